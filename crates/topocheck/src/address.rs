//! Naming of the endpoints each fixture node exposes.
//!
//! Every node runs a REST API reachable at `http://<http-label>-<id>:<http-port>`
//! and a validator listening for peers at `tcp://<peer-label>-<id>:<peer-port>`.

use std::{fmt::Display, num::ParseIntError, str::FromStr};

use serde::{Deserialize, Serialize};

pub const DEFAULT_HTTP_HOST_LABEL: &str = "rest-api";
pub const DEFAULT_HTTP_PORT: u16 = 8008;
pub const DEFAULT_PEER_HOST_LABEL: &str = "validator";
pub const DEFAULT_PEER_PORT: u16 = 8800;

/// Logical node index within a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl FromStr for NodeId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Administrative endpoint of a node, e.g. `http://rest-api-0:8008`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HttpAddress(String);

/// Peer-to-peer endpoint of a node, e.g. `tcp://validator-0:8800`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransportAddress(String);

macro_rules! address_impls {
    ($ty:ident) => {
        impl $ty {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $ty {
            fn from(addr: String) -> Self {
                Self(addr)
            }
        }

        impl From<&str> for $ty {
            fn from(addr: &str) -> Self {
                Self(addr.to_owned())
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

address_impls!(HttpAddress);
address_impls!(TransportAddress);

/// Host labels and ports used to derive node addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressScheme {
    pub http_host_label: String,
    pub http_port: u16,
    pub peer_host_label: String,
    pub peer_port: u16,
}

impl Default for AddressScheme {
    fn default() -> Self {
        Self {
            http_host_label: DEFAULT_HTTP_HOST_LABEL.to_owned(),
            http_port: DEFAULT_HTTP_PORT,
            peer_host_label: DEFAULT_PEER_HOST_LABEL.to_owned(),
            peer_port: DEFAULT_PEER_PORT,
        }
    }
}

impl AddressScheme {
    pub fn http_address(&self, node: NodeId) -> HttpAddress {
        HttpAddress(format!(
            "http://{}-{}:{}",
            self.http_host_label, node, self.http_port
        ))
    }

    pub fn peer_address(&self, node: NodeId) -> TransportAddress {
        TransportAddress(format!(
            "tcp://{}-{}:{}",
            self.peer_host_label, node, self.peer_port
        ))
    }

    /// Comma separated HTTP addresses of `nodes`, as accepted by the network CLI.
    pub fn joined_http_addresses(&self, nodes: impl IntoIterator<Item = NodeId>) -> String {
        nodes
            .into_iter()
            .map(|node| self.http_address(node).0)
            .collect::<Vec<_>>()
            .join(",")
    }
}

pub fn http_address(node: NodeId) -> HttpAddress {
    AddressScheme::default().http_address(node)
}

pub fn peer_address(node: NodeId) -> TransportAddress {
    AddressScheme::default().peer_address(node)
}
