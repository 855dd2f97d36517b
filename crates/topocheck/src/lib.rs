//! Verifies that the peer topology observed on a running validator network
//! matches a declared one.
//!
//! Peer views are sampled through external CLIs (one query per node, plus one
//! aggregated query for the whole network) and compared with an
//! [`ExpectedTopology`].

pub mod address;
pub mod command;
pub mod compare;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod parse;
pub mod topology;

pub use crate::{
    address::{http_address, peer_address, AddressScheme, HttpAddress, NodeId, TransportAddress},
    command::{CommandRunner, ProcessRunner},
    compare::{check_network, check_node_peers, Mismatch, NetworkDiff, PeerOrdering},
    error::{Error, ExecutionFailure, Result},
    orchestrator::{Orchestrator, OrchestratorConfig, Readiness, ToolCommands, VerificationReport},
    parse::{parse, parse_network, parse_peer_set, Format, ObservedNetwork, ObservedPeerSet, ParsedValue},
    topology::ExpectedTopology,
};
