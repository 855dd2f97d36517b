use std::{collections::BTreeSet, fmt::Display};

use crate::{
    address::{AddressScheme, HttpAddress, NodeId, TransportAddress},
    error::Result,
    parse::{ObservedNetwork, ObservedPeerSet},
    topology::ExpectedTopology,
};

/// How peer lists of the network view are compared.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PeerOrdering {
    /// Lists must match element by element.
    #[default]
    Strict,
    /// Lists are compared as sets: order and repeated entries are ignored.
    Unordered,
}

impl Display for PeerOrdering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerOrdering::Strict => write!(f, "strict"),
            PeerOrdering::Unordered => write!(f, "unordered"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    NodePeers {
        node: NodeId,
        missing: BTreeSet<TransportAddress>,
        unexpected: BTreeSet<TransportAddress>,
    },
    Network {
        diff: NetworkDiff,
        expected: ObservedNetwork,
        actual: ObservedNetwork,
    },
}

impl Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mismatch::NodePeers {
                node,
                missing,
                unexpected,
            } => write!(
                f,
                "peers of node {node} differ, missing: {}, unexpected: {}",
                list(missing),
                list(unexpected)
            ),
            Mismatch::Network {
                diff,
                expected,
                actual,
            } => write!(
                f,
                "network peer view differs ({diff}); expected {}, actual {}",
                render(expected),
                render(actual)
            ),
        }
    }
}

/// Per-key differences between an expected and an observed network view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkDiff {
    pub missing_nodes: Vec<HttpAddress>,
    pub unexpected_nodes: Vec<HttpAddress>,
    pub differing: Vec<PeerListDiff>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerListDiff {
    pub node: HttpAddress,
    pub expected: Vec<TransportAddress>,
    pub actual: Vec<TransportAddress>,
}

impl NetworkDiff {
    pub fn is_empty(&self) -> bool {
        self.missing_nodes.is_empty() && self.unexpected_nodes.is_empty() && self.differing.is_empty()
    }
}

impl Display for NetworkDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if !self.missing_nodes.is_empty() {
            parts.push(format!("missing nodes: {}", list(&self.missing_nodes)));
        }
        if !self.unexpected_nodes.is_empty() {
            parts.push(format!("unexpected nodes: {}", list(&self.unexpected_nodes)));
        }
        for entry in &self.differing {
            parts.push(format!(
                "{}: expected [{}], got [{}]",
                entry.node,
                join(&entry.expected),
                join(&entry.actual)
            ));
        }
        if parts.is_empty() {
            write!(f, "no differences")
        } else {
            write!(f, "{}", parts.join("; "))
        }
    }
}

/// Checks the peers reported by `node` against the declared topology.
///
/// Fails unless the observed set equals the expected one exactly.
pub fn check_node_peers(
    node: NodeId,
    observed: &ObservedPeerSet,
    expected: &ExpectedTopology,
    scheme: &AddressScheme,
) -> Result<()> {
    let expected_peers = expected.expected_peers(node, scheme)?;
    tracing::debug!(%node, actual = ?observed, expected = ?expected_peers, "comparing peers");
    if *observed == expected_peers {
        return Ok(());
    }
    let missing = expected_peers.difference(observed).cloned().collect();
    let unexpected = observed.difference(&expected_peers).cloned().collect();
    Err(Mismatch::NodePeers {
        node,
        missing,
        unexpected,
    }
    .into())
}

/// Checks the whole network view against the declared topology.
pub fn check_network(
    observed: &ObservedNetwork,
    expected: &ExpectedTopology,
    scheme: &AddressScheme,
    ordering: PeerOrdering,
) -> Result<()> {
    let expected_network = expected.expected_network(scheme);
    let diff = diff_networks(&expected_network, observed, ordering);
    if diff.is_empty() {
        return Ok(());
    }
    Err(Mismatch::Network {
        diff,
        expected: expected_network,
        actual: observed.clone(),
    }
    .into())
}

pub fn diff_networks(
    expected: &ObservedNetwork,
    actual: &ObservedNetwork,
    ordering: PeerOrdering,
) -> NetworkDiff {
    let mut diff = NetworkDiff::default();
    for (node, expected_peers) in expected {
        match actual.get(node) {
            None => diff.missing_nodes.push(node.clone()),
            Some(actual_peers) if !same_peers(expected_peers, actual_peers, ordering) => {
                diff.differing.push(PeerListDiff {
                    node: node.clone(),
                    expected: expected_peers.clone(),
                    actual: actual_peers.clone(),
                });
            }
            Some(_) => {}
        }
    }
    diff.unexpected_nodes = actual
        .keys()
        .filter(|node| !expected.contains_key(*node))
        .cloned()
        .collect();
    diff
}

fn same_peers(
    expected: &[TransportAddress],
    actual: &[TransportAddress],
    ordering: PeerOrdering,
) -> bool {
    match ordering {
        PeerOrdering::Strict => expected == actual,
        PeerOrdering::Unordered => {
            expected.iter().collect::<BTreeSet<_>>() == actual.iter().collect::<BTreeSet<_>>()
        }
    }
}

fn join<'a, T: Display + 'a>(items: impl IntoIterator<Item = &'a T>) -> String {
    items
        .into_iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn list<'a, T: Display + 'a>(items: impl IntoIterator<Item = &'a T>) -> String {
    let joined = join(items);
    if joined.is_empty() {
        "none".to_owned()
    } else {
        joined
    }
}

fn render(network: &ObservedNetwork) -> String {
    serde_json::to_string(network).unwrap_or_else(|_| format!("{network:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Error, parse::parse_network};

    fn fixture() -> ExpectedTopology {
        ExpectedTopology::five_node_fixture()
    }

    fn peers(addrs: &[&str]) -> ObservedPeerSet {
        addrs.iter().copied().map(TransportAddress::from).collect()
    }

    fn unwrap_mismatch(result: Result<()>) -> Mismatch {
        match result {
            Err(Error::TopologyMismatch(mismatch)) => *mismatch,
            other => panic!("expected a topology mismatch, got {other:?}"),
        }
    }

    #[test]
    fn node_peers_match() {
        let observed = peers(&[
            "tcp://validator-3:8800",
            "tcp://validator-0:8800",
            "tcp://validator-2:8800",
        ]);
        check_node_peers(NodeId::new(1), &observed, &fixture(), &AddressScheme::default()).unwrap();
    }

    #[test]
    fn node_peers_extra_peer_is_reported() {
        let observed = peers(&["tcp://validator-1:8800", "tcp://validator-2:8800"]);
        let mismatch = unwrap_mismatch(check_node_peers(
            NodeId::new(0),
            &observed,
            &fixture(),
            &AddressScheme::default(),
        ));
        assert_eq!(
            mismatch,
            Mismatch::NodePeers {
                node: NodeId::new(0),
                missing: BTreeSet::new(),
                unexpected: peers(&["tcp://validator-2:8800"]),
            }
        );
        assert!(mismatch.to_string().contains("validator-2:8800"));
    }

    #[test]
    fn node_peers_missing_peer_is_reported() {
        let observed = peers(&["tcp://validator-1:8800"]);
        let mismatch = unwrap_mismatch(check_node_peers(
            NodeId::new(4),
            &observed,
            &fixture(),
            &AddressScheme::default(),
        ));
        let Mismatch::NodePeers {
            missing,
            unexpected,
            ..
        } = mismatch
        else {
            panic!("wrong mismatch kind");
        };
        assert_eq!(
            missing,
            peers(&["tcp://validator-2:8800", "tcp://validator-3:8800"])
        );
        assert_eq!(unexpected, peers(&["tcp://validator-1:8800"]));
    }

    #[test]
    fn network_matches_itself() {
        let scheme = AddressScheme::default();
        let topology = fixture();
        let network = topology.expected_network(&scheme);
        check_network(&network, &topology, &scheme, PeerOrdering::Strict).unwrap();
        check_network(&network, &topology, &scheme, PeerOrdering::Unordered).unwrap();
    }

    #[test]
    fn network_from_json_output() {
        let raw = r#"{
            "http://rest-api-0:8008": ["tcp://validator-1:8800"],
            "http://rest-api-1:8008": ["tcp://validator-0:8800", "tcp://validator-2:8800", "tcp://validator-3:8800"],
            "http://rest-api-2:8008": ["tcp://validator-1:8800", "tcp://validator-4:8800"],
            "http://rest-api-3:8008": ["tcp://validator-1:8800", "tcp://validator-4:8800"],
            "http://rest-api-4:8008": ["tcp://validator-2:8800", "tcp://validator-3:8800"]
        }"#;
        let observed = parse_network(raw).unwrap();
        check_network(
            &observed,
            &fixture(),
            &AddressScheme::default(),
            PeerOrdering::Strict,
        )
        .unwrap();
    }

    #[test]
    fn network_reordered_peers_depend_on_ordering() {
        let scheme = AddressScheme::default();
        let topology = fixture();
        let mut observed = topology.expected_network(&scheme);
        observed
            .get_mut(&HttpAddress::from("http://rest-api-1:8008"))
            .unwrap()
            .reverse();

        check_network(&observed, &topology, &scheme, PeerOrdering::Unordered).unwrap();
        let mismatch = unwrap_mismatch(check_network(
            &observed,
            &topology,
            &scheme,
            PeerOrdering::Strict,
        ));
        let Mismatch::Network { diff, .. } = mismatch else {
            panic!("wrong mismatch kind");
        };
        assert_eq!(diff.differing.len(), 1);
        assert_eq!(diff.differing[0].node.as_str(), "http://rest-api-1:8008");
    }

    #[test]
    fn network_missing_and_extra_nodes() {
        let scheme = AddressScheme::default();
        let topology = fixture();
        let mut observed = topology.expected_network(&scheme);
        observed.remove(&HttpAddress::from("http://rest-api-0:8008"));
        observed.insert(HttpAddress::from("http://rest-api-9:8008"), vec![]);

        let mismatch = unwrap_mismatch(check_network(
            &observed,
            &topology,
            &scheme,
            PeerOrdering::Unordered,
        ));
        let Mismatch::Network { diff, .. } = &mismatch else {
            panic!("wrong mismatch kind");
        };
        assert_eq!(
            diff.missing_nodes,
            vec![HttpAddress::from("http://rest-api-0:8008")]
        );
        assert_eq!(
            diff.unexpected_nodes,
            vec![HttpAddress::from("http://rest-api-9:8008")]
        );
        assert!(diff.differing.is_empty());
        let message = mismatch.to_string();
        assert!(message.contains("missing nodes: http://rest-api-0:8008"));
        assert!(message.contains("unexpected nodes: http://rest-api-9:8008"));
    }

    #[test]
    fn network_differing_peer_values() {
        let scheme = AddressScheme::default();
        let topology = fixture();
        let mut observed = topology.expected_network(&scheme);
        observed.insert(
            HttpAddress::from("http://rest-api-2:8008"),
            vec![TransportAddress::from("tcp://validator-1:8800")],
        );
        assert!(check_network(&observed, &topology, &scheme, PeerOrdering::Unordered).is_err());
    }

    #[test]
    fn unordered_ignores_duplicates() {
        let v1 = TransportAddress::from("tcp://validator-1:8800");
        let v2 = TransportAddress::from("tcp://validator-2:8800");
        let repeated = vec![v1.clone(), v1.clone(), v2.clone()];
        assert!(same_peers(&repeated, &[v2.clone(), v1.clone()], PeerOrdering::Unordered));
        assert!(!same_peers(&repeated, &[v2.clone(), v1.clone()], PeerOrdering::Strict));
        assert!(!same_peers(
            &[v1.clone(), v1.clone()],
            &[v1, v2],
            PeerOrdering::Unordered
        ));
    }

    #[test]
    fn network_with_repeated_peer_passes_unordered() {
        let scheme = AddressScheme::default();
        let topology = fixture();
        let mut observed = topology.expected_network(&scheme);
        observed
            .get_mut(&HttpAddress::from("http://rest-api-0:8008"))
            .unwrap()
            .push(TransportAddress::from("tcp://validator-1:8800"));

        check_network(&observed, &topology, &scheme, PeerOrdering::Unordered).unwrap();
        assert!(check_network(&observed, &topology, &scheme, PeerOrdering::Strict).is_err());
    }
}
