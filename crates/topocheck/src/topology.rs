use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use crate::{
    address::{AddressScheme, NodeId, TransportAddress},
    error::{Error, Result},
    parse::{ObservedNetwork, ObservedPeerSet},
};

/// Declared peers of every node in a fixture.
///
/// Symmetry is not enforced: the declaration is the ground truth the
/// observations are checked against, so a one-sided edge is reported as
/// a mismatch by the checks rather than rejected here.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ExpectedTopology {
    nodes: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl ExpectedTopology {
    pub fn new<I, P>(nodes: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u32, P)>,
        P: IntoIterator<Item = u32>,
    {
        let nodes = nodes
            .into_iter()
            .map(|(node, peers)| {
                (
                    NodeId::new(node),
                    peers.into_iter().map(NodeId::new).collect(),
                )
            })
            .collect();
        let topology = Self { nodes };
        topology.validate()?;
        Ok(topology)
    }

    /// Five validators peered as a small mesh:
    /// `0-1`, `1-2`, `1-3`, `2-4`, `3-4`.
    pub fn five_node_fixture() -> Self {
        let nodes = [
            (0, vec![1]),
            (1, vec![0, 2, 3]),
            (2, vec![1, 4]),
            (3, vec![1, 4]),
            (4, vec![2, 3]),
        ]
        .into_iter()
        .map(|(node, peers)| {
            (
                NodeId::new(node),
                peers.into_iter().map(NodeId::new).collect(),
            )
        })
        .collect();
        Self { nodes }
    }

    /// Reads a JSON object mapping node ids to arrays of peer ids,
    /// e.g. `{"0": [1], "1": [0]}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let topology: Self = serde_json::from_str(json)
            .map_err(|e| Error::InvalidTopology(format!("malformed topology: {e}").into()))?;
        topology.validate()?;
        Ok(topology)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::InvalidTopology("no nodes declared".into()));
        }
        for (node, peers) in &self.nodes {
            if peers.contains(node) {
                return Err(Error::InvalidTopology(
                    format!("node {node} declares itself as a peer").into(),
                ));
            }
        }
        Ok(())
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn peers_of(&self, node: NodeId) -> Result<&BTreeSet<NodeId>> {
        self.nodes
            .get(&node)
            .ok_or_else(|| Error::InvalidTopology(format!("node {node} is not declared").into()))
    }

    pub fn expected_peers(&self, node: NodeId, scheme: &AddressScheme) -> Result<ObservedPeerSet> {
        Ok(self
            .peers_of(node)?
            .iter()
            .map(|peer| scheme.peer_address(*peer))
            .collect())
    }

    /// The network view the aggregation CLI should report: every node's HTTP
    /// address mapped to its peers' transport addresses in ascending id order.
    pub fn expected_network(&self, scheme: &AddressScheme) -> ObservedNetwork {
        self.nodes
            .iter()
            .map(|(node, peers)| {
                let peers: Vec<TransportAddress> =
                    peers.iter().map(|peer| scheme.peer_address(*peer)).collect();
                (scheme.http_address(*node), peers)
            })
            .collect()
    }

    /// Declared edges `(a, b)` for which `b` does not list `a` back.
    pub fn asymmetric_edges(&self) -> Vec<(NodeId, NodeId)> {
        let mut edges = Vec::new();
        for (node, peers) in &self.nodes {
            for peer in peers {
                let reciprocal = self
                    .nodes
                    .get(peer)
                    .is_some_and(|back| back.contains(node));
                if !reciprocal {
                    edges.push((*node, *peer));
                }
            }
        }
        edges
    }
}
