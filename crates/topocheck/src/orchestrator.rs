//! End to end verification of a running network.
//!
//! The orchestrator waits for the nodes to come up, then compares what each
//! node reports about its peers, and what the network CLI reports about the
//! whole network, with the declared topology. Checks run sequentially and
//! the first failure aborts the run.

use std::time::{Duration, Instant};

use crate::{
    address::{AddressScheme, HttpAddress, NodeId},
    command::CommandRunner,
    compare::{check_network, check_node_peers, PeerOrdering},
    error::{Error, Result},
    parse::{parse_network, parse_peer_set, Format, ObservedNetwork, ObservedPeerSet},
    topology::ExpectedTopology,
};

pub const DEFAULT_PEER_CLI: &str = "sawtooth";
pub const DEFAULT_NET_CLI: &str = "sawnet";
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Names of the external CLIs queried for peer information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommands {
    pub peer_cli: String,
    pub net_cli: String,
}

impl Default for ToolCommands {
    fn default() -> Self {
        Self {
            peer_cli: DEFAULT_PEER_CLI.to_owned(),
            net_cli: DEFAULT_NET_CLI.to_owned(),
        }
    }
}

impl ToolCommands {
    pub fn peer_list(&self, url: &HttpAddress, format: Format) -> String {
        format!("{} peer list --url {url} --format {format}", self.peer_cli)
    }

    pub fn network_list(&self, http_addresses: &str, pretty: bool) -> String {
        let mut command = format!("{} peers list {http_addresses}", self.net_cli);
        if pretty {
            command.push_str(" --pretty");
        }
        command
    }

    pub fn network_graph(&self, http_addresses: &str) -> String {
        format!("{} peers graph {http_addresses}", self.net_cli)
    }
}

/// How to decide the network is up before sampling it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Sleep for a fixed time and sample once.
    FixedDelay(Duration),
    /// Query every node until each one answers with at least as many peers
    /// as declared, failing once `timeout` elapses.
    Poll { timeout: Duration, interval: Duration },
}

impl Default for Readiness {
    fn default() -> Self {
        Readiness::Poll {
            timeout: DEFAULT_READINESS_TIMEOUT,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    pub scheme: AddressScheme,
    pub tools: ToolCommands,
    pub format: Format,
    pub ordering: PeerOrdering,
    pub readiness: Readiness,
}

/// Summary of a successful verification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub nodes_checked: Vec<NodeId>,
    pub network_checked: bool,
    pub smoke_commands: Vec<String>,
}

pub struct Orchestrator<R> {
    runner: R,
    topology: ExpectedTopology,
    config: OrchestratorConfig,
}

impl<R: CommandRunner> Orchestrator<R> {
    pub fn new(runner: R, topology: ExpectedTopology, config: OrchestratorConfig) -> Self {
        Self {
            runner,
            topology,
            config,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn expected_network(&self) -> ObservedNetwork {
        self.topology.expected_network(&self.config.scheme)
    }

    /// Runs every check: readiness, each node's peers, then the network view
    /// along with the smoke-tested pretty listing and graph rendering.
    pub async fn verify(&self) -> Result<VerificationReport> {
        let nodes: Vec<NodeId> = self.topology.nodes().collect();
        self.wait_until_ready(&nodes).await?;

        let mut report = VerificationReport::default();
        for node in nodes {
            self.check_node(node).await?;
            report.nodes_checked.push(node);
        }
        self.check_whole_network(&mut report).await?;
        tracing::info!(
            nodes = report.nodes_checked.len(),
            "network topology verified"
        );
        Ok(report)
    }

    pub async fn verify_node(&self, node: NodeId) -> Result<VerificationReport> {
        self.topology.peers_of(node)?;
        self.wait_until_ready(&[node]).await?;
        self.check_node(node).await?;
        Ok(VerificationReport {
            nodes_checked: vec![node],
            ..Default::default()
        })
    }

    pub async fn verify_network(&self) -> Result<VerificationReport> {
        let nodes: Vec<NodeId> = self.topology.nodes().collect();
        self.wait_until_ready(&nodes).await?;
        let mut report = VerificationReport::default();
        self.check_whole_network(&mut report).await?;
        Ok(report)
    }

    pub async fn observed_peers(&self, node: NodeId) -> Result<ObservedPeerSet> {
        let url = self.config.scheme.http_address(node);
        let command = self.config.tools.peer_list(&url, self.config.format);
        let output = self.runner.run(&command).await?;
        parse_peer_set(&output, self.config.format)
    }

    pub async fn observed_network(&self) -> Result<ObservedNetwork> {
        let command = self
            .config
            .tools
            .network_list(&self.http_addresses(), false);
        let output = self.runner.run(&command).await?;
        parse_network(&output)
    }

    pub async fn wait_until_ready(&self, nodes: &[NodeId]) -> Result<()> {
        match self.config.readiness {
            Readiness::FixedDelay(delay) => {
                tracing::info!(delay_ms = delay.as_millis() as u64, "waiting for peering");
                tokio::time::sleep(delay).await;
                Ok(())
            }
            Readiness::Poll { timeout, interval } => self.poll_ready(nodes, timeout, interval).await,
        }
    }

    async fn poll_ready(&self, nodes: &[NodeId], timeout: Duration, interval: Duration) -> Result<()> {
        let started = Instant::now();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let mut pending = Vec::new();
            let mut first_cause = None;
            for &node in nodes {
                let expected = self.topology.peers_of(node)?.len();
                let outcome = match self.observed_peers(node).await {
                    Ok(peers) if peers.len() >= expected => Ok(()),
                    Ok(peers) => {
                        check_node_peers(node, &peers, &self.topology, &self.config.scheme)
                    }
                    Err(err) => Err(err),
                };
                if let Err(err) = outcome {
                    pending.push(node);
                    first_cause.get_or_insert(err);
                }
            }

            let Some(cause) = first_cause else {
                tracing::info!(attempt, "network ready");
                return Ok(());
            };

            let waited = started.elapsed();
            if waited >= timeout {
                tracing::error!(?pending, %cause, "network did not become ready");
                return Err(Error::NotReady {
                    waited,
                    pending,
                    cause: Box::new(cause),
                });
            }
            tracing::debug!(attempt, ?pending, %cause, "network not ready yet");
            tokio::time::sleep(interval.min(timeout - waited)).await;
        }
    }

    async fn check_node(&self, node: NodeId) -> Result<()> {
        let observed = self.observed_peers(node).await?;
        check_node_peers(node, &observed, &self.topology, &self.config.scheme)
            .inspect_err(|err| tracing::error!(%node, "{err}"))?;
        tracing::info!(%node, peers = observed.len(), "node peers verified");
        Ok(())
    }

    async fn check_whole_network(&self, report: &mut VerificationReport) -> Result<()> {
        let addresses = self.http_addresses();

        let pretty = self.config.tools.network_list(&addresses, true);
        self.runner.run(&pretty).await?;
        report.smoke_commands.push(pretty);

        let observed = self.observed_network().await?;
        check_network(
            &observed,
            &self.topology,
            &self.config.scheme,
            self.config.ordering,
        )
        .inspect_err(|err| tracing::error!("{err}"))?;
        report.network_checked = true;
        tracing::info!(ordering = %self.config.ordering, "network peer view verified");

        let graph = self.config.tools.network_graph(&addresses);
        self.runner.run(&graph).await?;
        report.smoke_commands.push(graph);
        Ok(())
    }

    fn http_addresses(&self) -> String {
        self.config
            .scheme
            .joined_http_addresses(self.topology.nodes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_lines() {
        let tools = ToolCommands::default();
        let url = HttpAddress::from("http://rest-api-0:8008");
        assert_eq!(
            tools.peer_list(&url, Format::Csv),
            "sawtooth peer list --url http://rest-api-0:8008 --format csv"
        );
        assert_eq!(
            tools.network_list("http://rest-api-0:8008,http://rest-api-1:8008", true),
            "sawnet peers list http://rest-api-0:8008,http://rest-api-1:8008 --pretty"
        );
        assert_eq!(
            tools.network_list("http://rest-api-0:8008", false),
            "sawnet peers list http://rest-api-0:8008"
        );
        assert_eq!(
            tools.network_graph("http://rest-api-0:8008"),
            "sawnet peers graph http://rest-api-0:8008"
        );
    }

    #[test]
    fn polling_is_the_default() {
        assert!(matches!(
            OrchestratorConfig::default().readiness,
            Readiness::Poll { .. }
        ));
    }
}
