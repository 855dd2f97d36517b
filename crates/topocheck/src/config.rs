use std::{path::PathBuf, sync::atomic::AtomicBool, time::Duration};

use tracing::level_filters::LevelFilter;

use crate::{
    address::{
        AddressScheme, NodeId, DEFAULT_HTTP_HOST_LABEL, DEFAULT_HTTP_PORT, DEFAULT_PEER_HOST_LABEL,
        DEFAULT_PEER_PORT,
    },
    command::ProcessRunner,
    compare::PeerOrdering,
    error::Result,
    orchestrator::{OrchestratorConfig, Readiness, ToolCommands, DEFAULT_NET_CLI, DEFAULT_PEER_CLI},
    parse::Format,
    topology::ExpectedTopology,
};

#[derive(clap::Parser, Clone, Debug)]
#[clap(name = "topocheck")]
#[clap(about = "Verifies the peer topology of a running validator network")]
#[clap(version)]
pub struct Config {
    #[clap(subcommand)]
    pub sub_command: SubCommand,
    #[clap(flatten)]
    pub base: BaseConfig,
}

#[derive(clap::Subcommand, Clone, Debug)]
pub enum SubCommand {
    /// Check every node's peers, then the network wide view.
    Verify,
    /// Check the peers of a single node.
    Node {
        /// Node index within the topology.
        id: NodeId,
    },
    /// Check only the network wide view.
    Network,
    /// Print the expected network view as JSON without querying anything.
    Expected,
}

#[derive(clap::Parser, Clone, Debug)]
pub struct BaseConfig {
    /// JSON file mapping node ids to arrays of peer ids. Defaults to the
    /// five node fixture.
    #[arg(long, global = true, env = "TOPOCHECK_TOPOLOGY")]
    pub topology: Option<PathBuf>,
    /// CLI used to query a single node's peers.
    #[arg(long, global = true, default_value = DEFAULT_PEER_CLI)]
    pub peer_cli: String,
    /// CLI used to query the whole network.
    #[arg(long, global = true, default_value = DEFAULT_NET_CLI)]
    pub net_cli: String,
    #[arg(long, global = true, default_value = DEFAULT_HTTP_HOST_LABEL)]
    pub http_host_label: String,
    #[arg(long, global = true, default_value_t = DEFAULT_HTTP_PORT)]
    pub http_port: u16,
    #[arg(long, global = true, default_value = DEFAULT_PEER_HOST_LABEL)]
    pub peer_host_label: String,
    #[arg(long, global = true, default_value_t = DEFAULT_PEER_PORT)]
    pub peer_port: u16,
    /// Output format requested from the peer CLI.
    #[arg(long, global = true, value_enum, default_value_t = Format::Json)]
    pub format: Format,
    /// How peer lists of the network view are compared.
    #[arg(long, global = true, value_enum, default_value_t = PeerOrdering::Strict)]
    pub peer_ordering: PeerOrdering,
    /// Maximum time a single external command may run.
    #[arg(long, global = true, default_value_t = 30)]
    pub command_timeout_secs: u64,
    /// Maximum time to wait for every node to report its peers.
    #[arg(long, global = true, default_value_t = 60)]
    pub readiness_timeout_secs: u64,
    #[arg(long, global = true, default_value_t = 1000)]
    pub poll_interval_ms: u64,
    /// Sleep this long instead of polling the nodes for readiness.
    #[arg(long, global = true, conflicts_with_all = ["readiness_timeout_secs", "poll_interval_ms"])]
    pub warmup_secs: Option<u64>,
    /// Keep single quotes in command output as they are.
    #[arg(long, global = true)]
    pub no_quote_rewrite: bool,
    #[arg(long, global = true, env = "TOPOCHECK_LOG_LEVEL")]
    pub log_level: Option<LevelFilter>,
}

impl BaseConfig {
    pub fn topology(&self) -> Result<ExpectedTopology> {
        match &self.topology {
            Some(path) => ExpectedTopology::load(path),
            None => Ok(ExpectedTopology::five_node_fixture()),
        }
    }

    pub fn readiness(&self) -> Readiness {
        match self.warmup_secs {
            Some(secs) => Readiness::FixedDelay(Duration::from_secs(secs)),
            None => Readiness::Poll {
                timeout: Duration::from_secs(self.readiness_timeout_secs),
                interval: Duration::from_millis(self.poll_interval_ms),
            },
        }
    }

    pub fn scheme(&self) -> AddressScheme {
        AddressScheme {
            http_host_label: self.http_host_label.clone(),
            http_port: self.http_port,
            peer_host_label: self.peer_host_label.clone(),
            peer_port: self.peer_port,
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            scheme: self.scheme(),
            tools: ToolCommands {
                peer_cli: self.peer_cli.clone(),
                net_cli: self.net_cli.clone(),
            },
            format: self.format,
            ordering: self.peer_ordering,
            readiness: self.readiness(),
        }
    }

    pub fn runner(&self) -> ProcessRunner {
        let runner = ProcessRunner::new(Duration::from_secs(self.command_timeout_secs));
        if self.no_quote_rewrite {
            runner.without_quote_rewrite()
        } else {
            runner
        }
    }
}

/// Installs the global tracing subscriber; later calls are no-ops.
pub fn set_logger(level: Option<LevelFilter>) {
    static LOGGER_SET: AtomicBool = AtomicBool::new(false);
    if LOGGER_SET
        .compare_exchange(
            false,
            true,
            std::sync::atomic::Ordering::Release,
            std::sync::atomic::Ordering::SeqCst,
        )
        .is_err()
    {
        return;
    }

    if std::env::var("TOPOCHECK_DISABLE_LOGS").is_ok() {
        return;
    }

    let default_filter = if cfg!(any(test, debug_assertions)) {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter_layer = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(level.unwrap_or(default_filter).into())
        .from_env_lossy();

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

    let to_stderr = std::env::var("TOPOCHECK_LOG_TO_STDERR").is_ok();
    let fmt_layer = tracing_subscriber::fmt::layer().with_level(true).pretty();
    let fmt_layer = if cfg!(any(test, debug_assertions)) {
        fmt_layer.with_file(true).with_line_number(true)
    } else {
        fmt_layer
    };
    let fmt_layer = if to_stderr {
        fmt_layer.with_writer(std::io::stderr).boxed()
    } else {
        fmt_layer.boxed()
    };

    if let Err(err) = tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter_layer))
        .try_init()
    {
        eprintln!("failed to install logger: {err}");
    }
}
