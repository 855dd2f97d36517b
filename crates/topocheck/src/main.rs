use clap::Parser;
use topocheck::{
    config::{set_logger, Config, SubCommand},
    Orchestrator,
};

fn main() -> Result<(), anyhow::Error> {
    let config = Config::parse();
    set_logger(config.base.log_level);

    let topology = config.base.topology()?;
    let asymmetric = topology.asymmetric_edges();
    if !asymmetric.is_empty() {
        tracing::warn!(?asymmetric, "declared topology is not symmetric");
    }

    let orchestrator_config = config.base.orchestrator_config();
    let tokio_rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let orchestrator = Orchestrator::new(config.base.runner(), topology, orchestrator_config);
    let report = match config.sub_command {
        SubCommand::Expected => {
            let expected = orchestrator.expected_network();
            println!("{}", serde_json::to_string_pretty(&expected)?);
            return Ok(());
        }
        SubCommand::Verify => tokio_rt.block_on(orchestrator.verify())?,
        SubCommand::Node { id } => tokio_rt.block_on(orchestrator.verify_node(id))?,
        SubCommand::Network => tokio_rt.block_on(orchestrator.verify_network())?,
    };
    tracing::info!(
        nodes = ?report.nodes_checked,
        network = report.network_checked,
        "verification passed"
    );
    Ok(())
}
