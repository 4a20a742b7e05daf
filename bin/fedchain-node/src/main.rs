//! Fedchain Node Binary
//!
//! Hosts the federated round ledger in-process together with the round
//! tracker that turns ledger events into `START_AGGREGATION` requests.
//!
//! Commands:
//! - `run`: serve until interrupted, logging every aggregation request
//! - `simulate`: drive a number of rounds end to end and exit

mod config;
mod node;
mod simulate;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::NodeConfig;
use node::Node;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "fedchain-node")]
#[command(about = "Federated round ledger and quorum tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,

    /// Override the legacy quorum threshold
    #[arg(long)]
    legacy_quorum_threshold: Option<usize>,

    /// Override the default participant set (comma separated)
    #[arg(long, value_delimiter = ',')]
    default_participants: Option<Vec<String>>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve until Ctrl-C
    Run,
    /// Drive simulated rounds through the ledger and tracker
    Simulate {
        /// Number of rounds
        #[arg(long, default_value = "2")]
        rounds: u32,

        /// Participating banks (comma separated)
        #[arg(long, value_delimiter = ',', default_value = "dbs,ing,ocbc")]
        participants: Vec<String>,

        /// Seconds to wait for each aggregation request
        #[arg(long, default_value = "5")]
        timeout_secs: u64,
    },
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    let log_level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_logs)?;

    let (mut config, loaded) = NodeConfig::load_or_default(&cli.config)?;
    if loaded {
        info!(path = %cli.config, "Configuration loaded");
    } else {
        warn!(path = %cli.config, "Config file not found, using defaults");
    }
    if let Some(threshold) = cli.legacy_quorum_threshold {
        config.ledger.legacy_quorum_threshold = threshold;
    }
    if let Some(participants) = cli.default_participants {
        config.tracker.default_participants = participants;
    }
    config.validate()?;

    info!(
        legacy_quorum_threshold = config.ledger.legacy_quorum_threshold,
        default_participants = ?config.tracker.default_participants,
        "Starting fedchain node"
    );

    let node = Node::start(&config)?;

    match cli.command {
        Command::Run => {
            let mut aggregations = node.aggregation_listener();
            tokio::spawn(async move {
                while let Ok(message) = aggregations.recv().await {
                    info!(message = %message, "Aggregation request");
                }
            });

            tokio::signal::ctrl_c().await?;
            info!("Shutdown requested");
        }
        Command::Simulate {
            rounds,
            participants,
            timeout_secs,
        } => {
            let report = simulate::run(
                &node,
                rounds,
                &participants,
                std::time::Duration::from_secs(timeout_secs),
            )
            .await?;
            info!(
                rounds = report.rounds,
                aggregations = report.aggregations,
                "Simulation complete"
            );
            println!("{}", node.metrics.encode()?);
        }
    }

    node.stop().await?;
    Ok(())
}
