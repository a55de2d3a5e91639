//! WTT Simulator
//!
//! Runs wrapped-token scenarios against a ledger on a simulated chain.

use clap::Parser;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wtt_ledger::{EventRecord, LedgerConfig};

mod actors;
mod controller;
mod metrics;
mod scenario;
mod third_party;

use controller::SimulationController;
use scenario::Scenario;

/// WTT Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "Scenario runner for the wrapped native token ledger")]
struct Args {
    /// Scenario name or JSON scenario file (runs every built-in when omitted)
    #[arg(short, long)]
    scenario: Option<String>,

    /// Number of simulated actors
    #[arg(short, long, default_value = "6")]
    actors: usize,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Operations performed by the random scenario
    #[arg(long, default_value = "500")]
    operations: usize,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Print the final ledger snapshot of each scenario as JSON
    #[arg(long)]
    snapshot: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(args.json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!args.json_logs).then(|| tracing_subscriber::fmt::layer()))
        .init();

    let config = LedgerConfig::from_env();
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let run_id = uuid::Uuid::now_v7();
    info!(
        run_id = %run_id,
        token = %config.symbol,
        decimals = config.decimals,
        actors = args.actors,
        "Starting WTT Simulator"
    );

    let names: Vec<String> = match &args.scenario {
        Some(name) => vec![name.clone()],
        None => Scenario::BUILT_IN.iter().map(|name| name.to_string()).collect(),
    };

    let mut failures = 0usize;
    for name in &names {
        let scenario = if name == "random" {
            Scenario::random(args.operations)
        } else {
            Scenario::load(name)?
        };

        let mut controller = SimulationController::new(&config, args.actors, args.seed)?;
        controller.initialize()?;
        let watcher = spawn_watcher(controller.subscribe());

        let outcome = controller.run_scenario(&scenario);

        let metrics = controller.metrics();
        info!(
            scenario = %scenario.name,
            total = metrics.total_operations,
            successful = metrics.successful_operations,
            failed = metrics.failed_operations,
            success_rate = metrics.success_rate(),
            custody = %controller.chain().custody(),
            custodian_unwrapped = %controller.custodian().unwrapped_total(),
            "Scenario metrics"
        );
        for (kind, counts) in metrics.kinds() {
            info!(kind = *kind, successful = counts.successful, failed = counts.failed, "Operation counts");
        }
        for (code, count) in metrics.failure_codes() {
            info!(code = *code, count = *count, "Failure counts");
        }

        if args.snapshot {
            println!("{}", serde_json::to_string_pretty(&controller.ledger().snapshot())?);
        }

        // Dropping the ledger closes the watcher channel.
        drop(controller);
        let observed = watcher.await?;

        match outcome {
            Ok(()) => info!(scenario = %scenario.name, events = observed, "Scenario passed"),
            Err(e) => {
                error!(scenario = %scenario.name, error = %e, "Scenario failed");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(anyhow::anyhow!("{} of {} scenarios failed", failures, names.len()));
    }

    info!(run_id = %run_id, scenarios = names.len(), "Simulation complete");
    Ok(())
}

/// Log ledger notifications as they arrive; returns how many were seen.
fn spawn_watcher(mut receiver: broadcast::Receiver<EventRecord>) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut seen = 0u64;
        loop {
            match receiver.recv().await {
                Ok(record) => {
                    seen += 1;
                    debug!(
                        sequence = record.sequence,
                        event = record.event.name(),
                        wad = %record.event.wad(),
                        "Ledger event"
                    );
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event watcher lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        seen
    })
}
