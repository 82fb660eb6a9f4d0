//! Failover health check entry point
//!
//! Invoked periodically by the HA supervisor on the active member of a
//! failover pair. Exit code 0 keeps the master role, 1 relinquishes it.

use clap::Parser;
use failover_health::client::{self, HealthClient};
use failover_health::config::{self, RouterConfig};
use failover_health::contracts::Decision;
use failover_health::engine::{DecisionEngine, EvaluationInput, DEFAULT_ACTIVE_CIRCUIT_THRESHOLD};
use failover_health::probe::{CircuitProbe, CommandCircuitProbe, DEFAULT_CIRCUIT_COMMAND};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "failover-health")]
#[command(about = "Edge router failover health check - exit code signals role arbitration")]
#[command(version)]
struct Cli {
    /// Edge router config file
    #[arg(
        short = 'c',
        long,
        env = "ROUTER_CONFIG_FILE_PATH",
        default_value = config::DEFAULT_CONFIG_PATH
    )]
    router_config: PathBuf,

    /// Seconds to allow for session drainage before switching
    #[arg(
        short = 't',
        long,
        env = "SWITCH_TIMEOUT",
        default_value_t = config::DEFAULT_SWITCH_TIMEOUT_SECS
    )]
    switch_timeout: u64,

    /// YAML file listing router ids with the no-traversal flag set
    #[arg(short = 'r', long, env = "NO_T_FLAG_ROUTERS_FILE_PATH")]
    exclusion_file: Option<PathBuf>,

    /// Minimum level of log messages to display
    #[arg(short = 'l', long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log to this file in addition to the console
    #[arg(short = 'f', long, env = "LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Command used to count live circuits
    #[arg(long, env = "CIRCUIT_COMMAND", default_value = DEFAULT_CIRCUIT_COMMAND)]
    circuit_command: String,

    /// Decide from the drain timeout alone, without probing circuits
    #[arg(long)]
    skip_circuit_probe: bool,

    /// More than this many circuits counts as sessions still draining
    #[arg(long, default_value_t = DEFAULT_ACTIVE_CIRCUIT_THRESHOLD)]
    active_circuit_threshold: u32,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let guard = init_tracing(&cli);

    let code = run(cli).await;

    // Flush the file writer before the hard exit
    drop(guard);
    std::process::exit(code);
}

fn init_tracing(cli: &Cli) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_new(&cli.log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let (file_layer, guard) = match &cli.log_file {
        Some(path) => match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                let (writer, guard) = tracing_appender::non_blocking(file);
                let layer = tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer);
                (Some(layer), Some(guard))
            }
            Err(err) => {
                eprintln!("Cannot open log file {}: {}", path.display(), err);
                (None, None)
            }
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

async fn run(cli: Cli) -> i32 {
    // Configuration and resolution problems mean "cannot evaluate this
    // cycle"; they must not force a failover.
    let config = match RouterConfig::from_file(&cli.router_config) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "Cannot load router config; skipping evaluation");
            return 0;
        }
    };

    let (port, path) = match config.health_check_endpoint() {
        Ok(endpoint) => endpoint,
        Err(err) => {
            tracing::error!(error = %err, "Cannot locate health-check listener; skipping evaluation");
            return 0;
        }
    };

    let control_addrs = match config.control_addresses().await {
        Ok(addrs) => addrs,
        Err(err) => {
            tracing::error!(error = %err, "Cannot resolve control endpoint; skipping evaluation");
            return 0;
        }
    };
    tracing::debug!(?control_addrs, "Control endpoint addresses");

    let exclusions = config::load_exclusions(cli.exclusion_file.as_deref());
    tracing::debug!(?exclusions, "Non-traversable routers");

    // A node that cannot report on its own health is unhealthy.
    let client = match HealthClient::new(port, &path) {
        Ok(client) => client,
        Err(err) => {
            tracing::error!(error = %err, "Cannot build health client");
            return 1;
        }
    };

    let summary = match client.fetch().await {
        Ok(summary) => summary,
        Err(err) => {
            tracing::error!(error = %err, "Health data fetch failed");
            return 1;
        }
    };
    tracing::debug!(overall_healthy = summary.healthy, "Fetched health data");

    let (control, links) = match client::extract_checks(summary) {
        Ok(checks) => checks,
        Err(err) => {
            tracing::error!(error = %err, "Health payload is unusable");
            return 1;
        }
    };

    let probe = if cli.skip_circuit_probe {
        None
    } else {
        match CommandCircuitProbe::from_command_line(&cli.circuit_command) {
            Ok(probe) => Some(probe),
            Err(err) => {
                tracing::warn!(error = %err, "Invalid circuit command; continuing without the probe");
                None
            }
        }
    };

    let input = EvaluationInput {
        control,
        links,
        exclusions,
        control_addrs,
        switch_timeout_secs: cli.switch_timeout,
        active_circuit_threshold: cli.active_circuit_threshold,
    };

    let engine = DecisionEngine::new();
    let result = engine
        .evaluate(&input, probe.as_ref().map(|p| p as &dyn CircuitProbe))
        .await;

    match result.decision {
        Decision::RemainActive => {
            tracing::info!(state = ?result.state, "{}", result.rationale)
        }
        Decision::Relinquish => {
            tracing::warn!(state = ?result.state, "{}", result.rationale)
        }
    }
    result.decision.exit_code()
}
