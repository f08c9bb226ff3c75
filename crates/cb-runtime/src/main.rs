//! # cb-harness
//!
//! Runs the big-block compact relay scenario against a regtest node.
//!
//! ## Startup Sequence
//!
//! 1. Parse CLI arguments and load the TOML configuration
//! 2. Initialise logging (`RUST_LOG` overrides the configured filter)
//! 3. Connect to the node's RPC server
//! 4. Run the scenario and print the step report as JSON
//!
//! Exits with status 1 when any step fails.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cb_runtime::{BigBlockScenario, HarnessConfig, JsonRpcNode};

/// Big-block compact relay harness
#[derive(Parser, Debug)]
#[command(name = "cb-harness")]
#[command(about = "Checks that a node relays and accepts big blocks via compact blocks")]
struct Args {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Node P2P address, overrides [node] p2p_addr
    #[arg(long)]
    node_p2p: Option<String>,

    /// Node RPC URL, overrides [node] rpc_url
    #[arg(long)]
    rpc_url: Option<String>,

    /// Bound on every wait in seconds, overrides [scenario] wait_timeout_secs
    #[arg(long)]
    timeout_secs: Option<u64>,
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("cb-harness: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<bool> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_logging(&config)?;

    info!("[cb-runtime] Node P2P {} / RPC {}", config.node.p2p_addr, config.node.rpc_url);

    // RPC calls must outlive the slowest step: submitting an 8 MB block's
    // transactions one by one.
    let rpc_timeout = config.wait_timeout().max(Duration::from_secs(30));
    let mut rpc = JsonRpcNode::new(config.node.rpc_url.clone(), rpc_timeout)
        .context("Failed to build RPC client")?;
    if let (Some(user), Some(password)) = (&config.node.rpc_user, &config.node.rpc_password) {
        rpc = rpc.with_auth(user.clone(), password.clone());
    }

    let mut scenario =
        BigBlockScenario::new(config, rpc).context("Failed to read the node's best block")?;
    let outcome = scenario.run();
    let report = scenario.into_report();

    println!(
        "{}",
        report.to_json().context("Failed to serialize the report")?
    );

    match outcome {
        Ok(()) => {
            info!("[cb-runtime] All {} steps passed", report.steps.len());
            Ok(true)
        }
        Err(e) => {
            error!("[cb-runtime] Scenario aborted: {}", e);
            Ok(false)
        }
    }
}

fn load_config(args: &Args) -> Result<HarnessConfig> {
    let mut config = match &args.config {
        Some(path) => HarnessConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => HarnessConfig::default(),
    };
    if let Some(addr) = &args.node_p2p {
        config.node.p2p_addr = addr.clone();
    }
    if let Some(url) = &args.rpc_url {
        config.node.rpc_url = url.clone();
    }
    if let Some(secs) = args.timeout_secs {
        config.scenario.wait_timeout_secs = secs;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn init_logging(config: &HarnessConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))
        .context("Invalid log filter")?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
