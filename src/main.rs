//! simdrive CLI
//!
//! Estimates time-to-failure statistics for one or more topology files, or for
//! a single topology read from standard input.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use rand::Rng;
use tokio::io::AsyncReadExt;

use simdrive::trial::TRIALS_COUNT_DEFAULT;
use simdrive::{DeterministicRng, Drive, Topology, TrialConfig, TrialRunner};

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Application name
pub const APP_NAME: &str = "simdrive";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable holding a replay seed
pub const SEED_ENV_VAR: &str = "SIMDRIVE_SEED";

/// Label used for a topology read from standard input
const STDIN_LABEL: &str = "<stdin>";

// =============================================================================
// CLI
// =============================================================================

/// Monte Carlo failure-time estimator for storage topologies
#[derive(Parser, Debug)]
#[command(name = APP_NAME)]
#[command(about = "Estimate how long a storage topology survives")]
#[command(version)]
struct Cli {
    /// Topology files (JSON); reads standard input when none are given
    files: Vec<String>,

    /// Number of trials per input
    #[arg(short = 'n', long, default_value_t = TRIALS_COUNT_DEFAULT, value_parser = parse_positive::<usize>)]
    iterations: usize,

    /// Master seed (defaults to $SIMDRIVE_SEED, then a random seed)
    #[arg(long)]
    seed: Option<u64>,

    /// Maximum trials in flight (defaults to available parallelism)
    #[arg(short, long, value_parser = parse_positive::<usize>)]
    jobs: Option<usize>,

    /// Stop a trial that has not failed after this many hours
    #[arg(long, value_parser = parse_positive::<u64>)]
    hours_max: Option<u64>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_positive<T>(s: &str) -> Result<T, String>
where
    T: std::str::FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let value: T = s.parse().map_err(|e| format!("{}", e))?;
    if value <= T::default() {
        return Err("must be positive".to_string());
    }
    Ok(value)
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .init();

    tracing::info!("{} v{}", APP_NAME, APP_VERSION);

    let seed = resolve_seed(cli.seed)?;
    tracing::info!(seed, "Using seed (replay with --seed {})", seed);

    let mut config = TrialConfig::new(cli.iterations, seed);
    if let Some(jobs) = cli.jobs {
        config = config.with_concurrency(jobs);
    }
    if let Some(hours_max) = cli.hours_max {
        config = config.with_hours_max(hours_max);
    }

    if cli.files.is_empty() {
        let mut bytes = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut bytes)
            .await
            .context("failed to read topology from stdin")?;
        let topology = Topology::from_json(&bytes).context("invalid topology on stdin")?;
        return process(STDIN_LABEL, topology, config, cli.json).await;
    }

    let mut failed = 0;
    for file in &cli.files {
        let path = shellexpand::tilde(file).to_string();
        let result = async {
            let topology = Topology::from_path(Path::new(&path))
                .await
                .with_context(|| format!("failed to load {}", path))?;
            process(file, topology, config, cli.json).await
        }
        .await;

        if let Err(e) = result {
            tracing::error!(input = %file, "{:#}", e);
            failed += 1;
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} inputs failed", failed, cli.files.len());
    }
    Ok(())
}

/// Pick the master seed: flag, then environment, then random.
fn resolve_seed(flag: Option<u64>) -> anyhow::Result<u64> {
    if let Some(seed) = flag {
        return Ok(seed);
    }
    match std::env::var(SEED_ENV_VAR) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid u64, got {:?}", SEED_ENV_VAR, value)),
        Err(_) => Ok(rand::thread_rng().gen()),
    }
}

/// Validate, simulate and report one topology.
async fn process(
    label: &str,
    topology: Topology,
    config: TrialConfig,
    json: bool,
) -> anyhow::Result<()> {
    tracing::info!(input = label, "Processing");
    let start = Instant::now();

    // Resolve once up front so config errors surface before any trial runs.
    let root = topology
        .build(&mut DeterministicRng::new(config.seed()))
        .with_context(|| format!("invalid topology in {}", label))?;
    log_topology(label, &topology, root.as_ref());

    let topology = Arc::new(topology);
    let report = TrialRunner::new(config)
        .run(move |rng| topology.build(rng))
        .await
        .with_context(|| format!("trials failed for {}", label))?;
    let elapsed = start.elapsed();
    tracing::info!(input = label, "{:?} elapsed", elapsed);

    let stats = report
        .statistics()
        .with_context(|| format!("no trials to summarize for {}", label))?;

    if json {
        let output = serde_json::json!({
            "input": label,
            "seed": config.seed(),
            "elapsed_secs": elapsed.as_secs_f64(),
            "statistics": stats,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}: {:?} elapsed", label, elapsed);
        print!("{}", stats);
    }

    Ok(())
}

fn log_topology(label: &str, topology: &Topology, root: &dyn Drive) {
    tracing::info!(
        input = label,
        nodes = topology.node_count(),
        capacity_bytes = root.capacity_bytes(),
        throughput = root.throughput(),
        "Resolved topology"
    );
}
