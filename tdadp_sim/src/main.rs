//! TDADP Experiment CLI
//!
//! Run truth-discovery experiments against simulated poisoning attacks.

use clap::Parser;
use std::path::PathBuf;
use tdadp_core::{EngineConfig, ReliabilityMode};
use tdadp_sim::scenarios::ScenarioId;
use tdadp_sim::{
    AttackParams, DatasetSource, ExperimentExport, ExperimentResult, ExperimentRunner, SimError, SyntheticParams,
};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// TDADP experiment CLI
#[derive(Parser, Debug)]
#[command(name = "tdadp-sim")]
#[command(about = "Run truth-discovery experiments under data poisoning", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of runs per scenario
    #[arg(short, long, default_value = "10")]
    runs: usize,

    /// Scenario to run (baseline, sybil, coalition, noisy_coalition, takeover, custom, all)
    #[arg(short = 'S', long, default_value = "coalition")]
    scenario: String,

    /// Load a real dataset (answer.csv, truth.csv, optional quali.csv and
    /// quali_truth.csv) from this directory instead of generating one
    #[arg(short, long)]
    dataset: Option<PathBuf>,

    /// Number of normal tasks (N)
    #[arg(long, default_value = "200")]
    tasks: usize,

    /// Number of workers (M)
    #[arg(long, default_value = "50")]
    workers: usize,

    /// Label cardinality (L)
    #[arg(long, default_value = "2")]
    labels: usize,

    /// Workers per task (K)
    #[arg(short = 'k', long, default_value = "5")]
    workers_per_task: usize,

    /// Mean worker accuracy (θ)
    #[arg(long, default_value = "0.7")]
    theta: f64,

    /// Standard deviation of per-worker accuracy
    #[arg(long, default_value = "0.0")]
    theta_spread: f64,

    /// Number of golden tasks (simulated when a dataset provides none)
    #[arg(long, default_value = "20")]
    golden: usize,

    /// Malicious worker fraction (μ) for the custom scenario
    #[arg(long, default_value = "0.0")]
    mu: f64,

    /// Number of attackers (λ) for the custom scenario
    #[arg(long, default_value = "0")]
    lambda: usize,

    /// Deviation probability (ε) for the custom scenario
    #[arg(long, default_value = "0.0")]
    epsilon: f64,

    /// Batch size (B)
    #[arg(short = 'b', long)]
    batch_size: Option<usize>,

    /// Testing probability mix (α)
    #[arg(long)]
    alpha: Option<f64>,

    /// Trust ban threshold (τ)
    #[arg(long)]
    tau: Option<f64>,

    /// Reliability threshold (δ)
    #[arg(long)]
    delta: Option<f64>,

    /// Reproduce floor-division reliability arithmetic
    #[arg(long)]
    truncated: bool,

    /// Engine config JSON file (flags override its values)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use the virtual clock (elapsed times reported as 0)
    #[arg(long)]
    virtual_clock: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON summary on stdout
    #[arg(long)]
    json: bool,

    /// Export the experiment to a JSON file
    #[arg(long)]
    export: Option<String>,
}

impl Args {
    fn dataset_source(&self) -> DatasetSource {
        match &self.dataset {
            Some(path) => DatasetSource::Directory {
                path: path.clone(),
                golden_tasks: self.golden,
            },
            None => DatasetSource::Synthetic(SyntheticParams {
                tasks: self.tasks,
                workers: self.workers,
                labels: self.labels,
                workers_per_task: self.workers_per_task,
                accuracy: self.theta,
                accuracy_spread: self.theta_spread,
                golden_tasks: self.golden,
            }),
        }
    }

    fn engine_config(&self) -> Result<EngineConfig, SimError> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_json(&std::fs::read_to_string(path)?)?,
            None => EngineConfig::default(),
        };
        if let Some(b) = self.batch_size {
            config = config.with_batch_size(b);
        }
        if let Some(alpha) = self.alpha {
            config = config.with_alpha(alpha);
        }
        if let Some(tau) = self.tau {
            config = config.with_tau(tau);
        }
        if let Some(delta) = self.delta {
            config = config.with_delta(delta);
        }
        if self.truncated {
            config = config.with_reliability_mode(ReliabilityMode::Truncated);
        }
        Ok(config)
    }

    fn custom_attack(&self) -> AttackParams {
        AttackParams::new(self.mu, self.lambda, self.epsilon)
    }
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if !args.json {
        info!("TDADP Experiment Simulator v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    if let Err(e) = run(&args) {
        error!("✗ Experiment failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), SimError> {
    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().map_err(SimError::Scenario)?]
    };

    if args.export.is_some() && scenarios.len() > 1 {
        return Err(SimError::Scenario(
            "--export only supports a single scenario, not 'all'".to_string(),
        ));
    }

    // Determine base seed
    let seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };

    let runner = ExperimentRunner::new(seed, args.runs)
        .with_source(args.dataset_source())
        .with_config(args.engine_config()?)
        .with_virtual_clock(args.virtual_clock);

    let mut results: Vec<ExperimentResult> = Vec::new();
    for scenario in &scenarios {
        if !args.json {
            info!("▶ {}: {}", scenario.name(), scenario.description());
        }
        let result = runner.run(*scenario, args.custom_attack())?;

        if !args.json {
            info!("✓ {} (seed={}, experiment={})", scenario.name(), seed, result.id);
            result.report.log();
        }

        if let Some(path) = &args.export {
            ExperimentExport::new(&result, runner.source(), runner.config()).write_to_file(path)?;
            info!("Exported {} runs to {}", result.runs.len(), path);
        }
        results.push(result);
    }

    if args.json {
        let summary = serde_json::json!({
            "seed": seed,
            "runs": args.runs,
            "results": results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "description": r.scenario.description(),
                    "experiment_id": r.id.0.to_string(),
                    "attack": r.attack,
                    "summary": r.report,
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("✅ {} scenario(s) completed", results.len());
    }
    Ok(())
}
