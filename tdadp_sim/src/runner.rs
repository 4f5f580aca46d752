//! Experiment runner - replays many runs of one scenario against one dataset.

use crate::attack::{plan_attack, AttackParams};
use crate::context::SimContext;
use crate::dataset::{DatasetSource, SyntheticParams};
use crate::error::Result;
use crate::order::request_order;
use crate::report::Report;
use crate::scenarios::ScenarioId;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tdadp_core::{EngineConfig, RunMetrics, RunPlan, Tdadp};
use tdadp_env::{derive_seed, ExperimentId, SeedStream, WallClockContext};
use tracing::{debug, info, warn};

/// Results of an experiment.
#[derive(Debug, Clone)]
pub struct ExperimentResult {
    /// Identifier derived from the seed
    pub id: ExperimentId,

    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Attack strength actually used
    pub attack: AttackParams,

    /// Master seed
    pub seed: u64,

    /// Metrics of every run, in run order
    pub runs: Vec<RunMetrics>,

    /// Mean and standard error over the runs
    pub report: Report,
}

/// Runs experiments.
pub struct ExperimentRunner {
    /// Master seed
    seed: u64,

    /// Number of runs
    runs: usize,

    /// Dataset generation or loading
    source: DatasetSource,

    /// Engine thresholds
    config: EngineConfig,

    /// Measure runs with a virtual clock instead of the wall clock
    virtual_clock: bool,
}

impl ExperimentRunner {
    /// Creates a new experiment runner.
    pub fn new(seed: u64, runs: usize) -> Self {
        Self {
            seed,
            runs,
            source: DatasetSource::default(),
            config: EngineConfig::default(),
            virtual_clock: false,
        }
    }

    /// Generates a synthetic dataset from `params`.
    pub fn with_params(self, params: SyntheticParams) -> Self {
        self.with_source(DatasetSource::Synthetic(params))
    }

    /// Sets where the dataset comes from.
    pub fn with_source(mut self, source: DatasetSource) -> Self {
        self.source = source;
        self
    }

    /// Sets the engine config.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses the virtual clock (elapsed time is reported as 0).
    pub fn with_virtual_clock(mut self, enabled: bool) -> Self {
        self.virtual_clock = enabled;
        self
    }

    pub fn source(&self) -> &DatasetSource {
        &self.source
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs a scenario with its preset attack, or `custom` for `Custom`.
    pub fn run(&self, scenario: ScenarioId, custom: AttackParams) -> Result<ExperimentResult> {
        let attack = scenario.attack().unwrap_or(custom);
        info!(
            "Starting experiment: {} (seed={}, runs={}, μ={}, λ={}, ε={})",
            scenario.name(),
            self.seed,
            self.runs,
            attack.malicious_fraction,
            attack.attackers,
            attack.deviation
        );
        attack.validate()?;

        let mut dataset_rng = ChaCha8Rng::seed_from_u64(derive_seed(self.seed, SeedStream::Dataset));
        let dataset = self.source.load(&mut dataset_rng)?;
        let mut engine = Tdadp::new(self.config.clone(), &dataset)?;

        if self.runs < 2 {
            warn!("Fewer than 2 runs: standard errors are reported as 0");
        }

        let mut runs = Vec::with_capacity(self.runs);
        for run in 0..self.runs {
            let stream = run as u32;
            let mut attack_rng = ChaCha8Rng::seed_from_u64(derive_seed(self.seed, SeedStream::Attack(stream)));
            let mut order_rng = ChaCha8Rng::seed_from_u64(derive_seed(self.seed, SeedStream::Order(stream)));
            let plan = RunPlan {
                attack: plan_attack(&dataset, &attack, &mut attack_rng)?,
                order: request_order(&dataset, &mut order_rng),
            };
            debug!(
                "Run {}: {} requests, {} attackers",
                run + 1,
                plan.order.len(),
                plan.attack.attacker_count()
            );

            let engine_seed = derive_seed(self.seed, SeedStream::Engine(stream));
            let metrics = if self.virtual_clock {
                engine.run(&plan, &mut SimContext::new(engine_seed))?
            } else {
                engine.run(&plan, &mut WallClockContext::new(engine_seed))?
            };

            info!(
                "Run {} --- A-Accuracy:{:.4}   T-Cost:{:.3}  Time:{:.1}ms",
                run + 1,
                metrics.accuracy,
                metrics.testing_cost,
                metrics.elapsed_ms
            );
            runs.push(metrics);
        }

        let report = Report::from_runs(&runs);
        Ok(ExperimentResult {
            id: ExperimentId::from_seed(self.seed),
            scenario,
            attack,
            seed: self.seed,
            runs,
            report,
        })
    }
}
