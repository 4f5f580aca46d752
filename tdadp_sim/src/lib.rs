//! TDADP Deterministic Experiment Harness
//!
//! Generates a synthetic crowdsourcing dataset (or loads a real one),
//! replaces a share of the workers with attacker-controlled sybils, and
//! replays shuffled request streams through the engine for many runs.
//!
//! # Seeding
//!
//! Every random stream is derived from a single 64-bit master seed:
//!
//! ```text
//! master seed
//!   ├── Dataset        synthetic answers + golden tasks (once)
//!   └── per run r
//!         ├── Attack(r)   worker replacement + poison labels
//!         ├── Order(r)    request order
//!         └── Engine(r)   testing / evasion / deviation draws
//! ```
//!
//! With `--virtual-clock` the whole experiment, elapsed times included, is
//! reproducible from the seed.
//!
//! # Usage
//!
//! ```ignore
//! use tdadp_sim::{AttackParams, ExperimentRunner, ScenarioId};
//!
//! let runner = ExperimentRunner::new(42, 10).with_virtual_clock(true);
//! let result = runner.run(ScenarioId::Coalition, AttackParams::default())?;
//! result.report.log();
//! ```

mod attack;
mod context;
pub mod dataset;
mod error;
mod exporter;
mod order;
mod report;
mod runner;
pub mod scenarios;

pub use attack::{plan_attack, AttackParams};
pub use context::SimContext;
pub use dataset::{generate, load_real, DatasetSource, SyntheticParams};
pub use error::{Result, SimError};
pub use exporter::ExperimentExport;
pub use order::request_order;
pub use report::{MetricSummary, Report};
pub use runner::{ExperimentResult, ExperimentRunner};
pub use scenarios::ScenarioId;
