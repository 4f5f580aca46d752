//! TDADP Core - Truth Discovery with Adaptive Defense against data Poisoning
//!
//! Crowdsourcing aggregation that stays accurate when coordinated attackers
//! control a share of the workforce:
//! 1. **Testing**: golden tasks with known answers expose workers that side
//!    with wrong majorities, and those workers are banned
//! 2. **Weighted inference**: labels are aggregated with per-worker weights
//!    learned from agreement, discounted by suspicion
//! 3. **Adaptive golden pool**: normal tasks answered by reliable workers
//!    are promoted into the golden pool so attackers cannot memorize it

pub mod assignment;
pub mod attacker;
pub mod config;
pub mod engine;
pub mod error;
pub mod inference;
pub mod input;
pub mod metrics;
pub mod scoring;
pub mod task;
pub mod worker;

// Re-export key types for convenience
pub use assignment::ProbabilisticAssigner;
pub use attacker::{random_other_label, AttackerModel};
pub use config::{EngineConfig, ReliabilityMode};
pub use engine::{RequestOutcome, Tdadp};
pub use error::{Result, TdadpError};
pub use inference::{ExtendedTruthDiscovery, InferenceReport};
pub use input::{AttackPlan, AttackerSpec, Dataset, GoldenTaskRecord, NormalTaskRecord, RunPlan};
pub use metrics::RunMetrics;
pub use task::{TaskRole, TaskState};
pub use worker::WorkerState;
