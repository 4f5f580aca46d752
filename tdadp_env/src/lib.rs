//! TDADP Environment Abstraction Layer
//!
//! Shared vocabulary for the truth-discovery engine and its simulation
//! harness:
//! - Integer identifiers for workers, tasks and attackers
//! - The `RunContext` trait that injects time and the run's only RNG
//! - Seed derivation so every random stream comes from one 64-bit seed
//!
//! By deriving all entropy from a single seed, any run can be replayed
//! exactly from its seed number.

mod context;
mod types;
mod wall_clock;

pub use context::{derive_seed, RunContext, SeedStream};
pub use types::{AttackerId, ExperimentId, Label, TaskId, WorkerId};
pub use wall_clock::WallClockContext;
