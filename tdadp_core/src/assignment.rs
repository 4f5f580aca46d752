//! Probabilistic task assignment.
//!
//! Decides, for each requesting worker, between a golden task that tests the
//! worker and a normal task that produces labels. Pools are scanned in
//! ascending task id so the first match is reproducible.

use crate::config::EngineConfig;
use crate::task::TaskState;
use crate::worker::WorkerState;
use rand::Rng;
use std::collections::BTreeMap;
use tdadp_env::{TaskId, WorkerId};

/// Stateless assignment policy parameterized by the engine thresholds.
#[derive(Debug, Clone)]
pub struct ProbabilisticAssigner {
    /// Trust score ban threshold (τ)
    tau: f64,
    /// Reliability threshold (δ)
    delta: f64,
    /// Testing probability mix (α)
    alpha: f64,
    /// Expected workers per task (K)
    k: usize,
}

impl ProbabilisticAssigner {
    pub fn new(tau: f64, delta: f64, alpha: f64, k: usize) -> Self {
        Self { tau, delta, alpha, k }
    }

    /// Builds the policy from an engine config and the dataset's K.
    pub fn from_config(config: &EngineConfig, k: usize) -> Self {
        Self::new(config.tau, config.delta, config.alpha, k)
    }

    /// Returns true if the worker is still a candidate for testing.
    pub fn is_testable(&self, worker: &WorkerState) -> bool {
        worker.trust() < self.tau && worker.reliability() < self.delta
    }

    /// Probability of handing a golden task to a testable worker.
    ///
    /// `g = α(1 − r) + (1 − α)s`: unreliable or suspicious workers are tested more.
    pub fn testing_probability(&self, worker: &WorkerState) -> f64 {
        self.alpha * (1.0 - worker.reliability()) + (1.0 - self.alpha) * worker.trust()
    }

    /// Picks the task for a requesting worker, or `None` if nothing is left for it.
    ///
    /// Does not mutate anything; the caller records the assignment.
    pub fn assign<R: Rng + ?Sized>(
        &self,
        worker: &WorkerState,
        tasks: &BTreeMap<TaskId, TaskState>,
        workers: &BTreeMap<WorkerId, WorkerState>,
        rng: &mut R,
    ) -> Option<TaskId> {
        if worker.is_banned() {
            return None;
        }

        if self.is_testable(worker) {
            let g = self.testing_probability(worker);
            if rng.gen::<f64>() <= g {
                if let Some(task) = self.pick_golden(worker, tasks, workers) {
                    return Some(task);
                }
            }
        }

        self.pick_normal(worker, tasks)
    }

    /// First golden task the worker can answer that still has testing capacity.
    fn pick_golden(
        &self,
        worker: &WorkerState,
        tasks: &BTreeMap<TaskId, TaskState>,
        workers: &BTreeMap<WorkerId, WorkerState>,
    ) -> Option<TaskId> {
        tasks
            .values()
            .filter(|t| t.in_golden_pool() && !worker.has_labeled(t.id))
            // Independent workers only replay opinions they gave in the source data.
            .filter(|t| worker.is_malicious() || worker.has_original(t.id))
            .find(|t| self.has_testing_capacity(t, workers))
            .map(|t| t.id)
    }

    /// Exposures plus unreliable assignees must stay below K.
    fn has_testing_capacity(&self, task: &TaskState, workers: &BTreeMap<WorkerId, WorkerState>) -> bool {
        let unreliable = task
            .assigned()
            .iter()
            .filter(|w| workers.get(*w).map_or(true, |w| w.reliability() < self.delta))
            .count();
        (task.exposure() as usize) + unreliable < self.k
    }

    /// First normal-pool task not yet assigned to the worker that it may answer.
    fn pick_normal(&self, worker: &WorkerState, tasks: &BTreeMap<TaskId, TaskState>) -> Option<TaskId> {
        tasks
            .values()
            .filter(|t| t.in_normal_pool() && !t.is_assigned(worker.id))
            .find(|t| worker.is_malicious() || t.is_eligible(worker.id))
            .map(|t| t.id)
    }
}
