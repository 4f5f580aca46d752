//! Weighted iterative truth inference.
//!
//! Alternates two steps until no aggregated label changes:
//! 1. **Aggregation**: each assignee votes `s/L + (1 − s)·w` for its label
//!    (trust s, weight w); the task takes the label with the highest vote.
//! 2. **Weight estimation**: each active worker's weight becomes its share of
//!    agreement with the aggregated labels, weighting every task by the
//!    average reliability of its assignees.
//!
//! A suspicious worker (high s) is pulled toward a uniform vote, so its
//! label carries almost no information whatever its weight.

use crate::error::{Result, TdadpError};
use crate::task::TaskState;
use crate::worker::WorkerState;
use std::collections::{BTreeMap, BTreeSet};
use tdadp_env::{Label, TaskId, WorkerId};
use tracing::{debug, warn};

/// Outcome of one inference pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceReport {
    /// Aggregation steps executed
    pub iterations: usize,
    /// False if the iteration cap was hit first
    pub converged: bool,
}

/// Truth inference over a batch of tasks.
#[derive(Debug, Clone)]
pub struct ExtendedTruthDiscovery {
    label_count: usize,
    max_iterations: usize,
}

impl ExtendedTruthDiscovery {
    pub fn new(label_count: usize, max_iterations: usize) -> Self {
        Self {
            label_count,
            max_iterations,
        }
    }

    /// Runs inference on `batch`, updating aggregated labels and the weights
    /// of the `active` workers in place.
    pub fn process(
        &self,
        batch: &[TaskId],
        active: &BTreeSet<WorkerId>,
        tasks: &mut BTreeMap<TaskId, TaskState>,
        workers: &mut BTreeMap<WorkerId, WorkerState>,
    ) -> Result<InferenceReport> {
        for id in active {
            let worker = workers.get_mut(id).ok_or(TdadpError::UnknownWorker(*id))?;
            worker.set_weight(worker.accuracy());
        }

        for iteration in 1..=self.max_iterations {
            let mut changed = 0usize;
            for &task_id in batch {
                let winner = self.aggregate(task_id, tasks, workers)?;
                let task = tasks.get_mut(&task_id).ok_or(TdadpError::UnknownTask(task_id))?;
                if task.aggregated() != Some(winner) {
                    changed += 1;
                }
                task.set_aggregated(winner);
            }

            if changed == 0 {
                debug!("Truth inference converged after {} iterations ({} tasks)", iteration, batch.len());
                return Ok(InferenceReport {
                    iterations: iteration,
                    converged: true,
                });
            }

            self.estimate_weights(active, tasks, workers)?;
        }

        warn!(
            "Truth inference hit the {}-iteration cap without converging ({} tasks)",
            self.max_iterations,
            batch.len()
        );
        Ok(InferenceReport {
            iterations: self.max_iterations,
            converged: false,
        })
    }

    /// Weighted vote over one task's assignees. Ties keep the lowest label.
    fn aggregate(
        &self,
        task_id: TaskId,
        tasks: &BTreeMap<TaskId, TaskState>,
        workers: &BTreeMap<WorkerId, WorkerState>,
    ) -> Result<Label> {
        let task = tasks.get(&task_id).ok_or(TdadpError::UnknownTask(task_id))?;
        let l = self.label_count as f64;
        let mut votes = vec![0.0f64; self.label_count];

        for worker_id in task.assigned() {
            let worker = workers.get(worker_id).ok_or(TdadpError::UnknownWorker(*worker_id))?;
            let label = worker.current_label(task_id).ok_or_else(|| {
                TdadpError::invariant(format!("assignee {} has no label on task {}", worker_id, task_id))
            })?;
            let slot = votes.get_mut(label).ok_or(TdadpError::LabelOutOfRange {
                task: task_id,
                label,
                label_count: self.label_count,
            })?;
            let s = worker.trust();
            *slot += s / l + (1.0 - s) * worker.weight();
        }

        let mut winner = 0;
        let mut max_vote = -1.0;
        for (label, vote) in votes.iter().enumerate() {
            if *vote > max_vote {
                winner = label;
                max_vote = *vote;
            }
        }
        Ok(winner)
    }

    fn estimate_weights(
        &self,
        active: &BTreeSet<WorkerId>,
        tasks: &BTreeMap<TaskId, TaskState>,
        workers: &mut BTreeMap<WorkerId, WorkerState>,
    ) -> Result<()> {
        for id in active {
            let worker = workers.get_mut(id).ok_or(TdadpError::UnknownWorker(*id))?;
            let mut correct = 0.0;
            let mut total = 0.0;
            for (task_id, label) in worker.current_labels() {
                let task = tasks.get(task_id).ok_or(TdadpError::UnknownTask(*task_id))?;
                let c = task.avg_reliability();
                if task.aggregated() == Some(*label) {
                    correct += c;
                }
                total += c;
            }
            if total > 0.0 {
                worker.set_weight(correct / total);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskRole;
    use approx::assert_relative_eq;

    struct World {
        tasks: BTreeMap<TaskId, TaskState>,
        workers: BTreeMap<WorkerId, WorkerState>,
        active: BTreeSet<WorkerId>,
    }

    impl World {
        fn new() -> Self {
            Self {
                tasks: BTreeMap::new(),
                workers: BTreeMap::new(),
                active: BTreeSet::new(),
            }
        }

        fn worker(&mut self, id: u32, trust: f64, accuracy: f64) {
            let mut worker = WorkerState::new(WorkerId(id));
            worker.set_trust(trust);
            worker.set_accuracy(accuracy);
            self.workers.insert(worker.id, worker);
            self.active.insert(WorkerId(id));
        }

        fn task(&mut self, id: u64, answers: &[(u32, Label)]) {
            let mut task = TaskState::new(TaskId(id), TaskRole::Normal, 0, 2);
            for &(w, label) in answers {
                task.assign(WorkerId(w));
                self.workers.get_mut(&WorkerId(w)).unwrap().record_label(TaskId(id), label);
            }
            self.tasks.insert(task.id, task);
        }

        fn run(&mut self, batch: &[u64]) -> InferenceReport {
            let batch: Vec<TaskId> = batch.iter().map(|id| TaskId(*id)).collect();
            ExtendedTruthDiscovery::new(2, 1000)
                .process(&batch, &self.active, &mut self.tasks, &mut self.workers)
                .unwrap()
        }
    }

    #[test]
    fn test_weighted_vote_picks_heavier_label() {
        // label 0 gets 3 × 0.8 = 2.4, label 1 gets 2 × 0.55 = 1.1
        let mut world = World::new();
        for id in 0..3 {
            world.worker(id, 0.0, 0.8);
        }
        for id in 3..5 {
            world.worker(id, 0.0, 0.55);
        }
        world.task(1, &[(0, 0), (1, 0), (2, 0), (3, 1), (4, 1)]);

        let report = world.run(&[1]);

        assert!(report.converged);
        assert_eq!(world.tasks[&TaskId(1)].aggregated(), Some(0));
    }

    #[test]
    fn test_suspicious_worker_counts_as_uniform_vote() {
        // Fully distrusted worker contributes 1/L to its label and nothing more.
        let mut world = World::new();
        world.worker(0, 1.0, 1.0);
        world.worker(1, 0.0, 0.6);
        world.task(1, &[(0, 1), (1, 0)]);

        world.run(&[1]);

        assert_eq!(world.tasks[&TaskId(1)].aggregated(), Some(0));
    }

    #[test]
    fn test_ties_keep_lowest_label() {
        let mut world = World::new();
        world.worker(0, 0.0, 0.5);
        world.worker(1, 0.0, 0.5);
        world.task(1, &[(0, 1), (1, 0)]);

        world.run(&[1]);

        assert_eq!(world.tasks[&TaskId(1)].aggregated(), Some(0));
    }

    #[test]
    fn test_empty_task_aggregates_to_first_label() {
        let mut world = World::new();
        world.task(1, &[]);
        world.run(&[1]);
        assert_eq!(world.tasks[&TaskId(1)].aggregated(), Some(0));
    }

    #[test]
    fn test_weights_follow_reliability_weighted_agreement() {
        let mut world = World::new();
        for id in 0..3 {
            world.worker(id, 0.0, 0.9);
        }
        world.worker(3, 0.0, 0.9);
        world.task(1, &[(0, 0), (1, 0), (3, 1)]);
        world.task(2, &[(0, 1), (2, 1), (3, 0)]);
        for id in [1, 2] {
            world.tasks.get_mut(&TaskId(id)).unwrap().compute_avg_reliability([0.6, 0.6, 0.6]).unwrap();
        }

        world.run(&[1, 2]);

        assert_eq!(world.tasks[&TaskId(1)].aggregated(), Some(0));
        assert_eq!(world.tasks[&TaskId(2)].aggregated(), Some(1));
        assert_relative_eq!(world.workers[&WorkerId(0)].weight(), 1.0);
        assert_relative_eq!(world.workers[&WorkerId(3)].weight(), 0.0);
    }

    #[test]
    fn test_rerun_at_convergence_changes_nothing() {
        let mut world = World::new();
        for id in 0..3 {
            world.worker(id, 0.0, 0.7);
        }
        world.task(1, &[(0, 1), (1, 1), (2, 0)]);
        world.task(2, &[(0, 0), (1, 0), (2, 0)]);

        world.run(&[1, 2]);
        let before: Vec<_> = world.tasks.values().map(|t| t.aggregated()).collect();
        let report = world.run(&[1, 2]);
        let after: Vec<_> = world.tasks.values().map(|t| t.aggregated()).collect();

        assert_eq!(report.iterations, 1);
        assert!(report.converged);
        assert_eq!(before, after);
    }

    #[test]
    fn test_missing_label_is_invariant_error() {
        let mut world = World::new();
        world.worker(0, 0.0, 0.5);
        let mut task = TaskState::new(TaskId(1), TaskRole::Normal, 0, 2);
        task.assign(WorkerId(0));
        world.tasks.insert(task.id, task);

        let result = ExtendedTruthDiscovery::new(2, 10).process(
            &[TaskId(1)],
            &world.active,
            &mut world.tasks,
            &mut world.workers,
        );
        assert!(matches!(result, Err(TdadpError::Invariant(_))));
    }
}
