//! Data-poisoning attacker model.
//!
//! An attacker shares one poison label per task across all the workers it
//! controls. It counts how often each task reaches its workers: since a task
//! is expected to go to K workers, a (K+1)-th sighting means the task is
//! being reused for testing, and the attacker switches to a mostly honest
//! answer to avoid exposure.

use crate::error::{Result, TdadpError};
use rand::Rng;
use std::collections::{BTreeSet, HashMap};
use tdadp_env::{AttackerId, Label, TaskId, WorkerId};

/// Draws a label uniformly from `0..label_count` excluding `exclude`.
///
/// `label_count` must be at least 2.
pub fn random_other_label<R: Rng + ?Sized>(rng: &mut R, exclude: Label, label_count: usize) -> Label {
    let draw = rng.gen_range(0..label_count - 1);
    if draw >= exclude {
        draw + 1
    } else {
        draw
    }
}

/// One attacker's shared labels and observation counters.
#[derive(Debug, Clone)]
pub struct AttackerModel {
    /// Attacker ID
    pub id: AttackerId,

    /// Workers under this attacker's control
    workers: BTreeSet<WorkerId>,

    /// Label the controlled workers currently submit for each task
    labels: HashMap<TaskId, Label>,

    /// Times each task has been assigned to a controlled worker
    counts: HashMap<TaskId, usize>,

    /// Detection threshold: expected workers per task
    k: usize,

    /// Label cardinality
    label_count: usize,

    /// Probability of switching to the true label on detection
    honesty_probability: f64,
}

impl AttackerModel {
    /// Creates a new attacker with no cached labels.
    pub fn new(id: AttackerId, k: usize, label_count: usize, honesty_probability: f64) -> Self {
        Self {
            id,
            workers: BTreeSet::new(),
            labels: HashMap::new(),
            counts: HashMap::new(),
            k,
            label_count,
            honesty_probability,
        }
    }

    /// Adds a controlled worker.
    pub fn add_worker(&mut self, worker: WorkerId) {
        self.workers.insert(worker);
    }

    /// Returns true if `worker` is one of this attacker's sybils.
    pub fn controls(&self, worker: WorkerId) -> bool {
        self.workers.contains(&worker)
    }

    /// Caches the pre-randomized poison label for a task.
    pub fn set_task_label(&mut self, task: TaskId, label: Label) {
        self.labels.insert(task, label);
    }

    /// Returns the label controlled workers submit for `task`.
    pub fn task_label(&self, task: TaskId) -> Result<Label> {
        self.labels.get(&task).copied().ok_or_else(|| {
            TdadpError::invariant(format!("attacker {} has no label cached for task {}", self.id, task))
        })
    }

    /// Returns how many times `task` reached a controlled worker (0 if never).
    pub fn count(&self, task: TaskId) -> usize {
        self.counts.get(&task).copied().unwrap_or(0)
    }

    /// Returns true once `task` has been seen more than K times.
    pub fn has_detected(&self, task: TaskId) -> bool {
        self.count(task) > self.k
    }

    /// Records that `task` was assigned to a controlled worker.
    ///
    /// On exactly the (K+1)-th observation the cached label is replaced:
    /// with `honesty_probability` by the true label, otherwise by a random
    /// wrong label. The label never changes again for that task.
    ///
    /// Returns true if this observation triggered the switch.
    pub fn observe<R: Rng + ?Sized>(&mut self, task: TaskId, true_label: Label, rng: &mut R) -> bool {
        let count = self.counts.entry(task).or_insert(0);
        *count += 1;
        if *count != self.k + 1 {
            return false;
        }

        let label = if rng.gen::<f64>() <= self.honesty_probability {
            true_label
        } else {
            random_other_label(rng, true_label, self.label_count)
        };
        self.labels.insert(task, label);
        true
    }
}
