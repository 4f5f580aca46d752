//! Per-worker mutable state.

use std::collections::BTreeMap;
use tdadp_env::{AttackerId, Label, TaskId, WorkerId};

/// Truth-inference weight a worker starts the next run with.
pub const RESET_WEIGHT: f64 = 0.8;

/// Tracks one worker's answers and quality scores during a run.
///
/// Scores read before any golden answer are 0. After a reset the weight is
/// `RESET_WEIGHT` instead, so a freshly built worker and a reset worker differ
/// only in that field.
#[derive(Debug, Clone)]
pub struct WorkerState {
    /// Worker ID
    pub id: WorkerId,

    /// (task, label) pairs from the source dataset (normal and golden)
    original: BTreeMap<TaskId, Label>,

    /// (task, label) pairs for tasks assigned during the run
    current: BTreeMap<TaskId, Label>,

    /// Trust score s: likelihood golden answers diverge from consensus
    trust: f64,

    /// Reliability score r
    reliability: f64,

    /// Accuracy on golden tasks p
    accuracy: f64,

    /// Influence in truth inference
    weight: f64,

    /// Controlling attacker, `None` for an independent worker
    attacker: Option<AttackerId>,

    /// Terminal once set
    banned: bool,
}

impl WorkerState {
    /// Creates a new worker with no answers.
    pub fn new(id: WorkerId) -> Self {
        Self {
            id,
            original: BTreeMap::new(),
            current: BTreeMap::new(),
            trust: 0.0,
            reliability: 0.0,
            accuracy: 0.0,
            weight: 0.0,
            attacker: None,
            banned: false,
        }
    }

    /// Records an answer from the source dataset.
    pub fn add_original(&mut self, task: TaskId, label: Label) {
        self.original.insert(task, label);
    }

    /// Returns the source-dataset answer on a task, if any.
    pub fn original_label(&self, task: TaskId) -> Option<Label> {
        self.original.get(&task).copied()
    }

    /// Returns true if the source dataset has an answer from this worker on `task`.
    pub fn has_original(&self, task: TaskId) -> bool {
        self.original.contains_key(&task)
    }

    /// Returns the number of source-dataset answers.
    pub fn original_count(&self) -> usize {
        self.original.len()
    }

    /// Records the label given during the run.
    pub fn record_label(&mut self, task: TaskId, label: Label) {
        self.current.insert(task, label);
    }

    /// Returns the label given during the run, if any.
    pub fn current_label(&self, task: TaskId) -> Option<Label> {
        self.current.get(&task).copied()
    }

    /// Returns true if the worker has labeled `task` in this run.
    pub fn has_labeled(&self, task: TaskId) -> bool {
        self.current.contains_key(&task)
    }

    /// Returns the labels given during the run, in ascending task order.
    pub fn current_labels(&self) -> &BTreeMap<TaskId, Label> {
        &self.current
    }

    /// Retracts a label (used when the worker is banned).
    pub fn remove_label(&mut self, task: TaskId) -> Option<Label> {
        self.current.remove(&task)
    }

    pub fn trust(&self) -> f64 {
        self.trust
    }

    pub fn set_trust(&mut self, trust: f64) {
        self.trust = trust;
    }

    pub fn reliability(&self) -> f64 {
        self.reliability
    }

    pub fn set_reliability(&mut self, reliability: f64) {
        self.reliability = reliability;
    }

    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    pub fn set_accuracy(&mut self, accuracy: f64) {
        self.accuracy = accuracy;
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    /// Returns the controlling attacker, if any.
    pub fn attacker(&self) -> Option<AttackerId> {
        self.attacker
    }

    /// Returns true if the worker is controlled by an attacker.
    pub fn is_malicious(&self) -> bool {
        self.attacker.is_some()
    }

    pub fn set_attacker(&mut self, attacker: Option<AttackerId>) {
        self.attacker = attacker;
    }

    /// Bans the worker. Idempotent.
    pub fn ban(&mut self) {
        self.banned = true;
    }

    pub fn is_banned(&self) -> bool {
        self.banned
    }

    /// Clears run state so the next run starts clean.
    ///
    /// Original answers are kept; everything assigned or scored in the run
    /// is dropped, including attacker affiliation.
    pub fn reset(&mut self) {
        self.current.clear();
        self.trust = 0.0;
        self.reliability = 0.0;
        self.accuracy = 0.0;
        self.weight = RESET_WEIGHT;
        self.attacker = None;
        self.banned = false;
    }
}
