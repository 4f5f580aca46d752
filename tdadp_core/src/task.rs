//! Per-task mutable state.

use crate::error::{Result, TdadpError};
use tdadp_env::{Label, TaskId, WorkerId};

/// Role of a task within a run.
///
/// A task moves from `Normal` to `Promoted` at most once per run and never
/// back until the run is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRole {
    /// Production task awaiting aggregation
    Normal,
    /// Seeded quality-control task with an authoritative answer
    Golden,
    /// Normal task promoted into the golden pool
    Promoted,
}

/// Tracks one task's assignments and aggregation during a run.
#[derive(Debug, Clone)]
pub struct TaskState {
    /// Task ID
    pub id: TaskId,

    /// Current role
    role: TaskRole,

    /// Ground truth (evaluation only for normal tasks)
    true_label: Label,

    /// Truth-inference estimate, `None` until the first inference pass
    aggregated: Option<Label>,

    /// Workers that answered this task in the source dataset
    eligible: Vec<WorkerId>,

    /// Workers assigned during the run, in assignment order
    assigned: Vec<WorkerId>,

    /// `majority[l]` is true if label `l` has the top tally (with at least 2 votes)
    majority: Vec<bool>,

    /// Number of labels retracted from banned workers
    exposure: u32,

    /// Last computed average reliability of the assignees
    avg_reliability: f64,
}

impl TaskState {
    /// Creates a new task with no assignments.
    pub fn new(id: TaskId, role: TaskRole, true_label: Label, label_count: usize) -> Self {
        Self {
            id,
            role,
            true_label,
            aggregated: None,
            eligible: Vec::new(),
            assigned: Vec::new(),
            majority: vec![false; label_count],
            exposure: 0,
            avg_reliability: 0.0,
        }
    }

    pub fn role(&self) -> TaskRole {
        self.role
    }

    /// Returns true for tasks that test workers (`Golden` or `Promoted`).
    pub fn in_golden_pool(&self) -> bool {
        matches!(self.role, TaskRole::Golden | TaskRole::Promoted)
    }

    /// Returns true for tasks that came from the production set (`Normal` or `Promoted`).
    pub fn in_normal_pool(&self) -> bool {
        matches!(self.role, TaskRole::Normal | TaskRole::Promoted)
    }

    /// Moves a normal task into the golden pool.
    ///
    /// Returns false if the task was not `Normal`.
    pub fn promote(&mut self) -> bool {
        if self.role == TaskRole::Normal {
            self.role = TaskRole::Promoted;
            true
        } else {
            false
        }
    }

    pub fn true_label(&self) -> Label {
        self.true_label
    }

    /// Returns the answer golden scoring compares against.
    ///
    /// Seeded golden tasks use their true label; everything else uses the
    /// current aggregated estimate.
    pub fn reference_label(&self) -> Option<Label> {
        match self.role {
            TaskRole::Golden => Some(self.true_label),
            TaskRole::Normal | TaskRole::Promoted => self.aggregated,
        }
    }

    pub fn aggregated(&self) -> Option<Label> {
        self.aggregated
    }

    pub fn set_aggregated(&mut self, label: Label) {
        self.aggregated = Some(label);
    }

    /// Adds a worker from the source dataset.
    pub fn add_eligible(&mut self, worker: WorkerId) {
        self.eligible.push(worker);
    }

    pub fn is_eligible(&self, worker: WorkerId) -> bool {
        self.eligible.contains(&worker)
    }

    /// Assigns a worker. Assigning the same worker twice is a caller error.
    pub fn assign(&mut self, worker: WorkerId) {
        self.assigned.push(worker);
    }

    pub fn assigned(&self) -> &[WorkerId] {
        &self.assigned
    }

    pub fn is_assigned(&self, worker: WorkerId) -> bool {
        self.assigned.contains(&worker)
    }

    /// Removes a worker from the assignees. Returns false if it was not assigned.
    pub fn remove_worker(&mut self, worker: WorkerId) -> bool {
        match self.assigned.iter().position(|w| *w == worker) {
            Some(idx) => {
                self.assigned.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Recomputes the majority indicator from the assignees' labels.
    ///
    /// Every label reaching the top tally is marked, but only when that tally
    /// is at least 2; a single vote never forms a majority.
    pub fn compute_majority<I>(&mut self, labels: I) -> Result<()>
    where
        I: IntoIterator<Item = Label>,
    {
        let label_count = self.majority.len();
        let mut tally = vec![0u32; label_count];
        for label in labels {
            if label >= label_count {
                return Err(TdadpError::LabelOutOfRange {
                    task: self.id,
                    label,
                    label_count,
                });
            }
            tally[label] += 1;
        }

        let max_vote = tally.iter().copied().max().unwrap_or(0);
        for (flag, votes) in self.majority.iter_mut().zip(&tally) {
            *flag = max_vote >= 2 && *votes == max_vote;
        }
        Ok(())
    }

    /// Returns true if `label` was a majority label at the last computation.
    pub fn is_majority(&self, label: Label) -> bool {
        self.majority.get(label).copied().unwrap_or(false)
    }

    /// Records that a banned worker's label was retracted from this task.
    pub fn expose(&mut self) {
        self.exposure += 1;
    }

    pub fn exposure(&self) -> u32 {
        self.exposure
    }

    /// Recomputes and caches the average reliability of the assignees.
    ///
    /// `reliabilities` must yield one value per assignee. Fails when nobody
    /// is assigned.
    pub fn compute_avg_reliability<I>(&mut self, reliabilities: I) -> Result<f64>
    where
        I: IntoIterator<Item = f64>,
    {
        if self.assigned.is_empty() {
            return Err(TdadpError::invariant(format!(
                "average reliability of task {} with no assignees",
                self.id
            )));
        }
        let total: f64 = reliabilities.into_iter().sum();
        self.avg_reliability = total / self.assigned.len() as f64;
        Ok(self.avg_reliability)
    }

    /// Returns the cached average reliability (0 until first computed).
    pub fn avg_reliability(&self) -> f64 {
        self.avg_reliability
    }

    /// Clears run state. Promoted tasks return to `Normal`.
    pub fn reset(&mut self) {
        if self.role == TaskRole::Promoted {
            self.role = TaskRole::Normal;
        }
        self.assigned.clear();
        self.aggregated = None;
        self.majority.iter_mut().for_each(|m| *m = false);
        self.exposure = 0;
        self.avg_reliability = 0.0;
    }
}
