//! Input records supplied by the data-preparation side.
//!
//! A `Dataset` is fixed for a whole experiment; a `RunPlan` (attack plan and
//! request order) is supplied once per run.

use crate::config::check_unit;
use crate::error::{Result, TdadpError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tdadp_env::{AttackerId, Label, TaskId, WorkerId};

/// A production task with the answers observed in the source dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalTaskRecord {
    pub id: TaskId,
    /// Ground truth, used only to measure aggregation accuracy
    pub true_label: Label,
    /// (worker, label) pairs from the source dataset
    pub responses: Vec<(WorkerId, Label)>,
}

/// A quality-control task with a known answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenTaskRecord {
    pub id: TaskId,
    pub true_label: Label,
    /// Answers each worker would give when tested on this task
    pub responses: Vec<(WorkerId, Label)>,
}

/// The ground-truth dataset shared by every run of an experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    /// Label cardinality (L)
    pub label_count: usize,

    /// Expected number of workers per task (K)
    pub workers_per_task: usize,

    pub normal_tasks: Vec<NormalTaskRecord>,

    pub golden_tasks: Vec<GoldenTaskRecord>,
}

impl Dataset {
    /// Returns every worker that answered at least one normal task.
    pub fn workers(&self) -> BTreeSet<WorkerId> {
        self.normal_tasks
            .iter()
            .flat_map(|t| t.responses.iter().map(|(w, _)| *w))
            .collect()
    }

    /// Checks cardinalities, label ranges and id uniqueness.
    pub fn validate(&self) -> Result<()> {
        if self.label_count < 2 {
            return Err(TdadpError::input(format!(
                "label_count must be at least 2, got {}",
                self.label_count
            )));
        }
        if self.workers_per_task == 0 {
            return Err(TdadpError::input("workers_per_task must be positive"));
        }
        if self.normal_tasks.is_empty() {
            return Err(TdadpError::input("dataset has no normal tasks"));
        }

        let workers = self.workers();
        let mut seen = BTreeSet::new();
        let records = self
            .normal_tasks
            .iter()
            .map(|t| (t.id, t.true_label, &t.responses, false))
            .chain(self.golden_tasks.iter().map(|t| (t.id, t.true_label, &t.responses, true)));

        for (id, truth, responses, golden) in records {
            if !seen.insert(id) {
                return Err(TdadpError::input(format!("duplicate task id {}", id)));
            }
            self.check_label(id, truth)?;
            let mut responders = BTreeSet::new();
            for &(worker, label) in responses {
                self.check_label(id, label)?;
                if golden && !workers.contains(&worker) {
                    return Err(TdadpError::UnknownWorker(worker));
                }
                if !responders.insert(worker) {
                    return Err(TdadpError::input(format!(
                        "worker {} answers task {} twice",
                        worker, id
                    )));
                }
            }
        }
        Ok(())
    }

    fn check_label(&self, task: TaskId, label: Label) -> Result<()> {
        if label < self.label_count {
            Ok(())
        } else {
            Err(TdadpError::LabelOutOfRange {
                task,
                label,
                label_count: self.label_count,
            })
        }
    }
}

/// One attacker: the workers it controls and its pre-randomized poison labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackerSpec {
    pub id: AttackerId,
    pub workers: Vec<WorkerId>,
    /// Poison label for every normal and golden task
    pub poison_labels: BTreeMap<TaskId, Label>,
}

/// Attacker configuration for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttackPlan {
    /// Fraction of independent workers replaced by malicious ones (μ)
    pub malicious_fraction: f64,

    /// Probability a malicious worker deviates from the shared label (ε)
    pub deviation: f64,

    /// Attackers (λ = `attackers.len()`)
    pub attackers: Vec<AttackerSpec>,
}

impl AttackPlan {
    /// A plan with no attackers.
    pub fn honest() -> Self {
        Self::default()
    }

    /// Returns the number of attackers (λ).
    pub fn attacker_count(&self) -> usize {
        self.attackers.len()
    }

    /// Checks probabilities and that controlled worker sets are disjoint.
    pub(crate) fn validate(&self) -> Result<()> {
        check_unit("malicious_fraction", self.malicious_fraction)?;
        check_unit("deviation", self.deviation)?;

        let mut ids = BTreeSet::new();
        let mut controlled = BTreeSet::new();
        for attacker in &self.attackers {
            if !ids.insert(attacker.id) {
                return Err(TdadpError::input(format!("duplicate attacker id {}", attacker.id)));
            }
            for worker in &attacker.workers {
                if !controlled.insert(*worker) {
                    return Err(TdadpError::input(format!(
                        "worker {} is controlled by more than one attacker",
                        worker
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Everything that varies between runs of one experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunPlan {
    pub attack: AttackPlan,

    /// Worker request arrivals, processed in order
    pub order: Vec<WorkerId>,
}
