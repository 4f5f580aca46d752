//! The TDADP orchestrator.
//!
//! Replays one run's request stream against shared task/worker state:
//!
//! ```text
//! request ─► banned? ──yes──► skip
//!              │no
//!              ▼
//!        ProbabilisticAssigner ──► golden task ──► score worker ──► ban?
//!              │                                                   │yes
//!              │                                  retract labels on open normal tasks
//!              ▼
//!         normal task ──► label ──► K assignees & reliable? ──► promotion count
//!                                                                  │ == B
//!                                                                  ▼
//!                                         truth inference on pending tasks + promotion
//! ```
//!
//! At the end of the stream a final inference pass covers every normal
//! task, metrics are computed and all state is reset for the next run.

use crate::assignment::ProbabilisticAssigner;
use crate::attacker::{random_other_label, AttackerModel};
use crate::config::{EngineConfig, ReliabilityMode};
use crate::error::{Result, TdadpError};
use crate::inference::ExtendedTruthDiscovery;
use crate::input::{AttackPlan, Dataset, RunPlan};
use crate::metrics::RunMetrics;
use crate::scoring;
use crate::task::{TaskRole, TaskState};
use crate::worker::WorkerState;

use rand::{Rng, RngCore};
use std::collections::{BTreeMap, BTreeSet};
use tdadp_env::{AttackerId, Label, RunContext, TaskId, WorkerId};
use tracing::{debug, info, warn};

/// What happened to a single worker request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Worker is banned; nothing changed
    Skipped,
    /// No task left for this worker
    Idle,
    /// Worker answered a golden-pool task
    Golden { task: TaskId, banned: bool },
    /// Worker answered a normal task
    Normal { task: TaskId },
}

/// Counters accumulated over one run.
#[derive(Debug, Clone, Default)]
struct RunCounters {
    golden_assignments: usize,
    banned_workers: usize,
    promoted_tasks: usize,
    inference_passes: usize,
}

/// Truth discovery with adaptive defense against data poisoning.
pub struct Tdadp {
    config: EngineConfig,

    /// Label cardinality (L)
    label_count: usize,

    /// Expected workers per task (K)
    k: usize,

    assigner: ProbabilisticAssigner,

    inference: ExtendedTruthDiscovery,

    /// Every task, normal and golden, by id
    tasks: BTreeMap<TaskId, TaskState>,

    workers: BTreeMap<WorkerId, WorkerState>,

    /// Attackers of the current run
    attackers: BTreeMap<AttackerId, AttackerModel>,

    /// Deviation probability (ε) of the current run
    deviation: f64,

    /// Non-banned workers that have requested at least once
    active: BTreeSet<WorkerId>,

    /// Every worker that has requested at least once
    seen: BTreeSet<WorkerId>,

    /// Completed reliable tasks since the last batch
    promotion_count: usize,

    counters: RunCounters,
}

impl Tdadp {
    /// Builds the engine from a validated config and dataset.
    pub fn new(config: EngineConfig, dataset: &Dataset) -> Result<Self> {
        config.validate()?;
        dataset.validate()?;

        if config.reliability_mode == ReliabilityMode::Truncated {
            warn!("Truncated reliability mode: reliability collapses to 0 and golden accuracy to 0 or 1");
        }

        let label_count = dataset.label_count;
        let k = dataset.workers_per_task;
        let mut tasks = BTreeMap::new();
        let mut workers: BTreeMap<WorkerId, WorkerState> = BTreeMap::new();

        for record in &dataset.normal_tasks {
            let mut task = TaskState::new(record.id, TaskRole::Normal, record.true_label, label_count);
            for &(worker_id, label) in &record.responses {
                workers
                    .entry(worker_id)
                    .or_insert_with(|| WorkerState::new(worker_id))
                    .add_original(record.id, label);
                task.add_eligible(worker_id);
            }
            tasks.insert(record.id, task);
        }

        for record in &dataset.golden_tasks {
            let mut task = TaskState::new(record.id, TaskRole::Golden, record.true_label, label_count);
            for &(worker_id, label) in &record.responses {
                let worker = workers.get_mut(&worker_id).ok_or(TdadpError::UnknownWorker(worker_id))?;
                worker.add_original(record.id, label);
                task.add_eligible(worker_id);
            }
            tasks.insert(record.id, task);
        }

        info!(
            "Engine ready: {} normal tasks, {} golden tasks, {} workers, L={}, K={}",
            dataset.normal_tasks.len(),
            dataset.golden_tasks.len(),
            workers.len(),
            label_count,
            k
        );

        Ok(Self {
            assigner: ProbabilisticAssigner::from_config(&config, k),
            inference: ExtendedTruthDiscovery::new(label_count, config.max_iterations),
            config,
            label_count,
            k,
            tasks,
            workers,
            attackers: BTreeMap::new(),
            deviation: 0.0,
            active: BTreeSet::new(),
            seen: BTreeSet::new(),
            promotion_count: 0,
            counters: RunCounters::default(),
        })
    }

    // =========================================================================
    // RUN LIFECYCLE
    // =========================================================================

    /// Replays one run and returns its metrics.
    ///
    /// The engine is reset afterwards whether or not the run succeeded.
    pub fn run<C: RunContext>(&mut self, plan: &RunPlan, ctx: &mut C) -> Result<RunMetrics> {
        let outcome = self.replay(plan, ctx);
        self.reset();
        outcome
    }

    fn replay<C: RunContext>(&mut self, plan: &RunPlan, ctx: &mut C) -> Result<RunMetrics> {
        self.prepare_run(&plan.attack)?;
        if let Some(unknown) = plan.order.iter().find(|w| !self.workers.contains_key(*w)) {
            return Err(TdadpError::UnknownWorker(*unknown));
        }

        debug!(
            "Run start (seed={}): {} requests, {} attackers",
            ctx.seed(),
            plan.order.len(),
            self.attackers.len()
        );

        let start = ctx.now();
        for &worker in &plan.order {
            self.process_request(worker, ctx.rng())?;
        }
        let mut metrics = self.finish_run()?;
        metrics.elapsed_ms = (ctx.now() - start).as_secs_f64() * 1000.0;
        Ok(metrics)
    }

    /// Installs the attackers of a run.
    pub fn prepare_run(&mut self, plan: &AttackPlan) -> Result<()> {
        plan.validate()?;
        self.attackers.clear();
        for worker in self.workers.values_mut() {
            worker.set_attacker(None);
        }

        for spec in &plan.attackers {
            let mut model = AttackerModel::new(spec.id, self.k, self.label_count, self.config.honesty_probability);

            for (&task, &label) in &spec.poison_labels {
                if !self.tasks.contains_key(&task) {
                    return Err(TdadpError::UnknownTask(task));
                }
                self.check_label(task, label)?;
                model.set_task_label(task, label);
            }
            if let Some(missing) = self.tasks.keys().find(|t| !spec.poison_labels.contains_key(*t)) {
                return Err(TdadpError::input(format!(
                    "attacker {} has no poison label for task {}",
                    spec.id, missing
                )));
            }

            for &worker_id in &spec.workers {
                let worker = self.workers.get_mut(&worker_id).ok_or(TdadpError::UnknownWorker(worker_id))?;
                worker.set_attacker(Some(spec.id));
                model.add_worker(worker_id);
            }
            self.attackers.insert(spec.id, model);
        }

        self.deviation = plan.deviation;
        Ok(())
    }

    /// Handles one worker request.
    pub fn process_request<R: RngCore + ?Sized>(&mut self, worker_id: WorkerId, rng: &mut R) -> Result<RequestOutcome> {
        let worker = self.workers.get(&worker_id).ok_or(TdadpError::UnknownWorker(worker_id))?;
        self.seen.insert(worker_id);
        if worker.is_banned() {
            return Ok(RequestOutcome::Skipped);
        }
        self.active.insert(worker_id);

        let Some(task_id) = self.assigner.assign(worker, &self.tasks, &self.workers, rng) else {
            return Ok(RequestOutcome::Idle);
        };
        let attacker = worker.attacker();

        let task = self.get_task_mut(task_id)?;
        task.assign(worker_id);
        let true_label = task.true_label();
        let golden = task.in_golden_pool();

        if let Some(attacker_id) = attacker {
            let model = self.get_attacker_mut(attacker_id)?;
            if !model.controls(worker_id) {
                return Err(TdadpError::invariant(format!(
                    "worker {} affiliated with attacker {} that does not control it",
                    worker_id, attacker_id
                )));
            }
            if model.observe(task_id, true_label, rng) {
                debug!("Attacker {} flagged task {} as golden", attacker_id, task_id);
            }
        }

        let outcome = if golden {
            let banned = self.answer_golden(worker_id, task_id)?;
            RequestOutcome::Golden { task: task_id, banned }
        } else {
            self.answer_normal(worker_id, task_id, rng)?;
            RequestOutcome::Normal { task: task_id }
        };

        if self.promotion_count >= self.config.batch_size {
            self.close_batch()?;
        }
        Ok(outcome)
    }

    /// Runs the final inference pass over every normal task and computes metrics.
    ///
    /// `elapsed_ms` is left at 0; `run` fills it in.
    pub fn finish_run(&mut self) -> Result<RunMetrics> {
        let normal: Vec<TaskId> = self.tasks.values().filter(|t| t.in_normal_pool()).map(|t| t.id).collect();
        self.inference
            .process(&normal, &self.active, &mut self.tasks, &mut self.workers)?;
        self.counters.inference_passes += 1;

        let correct = normal
            .iter()
            .filter(|id| {
                self.tasks
                    .get(*id)
                    .map_or(false, |t| t.aggregated() == Some(t.true_label()))
            })
            .count();
        let accuracy = if normal.is_empty() {
            0.0
        } else {
            correct as f64 / normal.len() as f64
        };

        let exposed_golden = self
            .tasks
            .values()
            .filter(|t| t.in_golden_pool())
            .filter(|t| self.attackers.values().any(|a| a.has_detected(t.id)))
            .count();

        let testing_cost = if self.seen.is_empty() {
            0.0
        } else {
            self.counters.golden_assignments as f64 / self.seen.len() as f64
        };

        let metrics = RunMetrics {
            accuracy,
            exposed_golden,
            testing_cost,
            elapsed_ms: 0.0,
            golden_assignments: self.counters.golden_assignments,
            banned_workers: self.counters.banned_workers,
            promoted_tasks: self.counters.promoted_tasks,
            inference_passes: self.counters.inference_passes,
        };
        info!(
            "Run complete: accuracy={:.4} exposed={} cost={:.3} banned={} promoted={}",
            metrics.accuracy, metrics.exposed_golden, metrics.testing_cost, metrics.banned_workers, metrics.promoted_tasks
        );
        Ok(metrics)
    }

    /// Clears all run state; identities and the dataset are kept.
    pub fn reset(&mut self) {
        self.tasks.values_mut().for_each(TaskState::reset);
        self.workers.values_mut().for_each(WorkerState::reset);
        self.attackers.clear();
        self.deviation = 0.0;
        self.active.clear();
        self.seen.clear();
        self.promotion_count = 0;
        self.counters = RunCounters::default();
    }

    // =========================================================================
    // GOLDEN TASKS
    // =========================================================================

    /// Records a golden answer, rescores the worker and bans it if needed.
    fn answer_golden(&mut self, worker_id: WorkerId, task_id: TaskId) -> Result<bool> {
        self.counters.golden_assignments += 1;

        let label = match self.get_worker(worker_id)?.attacker() {
            Some(attacker_id) => self.get_attacker(attacker_id)?.task_label(task_id)?,
            None => self.original_label(worker_id, task_id)?,
        };
        self.get_worker_mut(worker_id)?.record_label(task_id, label);

        self.rescore(worker_id)?;

        if self.get_worker(worker_id)?.trust() >= self.config.tau {
            self.ban(worker_id)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Recomputes trust, reliability and golden accuracy from every golden answer.
    fn rescore(&mut self, worker_id: WorkerId) -> Result<()> {
        let answers: Vec<(TaskId, Label)> = self
            .get_worker(worker_id)?
            .current_labels()
            .iter()
            .filter(|(task, _)| self.tasks.get(*task).map_or(false, TaskState::in_golden_pool))
            .map(|(task, label)| (*task, *label))
            .collect();

        let mut wrong_majority = 0;
        let mut correct = 0;
        for &(task_id, answer) in &answers {
            let votes = self.assignee_labels(task_id)?;
            let task = self.get_task_mut(task_id)?;
            task.compute_majority(votes)?;
            let reference = task.reference_label();

            if task.is_majority(answer) && reference != Some(answer) {
                wrong_majority += 1;
            }
            if reference == Some(answer) {
                correct += 1;
            }
        }

        let trust = scoring::trust_score(wrong_majority);
        let (reliability, accuracy) = scoring::reliability(self.config.reliability_mode, answers.len(), correct);

        let worker = self.get_worker_mut(worker_id)?;
        worker.set_trust(trust);
        worker.set_reliability(reliability);
        worker.set_accuracy(accuracy);
        debug!(
            "Worker {} rescored: s={:.3} r={:.3} p={:.3} ({} golden answers)",
            worker_id,
            trust,
            reliability,
            accuracy,
            answers.len()
        );
        Ok(())
    }

    /// Bans a worker and retracts its labels on tasks outside the golden pool.
    fn ban(&mut self, worker_id: WorkerId) -> Result<()> {
        let open: Vec<TaskId> = self
            .get_worker(worker_id)?
            .current_labels()
            .keys()
            .filter(|task| self.tasks.get(*task).map_or(false, |t| !t.in_golden_pool()))
            .copied()
            .collect();

        for &task_id in &open {
            let task = self.get_task_mut(task_id)?;
            task.expose();
            task.remove_worker(worker_id);
        }

        let worker = self.get_worker_mut(worker_id)?;
        worker.ban();
        for task_id in &open {
            worker.remove_label(*task_id);
        }
        self.active.remove(&worker_id);
        self.counters.banned_workers += 1;

        info!("🔒 Banned worker {} ({} labels retracted)", worker_id, open.len());
        Ok(())
    }

    // =========================================================================
    // NORMAL TASKS
    // =========================================================================

    /// Records a normal-task answer and counts the task if it is ready for promotion.
    fn answer_normal<R: RngCore + ?Sized>(&mut self, worker_id: WorkerId, task_id: TaskId, rng: &mut R) -> Result<()> {
        let label = match self.get_worker(worker_id)?.attacker() {
            Some(attacker_id) => {
                let shared = self.get_attacker(attacker_id)?.task_label(task_id)?;
                if rng.gen::<f64>() <= self.deviation {
                    random_other_label(rng, shared, self.label_count)
                } else {
                    shared
                }
            }
            None => self.original_label(worker_id, task_id)?,
        };
        self.get_worker_mut(worker_id)?.record_label(task_id, label);

        if self.get_task(task_id)?.assigned().len() >= self.k {
            let reliabilities = self.assignee_reliabilities(task_id)?;
            let avg = self.get_task_mut(task_id)?.compute_avg_reliability(reliabilities)?;
            if avg >= self.config.delta {
                self.promotion_count += 1;
            }
        }
        Ok(())
    }

    /// Runs inference over pending normal tasks and promotes the reliable ones.
    fn close_batch(&mut self) -> Result<()> {
        let pending: Vec<TaskId> = self
            .tasks
            .values()
            .filter(|t| t.role() == TaskRole::Normal)
            .map(|t| t.id)
            .collect();

        let report = self
            .inference
            .process(&pending, &self.active, &mut self.tasks, &mut self.workers)?;
        self.counters.inference_passes += 1;

        let delta = self.config.delta;
        let mut promoted = 0;
        for &task_id in &pending {
            if self.get_task(task_id)?.assigned().len() < self.k {
                continue;
            }
            let reliabilities = self.assignee_reliabilities(task_id)?;
            let task = self.get_task_mut(task_id)?;
            if task.compute_avg_reliability(reliabilities)? >= delta && task.promote() {
                promoted += 1;
            }
        }
        self.counters.promoted_tasks += promoted;
        self.promotion_count = 0;

        debug!(
            "Batch closed: {} pending tasks, {} promoted, inference iterations={}",
            pending.len(),
            promoted,
            report.iterations
        );
        Ok(())
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn worker(&self, id: WorkerId) -> Option<&WorkerState> {
        self.workers.get(&id)
    }

    pub fn task(&self, id: TaskId) -> Option<&TaskState> {
        self.tasks.get(&id)
    }

    pub fn attacker(&self, id: AttackerId) -> Option<&AttackerModel> {
        self.attackers.get(&id)
    }

    /// Returns the golden pool (seeded and promoted) in ascending id order.
    pub fn golden_pool(&self) -> Vec<TaskId> {
        self.tasks.values().filter(|t| t.in_golden_pool()).map(|t| t.id).collect()
    }

    /// Returns the non-banned workers that have requested in this run.
    pub fn active_workers(&self) -> &BTreeSet<WorkerId> {
        &self.active
    }

    fn get_worker(&self, id: WorkerId) -> Result<&WorkerState> {
        self.workers.get(&id).ok_or(TdadpError::UnknownWorker(id))
    }

    fn get_worker_mut(&mut self, id: WorkerId) -> Result<&mut WorkerState> {
        self.workers.get_mut(&id).ok_or(TdadpError::UnknownWorker(id))
    }

    fn get_task(&self, id: TaskId) -> Result<&TaskState> {
        self.tasks.get(&id).ok_or(TdadpError::UnknownTask(id))
    }

    fn get_task_mut(&mut self, id: TaskId) -> Result<&mut TaskState> {
        self.tasks.get_mut(&id).ok_or(TdadpError::UnknownTask(id))
    }

    fn get_attacker(&self, id: AttackerId) -> Result<&AttackerModel> {
        self.attackers
            .get(&id)
            .ok_or_else(|| TdadpError::invariant(format!("worker affiliated with unknown attacker {}", id)))
    }

    fn get_attacker_mut(&mut self, id: AttackerId) -> Result<&mut AttackerModel> {
        self.attackers
            .get_mut(&id)
            .ok_or_else(|| TdadpError::invariant(format!("worker affiliated with unknown attacker {}", id)))
    }

    fn original_label(&self, worker_id: WorkerId, task_id: TaskId) -> Result<Label> {
        self.get_worker(worker_id)?.original_label(task_id).ok_or_else(|| {
            TdadpError::invariant(format!(
                "independent worker {} assigned task {} it never answered",
                worker_id, task_id
            ))
        })
    }

    fn assignee_labels(&self, task_id: TaskId) -> Result<Vec<Label>> {
        self.get_task(task_id)?
            .assigned()
            .iter()
            .map(|w| {
                self.get_worker(*w)?.current_label(task_id).ok_or_else(|| {
                    TdadpError::invariant(format!("assignee {} has no label on task {}", w, task_id))
                })
            })
            .collect()
    }

    fn assignee_reliabilities(&self, task_id: TaskId) -> Result<Vec<f64>> {
        self.get_task(task_id)?
            .assigned()
            .iter()
            .map(|w| self.get_worker(*w).map(WorkerState::reliability))
            .collect()
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
