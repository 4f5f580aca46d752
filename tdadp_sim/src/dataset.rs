//! Crowdsourcing datasets: synthetic generation and real answer files.
//!
//! Produces the normal tasks (true labels plus the answers each worker gave)
//! and the golden tasks every run draws its quality-control tests from.

use crate::error::{Result, SimError};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tdadp_core::{random_other_label, Dataset, GoldenTaskRecord, NormalTaskRecord};
use tdadp_env::{Label, TaskId, WorkerId};
use tracing::{debug, info, warn};

/// Where an experiment's dataset comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatasetSource {
    /// Generated from parameters
    Synthetic(SyntheticParams),

    /// Read from a directory of answer files (see `load_real`)
    Directory {
        path: PathBuf,
        /// Golden tasks to simulate when the directory provides none
        golden_tasks: usize,
    },
}

impl Default for DatasetSource {
    fn default() -> Self {
        DatasetSource::Synthetic(SyntheticParams::default())
    }
}

impl DatasetSource {
    /// Builds the dataset, drawing any randomness from `rng`.
    pub fn load<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Dataset> {
        match self {
            DatasetSource::Synthetic(params) => generate(params, rng),
            DatasetSource::Directory { path, golden_tasks } => load_real(path, *golden_tasks, rng),
        }
    }
}

/// Parameters of a synthetic dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticParams {
    /// Number of normal tasks (N)
    pub tasks: usize,

    /// Number of workers (M)
    pub workers: usize,

    /// Label cardinality (L)
    pub labels: usize,

    /// Answers per normal task (K)
    pub workers_per_task: usize,

    /// Mean worker accuracy (θ)
    pub accuracy: f64,

    /// Standard deviation of per-worker accuracy; 0 gives every worker θ
    pub accuracy_spread: f64,

    /// Number of golden tasks
    pub golden_tasks: usize,
}

impl Default for SyntheticParams {
    fn default() -> Self {
        Self {
            tasks: 200,
            workers: 50,
            labels: 2,
            workers_per_task: 5,
            accuracy: 0.7,
            accuracy_spread: 0.0,
            golden_tasks: 20,
        }
    }
}

impl SyntheticParams {
    /// Maximum number of normal answers a single worker gives: `N·K/M + 5`
    /// with integer division, applied even when `N·K/M` is fractional.
    pub fn answer_cap(&self) -> usize {
        self.tasks * self.workers_per_task / self.workers + 5
    }

    pub fn validate(&self) -> Result<()> {
        if self.tasks == 0 || self.workers == 0 || self.workers_per_task == 0 {
            return Err(SimError::dataset("tasks, workers and workers_per_task must be positive"));
        }
        if self.labels < 2 {
            return Err(SimError::dataset(format!("need at least 2 labels, got {}", self.labels)));
        }
        if self.workers_per_task > self.workers {
            return Err(SimError::dataset(format!(
                "{} workers per task but only {} workers",
                self.workers_per_task, self.workers
            )));
        }
        if !(0.0..=1.0).contains(&self.accuracy) {
            return Err(SimError::dataset(format!("accuracy {} outside [0, 1]", self.accuracy)));
        }
        if !(self.accuracy_spread >= 0.0 && self.accuracy_spread.is_finite()) {
            return Err(SimError::dataset(format!(
                "accuracy_spread {} must be a non-negative number",
                self.accuracy_spread
            )));
        }
        Ok(())
    }
}

/// Generates a dataset from `params`.
///
/// Workers are drawn for each task from a shuffled pool; a worker leaves the
/// pool once it has given `answer_cap()` answers. Workers that end up with
/// no normal answer are left out of the dataset.
pub fn generate<R: Rng + ?Sized>(params: &SyntheticParams, rng: &mut R) -> Result<Dataset> {
    params.validate()?;

    let accuracies = worker_accuracies(params, rng)?;
    let cap = params.answer_cap();
    let mut answered = vec![0usize; params.workers];
    let mut correct = vec![0usize; params.workers];
    let mut available: Vec<usize> = (0..params.workers).collect();
    let mut normal_tasks = Vec::with_capacity(params.tasks);

    for task in 0..params.tasks {
        if available.len() < params.workers_per_task {
            return Err(SimError::dataset(format!(
                "only {} workers left for task {} (need {}); raise workers or lower tasks",
                available.len(),
                task,
                params.workers_per_task
            )));
        }
        let truth: Label = rng.gen_range(0..params.labels);
        available.shuffle(rng);

        let mut responses = Vec::with_capacity(params.workers_per_task);
        for &worker in available.iter().rev().take(params.workers_per_task) {
            let label = if rng.gen::<f64>() <= accuracies[worker] {
                correct[worker] += 1;
                truth
            } else {
                random_other_label(rng, truth, params.labels)
            };
            answered[worker] += 1;
            responses.push((WorkerId(worker as u32), label));
        }
        available.retain(|w| answered[*w] < cap);

        normal_tasks.push(NormalTaskRecord {
            id: TaskId(task as u64),
            true_label: truth,
            responses,
        });
    }

    let stats: BTreeMap<WorkerId, (usize, usize)> = (0..params.workers)
        .filter(|w| answered[*w] > 0)
        .map(|w| (WorkerId(w as u32), (answered[w], correct[w])))
        .collect();
    let golden_tasks = simulate_golden(params.golden_tasks, params.tasks as u64, params.labels, &stats, rng);

    let dataset = Dataset {
        label_count: params.labels,
        workers_per_task: params.workers_per_task,
        normal_tasks,
        golden_tasks,
    };

    debug!(
        "Generated dataset: {} tasks, {} golden, {} answering workers, answer cap {}",
        params.tasks,
        params.golden_tasks,
        answered.iter().filter(|n| **n > 0).count(),
        cap
    );
    Ok(dataset)
}

/// Golden tasks answered by every worker in `stats` at its empirical accuracy.
///
/// `stats` maps a worker to its `(answered, correct)` normal-task counts.
/// Task ids start at `first_id`.
fn simulate_golden<R: Rng + ?Sized>(
    count: usize,
    first_id: u64,
    label_count: usize,
    stats: &BTreeMap<WorkerId, (usize, usize)>,
    rng: &mut R,
) -> Vec<GoldenTaskRecord> {
    let truths: Vec<Label> = (0..count).map(|_| rng.gen_range(0..label_count)).collect();
    let mut responses: Vec<Vec<(WorkerId, Label)>> = vec![Vec::new(); count];

    for (&worker, &(answered, correct)) in stats {
        if answered == 0 {
            continue;
        }
        let empirical = correct as f64 / answered as f64;
        for (index, &truth) in truths.iter().enumerate() {
            let label = if rng.gen::<f64>() <= empirical {
                truth
            } else {
                random_other_label(rng, truth, label_count)
            };
            responses[index].push((worker, label));
        }
    }

    truths
        .into_iter()
        .zip(responses)
        .enumerate()
        .map(|(index, (truth, responses))| GoldenTaskRecord {
            id: TaskId(first_id + index as u64),
            true_label: truth,
            responses,
        })
        .collect()
}

// ============================================================================
// REAL DATASETS
// ============================================================================

/// `(task, worker, label)` row of `answer.csv` and `quali.csv`.
#[derive(Debug, Deserialize)]
struct AnswerRow(u64, String, Label);

/// `(task, truth)` row of `truth.csv` and `quali_truth.csv`.
#[derive(Debug, Deserialize)]
struct TruthRow(u64, Label);

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let rows = reader.deserialize().collect::<std::result::Result<Vec<T>, csv::Error>>()?;
    Ok(rows)
}

/// Loads a real crowdsourcing dataset from `dir`.
///
/// Expects `answer.csv` (task, worker, label) and `truth.csv` (task, truth),
/// each with a header line. Worker names are numbered in order of first
/// appearance; a repeated answer replaces the earlier one. L is one more than
/// the largest label present and K the largest number of workers on a task.
/// Tasks without a truth row are dropped.
///
/// Golden tasks come from `quali.csv` and `quali_truth.csv` when present,
/// otherwise `golden_tasks` are simulated from each worker's accuracy on the
/// normal tasks. Either way they are renumbered after the last normal task.
pub fn load_real<R: Rng + ?Sized>(dir: &Path, golden_tasks: usize, rng: &mut R) -> Result<Dataset> {
    let mut names: HashMap<String, WorkerId> = HashMap::new();
    let mut answers: BTreeMap<TaskId, BTreeMap<WorkerId, Label>> = BTreeMap::new();
    for AnswerRow(task, name, label) in read_rows::<AnswerRow>(&dir.join("answer.csv"))? {
        let next = WorkerId(names.len() as u32);
        let worker = *names.entry(name).or_insert(next);
        answers.entry(TaskId(task)).or_default().insert(worker, label);
    }

    let truths: BTreeMap<TaskId, Label> = read_rows::<TruthRow>(&dir.join("truth.csv"))?
        .into_iter()
        .map(|TruthRow(task, truth)| (TaskId(task), truth))
        .collect();
    if let Some(task) = truths.keys().find(|t| !answers.contains_key(*t)) {
        return Err(SimError::dataset(format!("truth.csv lists task {} that nobody answered", task)));
    }
    let dropped = answers.keys().filter(|t| !truths.contains_key(*t)).count();
    if dropped > 0 {
        warn!("Dropping {} answered tasks with no truth row", dropped);
    }

    let workers_per_task = answers.values().map(BTreeMap::len).max().unwrap_or(0);
    let mut max_label = answers
        .values()
        .flat_map(|a| a.values())
        .chain(truths.values())
        .copied()
        .max()
        .unwrap_or(0);

    let mut stats: BTreeMap<WorkerId, (usize, usize)> = BTreeMap::new();
    let mut normal_tasks = Vec::with_capacity(truths.len());
    for (&id, &truth) in &truths {
        let responses: Vec<(WorkerId, Label)> = answers
            .remove(&id)
            .map(|a| a.into_iter().collect())
            .unwrap_or_default();
        for &(worker, label) in &responses {
            let entry = stats.entry(worker).or_default();
            entry.0 += 1;
            if label == truth {
                entry.1 += 1;
            }
        }
        normal_tasks.push(NormalTaskRecord {
            id,
            true_label: truth,
            responses,
        });
    }

    let first_golden = normal_tasks.last().map_or(0, |t| t.id.0 + 1);
    let golden = if dir.join("quali.csv").exists() {
        let golden = read_golden(dir, &names, &stats, first_golden)?;
        let golden_max = golden
            .iter()
            .flat_map(|t| t.responses.iter().map(|(_, l)| *l).chain([t.true_label]))
            .max()
            .unwrap_or(0);
        max_label = max_label.max(golden_max);
        golden
    } else {
        simulate_golden(golden_tasks, first_golden, (max_label + 1).max(2), &stats, rng)
    };

    let dataset = Dataset {
        label_count: (max_label + 1).max(2),
        workers_per_task,
        normal_tasks,
        golden_tasks: golden,
    };
    dataset.validate()?;

    info!(
        "Loaded {}: {} tasks, {} golden, {} workers, L={}, K={}",
        dir.display(),
        dataset.normal_tasks.len(),
        dataset.golden_tasks.len(),
        stats.len(),
        dataset.label_count,
        dataset.workers_per_task
    );
    Ok(dataset)
}

/// Reads the provided golden tasks, keeping answers from workers in `answering`.
fn read_golden(
    dir: &Path,
    names: &HashMap<String, WorkerId>,
    answering: &BTreeMap<WorkerId, (usize, usize)>,
    first_id: u64,
) -> Result<Vec<GoldenTaskRecord>> {
    let truths: BTreeMap<u64, Label> = read_rows::<TruthRow>(&dir.join("quali_truth.csv"))?
        .into_iter()
        .map(|TruthRow(task, truth)| (task, truth))
        .collect();

    let mut responses: BTreeMap<u64, BTreeMap<WorkerId, Label>> = BTreeMap::new();
    for AnswerRow(task, name, label) in read_rows::<AnswerRow>(&dir.join("quali.csv"))? {
        let worker = *names
            .get(&name)
            .ok_or_else(|| SimError::dataset(format!("quali.csv worker {} has no normal answers", name)))?;
        if !truths.contains_key(&task) {
            return Err(SimError::dataset(format!("quali.csv task {} missing from quali_truth.csv", task)));
        }
        if answering.contains_key(&worker) {
            responses.entry(task).or_default().insert(worker, label);
        }
    }

    Ok(truths
        .into_iter()
        .enumerate()
        .map(|(index, (task, truth))| GoldenTaskRecord {
            id: TaskId(first_id + index as u64),
            true_label: truth,
            responses: responses
                .remove(&task)
                .map(|r| r.into_iter().collect())
                .unwrap_or_default(),
        })
        .collect())
}

/// θ for every worker, or `Normal(θ, spread)` clamped to [0, 1].
fn worker_accuracies<R: Rng + ?Sized>(params: &SyntheticParams, rng: &mut R) -> Result<Vec<f64>> {
    if params.accuracy_spread == 0.0 {
        return Ok(vec![params.accuracy; params.workers]);
    }
    let normal = Normal::new(params.accuracy, params.accuracy_spread)
        .map_err(|e| SimError::dataset(format!("accuracy distribution: {}", e)))?;
    Ok((0..params.workers)
        .map(|_| normal.sample(rng).clamp(0.0, 1.0))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeSet;

    fn small() -> SyntheticParams {
        SyntheticParams {
            tasks: 40,
            workers: 12,
            labels: 3,
            workers_per_task: 3,
            accuracy: 0.8,
            accuracy_spread: 0.0,
            golden_tasks: 5,
        }
    }

    #[test]
    fn test_generated_dataset_is_valid() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let dataset = generate(&small(), &mut rng).unwrap();

        dataset.validate().unwrap();
        assert_eq!(dataset.normal_tasks.len(), 40);
        assert_eq!(dataset.golden_tasks.len(), 5);
        for task in &dataset.normal_tasks {
            assert_eq!(task.responses.len(), 3);
            let distinct: BTreeSet<_> = task.responses.iter().map(|(w, _)| *w).collect();
            assert_eq!(distinct.len(), 3);
        }
    }

    #[test]
    fn test_golden_ids_follow_normal_ids() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let dataset = generate(&small(), &mut rng).unwrap();
        let ids: Vec<u64> = dataset.golden_tasks.iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![40, 41, 42, 43, 44]);

        let answering = dataset.workers();
        for golden in &dataset.golden_tasks {
            assert_eq!(golden.responses.len(), answering.len());
        }
    }

    #[test]
    fn test_answer_cap_respected() {
        let params = small();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let dataset = generate(&params, &mut rng).unwrap();

        let mut counts: BTreeMap<WorkerId, usize> = BTreeMap::new();
        for task in &dataset.normal_tasks {
            for (worker, _) in &task.responses {
                *counts.entry(*worker).or_default() += 1;
            }
        }
        assert_eq!(params.answer_cap(), 15);
        assert!(counts.values().all(|n| *n <= params.answer_cap()));
    }

    #[test]
    fn test_perfect_workers_answer_truthfully() {
        let params = SyntheticParams {
            accuracy: 1.0,
            ..small()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let dataset = generate(&params, &mut rng).unwrap();

        for task in &dataset.normal_tasks {
            assert!(task.responses.iter().all(|(_, l)| *l == task.true_label));
        }
        for task in &dataset.golden_tasks {
            assert!(task.responses.iter().all(|(_, l)| *l == task.true_label));
        }
    }

    #[test]
    fn test_same_seed_same_dataset() {
        let params = SyntheticParams {
            accuracy_spread: 0.1,
            ..small()
        };
        let a = generate(&params, &mut ChaCha8Rng::seed_from_u64(5)).unwrap();
        let b = generate(&params, &mut ChaCha8Rng::seed_from_u64(5)).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    /// Writes `files` into a fresh directory under the system temp dir.
    fn dataset_dir(name: &str, files: &[(&str, &str)]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tdadp-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        for (file, text) in files {
            std::fs::write(dir.join(file), text).unwrap();
        }
        dir
    }

    const ANSWERS: &str = "question,worker,answer\n0,alice,1\n0,bob,1\n0,carol,0\n1,bob,0\n1,carol,0\n2,alice,2\n";
    const TRUTHS: &str = "question,truth\n0,1\n1,0\n";

    #[test]
    fn test_load_real_with_golden_files() {
        let dir = dataset_dir(
            "golden",
            &[
                ("answer.csv", ANSWERS),
                ("truth.csv", TRUTHS),
                ("quali.csv", "question,worker,answer\n7,carol,1\n7,alice,0\n9,bob,1\n"),
                ("quali_truth.csv", "question,truth\n7,0\n9,1\n"),
            ],
        );
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let dataset = load_real(&dir, 20, &mut rng).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        // Task 2 has no truth row, but its label still counts towards L.
        assert_eq!(dataset.label_count, 3);
        assert_eq!(dataset.workers_per_task, 3);
        let ids: Vec<u64> = dataset.normal_tasks.iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![0, 1]);
        // alice, bob, carol numbered by first appearance.
        assert_eq!(
            dataset.normal_tasks[0].responses,
            vec![(WorkerId(0), 1), (WorkerId(1), 1), (WorkerId(2), 0)]
        );

        assert_eq!(dataset.golden_tasks.len(), 2);
        let first = &dataset.golden_tasks[0];
        assert_eq!(first.id, TaskId(2));
        assert_eq!(first.true_label, 0);
        assert_eq!(first.responses, vec![(WorkerId(0), 0), (WorkerId(2), 1)]);
        let second = &dataset.golden_tasks[1];
        assert_eq!(second.id, TaskId(3));
        assert_eq!(second.responses, vec![(WorkerId(1), 1)]);
    }

    #[test]
    fn test_load_real_simulates_missing_golden_tasks() {
        let dir = dataset_dir(
            "simulated",
            &[
                ("answer.csv", "question,worker,answer\n0,x,1\n0,y,1\n1,x,0\n1,y,0\n"),
                ("truth.csv", "question,truth\n0,1\n1,0\n"),
            ],
        );
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let dataset = load_real(&dir, 4, &mut rng).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(dataset.label_count, 2);
        assert_eq!(dataset.workers_per_task, 2);
        let ids: Vec<u64> = dataset.golden_tasks.iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![2, 3, 4, 5]);
        // Perfect workers answer every simulated golden task correctly.
        for task in &dataset.golden_tasks {
            assert_eq!(task.responses.len(), 2);
            assert!(task.responses.iter().all(|(_, l)| *l == task.true_label));
        }
    }

    #[test]
    fn test_load_real_rejects_unknown_golden_worker() {
        let dir = dataset_dir(
            "unknown",
            &[
                ("answer.csv", ANSWERS),
                ("truth.csv", TRUTHS),
                ("quali.csv", "question,worker,answer\n7,mallory,1\n"),
                ("quali_truth.csv", "question,truth\n7,0\n"),
            ],
        );
        let result = load_real(&dir, 20, &mut ChaCha8Rng::seed_from_u64(3));
        std::fs::remove_dir_all(&dir).unwrap();

        assert!(matches!(result, Err(SimError::Dataset(_))));
    }

    #[test]
    fn test_load_real_missing_directory() {
        let dir = std::env::temp_dir().join("tdadp-no-such-dataset");
        let result = load_real(&dir, 20, &mut ChaCha8Rng::seed_from_u64(4));
        assert!(matches!(result, Err(SimError::Csv(_))));
    }

    #[test]
    fn test_rejects_impossible_params() {
        let params = SyntheticParams {
            workers_per_task: 20,
            ..small()
        };
        assert!(params.validate().is_err());
        let params = SyntheticParams {
            labels: 1,
            ..small()
        };
        assert!(params.validate().is_err());
    }
}
