//! Per-run replacement of independent workers with malicious ones.

use crate::error::{Result, SimError};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tdadp_core::{AttackPlan, AttackerSpec, Dataset};
use tdadp_env::{AttackerId, TaskId, WorkerId};

/// Attack strength of an experiment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AttackParams {
    /// Fraction of workers replaced by malicious ones (μ)
    pub malicious_fraction: f64,

    /// Number of attackers (λ)
    pub attackers: usize,

    /// Probability a malicious worker deviates from the shared label (ε)
    pub deviation: f64,
}

impl AttackParams {
    pub fn new(malicious_fraction: f64, attackers: usize, deviation: f64) -> Self {
        Self {
            malicious_fraction,
            attackers,
            deviation,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("malicious_fraction", self.malicious_fraction), ("deviation", self.deviation)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SimError::dataset(format!("{} {} outside [0, 1]", name, value)));
            }
        }
        if self.malicious_fraction > 0.0 && self.attackers == 0 {
            return Err(SimError::dataset("malicious workers need at least one attacker"));
        }
        Ok(())
    }
}

/// Picks `⌈M·μ⌉` workers at random and splits them over the attackers.
///
/// Each attacker controls `⌊num/λ⌋` workers, the last one also takes the
/// remainder. Every attacker draws a random poison label for every normal
/// and golden task.
pub fn plan_attack<R: Rng + ?Sized>(dataset: &Dataset, params: &AttackParams, rng: &mut R) -> Result<AttackPlan> {
    params.validate()?;
    if params.attackers == 0 {
        return Ok(AttackPlan {
            deviation: params.deviation,
            ..AttackPlan::honest()
        });
    }

    let mut pool: Vec<WorkerId> = dataset.workers().into_iter().collect();
    let num = ((pool.len() as f64 * params.malicious_fraction).ceil() as usize).min(pool.len());
    let share = num / params.attackers;
    pool.shuffle(rng);

    let task_ids: Vec<TaskId> = dataset
        .normal_tasks
        .iter()
        .map(|t| t.id)
        .chain(dataset.golden_tasks.iter().map(|t| t.id))
        .collect();

    let mut attackers = Vec::with_capacity(params.attackers);
    for index in 0..params.attackers {
        let size = if index + 1 == params.attackers {
            num - share * (params.attackers - 1)
        } else {
            share
        };
        let workers: Vec<WorkerId> = (0..size).filter_map(|_| pool.pop()).collect();
        let poison_labels: BTreeMap<TaskId, usize> = task_ids
            .iter()
            .map(|id| (*id, rng.gen_range(0..dataset.label_count)))
            .collect();

        attackers.push(AttackerSpec {
            id: AttackerId(index as u32),
            workers,
            poison_labels,
        });
    }

    Ok(AttackPlan {
        malicious_fraction: params.malicious_fraction,
        deviation: params.deviation,
        attackers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{generate, SyntheticParams};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeSet;

    fn dataset() -> Dataset {
        let params = SyntheticParams {
            tasks: 30,
            workers: 10,
            labels: 4,
            workers_per_task: 3,
            accuracy: 0.7,
            accuracy_spread: 0.0,
            golden_tasks: 4,
        };
        generate(&params, &mut ChaCha8Rng::seed_from_u64(8)).unwrap()
    }

    #[test]
    fn test_split_puts_remainder_on_last_attacker() {
        let dataset = dataset();
        let total = dataset.workers().len();
        let params = AttackParams::new(0.7, 3, 0.0);
        let plan = plan_attack(&dataset, &params, &mut ChaCha8Rng::seed_from_u64(1)).unwrap();

        let num = (total as f64 * 0.7).ceil() as usize;
        let sizes: Vec<usize> = plan.attackers.iter().map(|a| a.workers.len()).collect();
        assert_eq!(sizes.len(), 3);
        assert_eq!(sizes[0], num / 3);
        assert_eq!(sizes[1], num / 3);
        assert_eq!(sizes[2], num - 2 * (num / 3));

        let controlled: BTreeSet<WorkerId> = plan.attackers.iter().flat_map(|a| a.workers.clone()).collect();
        assert_eq!(controlled.len(), num);
    }

    #[test]
    fn test_poison_covers_every_task() {
        let dataset = dataset();
        let plan = plan_attack(&dataset, &AttackParams::new(0.2, 1, 0.1), &mut ChaCha8Rng::seed_from_u64(2)).unwrap();
        let attacker = &plan.attackers[0];
        assert_eq!(attacker.poison_labels.len(), 34);
        assert!(attacker.poison_labels.values().all(|l| *l < 4));
        assert_eq!(plan.deviation, 0.1);
    }

    #[test]
    fn test_no_attackers_is_honest() {
        let plan = plan_attack(&dataset(), &AttackParams::default(), &mut ChaCha8Rng::seed_from_u64(3)).unwrap();
        assert_eq!(plan.attacker_count(), 0);
    }

    #[test]
    fn test_malicious_fraction_without_attackers_rejected() {
        let result = plan_attack(&dataset(), &AttackParams::new(0.3, 0, 0.0), &mut ChaCha8Rng::seed_from_u64(3));
        assert!(matches!(result, Err(SimError::Dataset(_))));
    }
}
