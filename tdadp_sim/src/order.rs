//! Worker request order for one run.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use tdadp_core::Dataset;
use tdadp_env::WorkerId;

/// Shuffled request stream: each worker requests once per normal answer it
/// gave plus once per golden task.
pub fn request_order<R: Rng + ?Sized>(dataset: &Dataset, rng: &mut R) -> Vec<WorkerId> {
    let mut answers: BTreeMap<WorkerId, usize> = BTreeMap::new();
    for task in &dataset.normal_tasks {
        for (worker, _) in &task.responses {
            *answers.entry(*worker).or_default() += 1;
        }
    }

    let golden = dataset.golden_tasks.len();
    let mut order: Vec<WorkerId> = answers
        .iter()
        .flat_map(|(worker, count)| std::iter::repeat(*worker).take(count + golden))
        .collect();
    order.shuffle(rng);
    order
}
