//! Worker score transforms applied after each golden answer.

use crate::config::ReliabilityMode;

/// Saturating transform `2 / (1 + e^-x) - 1`, mapping [0, ∞) onto [0, 1].
///
/// Large inputs round to exactly 1.0 in f64.
fn saturate(x: f64) -> f64 {
    2.0 / (1.0 + (-x).exp()) - 1.0
}

/// Trust score from the number of golden answers that sided with a wrong majority.
///
/// One such answer gives 0.46, two give 0.76, three give 0.91.
pub fn trust_score(wrong_majority_answers: usize) -> f64 {
    saturate(wrong_majority_answers as f64)
}

/// Reliability and golden accuracy from `correct` out of `answered` golden answers.
///
/// Returns `(reliability, accuracy)`. Reliability is the correct fraction
/// damped by how many golden tasks were answered, so a single lucky answer
/// does not make a worker reliable. `answered` of 0 yields `(0, 0)`.
pub fn reliability(mode: ReliabilityMode, answered: usize, correct: usize) -> (f64, f64) {
    if answered == 0 {
        return (0.0, 0.0);
    }
    let n = answered as f64;
    let c = correct as f64;
    match mode {
        ReliabilityMode::Fractional => {
            let fraction = c / n;
            (saturate(n / 3.0) * fraction, fraction)
        }
        ReliabilityMode::Truncated => {
            let exponent = (-(answered as i64)).div_euclid(3) as f64;
            let damping = saturate(-exponent);
            ((damping * c / n).floor(), (correct / answered) as f64)
        }
    }
}
