//! Wall-clock implementation of RunContext.

use crate::RunContext;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::{Duration, Instant};

/// Context backed by the system monotonic clock and a seeded ChaCha8 RNG.
///
/// This is the context used when reporting real elapsed time. Randomness is
/// still seeded, so decisions are reproducible even though timings are not.
pub struct WallClockContext {
    /// Start time for monotonic duration calculations
    start: Instant,

    /// Seed the generator was created from
    seed: u64,

    /// Generator for every draw of the run
    rng: ChaCha8Rng,
}

impl WallClockContext {
    /// Creates a new WallClockContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            start: Instant::now(),
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl RunContext for WallClockContext {
    type Entropy = ChaCha8Rng;

    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}
