//! Percentage sources for rollout dice rolls.
//!
//! Rolls are drawn from `1..=100`, so a rollout of `R` admits a user when
//! `roll <= R`: `0` admits nobody and `100` admits everyone.

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Lowest possible roll.
pub const MIN_ROLL: u8 = 1;
/// Highest possible roll.
pub const MAX_ROLL: u8 = 100;

/// A source of percentage rolls.
pub trait PercentageSource {
    /// Draws one roll in `1..=100`.
    fn roll(&mut self) -> u8;
}

impl<R: RngCore> PercentageSource for R {
    fn roll(&mut self) -> u8 {
        self.gen_range(MIN_ROLL..=MAX_ROLL)
    }
}

/// Deterministic source backed by ChaCha8.
#[derive(Debug, Clone)]
pub struct SeededPercentage {
    rng: ChaCha8Rng,
}

impl SeededPercentage {
    /// Creates a source with a fixed seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Creates a source seeded from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
        }
    }
}

impl PercentageSource for SeededPercentage {
    fn roll(&mut self) -> u8 {
        self.rng.roll()
    }
}

/// Always returns the same roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPercentage(pub u8);

impl PercentageSource for FixedPercentage {
    fn roll(&mut self) -> u8 {
        self.0
    }
}
