//! Render configuration.

use configsum_rule::{MismatchPolicy, SeededPercentage};

/// Configuration for [`UserService`](crate::UserService).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    /// Seed for rollout rolls. `None` seeds from OS entropy.
    pub seed: Option<u64>,
    /// Whether malformed criteria fail the render instead of being skipped.
    pub fail_on_type_mismatch: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderConfig {
    /// Creates the default configuration: entropy seeded, strict criteria.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            seed: None,
            fail_on_type_mismatch: true,
        }
    }

    /// Sets the seed for reproducible rolls.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets whether malformed criteria fail the render.
    #[must_use]
    pub const fn with_fail_on_type_mismatch(mut self, fail: bool) -> Self {
        self.fail_on_type_mismatch = fail;
        self
    }

    /// Returns the fold policy for malformed criteria.
    #[must_use]
    pub const fn mismatch_policy(&self) -> MismatchPolicy {
        if self.fail_on_type_mismatch {
            MismatchPolicy::Fail
        } else {
            MismatchPolicy::Skip
        }
    }

    /// Builds the percentage source described by this configuration.
    #[must_use]
    pub fn percentage_source(&self) -> SeededPercentage {
        self.seed
            .map_or_else(SeededPercentage::from_entropy, SeededPercentage::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use configsum_rule::PercentageSource;

    #[test]
    fn defaults() {
        let config = RenderConfig::default();

        assert_eq!(config.seed, None);
        assert_eq!(config.mismatch_policy(), MismatchPolicy::Fail);
    }

    #[test]
    fn lenient_policy() {
        let config = RenderConfig::new().with_fail_on_type_mismatch(false);
        assert_eq!(config.mismatch_policy(), MismatchPolicy::Skip);
    }

    #[test]
    fn seeded_sources_agree() {
        let config = RenderConfig::new().with_seed(9);
        let mut a = config.percentage_source();
        let mut b = config.percentage_source();

        for _ in 0..16 {
            assert_eq!(a.roll(), b.roll());
        }
    }
}
