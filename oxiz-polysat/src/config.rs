//! Configuration for the conflict-explanation engines.

/// Tuning knobs. The defaults reproduce the validated behavior; the
/// experimental switches enable rule variants that are still being
/// evaluated and are off by default.
#[derive(Debug, Clone)]
pub struct Config {
    /// Enable pattern variants pending validation: the one-sided
    /// `non_zero`/`non_max` interval patterns.
    pub enable_experimental: bool,
    /// Precision budget for the overflow-predicate interval: when both
    /// derived bounds are at least this large, the two-value approximation
    /// would lose too much precision and the match is abandoned instead.
    pub ovfl_budget: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_experimental: false,
            ovfl_budget: 4,
        }
    }
}
