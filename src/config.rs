use crate::constants::dataset::{DEFAULT_SEED, DEFAULT_TRAIN_FRACTION};
use crate::constants::generator::{DEFAULT_BATCH_SIZE, DEFAULT_STALE_DAYS, DEFAULT_WORKERS};
use crate::errors::MatchError;

/// Controls the bounded parallel fan-out used by pair generation.
#[derive(Clone, Copy, Debug)]
pub struct FanOutConfig {
    /// Max number of workers scanning partitions concurrently.
    pub workers: usize,
    /// Items a worker maps locally before merging into the shared result.
    ///
    /// Cancellation is checked between batches, so smaller batches react faster
    /// at the cost of more lock acquisitions.
    pub batch_size: usize,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl FanOutConfig {
    /// Validate that both the worker count and batch size are non-zero.
    pub fn validated(self) -> Result<Self, MatchError> {
        if self.workers == 0 {
            return Err(MatchError::Configuration(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(MatchError::Configuration(
                "batch size must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Top-level pipeline configuration.
#[derive(Clone, Debug)]
pub struct MatchConfig {
    /// Seed that controls which finding each negative example is paired with.
    pub seed: u64,
    /// Unmatched losses must be older than this many days to become negatives.
    pub stale_days: i64,
    /// Fraction of matches (and as many non-matches) placed in the training set.
    pub train_fraction: f32,
    /// Keep items flagged as legacy records.
    pub use_legacy_data: bool,
    /// Parallelism for pair generation.
    pub fan_out: FanOutConfig,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            stale_days: DEFAULT_STALE_DAYS,
            train_fraction: DEFAULT_TRAIN_FRACTION,
            use_legacy_data: false,
            fan_out: FanOutConfig::default(),
        }
    }
}

impl MatchConfig {
    /// Validate the train fraction and fan-out settings.
    pub fn validated(self) -> Result<Self, MatchError> {
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return Err(MatchError::Configuration(
                "train fraction must lie strictly between 0 and 1".to_string(),
            ));
        }
        if self.stale_days < 0 {
            return Err(MatchError::Configuration(
                "stale days must not be negative".to_string(),
            ));
        }
        self.fan_out.validated()?;
        Ok(self)
    }
}
