/// Constants used when laying out the category index.
pub mod categories {
    /// Slots reserved per category ahead of its subcategories.
    pub const CATEGORY_PADDING: usize = 10;
}

/// Constants used when mapping incident dates.
pub mod dates {
    /// Dates before this year are the "unset date" sentinel (the source data uses 1999-12-31).
    pub const EPOCH_YEAR: i32 = 2000;
}

/// Constants used by color parsing and Lab conversion.
pub mod colors {
    /// Sentinel values that mean "no meaningful color".
    pub const SENTINEL_COLORS: [&str; 2] = ["#000000", "#ffffff"];
    /// D65 reference white, X component (scaled to 100).
    pub const REF_WHITE_X: f64 = 95.047;
    /// D65 reference white, Y component (scaled to 100).
    pub const REF_WHITE_Y: f64 = 100.0;
    /// D65 reference white, Z component (scaled to 100).
    pub const REF_WHITE_Z: f64 = 108.883;
    /// CIE epsilon (216 / 24389).
    pub const LAB_EPSILON: f64 = 0.008856;
    /// CIE kappa (24389 / 27).
    pub const LAB_KAPPA: f64 = 903.3;
    /// Lab channels are divided by this before min-max scaling.
    pub const LAB_CHANNEL_DIVISOR: f64 = 100.0;
}

/// Constants used by pair generation.
pub mod generator {
    /// Default number of concurrent workers.
    pub const DEFAULT_WORKERS: usize = 6;
    /// Default number of items a worker maps before merging into the shared result.
    pub const DEFAULT_BATCH_SIZE: usize = 1000;
    /// Progress is logged whenever the merged result crosses a multiple of this.
    pub const PROGRESS_LOG_INTERVAL: usize = 1000;
    /// Default minimum age (days) before an unmatched loss counts as a negative example.
    pub const DEFAULT_STALE_DAYS: i64 = 15;
    /// Maximum description length included in duplicate-finding warnings.
    pub const DESCRIPTION_LOG_CHARS: usize = 100;
    /// Label assigned to matching pairs.
    pub const MATCH_LABEL: f64 = 1.0;
    /// Label assigned to non-matching pairs.
    pub const NON_MATCH_LABEL: f64 = -1.0;
}

/// Constants used by dataset assembly and export.
pub mod dataset {
    /// Default seed for negative sampling.
    pub const DEFAULT_SEED: u64 = 42;
    /// Default fraction of matches placed in the training set.
    pub const DEFAULT_TRAIN_FRACTION: f32 = 0.5;
    /// Default training CSV filename.
    pub const TRAINING_CSV: &str = "training.csv";
    /// Default test CSV filename.
    pub const TEST_CSV: &str = "test.csv";
    /// Default training pairs JSON filename.
    pub const TRAINING_JSON: &str = "training.json";
    /// Default test pairs JSON filename.
    pub const TEST_JSON: &str = "test.json";
}

/// Constants used by per-record seed hashing.
pub mod hash {
    /// FNV-1a 64-bit offset basis.
    pub const FNV1A64_OFFSET: u64 = 0xcbf29ce484222325;
    /// FNV-1a 64-bit prime.
    pub const FNV1A64_PRIME: u64 = 0x100000001b3;
}
