use std::io;

use thiserror::Error;

use crate::data::AttributeKind;
use crate::types::AttributeId;

/// Error type for configuration, IO, vector layout, and generation failures.
#[derive(Debug, Error)]
pub enum MatchError {
    /// An attribute's value count does not match its kind's arity.
    #[error(
        "attribute '{attribute_id}' ({kind:?}) has {actual} values, expected {expected}; vector would be malformed"
    )]
    MalformedVector {
        /// Offending attribute.
        attribute_id: AttributeId,
        /// Its declared kind.
        kind: AttributeKind,
        /// Arity of `kind`.
        expected: usize,
        /// Values found on the record.
        actual: usize,
    },
    /// Vectors of one batch disagree in length.
    #[error("vector {index} has length {actual}, expected {expected}")]
    InconsistentVectorLength {
        /// Position of the vector in the batch.
        index: usize,
        /// Length of the first vector.
        expected: usize,
        /// Length of this vector.
        actual: usize,
    },
    /// The value kind has no numeric encoding.
    #[error("no encoding available for {0}")]
    Unsupported(String),
    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A [`CancellationToken`](crate::CancellationToken) stopped generation.
    #[error("pair generation was cancelled")]
    Cancelled,
    /// A generation worker panicked; carries the panic message.
    #[error("pair generation worker panicked: {0}")]
    WorkerPanicked(String),
    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// JSON (de)serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// CSV writer failure.
    #[error(transparent)]
    Csv(#[from] csv::Error),
}
