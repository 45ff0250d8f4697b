use thiserror::Error;

/// Errors surfaced by sketch construction and merging.
///
/// Everything else is a programmer error; `add` and `count` cannot fail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SketchError {
    /// Constructor argument outside the supported `[4, 18]` range.
    #[error("precision must be between 4 and 18")]
    InvalidPrecision,

    /// Merge argument was built with a different precision.
    #[error("precisions must be equal")]
    PrecisionMismatch,

    /// Merge argument is not a `HyperLogLogPlus`; carries the concrete type
    /// name of the offending sketch.
    #[error("wrong type for merging: {0}")]
    IncompatibleSketch(&'static str),
}
