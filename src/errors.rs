use thiserror::Error;

use crate::overlay::TraceId;

/// Errors surfaced at the engine boundary.
///
/// Structural problems with the input (empty or mismatched arrays) are
/// reported here. Numeric degeneracies inside metrics or downsampling are
/// not errors, those degrade to empty series or missing metric values.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("series is empty (no finite samples)")]
    EmptySeries,

    #[error("shape mismatch: axis has {axis_len} samples, value has {value_len}")]
    ShapeMismatch { axis_len: usize, value_len: usize },

    #[error("auxiliary data has {found} entries, expected {expected}")]
    AuxiliaryMismatch { expected: usize, found: usize },

    #[error("image shape {shape:?} does not match a buffer of {pixels} pixels")]
    ImageShape { shape: Vec<usize>, pixels: usize },

    #[error("image trace has no pixel payload")]
    MissingImage,

    #[error("trace {0} is not part of the overlay set")]
    UnknownTrace(TraceId),

    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
