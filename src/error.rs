//! Error taxonomy for the recognition core.
//!
//! Initialization failures (bad config files, models that fail to load or whose shape
//! doesn't match the contract) are fatal and propagate as [`CoreError`]. Per-frame and
//! per-window conditions (an invalid frame, a decode attempted before initialization)
//! are never fatal: a dropped frame is reported by `push_frame` returning `false`, and
//! decoding before initialization yields an empty hypothesis list. Neither has a
//! variant here because neither is ever returned as an `Err`.
use thiserror::Error;

/// Fatal error kinds that can cross the core's API boundary.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A config, token, lexicon or homophones file was missing, unreadable or malformed.
    #[error("configuration error: {0}")]
    Config(String),
    /// The acoustic model file could not be parsed, or has the wrong arity/structure.
    #[error("failed to load acoustic model: {0}")]
    ModelLoadFailed(String),
    /// An input or output tensor's rank/size differs from the documented contract.
    #[error("acoustic model shape mismatch: {0}")]
    ModelShapeMismatch(String),
    /// A runtime error occurred inside the acoustic model during inference.
    #[error("acoustic model inference failed: {0}")]
    InferenceFailed(String),
    /// Caller passed null/empty/mismatched-length arguments across the boundary.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
