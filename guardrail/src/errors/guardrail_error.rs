//! Unified error type for the guardrail crate.

use services::artifact::CodecError;
use services::env::EnvError;
use services::storage::StorageError;
use thiserror::Error;

/// Errors produced by featurization, training, and scope classification.
#[derive(Debug, Error)]
pub enum GuardrailError {
    // ── Input ───────────────────────────────────────────────────────────────
    /// Text is empty, whitespace-only, or contains NUL characters.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    // ── Model state ─────────────────────────────────────────────────────────
    /// Classification was requested before any artifact pair was loaded.
    #[error("guardrail model is not loaded")]
    ModelNotLoaded,

    /// Vectorizer and ensemble do not belong together, or a feature vector
    /// has a different dimension than the ensemble expects.
    #[error("model version mismatch: expected {expected}, found {found}")]
    ModelVersionMismatch { expected: String, found: String },

    // ── Training data ───────────────────────────────────────────────────────
    /// No usable training examples.
    #[error("training set is empty")]
    EmptyTrainingSet,

    /// Document-frequency pruning removed every term.
    #[error("vocabulary is empty after pruning (min_df={min_df}, max_df={max_df})")]
    EmptyVocabulary { min_df: usize, max_df: f64 },

    /// Label column holds something other than 0 or 1.
    #[error("invalid label '{value}' on line {line} (expected 0 or 1)")]
    InvalidLabel { line: u64, value: String },

    /// Required CSV column is absent from the header.
    #[error("training data is missing required column '{column}'")]
    MissingColumn { column: &'static str },

    /// CSV parse failure.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    // ── Configuration / environment ─────────────────────────────────────────
    /// Configuration combination is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Environment variable could not be read.
    #[error(transparent)]
    Env(#[from] EnvError),

    // ── Persistence ─────────────────────────────────────────────────────────
    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Artifact storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Artifact envelope failure.
    #[error(transparent)]
    Codec(#[from] CodecError),
}
