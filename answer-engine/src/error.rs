//! Typed errors for the answer-engine crate.

use guardrail::GuardrailError;
use passage_index::IndexError;
use services::env::EnvError;
use thiserror::Error;

/// Failures while assembling an [`crate::AskService`] from stored artifacts.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Classifier artifacts are missing, corrupt, or do not belong together.
    #[error("guardrail error: {0}")]
    Guardrail(#[from] GuardrailError),

    /// Passage index is missing, corrupt, or built with another embedder.
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error("invalid config: {0}")]
    Config(String),
}

/// Request rejected before any core logic runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("question must be at least {min} characters, got {len}")]
    QuestionTooShort { min: usize, len: usize },

    #[error("question must be at most {max} characters, got {len}")]
    QuestionTooLong { max: usize, len: usize },

    #[error("question contains a NUL character")]
    ContainsNul,

    #[error("unsupported grade '{grade}'; expected one of: {supported}")]
    UnsupportedGrade { grade: String, supported: String },

    #[error("unsupported subject '{subject}'; expected one of: {supported}")]
    UnsupportedSubject { subject: String, supported: String },
}

/// Malformed chunk metadata handed to the synthesizer.
///
/// "Nothing relevant" is never an error; it is a `no_content` result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    #[error("chunk {chunk_id} has empty content")]
    EmptyContent { chunk_id: u64 },

    #[error("chunk {chunk_id} is missing its {field}")]
    MissingMetadata { chunk_id: u64, field: &'static str },

    #[error("chunk {chunk_id} has page number 0")]
    InvalidPage { chunk_id: u64 },
}
