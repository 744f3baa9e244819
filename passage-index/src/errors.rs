//! Unified error types for the crate.

use services::artifact::CodecError;
use services::env::EnvError;
use services::storage::StorageError;
use thiserror::Error;

/// Top-level error for passage-index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// I/O or filesystem errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSONL row failed to parse.
    #[error("parse error on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Invalid or unsupported configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Environment variable could not be read.
    #[error(transparent)]
    Env(#[from] EnvError),

    /// Embedding dimension differs from the index dimension.
    #[error("vector size mismatch: got {got}, want {want}")]
    VectorSizeMismatch { got: usize, want: usize },

    /// Two entries share a chunk id.
    #[error("duplicate chunk id: {0}")]
    DuplicateChunkId(u64),

    /// Page or document metadata is unusable.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Index was built by a different embedder.
    #[error("embedder mismatch: index built with '{index}', queried with '{query}'")]
    EmbedderMismatch { index: String, query: String },

    /// Index artifact is absent.
    #[error("passage index is not built")]
    NotBuilt,

    /// Artifact storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Artifact envelope failure.
    #[error(transparent)]
    Codec(#[from] CodecError),
}
