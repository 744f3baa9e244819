//! Embedding abstraction.

mod hashing;

pub use hashing::HashingEmbedder;

use crate::errors::IndexError;

/// Provider interface for embedding generation.
///
/// Ingestion and serving must use the same provider so that chunks and
/// questions live in one metric space; the index records `model_id` and
/// `dim` to enforce this.
pub trait EmbeddingsProvider: Send + Sync {
    /// Stable identifier of the embedding model and its parameters.
    fn model_id(&self) -> String;

    /// Output dimensionality.
    fn dim(&self) -> usize;

    /// Produces an embedding vector for the given text.
    fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError>;
}
