//! Chunking and embedding configuration.

use serde::{Deserialize, Serialize};
use services::env::env_or;

use crate::errors::IndexError;

/// Word-window sizes for the chunker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Lower bound on chunk size; only the trailing chunk may be shorter.
    pub min_words: usize,
    /// Upper bound on chunk size.
    pub max_words: usize,
    /// Words shared by consecutive chunks.
    pub overlap_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            min_words: 300,
            max_words: 500,
            overlap_words: 50,
        }
    }
}

impl ChunkingConfig {
    pub fn new(min_words: usize, max_words: usize, overlap_words: usize) -> Result<Self, IndexError> {
        let cfg = Self {
            min_words,
            max_words,
            overlap_words,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates window sizes.
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.max_words == 0 {
            return Err(IndexError::Config("max_words must be > 0".into()));
        }
        if self.overlap_words >= self.max_words {
            return Err(IndexError::Config(format!(
                "overlap_words ({}) must be < max_words ({})",
                self.overlap_words, self.max_words
            )));
        }
        if self.min_words > self.max_words {
            return Err(IndexError::Config(format!(
                "min_words ({}) must be <= max_words ({})",
                self.min_words, self.max_words
            )));
        }
        Ok(())
    }

    /// Words the window advances per step.
    pub fn step(&self) -> usize {
        self.max_words - self.overlap_words
    }
}

/// Local embedder settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding dimensionality.
    pub dim: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { dim: 384 }
    }
}

/// Configuration for ingestion and retrieval.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
}

impl IndexConfig {
    /// Build configuration from environment variables.
    ///
    /// Environment variables used:
    /// - `CHUNK_MIN_WORDS` (default: 300)
    /// - `CHUNK_MAX_WORDS` (default: 500)
    /// - `CHUNK_OVERLAP_WORDS` (default: 50)
    /// - `EMBEDDING_DIM` (default: 384)
    pub fn from_env() -> Result<Self, IndexError> {
        let d = Self::default();
        let chunking = ChunkingConfig::new(
            env_or("CHUNK_MIN_WORDS", d.chunking.min_words)?,
            env_or("CHUNK_MAX_WORDS", d.chunking.max_words)?,
            env_or("CHUNK_OVERLAP_WORDS", d.chunking.overlap_words)?,
        )?;
        let embedding = EmbeddingConfig {
            dim: env_or("EMBEDDING_DIM", d.embedding.dim)?,
        };
        if embedding.dim == 0 {
            return Err(IndexError::Config("EMBEDDING_DIM must be > 0".into()));
        }
        Ok(Self {
            chunking,
            embedding,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_windows() {
        assert!(ChunkingConfig::new(0, 0, 0).is_err());
        assert!(ChunkingConfig::new(1, 10, 10).is_err());
        assert!(ChunkingConfig::new(11, 10, 2).is_err());
        assert_eq!(ChunkingConfig::default().step(), 450);
    }
}
