//! Passage retrieval: chunk textbook pages, embed chunks locally, and answer
//! exact Euclidean k-NN queries.
//!
//! This crate provides a clean API to:
//! - Read page JSONL and chunk documents into overlapping word windows
//! - Build an immutable index and persist it through `ArtifactStorage`
//! - Retrieve the top-K chunks for a question, optionally scoped to a grade and subject

mod chunker;
mod config;
mod embed;
mod errors;
mod index;
mod ingest;
mod io_jsonl;
mod progress;
mod record;

pub use chunker::{Chunks, chunk};
pub use config::{ChunkingConfig, EmbeddingConfig, IndexConfig};
pub use embed::{EmbeddingsProvider, HashingEmbedder};
pub use errors::IndexError;
pub use index::{INDEX_KEY, INDEX_SCOPE, PassageIndex, PassageIndexBuilder};
pub use ingest::{IngestStats, build_index, ingest_file};
pub use io_jsonl::{read_documents, read_documents_from};
pub use progress::{IndicatifProgress, NoopProgress, Progress};
pub use record::{Document, Page, SearchHit, TextChunk};
