//! Shared building blocks used by every crate in the workspace.
//!
//! - [`storage`]: the `ArtifactStorage` capability (load/save by key) with
//!   filesystem and in-memory implementations.
//! - [`artifact`]: the versioned binary envelope every artifact is written in.
//! - [`env`]: typed environment-variable readers.
//! - [`text`]: tokenization and the English stop-word list shared by the
//!   featurizer, the embedder, and the answer synthesizer.

pub mod artifact;
pub mod env;
pub mod storage;
pub mod text;

pub use storage::{
    ArtifactStorage, FsArtifactStorage, InMemoryArtifactStorage, StorageError, StorageLock,
};
