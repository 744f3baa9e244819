//! Build a serving [`AskService`] from persisted artifacts.

use std::sync::Arc;

use guardrail::GuardrailModel;
use passage_index::{HashingEmbedder, PassageIndex};
use services::storage::ArtifactStorage;
use tracing::info;

use crate::cfg::EngineConfig;
use crate::error::EngineError;
use crate::pipeline::AskService;

impl AskService {
    /// Load the classifier pair and the passage index from `storage`.
    ///
    /// Blocking; call it off the async runtime.
    ///
    /// # Errors
    /// - `GuardrailError::ModelNotLoaded` when classifier artifacts are missing
    /// - `GuardrailError::ModelVersionMismatch` when they do not belong together
    /// - `IndexError::NotBuilt` when no index has been ingested
    pub fn load(storage: &dyn ArtifactStorage, cfg: EngineConfig) -> Result<Self, EngineError> {
        let model = GuardrailModel::load(storage)?;
        let index = PassageIndex::load(storage)?;
        let embedder = HashingEmbedder::new(index.dim())?;

        let version = model.version();
        info!(
            target: "answer_engine::load",
            vectorizer = short(&version.vectorizer_fingerprint),
            ensemble = short(&version.ensemble_fingerprint),
            vocabulary = model.vectorizer().vocabulary_size(),
            trees = model.forest().n_trees(),
            chunks = index.len(),
            embedder = index.embedder_id(),
            "artifacts loaded"
        );
        Self::new(Arc::new(model), Arc::new(index), Arc::new(embedder), cfg)
    }
}

fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}
