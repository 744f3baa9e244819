use std::sync::Arc;

use answer_engine::{AskService, EngineConfig};
use chrono::{DateTime, Utc};
use services::storage::ArtifactStorage;
use tokio::sync::RwLock;
use tracing::info;

use crate::error_handler::AppError;

/// Shared state for all HTTP handlers.
pub struct AppState {
    /// Current serving artifacts. Handlers clone the `Arc` and drop the guard.
    service: RwLock<Arc<AskService>>,
    /// Where `reload` reads fresh artifacts from.
    storage: Arc<dyn ArtifactStorage>,
    cfg: EngineConfig,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(service: AskService, storage: Arc<dyn ArtifactStorage>, cfg: EngineConfig) -> Self {
        Self {
            service: RwLock::new(Arc::new(service)),
            storage,
            cfg,
            started_at: Utc::now(),
        }
    }

    /// Snapshot of the serving artifacts; unaffected by a concurrent reload.
    pub async fn current(&self) -> Arc<AskService> {
        Arc::clone(&*self.service.read().await)
    }

    /// Load a fresh artifact set off the runtime and swap it in.
    pub async fn reload(&self) -> Result<Arc<AskService>, AppError> {
        let storage = Arc::clone(&self.storage);
        let cfg = self.cfg.clone();
        let fresh = tokio::task::spawn_blocking(move || AskService::load(&*storage, cfg))
            .await
            .map_err(|e| AppError::Join(e.to_string()))?
            .map_err(AppError::Reload)?;

        let fresh = Arc::new(fresh);
        *self.service.write().await = Arc::clone(&fresh);
        info!(
            target: "api::reload",
            chunks = fresh.index().len(),
            "serving artifacts swapped"
        );
        Ok(fresh)
    }
}
