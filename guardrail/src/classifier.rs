//! Trained guardrail model (vectorizer + ensemble) and the scope gate that
//! wraps it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use services::artifact::{self, ArtifactHeader};
use services::storage::ArtifactStorage;
use tracing::{debug, info, warn};

use crate::errors::guardrail_error::GuardrailError;
use crate::featurizer::{FeatureVector, TfidfVectorizer};
use crate::forest::RandomForest;
use crate::structs::prediction::{GateDecision, Prediction};

/// Pointer blob naming the active artifact pair. Written after both blobs.
pub const CURRENT_KEY: &str = "guardrail/current";
/// Writer-lock scope for both guardrail artifacts.
pub const GUARDRAIL_SCOPE: &str = "guardrail";

/// Storage key of the vectorizer artifact of `version`.
pub fn vectorizer_key(version: &str) -> String {
    format!("{GUARDRAIL_SCOPE}/{version}/vectorizer.bin")
}

/// Storage key of the ensemble artifact of `version`.
pub fn ensemble_key(version: &str) -> String {
    format!("{GUARDRAIL_SCOPE}/{version}/ensemble.bin")
}

const ENSEMBLE_KIND: &str = "random-forest";
const ENSEMBLE_FORMAT: u32 = 1;

#[derive(Serialize, Deserialize)]
struct EnsembleBody {
    /// Fingerprint of the vectorizer this ensemble was trained against.
    vectorizer_fingerprint: String,
    forest: RandomForest,
}

/// Identifies the artifact pair a model was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelVersion {
    pub vectorizer_fingerprint: String,
    pub ensemble_fingerprint: String,
}

/// A vectorizer and the ensemble trained on its feature space.
#[derive(Debug, Clone)]
pub struct GuardrailModel {
    vectorizer: TfidfVectorizer,
    forest: RandomForest,
    ensemble_fingerprint: String,
}

impl GuardrailModel {
    /// Pair a vectorizer with a forest trained on its output.
    pub fn new(vectorizer: TfidfVectorizer, forest: RandomForest) -> Result<Self, GuardrailError> {
        if forest.n_features() != vectorizer.vocabulary_size() {
            return Err(GuardrailError::ModelVersionMismatch {
                expected: format!("{} features", vectorizer.vocabulary_size()),
                found: format!("{} features", forest.n_features()),
            });
        }
        let body = EnsembleBody {
            vectorizer_fingerprint: vectorizer.fingerprint().to_string(),
            forest,
        };
        let encoded = bincode::serialize(&body).map_err(artifact::CodecError::from)?;
        let ensemble_fingerprint = artifact::fingerprint(&encoded);
        Ok(Self {
            vectorizer,
            forest: body.forest,
            ensemble_fingerprint,
        })
    }

    pub fn featurize(&self, text: &str) -> Result<FeatureVector, GuardrailError> {
        self.vectorizer.transform(text)
    }

    pub fn predict(&self, x: &FeatureVector) -> Result<Prediction, GuardrailError> {
        self.forest.predict(x)
    }

    /// Featurize and predict in one step.
    pub fn classify(&self, text: &str) -> Result<Prediction, GuardrailError> {
        let x = self.featurize(text)?;
        let p = self.predict(&x)?;
        debug!(
            target: "guardrail::predict",
            in_scope = p.in_scope,
            confidence = p.confidence,
            nnz = x.nnz(),
            "classified"
        );
        Ok(p)
    }

    pub fn classify_batch<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<Prediction>, GuardrailError> {
        texts.iter().map(|t| self.classify(t.as_ref())).collect()
    }

    /// Top `top_n` vocabulary terms by mean impurity decrease, descending.
    pub fn feature_importances(&self, top_n: usize) -> Vec<(String, f32)> {
        let mut ranked: Vec<(usize, f32)> = self
            .forest
            .feature_importances()
            .into_iter()
            .enumerate()
            .filter(|(_, v)| *v > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
            .into_iter()
            .take(top_n)
            .filter_map(|(i, v)| self.vectorizer.term(i).map(|t| (t.to_string(), v)))
            .collect()
    }

    pub fn vectorizer(&self) -> &TfidfVectorizer {
        &self.vectorizer
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    pub fn version(&self) -> ModelVersion {
        ModelVersion {
            vectorizer_fingerprint: self.vectorizer.fingerprint().to_string(),
            ensemble_fingerprint: self.ensemble_fingerprint.clone(),
        }
    }

    /// Encode the ensemble artifact (bound to this model's vectorizer).
    pub fn ensemble_bytes(&self) -> Result<Vec<u8>, GuardrailError> {
        let body = EnsembleBody {
            vectorizer_fingerprint: self.vectorizer.fingerprint().to_string(),
            forest: self.forest.clone(),
        };
        let header = ArtifactHeader::new(ENSEMBLE_KIND, ENSEMBLE_FORMAT, &self.ensemble_fingerprint);
        Ok(artifact::encode(&header, &body)?)
    }

    /// Rebuild a model from a vectorizer blob and an ensemble blob.
    pub fn from_bytes(vectorizer: &[u8], ensemble: &[u8]) -> Result<Self, GuardrailError> {
        let vectorizer = TfidfVectorizer::from_bytes(vectorizer)?;
        let (header, body): (ArtifactHeader, EnsembleBody) =
            artifact::decode(ensemble, ENSEMBLE_KIND, ENSEMBLE_FORMAT)?;

        if body.vectorizer_fingerprint != vectorizer.fingerprint() {
            warn!(
                target: "guardrail::load",
                vectorizer = vectorizer.fingerprint(),
                expected = %body.vectorizer_fingerprint,
                "ensemble was trained against a different vectorizer"
            );
            return Err(GuardrailError::ModelVersionMismatch {
                expected: body.vectorizer_fingerprint,
                found: vectorizer.fingerprint().to_string(),
            });
        }
        body.forest.validate()?;

        let model = Self::new(vectorizer, body.forest)?;
        if model.ensemble_fingerprint != header.fingerprint {
            return Err(GuardrailError::ModelVersionMismatch {
                expected: header.fingerprint,
                found: model.ensemble_fingerprint,
            });
        }
        Ok(model)
    }

    /// Write both artifacts under this model's version, then point
    /// `guardrail/current` at it. The previously active pair stays intact
    /// until the pointer moves. Caller holds the `guardrail` writer lock.
    pub fn save(&self, storage: &dyn ArtifactStorage) -> Result<(), GuardrailError> {
        let version = self.ensemble_fingerprint.as_str();
        storage.save(&vectorizer_key(version), &self.vectorizer.to_bytes()?)?;
        storage.save(&ensemble_key(version), &self.ensemble_bytes()?)?;
        storage.save(CURRENT_KEY, version.as_bytes())?;
        info!(
            target: "guardrail::save",
            vectorizer = short(self.vectorizer.fingerprint()),
            ensemble = short(version),
            "guardrail artifacts saved"
        );
        Ok(())
    }

    /// Load the pair `guardrail/current` points at. No pointer surfaces as
    /// `ModelNotLoaded`.
    pub fn load(storage: &dyn ArtifactStorage) -> Result<Self, GuardrailError> {
        if !storage.exists(CURRENT_KEY)? {
            return Err(GuardrailError::ModelNotLoaded);
        }
        let pointer = storage.load(CURRENT_KEY)?;
        let version = std::str::from_utf8(&pointer)
            .map(str::trim)
            .map_err(|_| GuardrailError::ModelVersionMismatch {
                expected: "utf-8 version id".into(),
                found: format!("{} opaque bytes", pointer.len()),
            })?;

        let model = Self::from_bytes(
            &storage.load(&vectorizer_key(version))?,
            &storage.load(&ensemble_key(version))?,
        )?;
        if model.ensemble_fingerprint != version {
            return Err(GuardrailError::ModelVersionMismatch {
                expected: version.to_string(),
                found: model.ensemble_fingerprint,
            });
        }
        info!(
            target: "guardrail::load",
            vocabulary = model.vectorizer.vocabulary_size(),
            trees = model.forest.n_trees(),
            ensemble = short(&model.ensemble_fingerprint),
            "guardrail artifacts loaded"
        );
        Ok(model)
    }
}

fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}

/// Scope gate. Holds an optional model so that a process can start before
/// artifacts exist and report `ModelNotLoaded` instead of panicking.
#[derive(Debug, Clone)]
pub struct Guardrail {
    model: Option<Arc<GuardrailModel>>,
    threshold: f32,
}

impl Guardrail {
    pub fn unloaded(threshold: f32) -> Self {
        Self {
            model: None,
            threshold,
        }
    }

    pub fn new(model: Arc<GuardrailModel>, threshold: f32) -> Self {
        Self {
            model: Some(model),
            threshold,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn model(&self) -> Result<&Arc<GuardrailModel>, GuardrailError> {
        self.model.as_ref().ok_or(GuardrailError::ModelNotLoaded)
    }

    /// Classify `text` and apply the confidence threshold.
    pub fn check(&self, text: &str) -> Result<GateDecision, GuardrailError> {
        let prediction = self.model()?.classify(text)?;
        Ok(GateDecision::new(prediction, self.threshold))
    }

    pub fn check_batch<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<GateDecision>, GuardrailError> {
        Ok(self
            .model()?
            .classify_batch(texts)?
            .into_iter()
            .map(|p| GateDecision::new(p, self.threshold))
            .collect())
    }
}
