//! Public API:
//! - `train`: fit the TF-IDF vectorizer and the random forest on labelled questions.
//! - `train_and_save`: `train` + persist both artifacts under the writer lock.
//! - `Guardrail::check`: gate a question (label + confidence vs threshold).

pub mod classifier;
pub mod errors;
pub mod featurizer;
pub mod forest;
pub mod structs;
mod training_csv;

use std::time::Instant;

use services::storage::ArtifactStorage;
use tracing::{info, warn};

pub use classifier::{
    CURRENT_KEY, GUARDRAIL_SCOPE, Guardrail, GuardrailModel, ModelVersion, ensemble_key,
    vectorizer_key,
};
pub use errors::guardrail_error::GuardrailError;
pub use featurizer::{FeatureVector, TfidfVectorizer};
pub use forest::RandomForest;
pub use structs::guardrail_config::{ForestConfig, GuardrailConfig, MaxFeatures, VectorizerConfig};
pub use structs::prediction::{GateDecision, Prediction};
pub use structs::training_example::{ClassDistribution, TrainingExample};
pub use training_csv::{read_training_csv, read_training_csv_from};

/// Below this many examples training proceeds with a warning.
const SMALL_TRAINING_SET: usize = 10;

/// Terms logged after training.
const LOGGED_TOP_FEATURES: usize = 20;

/// Summary of a training run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub distribution: ClassDistribution,
    pub vocabulary_size: usize,
    pub trees: usize,
    pub version: ModelVersion,
    pub top_features: Vec<(String, f32)>,
    pub duration_ms: u128,
}

/// Fit a vectorizer and a forest on `examples`.
pub fn train(
    examples: &[TrainingExample],
    cfg: &GuardrailConfig,
) -> Result<GuardrailModel, GuardrailError> {
    cfg.validate()?;
    if examples.is_empty() {
        return Err(GuardrailError::EmptyTrainingSet);
    }

    let dist = ClassDistribution::of(examples);
    info!(
        target: "guardrail::train",
        examples = dist.total(),
        in_scope = dist.in_scope,
        out_of_scope = dist.out_of_scope,
        "train: start"
    );
    if dist.total() < SMALL_TRAINING_SET {
        warn!(
            target: "guardrail::train",
            examples = dist.total(),
            "very small training set; the model will not generalise"
        );
    }
    if dist.in_scope == 0 || dist.out_of_scope == 0 {
        warn!(target: "guardrail::train", "training set has a single class");
    }

    let questions: Vec<&str> = examples.iter().map(|e| e.question.as_str()).collect();
    let vectorizer = TfidfVectorizer::fit(&questions, &cfg.vectorizer)?;

    let rows = questions
        .iter()
        .map(|q| vectorizer.transform(q))
        .collect::<Result<Vec<_>, _>>()?;
    let labels: Vec<bool> = examples.iter().map(|e| e.in_scope).collect();

    let forest = RandomForest::fit(&rows, &labels, &cfg.forest)?;
    GuardrailModel::new(vectorizer, forest)
}

/// Train, log the most important terms, and write both artifacts while
/// holding the guardrail writer lock.
pub fn train_and_save(
    examples: &[TrainingExample],
    cfg: &GuardrailConfig,
    storage: &dyn ArtifactStorage,
) -> Result<TrainingReport, GuardrailError> {
    let _lock = storage.lock(GUARDRAIL_SCOPE)?;
    let started = Instant::now();

    let model = train(examples, cfg)?;
    let top_features = model.feature_importances(LOGGED_TOP_FEATURES);
    for (rank, (term, importance)) in top_features.iter().enumerate() {
        info!(
            target: "guardrail::train",
            rank = rank + 1,
            term = %term,
            importance = *importance,
            "top feature"
        );
    }

    model.save(storage)?;

    let report = TrainingReport {
        distribution: ClassDistribution::of(examples),
        vocabulary_size: model.vectorizer().vocabulary_size(),
        trees: model.forest().n_trees(),
        version: model.version(),
        top_features,
        duration_ms: started.elapsed().as_millis(),
    };
    info!(
        target: "guardrail::train",
        vocabulary = report.vocabulary_size,
        trees = report.trees,
        duration_ms = report.duration_ms,
        "train: finished"
    );
    Ok(report)
}
