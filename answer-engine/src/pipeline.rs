//! The ask pipeline: validate → gate → retrieve → synthesize.

use std::sync::Arc;

use guardrail::{Guardrail, GuardrailModel, ModelVersion};
use passage_index::{EmbeddingsProvider, IndexError, PassageIndex, TextChunk};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::api_types::{AnswerResult, AskOutcome, AskRequest, Question};
use crate::cfg::EngineConfig;
use crate::error::{EngineError, ValidationError};
use crate::synthesizer::AnswerSynthesizer;
use crate::validate::validate_request;

/// Owns one consistent set of serving artifacts. Immutable once built;
/// share it behind an `Arc` and swap the `Arc` to reload.
pub struct AskService {
    model: Arc<GuardrailModel>,
    guardrail: Guardrail,
    index: Arc<PassageIndex>,
    embedder: Arc<dyn EmbeddingsProvider>,
    synthesizer: AnswerSynthesizer,
    cfg: EngineConfig,
}

/// Chunks held for one (grade, subject) pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScopeCount {
    pub grade: String,
    pub subject: String,
    pub chunks: usize,
}

/// Snapshot of what a service is serving.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ServiceStatus {
    pub model: ModelVersion,
    pub vocabulary_size: usize,
    pub trees: usize,
    pub confidence_threshold: f32,
    pub embedder: String,
    pub index_dim: usize,
    pub index_chunks: usize,
    pub scopes: Vec<ScopeCount>,
}

impl AskService {
    /// Assemble a service from already loaded artifacts.
    ///
    /// # Errors
    /// `EngineError::Config` for an invalid config, `EngineError::Index` when
    /// `embedder` did not produce the index's embeddings.
    pub fn new(
        model: Arc<GuardrailModel>,
        index: Arc<PassageIndex>,
        embedder: Arc<dyn EmbeddingsProvider>,
        cfg: EngineConfig,
    ) -> Result<Self, EngineError> {
        cfg.validate()?;
        index.ensure_compatible(&*embedder)?;
        Ok(Self {
            guardrail: Guardrail::new(Arc::clone(&model), cfg.confidence_threshold),
            model,
            index,
            embedder,
            synthesizer: AnswerSynthesizer::from_config(&cfg),
            cfg,
        })
    }

    /// Answer one request.
    ///
    /// Only invalid input is an `Err`. Every other outcome, internal faults
    /// included, is an [`AskOutcome`] whose result carries the status.
    pub fn ask(&self, req: &AskRequest) -> Result<AskOutcome, ValidationError> {
        // 1) Validate
        let question = validate_request(req, &self.cfg)?;

        // 2) Gate; refused questions never reach retrieval
        let decision = match self.guardrail.check(question.text()) {
            Ok(d) => d,
            Err(e) => {
                error!(target: "answer_engine::ask", error = %e, "guardrail failed");
                return Ok(outcome(question, false, AnswerResult::error()));
            }
        };
        let confidence = decision.confidence();
        info!(
            target: "answer_engine::ask",
            grade = question.grade(),
            subject = question.subject(),
            in_scope = decision.prediction.in_scope,
            confidence,
            admitted = decision.admitted,
            "guardrail decision"
        );
        if !decision.admitted {
            return Ok(outcome(question, false, AnswerResult::out_of_syllabus(confidence)));
        }

        // 3) Retrieve
        let chunks = match self.retrieve(&question) {
            Ok(c) => c,
            Err(e) => {
                error!(target: "answer_engine::ask", error = %e, "retrieval failed");
                return Ok(outcome(question, true, AnswerResult::error().with_confidence(confidence)));
            }
        };

        // 4) Synthesize + ground
        let result = match self.synthesizer.synthesize(&question, &chunks) {
            Ok(r) => r.with_confidence(confidence),
            Err(e) => {
                error!(target: "answer_engine::ask", error = %e, "synthesis failed");
                AnswerResult::error().with_confidence(confidence)
            }
        };
        info!(
            target: "answer_engine::ask",
            status = result.status().as_str(),
            pages = ?result.page_references(),
            sources = result.source_chunks().len(),
            "answered"
        );
        Ok(outcome(question, true, result))
    }

    fn retrieve(&self, question: &Question) -> Result<Vec<TextChunk>, IndexError> {
        let embedding = self.embedder.embed(question.text())?;
        let mut hits = self.index.query_scoped(
            &embedding,
            self.cfg.top_k,
            question.grade(),
            question.subject(),
        )?;
        if let Some(max) = self.cfg.max_distance {
            hits.retain(|h| h.distance <= max);
        }
        debug!(
            target: "answer_engine::ask",
            hits = hits.len(),
            nearest = ?hits.first().map(|h| h.distance),
            "retrieved"
        );
        Ok(self.index.resolve(&hits))
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            model: self.model.version(),
            vocabulary_size: self.model.vectorizer().vocabulary_size(),
            trees: self.model.forest().n_trees(),
            confidence_threshold: self.guardrail.threshold(),
            embedder: self.index.embedder_id().to_string(),
            index_dim: self.index.dim(),
            index_chunks: self.index.len(),
            scopes: self
                .index
                .scopes()
                .into_iter()
                .map(|((grade, subject), chunks)| ScopeCount {
                    grade,
                    subject,
                    chunks,
                })
                .collect(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn index(&self) -> &PassageIndex {
        &self.index
    }
}

fn outcome(question: Question, is_in_syllabus: bool, result: AnswerResult) -> AskOutcome {
    AskOutcome {
        question,
        is_in_syllabus,
        result,
    }
}
