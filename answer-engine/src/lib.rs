//! Safety-gated question answering over an ingested textbook index.
//!
//! Public API: [`AskService`]. It validates a request, gates the question
//! through the guardrail classifier, retrieves the nearest chunks for the
//! request's grade and subject, and composes an extractive answer that is
//! checked against the retrieved text before it is returned.
//!
//! # Example
//! ```no_run
//! # use answer_engine::{AskRequest, AskService, EngineConfig};
//! # use services::storage::FsArtifactStorage;
//! let storage = FsArtifactStorage::new("artifacts");
//! let svc = AskService::load(&storage, EngineConfig::from_env().unwrap()).unwrap();
//! let out = svc
//!     .ask(&AskRequest::new("Grade 10", "Science", "What is photosynthesis?"))
//!     .unwrap();
//! println!("{}: {}", out.result.status().as_str(), out.result.answer());
//! ```

mod api_types;
mod cfg;
mod error;
mod grounding;
mod loader;
mod pipeline;
mod synthesizer;
mod validate;

pub use api_types::{
    AnswerResult, AnswerStatus, AskOutcome, AskRequest, AskResponse, MSG_NO_CONTENT,
    MSG_OUT_OF_SYLLABUS, MSG_PROCESSING_ERROR, Question, SourceChunk,
};
pub use cfg::{DEFAULT_GRADES, DEFAULT_SUBJECTS, EngineConfig};
pub use error::{EngineError, SynthesisError, ValidationError};
pub use grounding::{Fragment, GroundingFailure, verify as verify_grounding};
pub use pipeline::{AskService, ScopeCount, ServiceStatus};
pub use synthesizer::AnswerSynthesizer;
pub use validate::validate_request;
