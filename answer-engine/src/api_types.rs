//! Public API types re-used by external crates (e.g., the HTTP API layer).

use passage_index::TextChunk;
use serde::{Deserialize, Serialize};

use crate::grounding::Fragment;

pub const MSG_OUT_OF_SYLLABUS: &str = "This question is not covered in your selected textbook.";
pub const MSG_NO_CONTENT: &str = "No relevant content found in the textbook for this question.";
pub const MSG_PROCESSING_ERROR: &str =
    "An error occurred while processing your question. Please try again.";

/// Raw ask request as received from a transport.
///
/// # Example
/// ```
/// use answer_engine::AskRequest;
/// let req = AskRequest::new("Grade 10", "Science", "What is photosynthesis?");
/// assert_eq!(req.subject, "Science");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskRequest {
    pub grade: String,
    pub subject: String,
    pub question: String,
}

impl AskRequest {
    pub fn new(
        grade: impl Into<String>,
        subject: impl Into<String>,
        question: impl Into<String>,
    ) -> Self {
        Self {
            grade: grade.into(),
            subject: subject.into(),
            question: question.into(),
        }
    }
}

/// A request that passed validation. Only `validate_request` builds one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Question {
    text: String,
    grade: String,
    subject: String,
}

impl Question {
    pub(crate) fn new(text: String, grade: String, subject: String) -> Self {
        Self {
            text,
            grade,
            subject,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn grade(&self) -> &str {
        &self.grade
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    Success,
    OutOfSyllabus,
    NoContent,
    Error,
}

impl AnswerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::OutOfSyllabus => "out_of_syllabus",
            Self::NoContent => "no_content",
            Self::Error => "error",
        }
    }
}

/// A chunk that contributed to an answer, as returned to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceChunk {
    pub chunk_id: u64,
    pub content: String,
    pub page_number: u32,
    pub grade: String,
    pub subject: String,
}

impl From<&TextChunk> for SourceChunk {
    fn from(c: &TextChunk) -> Self {
        Self {
            chunk_id: c.chunk_id,
            content: c.content.clone(),
            page_number: c.page_number,
            grade: c.grade.clone(),
            subject: c.subject.clone(),
        }
    }
}

/// Outcome of synthesis.
///
/// Fields are private; constructors keep `source_chunks` non-empty exactly
/// when the status is `success`, and `page_references` sorted and unique.
#[derive(Clone, Debug, PartialEq)]
pub struct AnswerResult {
    answer: String,
    confidence: f32,
    page_references: Vec<u32>,
    status: AnswerStatus,
    source_chunks: Vec<SourceChunk>,
    fragments: Vec<Fragment>,
}

impl AnswerResult {
    /// Successful answer. Falls back to `no_content` when nothing was used.
    pub(crate) fn success(
        answer: String,
        source_chunks: Vec<SourceChunk>,
        fragments: Vec<Fragment>,
    ) -> Self {
        if source_chunks.is_empty() {
            return Self::no_content();
        }
        let mut page_references: Vec<u32> = source_chunks.iter().map(|c| c.page_number).collect();
        page_references.sort_unstable();
        page_references.dedup();
        Self {
            answer,
            confidence: 0.0,
            page_references,
            status: AnswerStatus::Success,
            source_chunks,
            fragments,
        }
    }

    fn refusal(status: AnswerStatus, message: &str) -> Self {
        Self {
            answer: message.to_string(),
            confidence: 0.0,
            page_references: Vec::new(),
            status,
            source_chunks: Vec::new(),
            fragments: Vec::new(),
        }
    }

    pub fn out_of_syllabus(confidence: f32) -> Self {
        Self::refusal(AnswerStatus::OutOfSyllabus, MSG_OUT_OF_SYLLABUS).with_confidence(confidence)
    }

    pub fn no_content() -> Self {
        Self::refusal(AnswerStatus::NoContent, MSG_NO_CONTENT)
    }

    pub fn error() -> Self {
        Self::refusal(AnswerStatus::Error, MSG_PROCESSING_ERROR)
    }

    /// Attach the gate confidence, clamped to [0, 1].
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        self
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn page_references(&self) -> &[u32] {
        &self.page_references
    }

    pub fn status(&self) -> AnswerStatus {
        self.status
    }

    pub fn source_chunks(&self) -> &[SourceChunk] {
        &self.source_chunks
    }

    /// Verbatim sentences the answer was assembled from.
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }
}

/// Full result of one ask: the validated question, the gate verdict, and
/// the answer.
#[derive(Clone, Debug, PartialEq)]
pub struct AskOutcome {
    pub question: Question,
    pub is_in_syllabus: bool,
    pub result: AnswerResult,
}

impl AskOutcome {
    pub fn to_response(&self) -> AskResponse {
        AskResponse {
            question: self.question.text.clone(),
            grade: self.question.grade.clone(),
            subject: self.question.subject.clone(),
            is_in_syllabus: self.is_in_syllabus,
            confidence: self.result.confidence,
            answer: self.result.answer.clone(),
            source_chunks: self.result.source_chunks.clone(),
            page_references: self.result.page_references.clone(),
            status: self.result.status,
        }
    }
}

/// Wire shape of an ask response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub question: String,
    pub grade: String,
    pub subject: String,
    pub is_in_syllabus: bool,
    pub confidence: f32,
    pub answer: String,
    pub source_chunks: Vec<SourceChunk>,
    pub page_references: Vec<u32>,
    pub status: AnswerStatus,
}
