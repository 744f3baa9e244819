//! Core data models used by the library.

use serde::{Deserialize, Serialize};

/// Extracted text of one textbook page. Page numbers are 1-based.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page_number: u32,
    pub text: String,
}

/// A source document (one textbook) with its curriculum tags.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub source: String,
    pub grade: String,
    pub subject: String,
    /// Pages in reading order.
    pub pages: Vec<Page>,
}

impl Document {
    pub fn new(source: impl Into<String>, grade: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            grade: grade.into(),
            subject: subject.into(),
            pages: Vec::new(),
        }
    }

    pub fn with_page(mut self, page_number: u32, text: impl Into<String>) -> Self {
        self.pages.push(Page {
            page_number,
            text: text.into(),
        });
        self
    }

    pub fn word_count(&self) -> usize {
        self.pages
            .iter()
            .map(|p| p.text.split_whitespace().count())
            .sum()
    }
}

/// A bounded, overlapping excerpt of a document; the unit of retrieval.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub chunk_id: u64,
    pub content: String,
    pub word_count: usize,
    /// Page holding the first word.
    pub page_number: u32,
    /// Page holding the last word.
    pub end_page_number: u32,
    pub grade: String,
    pub subject: String,
    /// Position within the document's chunk sequence.
    pub ordinal: usize,
    /// Half-open word range within the document.
    pub start_word: usize,
    pub end_word: usize,
}

impl TextChunk {
    pub fn matches_scope(&self, grade: &str, subject: &str) -> bool {
        self.grade == grade && self.subject == subject
    }
}

/// A single retrieval hit.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchHit {
    pub chunk_id: u64,
    /// Euclidean distance to the query.
    pub distance: f32,
}
