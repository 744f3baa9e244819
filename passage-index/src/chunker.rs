//! Overlapping word-window chunking.
//!
//! Windows run over the document's whole word stream (pages concatenated in
//! reading order), so a chunk may start on one page and end on the next.
//! Iteration stops after the window that reaches the last word.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::ChunkingConfig;
use crate::errors::IndexError;
use crate::record::{Document, TextChunk};

/// Lazily produced chunk sequence. Cloning restarts from the clone point.
#[derive(Clone, Debug)]
pub struct Chunks<'a> {
    doc: &'a Document,
    words: Arc<[(&'a str, u32)]>,
    cfg: ChunkingConfig,
    next_start: Option<usize>,
    ordinal: usize,
    first_id: u64,
}

/// Split `doc` into overlapping chunks.
pub fn chunk<'a>(doc: &'a Document, cfg: &ChunkingConfig) -> Result<Chunks<'a>, IndexError> {
    cfg.validate()?;
    validate_document(doc)?;

    let words: Arc<[(&str, u32)]> = doc
        .pages
        .iter()
        .flat_map(|p| p.text.split_whitespace().map(move |w| (w, p.page_number)))
        .collect();

    if !words.is_empty() && words.len() < cfg.min_words {
        warn!(
            target: "passage_index::chunk",
            source = %doc.source,
            words = words.len(),
            min_words = cfg.min_words,
            "document below minimum chunk size; emitting a single chunk"
        );
    }
    debug!(
        target: "passage_index::chunk",
        source = %doc.source,
        pages = doc.pages.len(),
        words = words.len(),
        "chunking document"
    );

    Ok(Chunks {
        doc,
        next_start: if words.is_empty() { None } else { Some(0) },
        words,
        cfg: *cfg,
        ordinal: 0,
        first_id: 0,
    })
}

impl Chunks<'_> {
    /// Number chunk ids from `first_id` instead of 0.
    pub fn starting_at(mut self, first_id: u64) -> Self {
        self.first_id = first_id;
        self
    }
}

impl Iterator for Chunks<'_> {
    type Item = TextChunk;

    fn next(&mut self) -> Option<TextChunk> {
        let start = self.next_start?;
        let len = self.words.len();
        let end = (start + self.cfg.max_words).min(len);

        let window = &self.words[start..end];
        let content = window
            .iter()
            .map(|(w, _)| *w)
            .collect::<Vec<_>>()
            .join(" ");

        let chunk = TextChunk {
            chunk_id: self.first_id + self.ordinal as u64,
            content,
            word_count: end - start,
            page_number: window[0].1,
            end_page_number: window[window.len() - 1].1,
            grade: self.doc.grade.clone(),
            subject: self.doc.subject.clone(),
            ordinal: self.ordinal,
            start_word: start,
            end_word: end,
        };

        self.ordinal += 1;
        self.next_start = if end == len {
            None
        } else {
            Some(start + self.cfg.step())
        };
        Some(chunk)
    }
}

fn validate_document(doc: &Document) -> Result<(), IndexError> {
    if doc.grade.trim().is_empty() || doc.subject.trim().is_empty() {
        return Err(IndexError::InvalidDocument(format!(
            "'{}' is missing grade or subject",
            doc.source
        )));
    }
    if let Some(p) = doc.pages.iter().find(|p| p.page_number == 0) {
        return Err(IndexError::InvalidDocument(format!(
            "'{}' has page number {} (pages are 1-based)",
            doc.source, p.page_number
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_words(n: usize, per_page: usize) -> Document {
        let mut doc = Document::new("bio.pdf", "Grade 10", "Science");
        let words: Vec<String> = (0..n).map(|i| format!("w{i}")).collect();
        for (p, page) in words.chunks(per_page).enumerate() {
            doc = doc.with_page(p as u32 + 1, page.join(" "));
        }
        doc
    }

    fn cfg(min: usize, max: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig::new(min, max, overlap).unwrap()
    }

    #[test]
    fn removing_overlap_reconstructs_the_document() {
        let doc = doc_with_words(1234, 100);
        let chunks: Vec<_> = chunk(&doc, &cfg(300, 500, 50)).unwrap().collect();

        let mut rebuilt: Vec<String> = Vec::new();
        let mut covered = 0usize;
        for c in &chunks {
            let words: Vec<&str> = c.content.split(' ').collect();
            let skip = covered - c.start_word;
            rebuilt.extend(words[skip..].iter().map(|w| w.to_string()));
            covered = c.end_word;
        }
        let original: Vec<String> = (0..1234).map(|i| format!("w{i}")).collect();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn windows_respect_bounds_and_overlap() {
        let doc = doc_with_words(1234, 100);
        let chunks: Vec<_> = chunk(&doc, &cfg(300, 500, 50)).unwrap().collect();
        // starts: 0, 450, 900; the third reaches the end.
        assert_eq!(chunks.len(), 3);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.ordinal, i);
            assert_eq!(c.start_word, i * 450);
            if i + 1 < chunks.len() {
                assert_eq!(c.word_count, 500);
            }
        }
        assert_eq!(chunks[2].word_count, 334);
        assert_eq!(chunks[1].page_number, 5);
        assert_eq!(chunks[1].end_page_number, 10);
    }

    #[test]
    fn short_document_yields_exactly_one_chunk() {
        let doc = doc_with_words(42, 100);
        let chunks: Vec<_> = chunk(&doc, &cfg(300, 500, 50)).unwrap().collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].word_count, 42);
        assert_eq!(chunks[0].grade, "Grade 10");
    }

    #[test]
    fn empty_document_yields_nothing() {
        let doc = Document::new("empty.pdf", "Grade 6", "History").with_page(1, "   ");
        assert_eq!(chunk(&doc, &cfg(300, 500, 50)).unwrap().count(), 0);
    }

    #[test]
    fn sequence_is_restartable() {
        let doc = doc_with_words(1000, 250);
        let chunks = chunk(&doc, &cfg(10, 100, 20)).unwrap().starting_at(7);
        let a: Vec<_> = chunks.clone().collect();
        let b: Vec<_> = chunks.collect();
        assert_eq!(a, b);
        assert_eq!(a[0].chunk_id, 7);
    }

    #[test]
    fn page_zero_is_rejected() {
        let doc = Document::new("x.pdf", "Grade 7", "Civics").with_page(0, "text");
        assert!(matches!(
            chunk(&doc, &ChunkingConfig::default()),
            Err(IndexError::InvalidDocument(_))
        ));
    }
}
