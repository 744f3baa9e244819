//! Extractive answer composition.
//!
//! Sentences are cut from the top-ranked chunks and scored by how many
//! distinct question terms they contain. The best few are rendered under a
//! heading, each followed by its page. Nothing outside the chunks is added.

use std::collections::HashSet;

use passage_index::TextChunk;
use services::text::content_terms;
use tracing::{debug, warn};
use unicode_segmentation::UnicodeSegmentation;

use crate::api_types::{AnswerResult, Question, SourceChunk};
use crate::cfg::EngineConfig;
use crate::error::SynthesisError;
use crate::grounding::{self, Fragment};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerSynthesizer {
    top_k: usize,
    max_sentences: usize,
}

/// Candidate sentence; `rank` indexes the context, `position` the sentence
/// within its chunk.
struct Candidate<'a> {
    rank: usize,
    position: usize,
    score: usize,
    start: usize,
    text: &'a str,
}

/// Composed answer awaiting the grounding check.
struct Draft {
    answer: String,
    fragments: Vec<Fragment>,
    /// Context positions that contributed, ascending.
    used: Vec<usize>,
}

impl AnswerSynthesizer {
    pub fn new(top_k: usize, max_sentences: usize) -> Self {
        Self {
            top_k: top_k.max(1),
            max_sentences: max_sentences.max(1),
        }
    }

    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self::new(cfg.top_k, cfg.max_sentences)
    }

    /// Compose a grounded answer from `chunks` (best first).
    ///
    /// Returns `no_content` when `chunks` is empty, when no sentence shares
    /// a term with the question, or when the composed answer fails the
    /// grounding check.
    ///
    /// # Errors
    /// `SynthesisError` when a chunk in the top-K window carries malformed
    /// metadata.
    pub fn synthesize(
        &self,
        question: &Question,
        chunks: &[TextChunk],
    ) -> Result<AnswerResult, SynthesisError> {
        if chunks.is_empty() {
            return Ok(AnswerResult::no_content());
        }
        let context = &chunks[..chunks.len().min(self.top_k)];
        context.iter().try_for_each(check_metadata)?;

        let Some(draft) = self.compose(question, context) else {
            debug!(
                target: "answer_engine::synthesize",
                chunks = context.len(),
                "no sentence overlaps the question"
            );
            return Ok(AnswerResult::no_content());
        };
        Ok(finish(draft, context))
    }

    fn compose(&self, question: &Question, context: &[TextChunk]) -> Option<Draft> {
        let terms: HashSet<String> = content_terms(question.text()).into_iter().collect();
        if terms.is_empty() {
            return None;
        }

        let mut candidates: Vec<Candidate<'_>> = Vec::new();
        for (rank, chunk) in context.iter().enumerate() {
            for (position, (start, text)) in sentences(&chunk.content).enumerate() {
                let words: HashSet<String> = content_terms(text).into_iter().collect();
                let score = terms.iter().filter(|t| words.contains(*t)).count();
                if score > 0 {
                    candidates.push(Candidate {
                        rank,
                        position,
                        score,
                        start,
                        text,
                    });
                }
            }
        }

        candidates.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(a.rank.cmp(&b.rank))
                .then(a.position.cmp(&b.position))
        });
        // Overlapping windows repeat sentences; keep the best-ranked copy.
        let mut seen: HashSet<&str> = HashSet::new();
        let mut picked: Vec<&Candidate<'_>> = candidates
            .iter()
            .filter(|c| seen.insert(c.text))
            .take(self.max_sentences)
            .collect();
        if picked.is_empty() {
            return None;
        }
        picked.sort_by_key(|c| (c.rank, c.position));

        let mut answer = grounding::heading(question.grade(), question.subject());
        let mut fragments = Vec::with_capacity(picked.len());
        let mut used: Vec<usize> = Vec::new();
        for c in picked {
            let chunk = &context[c.rank];
            answer.push_str(&grounding::cited_line(c.text, chunk.page_number));
            fragments.push(Fragment {
                chunk_id: chunk.chunk_id,
                start: c.start,
                end: c.start + c.text.len(),
                text: c.text.to_string(),
            });
            if used.last() != Some(&c.rank) {
                used.push(c.rank);
            }
        }

        Some(Draft {
            answer,
            fragments,
            used,
        })
    }
}

fn finish(draft: Draft, context: &[TextChunk]) -> AnswerResult {
    if let Err(failure) = grounding::verify(&draft.answer, &draft.fragments, context) {
        warn!(
            target: "answer_engine::synthesize",
            %failure,
            "answer failed grounding, downgrading to no_content"
        );
        return AnswerResult::no_content();
    }
    let sources = draft
        .used
        .iter()
        .filter_map(|&i| context.get(i))
        .map(SourceChunk::from)
        .collect();
    AnswerResult::success(draft.answer, sources, draft.fragments)
}

/// Trimmed, non-empty sentences with their byte offset in `content`.
fn sentences(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .split_sentence_bound_indices()
        .filter_map(|(offset, raw)| {
            let text = raw.trim();
            if text.is_empty() {
                return None;
            }
            let lead = raw.len() - raw.trim_start().len();
            Some((offset + lead, text))
        })
}

fn check_metadata(c: &TextChunk) -> Result<(), SynthesisError> {
    let chunk_id = c.chunk_id;
    if c.content.trim().is_empty() {
        return Err(SynthesisError::EmptyContent { chunk_id });
    }
    if c.grade.trim().is_empty() {
        return Err(SynthesisError::MissingMetadata {
            chunk_id,
            field: "grade",
        });
    }
    if c.subject.trim().is_empty() {
        return Err(SynthesisError::MissingMetadata {
            chunk_id,
            field: "subject",
        });
    }
    if c.page_number == 0 {
        return Err(SynthesisError::InvalidPage { chunk_id });
    }
    Ok(())
}
