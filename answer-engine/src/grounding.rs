//! Grounding check: every sentence in an answer must be a verbatim span of a
//! chunk that was handed to the synthesizer, and the answer text must consist
//! of nothing but those sentences under the heading.

use std::fmt;

use passage_index::TextChunk;
use serde::Serialize;

/// A sentence lifted from a chunk, with the byte span it was cut from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Fragment {
    pub chunk_id: u64,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Why a fragment could not be traced back to its evidence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GroundingFailure {
    Empty { chunk_id: u64 },
    UnknownChunk { chunk_id: u64 },
    SpanOutOfBounds { chunk_id: u64, start: usize, end: usize },
    TextMismatch { chunk_id: u64, start: usize, end: usize },
    /// Answer carries no cited sentence.
    NoSentences,
    /// First line is not the answer heading.
    MissingHeading,
    /// Line `line` (0-based, after the heading) is not the rendering of
    /// fragment `line`.
    UnsupportedLine { line: usize },
    /// Text remains after the last cited sentence.
    TrailingText,
}

impl fmt::Display for GroundingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { chunk_id } => write!(f, "empty fragment from chunk {chunk_id}"),
            Self::UnknownChunk { chunk_id } => write!(f, "chunk {chunk_id} was not supplied"),
            Self::SpanOutOfBounds {
                chunk_id,
                start,
                end,
            } => write!(f, "span {start}..{end} is outside chunk {chunk_id}"),
            Self::TextMismatch {
                chunk_id,
                start,
                end,
            } => write!(f, "span {start}..{end} of chunk {chunk_id} does not match"),
            Self::NoSentences => f.write_str("answer cites no sentence"),
            Self::MissingHeading => f.write_str("answer does not start with the heading"),
            Self::UnsupportedLine { line } => {
                write!(f, "answer line {line} is not backed by its fragment")
            }
            Self::TrailingText => f.write_str("answer has text after the last citation"),
        }
    }
}

const HEADING_PREFIX: &str = "Based on the ";
const HEADING_SUFFIX: &str = " textbook content:";

/// Answer heading naming the scope the sentences were drawn from.
pub(crate) fn heading(grade: &str, subject: &str) -> String {
    format!("{HEADING_PREFIX}{grade} {subject}{HEADING_SUFFIX}\n")
}

/// One cited sentence as it appears in the answer.
pub(crate) fn cited_line(text: &str, page: u32) -> String {
    format!("\n- {text} (page {page})")
}

/// Verify `answer` against `fragments` and the supplied chunks.
///
/// Every fragment must be the exact span it claims in a supplied chunk.
/// The answer must then be the heading followed by one cited line per
/// fragment, in order, each naming the page of the fragment's chunk.
pub fn verify(
    answer: &str,
    fragments: &[Fragment],
    chunks: &[TextChunk],
) -> Result<(), GroundingFailure> {
    if fragments.is_empty() {
        return Err(GroundingFailure::NoSentences);
    }
    let pages = fragments
        .iter()
        .map(|f| verify_one(f, chunks))
        .collect::<Result<Vec<u32>, _>>()?;

    let mut rest = answer
        .split_once('\n')
        .filter(|(head, _)| head.starts_with(HEADING_PREFIX) && head.ends_with(HEADING_SUFFIX))
        .map(|(_, body)| body)
        .ok_or(GroundingFailure::MissingHeading)?;

    for (line, (f, page)) in fragments.iter().zip(pages).enumerate() {
        rest = rest
            .strip_prefix(cited_line(&f.text, page).as_str())
            .ok_or(GroundingFailure::UnsupportedLine { line })?;
    }
    if !rest.is_empty() {
        return Err(GroundingFailure::TrailingText);
    }
    Ok(())
}

/// Check one fragment; returns the page of the chunk it came from.
fn verify_one(f: &Fragment, chunks: &[TextChunk]) -> Result<u32, GroundingFailure> {
    let chunk_id = f.chunk_id;
    if f.text.trim().is_empty() {
        return Err(GroundingFailure::Empty { chunk_id });
    }
    let chunk = chunks
        .iter()
        .find(|c| c.chunk_id == chunk_id)
        .ok_or(GroundingFailure::UnknownChunk { chunk_id })?;

    let span = chunk
        .content
        .get(f.start..f.end)
        .ok_or(GroundingFailure::SpanOutOfBounds {
            chunk_id,
            start: f.start,
            end: f.end,
        })?;
    if span != f.text {
        return Err(GroundingFailure::TextMismatch {
            chunk_id,
            start: f.start,
            end: f.end,
        });
    }
    Ok(chunk.page_number)
}
