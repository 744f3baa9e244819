//! Page JSONL reader.
//!
//! One JSON object per line:
//! `{"source": "...", "grade": "...", "subject": "...", "page_number": 1, "text": "..."}`.
//! Rows are grouped into documents by (source, grade, subject) in order of
//! first appearance; pages inside a document are sorted by page number.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use services::text::normalize_whitespace;
use tracing::{debug, info};

use crate::errors::IndexError;
use crate::record::{Document, Page};

/// Expected JSONL row shape.
#[derive(Deserialize)]
struct PageRow {
    source: String,
    grade: String,
    subject: String,
    page_number: u32,
    text: String,
}

/// Reads page JSONL strictly and groups rows into documents.
///
/// - Ignores empty lines.
/// - Fails on malformed rows with [`IndexError::Parse`] naming the line.
/// - Collapses whitespace in page text.
pub fn read_documents(jsonl_path: impl AsRef<Path>) -> Result<Vec<Document>, IndexError> {
    info!(
        target: "passage_index::io",
        path = %jsonl_path.as_ref().display(),
        "reading page JSONL"
    );
    let file = File::open(jsonl_path.as_ref())?;
    read_documents_from(file)
}

/// Same as [`read_documents`] over any reader.
pub fn read_documents_from<R: Read>(reader: R) -> Result<Vec<Document>, IndexError> {
    let reader = BufReader::new(reader);

    let mut docs: Vec<Document> = Vec::new();
    let mut slot: HashMap<(String, String, String), usize> = HashMap::new();
    let mut rows = 0usize;

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row: PageRow = serde_json::from_str(&line).map_err(|source| IndexError::Parse {
            line: i + 1,
            source,
        })?;
        if row.page_number == 0 {
            return Err(IndexError::InvalidDocument(format!(
                "line {}: page numbers are 1-based",
                i + 1
            )));
        }
        rows += 1;

        let key = (row.source.clone(), row.grade.clone(), row.subject.clone());
        let at = *slot.entry(key).or_insert_with(|| {
            docs.push(Document::new(row.source, row.grade, row.subject));
            docs.len() - 1
        });
        docs[at].pages.push(Page {
            page_number: row.page_number,
            text: normalize_whitespace(&row.text),
        });
    }

    for doc in &mut docs {
        doc.pages.sort_by_key(|p| p.page_number);
    }

    debug!(
        target: "passage_index::io",
        rows,
        documents = docs.len(),
        "page rows grouped"
    );
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_pages_by_document_in_first_seen_order() {
        let data = r#"{"source":"sci.pdf","grade":"Grade 10","subject":"Science","page_number":2,"text":"Leaves   are\ngreen."}

{"source":"hist.pdf","grade":"Grade 9","subject":"History","page_number":1,"text":"Kings."}
{"source":"sci.pdf","grade":"Grade 10","subject":"Science","page_number":1,"text":"Plants."}
"#;
        let docs = read_documents_from(data.as_bytes()).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source, "sci.pdf");
        assert_eq!(docs[0].pages[0].page_number, 1);
        assert_eq!(docs[0].pages[1].text, "Leaves are green.");
        assert_eq!(docs[1].subject, "History");
    }

    #[test]
    fn malformed_line_is_reported_with_its_number() {
        let data = "{\"source\":\"a\",\"grade\":\"Grade 6\",\"subject\":\"Tamil\",\"page_number\":1,\"text\":\"x\"}\n{not json}\n";
        match read_documents_from(data.as_bytes()) {
            Err(IndexError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
