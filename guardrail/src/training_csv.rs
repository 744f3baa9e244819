//! Training data reader: CSV with `question,label[,grade,subject]` columns.
//! Header names matter, column order does not.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::guardrail_error::GuardrailError;
use crate::structs::training_example::TrainingExample;

#[derive(Debug, Deserialize)]
struct CsvRow {
    question: String,
    label: String,
    #[serde(default)]
    grade: Option<String>,
    #[serde(default)]
    subject: Option<String>,
}

/// Read training examples from a CSV file.
pub fn read_training_csv(path: &Path) -> Result<Vec<TrainingExample>, GuardrailError> {
    let file = File::open(path)?;
    let examples = read_training_csv_from(file)?;
    info!(
        target: "guardrail::data",
        path = %path.display(),
        examples = examples.len(),
        "training data loaded"
    );
    Ok(examples)
}

/// Read training examples from any CSV source.
///
/// Rows with a blank question are skipped with a warning; a label other than
/// `0` or `1` fails the whole read.
pub fn read_training_csv_from<R: Read>(reader: R) -> Result<Vec<TrainingExample>, GuardrailError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    for column in ["question", "label"] {
        if !headers.iter().any(|h| h == column) {
            return Err(GuardrailError::MissingColumn { column });
        }
    }

    let mut out = Vec::new();
    let mut record = csv::StringRecord::new();
    while rdr.read_record(&mut record)? {
        let row: CsvRow = record.deserialize(Some(&headers))?;
        // Quoted fields may span lines; report where the record starts.
        let line = record.position().map_or(0, |p| p.line());

        if row.question.trim().is_empty() {
            warn!(target: "guardrail::data", line, "blank question skipped");
            continue;
        }
        let in_scope = match row.label.as_str() {
            "1" => true,
            "0" => false,
            other => {
                return Err(GuardrailError::InvalidLabel {
                    line,
                    value: other.to_string(),
                });
            }
        };
        out.push(TrainingExample {
            question: row.question,
            in_scope,
            grade: row.grade.filter(|g| !g.is_empty()),
            subject: row.subject.filter(|s| !s.is_empty()),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_columns_by_name() {
        let data = "\
label,subject,question,grade
1,Science,What is photosynthesis?,Grade 10
0,,How do I become rich?,
";
        let rows = read_training_csv_from(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].question, "What is photosynthesis?");
        assert!(rows[0].in_scope);
        assert_eq!(rows[0].grade.as_deref(), Some("Grade 10"));
        assert!(!rows[1].in_scope);
        assert_eq!(rows[1].subject, None);
    }

    #[test]
    fn optional_columns_may_be_absent() {
        let data = "question,label\n\"Define osmosis, with examples\",1\n";
        let rows = read_training_csv_from(data.as_bytes()).unwrap();
        assert_eq!(rows[0].question, "Define osmosis, with examples");
        assert_eq!(rows[0].grade, None);
    }

    #[test]
    fn bad_label_names_its_line() {
        let data = "question,label\nok question,1\nbad question,yes\n";
        match read_training_csv_from(data.as_bytes()) {
            Err(GuardrailError::InvalidLabel { line, value }) => {
                assert_eq!(line, 3);
                assert_eq!(value, "yes");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn bad_label_line_accounts_for_multiline_questions() {
        let data = "question,label\n\"Explain osmosis\nand diffusion\",1\nbad question,2\n";
        match read_training_csv_from(data.as_bytes()) {
            Err(GuardrailError::InvalidLabel { line, value }) => {
                assert_eq!(line, 4);
                assert_eq!(value, "2");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn missing_label_column_is_reported() {
        let data = "question,grade\nWhat is a cell?,Grade 6\n";
        assert!(matches!(
            read_training_csv_from(data.as_bytes()),
            Err(GuardrailError::MissingColumn { column: "label" })
        ));
    }

    #[test]
    fn blank_questions_are_skipped() {
        let data = "question,label\n   ,1\nWhat is a cell?,1\n";
        let rows = read_training_csv_from(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
    }
}
