//! Request validation. Pure; runs before the guardrail sees anything.

use crate::api_types::{AskRequest, Question};
use crate::cfg::EngineConfig;
use crate::error::ValidationError;

/// Turn a raw request into a [`Question`], or explain why it is unusable.
///
/// The question is trimmed and its length counted in characters. Grade and
/// subject must match one of the configured values exactly (after trim).
pub fn validate_request(req: &AskRequest, cfg: &EngineConfig) -> Result<Question, ValidationError> {
    let text = req.question.trim();
    if text.is_empty() {
        return Err(ValidationError::EmptyQuestion);
    }
    if text.contains('\0') {
        return Err(ValidationError::ContainsNul);
    }
    let len = text.chars().count();
    if len < cfg.question_min_chars {
        return Err(ValidationError::QuestionTooShort {
            min: cfg.question_min_chars,
            len,
        });
    }
    if len > cfg.question_max_chars {
        return Err(ValidationError::QuestionTooLong {
            max: cfg.question_max_chars,
            len,
        });
    }

    let grade = req.grade.trim();
    if !cfg.supported_grades.iter().any(|g| g == grade) {
        return Err(ValidationError::UnsupportedGrade {
            grade: grade.to_string(),
            supported: cfg.supported_grades.join(", "),
        });
    }
    let subject = req.subject.trim();
    if !cfg.supported_subjects.iter().any(|s| s == subject) {
        return Err(ValidationError::UnsupportedSubject {
            subject: subject.to_string(),
            supported: cfg.supported_subjects.join(", "),
        });
    }

    Ok(Question::new(
        text.to_string(),
        grade.to_string(),
        subject.to_string(),
    ))
}
