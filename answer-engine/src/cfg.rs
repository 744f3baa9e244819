//! Runtime configuration loaded from environment variables.

use services::env::{env_list, env_or, parse_env};

use crate::error::EngineError;

pub const DEFAULT_GRADES: &[&str] = &[
    "Grade 6", "Grade 7", "Grade 8", "Grade 9", "Grade 10", "Grade 11", "Grade 12", "Grade 13",
];

pub const DEFAULT_SUBJECTS: &[&str] = &[
    "Mathematics",
    "Science",
    "English",
    "Sinhala",
    "Tamil",
    "History",
    "Civics",
    "Geography",
];

/// Config bag for the ask pipeline. All fields have defaults via `Default`.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Gate passes only when in-scope confidence is strictly above this.
    pub confidence_threshold: f32,

    // Retrieval knobs
    pub top_k: usize,
    /// Hits farther than this (Euclidean) are dropped before synthesis.
    pub max_distance: Option<f32>,

    // Synthesis
    pub max_sentences: usize,

    // Request validation
    pub question_min_chars: usize,
    pub question_max_chars: usize,
    pub supported_grades: Vec<String>,
    pub supported_subjects: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            top_k: 5,
            max_distance: None,
            max_sentences: 3,
            question_min_chars: 10,
            question_max_chars: 2000,
            supported_grades: DEFAULT_GRADES.iter().map(|s| s.to_string()).collect(),
            supported_subjects: DEFAULT_SUBJECTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl EngineConfig {
    /// Build from environment variables.
    ///
    /// Environment variables used:
    /// - `SYLLABUS_CONFIDENCE_THRESHOLD` (default: 0.6)
    /// - `RETRIEVAL_TOP_K` (default: 5)
    /// - `RETRIEVAL_MAX_DISTANCE` (optional)
    /// - `ANSWER_MAX_SENTENCES` (default: 3)
    /// - `QUESTION_MIN_CHARS` / `QUESTION_MAX_CHARS` (default: 10 / 2000)
    /// - `SUPPORTED_GRADES`, `SUPPORTED_SUBJECTS` (comma-separated)
    ///
    /// # Example
    /// ```
    /// use answer_engine::EngineConfig;
    /// let cfg = EngineConfig::from_env().unwrap();
    /// assert!(cfg.top_k >= 1);
    /// ```
    pub fn from_env() -> Result<Self, EngineError> {
        let d = Self::default();
        let cfg = Self {
            confidence_threshold: env_or("SYLLABUS_CONFIDENCE_THRESHOLD", d.confidence_threshold)?,
            top_k: env_or("RETRIEVAL_TOP_K", d.top_k)?,
            max_distance: parse_env("RETRIEVAL_MAX_DISTANCE")?,
            max_sentences: env_or("ANSWER_MAX_SENTENCES", d.max_sentences)?,
            question_min_chars: env_or("QUESTION_MIN_CHARS", d.question_min_chars)?,
            question_max_chars: env_or("QUESTION_MAX_CHARS", d.question_max_chars)?,
            supported_grades: env_list("SUPPORTED_GRADES").unwrap_or(d.supported_grades),
            supported_subjects: env_list("SUPPORTED_SUBJECTS").unwrap_or(d.supported_subjects),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let bad = |msg: String| Err(EngineError::Config(msg));
        if !(0.0..1.0).contains(&self.confidence_threshold) {
            return bad(format!(
                "confidence threshold must be in [0, 1), got {}",
                self.confidence_threshold
            ));
        }
        if self.top_k == 0 || self.max_sentences == 0 {
            return bad("top_k and max_sentences must be > 0".into());
        }
        if self.max_distance.is_some_and(|d| !(d >= 0.0)) {
            return bad("max_distance must be a non-negative number".into());
        }
        if self.question_min_chars > self.question_max_chars {
            return bad(format!(
                "question length bounds are inverted: {} > {}",
                self.question_min_chars, self.question_max_chars
            ));
        }
        if self.supported_grades.is_empty() || self.supported_subjects.is_empty() {
            return bad("supported grades and subjects must not be empty".into());
        }
        Ok(())
    }
}
