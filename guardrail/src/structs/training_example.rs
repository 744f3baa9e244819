use serde::{Deserialize, Serialize};

/// One labelled question used to train the guardrail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub question: String,
    /// `true` = in scope (label 1), `false` = out of scope (label 0).
    pub in_scope: bool,
    /// Informational; not used as a feature.
    #[serde(default)]
    pub grade: Option<String>,
    /// Informational; not used as a feature.
    #[serde(default)]
    pub subject: Option<String>,
}

impl TrainingExample {
    pub fn new(question: impl Into<String>, in_scope: bool) -> Self {
        Self {
            question: question.into(),
            in_scope,
            grade: None,
            subject: None,
        }
    }
}

/// Per-class counts of a training set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassDistribution {
    pub in_scope: usize,
    pub out_of_scope: usize,
}

impl ClassDistribution {
    pub fn of(examples: &[TrainingExample]) -> Self {
        let in_scope = examples.iter().filter(|e| e.in_scope).count();
        Self {
            in_scope,
            out_of_scope: examples.len() - in_scope,
        }
    }

    pub fn total(&self) -> usize {
        self.in_scope + self.out_of_scope
    }
}
