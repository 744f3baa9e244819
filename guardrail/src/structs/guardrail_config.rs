//! Configuration layer: reads featurizer and forest settings from
//! environment variables and exposes strongly typed configs.

use serde::{Deserialize, Serialize};
use services::env::{env_or, env_string, parse_env};

use crate::errors::guardrail_error::GuardrailError;

/// TF-IDF vocabulary learning parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizerConfig {
    /// Upper bound on vocabulary size; most frequent terms are kept.
    pub max_features: usize,
    /// Minimum number of documents a term must appear in.
    pub min_df: usize,
    /// Maximum fraction of documents a term may appear in.
    pub max_df: f64,
    /// Longest n-gram (1 = unigrams only, 2 = unigrams + bigrams).
    pub ngram_max: usize,
    /// Drop English stop words before forming n-grams.
    pub stop_words: bool,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            max_features: 5000,
            min_df: 2,
            max_df: 0.8,
            ngram_max: 2,
            stop_words: true,
        }
    }
}

/// Number of feature dimensions examined per split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    All,
    Fixed(usize),
}

impl MaxFeatures {
    /// Parse `"sqrt" | "log2" | "all" | <n>` (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqrt" => Some(Self::Sqrt),
            "log2" => Some(Self::Log2),
            "all" | "none" => Some(Self::All),
            n => n.parse::<usize>().ok().filter(|n| *n > 0).map(Self::Fixed),
        }
    }

    /// Resolve against `n_features` dimensions; always at least 1.
    pub fn resolve(self, n_features: usize) -> usize {
        let n = match self {
            Self::Sqrt => (n_features as f64).sqrt() as usize,
            Self::Log2 => (n_features as f64).log2() as usize,
            Self::All => n_features,
            Self::Fixed(k) => k.min(n_features),
        };
        n.max(1)
    }
}

/// Random-forest training parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    /// `None` draws a fresh seed from the OS; runs are then not reproducible.
    pub seed: Option<u64>,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 20,
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: MaxFeatures::Sqrt,
            seed: Some(42),
        }
    }
}

/// Top-level training configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardrailConfig {
    pub vectorizer: VectorizerConfig,
    pub forest: ForestConfig,
}

impl GuardrailConfig {
    /// Build configuration from environment variables.
    ///
    /// Environment variables used:
    /// - `TFIDF_MAX_FEATURES` (default: 5000)
    /// - `TFIDF_MIN_DF` (default: 2)
    /// - `TFIDF_MAX_DF` (default: 0.8)
    /// - `TFIDF_NGRAM_MAX` (default: 2)
    /// - `TFIDF_STOP_WORDS` (default: true)
    /// - `RF_N_ESTIMATORS` (default: 100)
    /// - `RF_MAX_DEPTH` (default: 20)
    /// - `RF_MIN_SAMPLES_SPLIT` (default: 5)
    /// - `RF_MIN_SAMPLES_LEAF` (default: 2)
    /// - `RF_MAX_FEATURES` ("sqrt" | "log2" | "all" | n; default: "sqrt")
    /// - `RF_SEED` (default: 42; "random" disables seeding)
    pub fn from_env() -> Result<Self, GuardrailError> {
        let d = Self::default();

        let vectorizer = VectorizerConfig {
            max_features: env_or("TFIDF_MAX_FEATURES", d.vectorizer.max_features)?,
            min_df: env_or("TFIDF_MIN_DF", d.vectorizer.min_df)?,
            max_df: env_or("TFIDF_MAX_DF", d.vectorizer.max_df)?,
            ngram_max: env_or("TFIDF_NGRAM_MAX", d.vectorizer.ngram_max)?,
            stop_words: env_or("TFIDF_STOP_WORDS", d.vectorizer.stop_words)?,
        };

        let max_features = match env_string("RF_MAX_FEATURES") {
            Some(raw) => MaxFeatures::parse(&raw).ok_or_else(|| {
                GuardrailError::InvalidConfig(format!("RF_MAX_FEATURES = '{raw}'"))
            })?,
            None => d.forest.max_features,
        };

        let seed = match env_string("RF_SEED") {
            Some(raw) if raw.eq_ignore_ascii_case("random") => None,
            Some(_) => parse_env::<u64>("RF_SEED")?,
            None => d.forest.seed,
        };

        let forest = ForestConfig {
            n_trees: env_or("RF_N_ESTIMATORS", d.forest.n_trees)?,
            max_depth: env_or("RF_MAX_DEPTH", d.forest.max_depth)?,
            min_samples_split: env_or("RF_MIN_SAMPLES_SPLIT", d.forest.min_samples_split)?,
            min_samples_leaf: env_or("RF_MIN_SAMPLES_LEAF", d.forest.min_samples_leaf)?,
            max_features,
            seed,
        };

        let cfg = Self { vectorizer, forest };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject parameter combinations that cannot train or gate.
    pub fn validate(&self) -> Result<(), GuardrailError> {
        let v = &self.vectorizer;
        let f = &self.forest;
        let bad = |msg: String| Err(GuardrailError::InvalidConfig(msg));

        if v.max_features == 0 {
            return bad("max_features must be > 0".into());
        }
        if v.min_df == 0 {
            return bad("min_df must be >= 1".into());
        }
        if !(v.max_df > 0.0 && v.max_df <= 1.0) {
            return bad(format!("max_df must be in (0, 1], got {}", v.max_df));
        }
        if !(1..=3).contains(&v.ngram_max) {
            return bad(format!("ngram_max must be in 1..=3, got {}", v.ngram_max));
        }
        if f.n_trees == 0 || f.max_depth == 0 {
            return bad("n_trees and max_depth must be > 0".into());
        }
        if f.min_samples_split < 2 {
            return bad("min_samples_split must be >= 2".into());
        }
        if f.min_samples_leaf == 0 {
            return bad("min_samples_leaf must be >= 1".into());
        }
        Ok(())
    }
}
