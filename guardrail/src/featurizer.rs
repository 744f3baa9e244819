//! TF-IDF featurizer.
//!
//! Text is tokenized by `services::text`, stop words are optionally removed,
//! and unigrams plus bigrams are counted against a vocabulary learned at
//! training time. Weights are `count * idf` followed by L2 normalisation, so
//! every non-zero vector has unit length.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use services::artifact::{self, ArtifactHeader};
use services::text::{content_terms, ngrams, tokenize};
use tracing::{debug, info};

use crate::errors::guardrail_error::GuardrailError;
use crate::structs::guardrail_config::VectorizerConfig;

pub(crate) const VECTORIZER_KIND: &str = "tfidf-vectorizer";
pub(crate) const VECTORIZER_FORMAT: u32 = 1;

/// Sparse, fixed-dimension feature vector. Entries are sorted by index and
/// hold only non-zero weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    dim: usize,
    entries: Vec<(u32, f32)>,
}

impl FeatureVector {
    /// Build from `(index, weight)` pairs. Zero weights are dropped; indices
    /// must be unique and below `dim`.
    pub fn from_sparse(dim: usize, mut entries: Vec<(u32, f32)>) -> Self {
        entries.retain(|(i, w)| *w != 0.0 && (*i as usize) < dim);
        entries.sort_by_key(|(i, _)| *i);
        entries.dedup_by_key(|(i, _)| *i);
        Self { dim, entries }
    }

    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            entries: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Weight at `index` (0.0 when absent).
    pub fn get(&self, index: u32) -> f32 {
        self.entries
            .binary_search_by_key(&index, |(i, _)| *i)
            .map(|pos| self.entries[pos].1)
            .unwrap_or(0.0)
    }

    /// Non-zero `(index, weight)` pairs in ascending index order.
    pub fn entries(&self) -> &[(u32, f32)] {
        &self.entries
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn is_zero(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn norm(&self) -> f32 {
        self.entries.iter().map(|(_, w)| w * w).sum::<f32>().sqrt()
    }
}

/// Persisted body of a vectorizer artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorizerBody {
    terms: Vec<String>,
    idf: Vec<f32>,
    ngram_max: usize,
    stop_words: bool,
    n_documents: usize,
}

/// Learned vocabulary + IDF weights.
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    body: VectorizerBody,
    index: HashMap<String, u32>,
    fingerprint: String,
}

impl TfidfVectorizer {
    /// Learn vocabulary and IDF weights from `documents`.
    pub fn fit<S: AsRef<str>>(
        documents: &[S],
        cfg: &VectorizerConfig,
    ) -> Result<Self, GuardrailError> {
        if documents.is_empty() {
            return Err(GuardrailError::EmptyTrainingSet);
        }
        let n = documents.len();

        // Document frequency and total corpus frequency per term.
        let mut df: HashMap<String, usize> = HashMap::new();
        let mut tf: HashMap<String, usize> = HashMap::new();
        for doc in documents {
            let terms = analyze(doc.as_ref(), cfg.ngram_max, cfg.stop_words);
            let mut seen: HashSet<&str> = HashSet::with_capacity(terms.len());
            for term in &terms {
                *tf.entry(term.clone()).or_default() += 1;
                if seen.insert(term.as_str()) {
                    *df.entry(term.clone()).or_default() += 1;
                }
            }
        }
        let seen_terms = df.len();

        let max_doc_count = cfg.max_df * n as f64;
        let mut kept: Vec<(String, usize)> = df
            .into_iter()
            .filter(|(_, d)| *d >= cfg.min_df && (*d as f64) <= max_doc_count)
            .collect();

        if kept.is_empty() {
            return Err(GuardrailError::EmptyVocabulary {
                min_df: cfg.min_df,
                max_df: cfg.max_df,
            });
        }

        if kept.len() > cfg.max_features {
            kept.sort_by(|(ta, _), (tb, _)| tf[tb].cmp(&tf[ta]).then_with(|| ta.cmp(tb)));
            kept.truncate(cfg.max_features);
        }
        kept.sort_by(|(a, _), (b, _)| a.cmp(b));

        let idf: Vec<f32> = kept
            .iter()
            .map(|(_, d)| (((1 + n) as f64 / (1 + *d) as f64).ln() + 1.0) as f32)
            .collect();
        let terms: Vec<String> = kept.into_iter().map(|(t, _)| t).collect();

        let vectorizer = Self::from_body(VectorizerBody {
            terms,
            idf,
            ngram_max: cfg.ngram_max,
            stop_words: cfg.stop_words,
            n_documents: n,
        });

        info!(
            target: "guardrail::featurizer",
            documents = n,
            seen_terms,
            vocabulary = vectorizer.vocabulary_size(),
            fingerprint = %&vectorizer.fingerprint[..12],
            "vectorizer fitted"
        );
        Ok(vectorizer)
    }

    fn from_body(body: VectorizerBody) -> Self {
        let index = body
            .terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i as u32))
            .collect();
        let fingerprint = fingerprint_of(&body);
        Self {
            body,
            index,
            fingerprint,
        }
    }

    /// Map `text` to its TF-IDF vector.
    pub fn transform(&self, text: &str) -> Result<FeatureVector, GuardrailError> {
        if text.trim().is_empty() {
            return Err(GuardrailError::InvalidInput("text is empty".into()));
        }
        if text.contains('\0') {
            return Err(GuardrailError::InvalidInput(
                "text contains NUL characters".into(),
            ));
        }

        let mut counts: BTreeMap<u32, f32> = BTreeMap::new();
        for term in analyze(text, self.body.ngram_max, self.body.stop_words) {
            if let Some(&i) = self.index.get(&term) {
                *counts.entry(i).or_default() += 1.0;
            }
        }

        let mut entries: Vec<(u32, f32)> = counts
            .into_iter()
            .map(|(i, c)| (i, c * self.body.idf[i as usize]))
            .collect();
        let norm = entries.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, w) in entries.iter_mut() {
                *w /= norm;
            }
        }

        debug!(
            target: "guardrail::featurizer",
            nnz = entries.len(),
            "text featurized"
        );
        Ok(FeatureVector {
            dim: self.body.terms.len(),
            entries,
        })
    }

    pub fn vocabulary_size(&self) -> usize {
        self.body.terms.len()
    }

    /// Term at feature `index`.
    pub fn term(&self, index: usize) -> Option<&str> {
        self.body.terms.get(index).map(String::as_str)
    }

    /// Feature index of `term`, if it is in the vocabulary.
    pub fn index_of(&self, term: &str) -> Option<u32> {
        self.index.get(term).copied()
    }

    pub fn idf(&self, index: usize) -> Option<f32> {
        self.body.idf.get(index).copied()
    }

    /// blake3 hex digest over vocabulary and IDF bits.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Number of documents the vocabulary was learned from.
    pub fn n_documents(&self) -> usize {
        self.body.n_documents
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, GuardrailError> {
        let header = ArtifactHeader::new(VECTORIZER_KIND, VECTORIZER_FORMAT, &self.fingerprint);
        Ok(artifact::encode(&header, &self.body)?)
    }

    /// Decode an artifact blob; the stored fingerprint must match the content.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GuardrailError> {
        let (header, body): (ArtifactHeader, VectorizerBody) =
            artifact::decode(bytes, VECTORIZER_KIND, VECTORIZER_FORMAT)?;
        if body.idf.len() != body.terms.len() {
            return Err(GuardrailError::ModelVersionMismatch {
                expected: format!("{} idf weights", body.terms.len()),
                found: format!("{} idf weights", body.idf.len()),
            });
        }
        let vectorizer = Self::from_body(body);
        if vectorizer.fingerprint != header.fingerprint {
            return Err(GuardrailError::ModelVersionMismatch {
                expected: header.fingerprint,
                found: vectorizer.fingerprint,
            });
        }
        Ok(vectorizer)
    }
}

/// Tokens → optional stop-word removal → n-grams.
fn analyze(text: &str, ngram_max: usize, stop_words: bool) -> Vec<String> {
    let tokens = if stop_words {
        content_terms(text)
    } else {
        tokenize(text)
    };
    ngrams(&tokens, ngram_max)
}

fn fingerprint_of(body: &VectorizerBody) -> String {
    let mut h = blake3::Hasher::new();
    for term in &body.terms {
        h.update(term.as_bytes());
        h.update(b"\n");
    }
    for w in &body.idf {
        h.update(&w.to_bits().to_le_bytes());
    }
    h.update(&(body.ngram_max as u64).to_le_bytes());
    h.update(&[body.stop_words as u8]);
    h.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(min_df: usize, max_df: f64) -> VectorizerConfig {
        VectorizerConfig {
            min_df,
            max_df,
            ..VectorizerConfig::default()
        }
    }

    fn corpus() -> Vec<&'static str> {
        vec![
            "What is photosynthesis?",
            "Explain photosynthesis in plants",
            "How do plants absorb light energy?",
            "How do I become rich?",
        ]
    }

    #[test]
    fn vocabulary_is_sorted_and_pruned_by_df() {
        let v = TfidfVectorizer::fit(&corpus(), &cfg(2, 1.0)).unwrap();
        // Only terms in at least two documents survive.
        let terms: Vec<_> = (0..v.vocabulary_size())
            .map(|i| v.term(i).unwrap().to_string())
            .collect();
        assert_eq!(terms, vec!["photosynthesis", "plants"]);
    }

    #[test]
    fn max_df_drops_ubiquitous_terms() {
        let docs = ["plants grow", "plants eat", "plants sleep"];
        let v = TfidfVectorizer::fit(&docs, &cfg(1, 0.8)).unwrap();
        assert!(v.index_of("plants").is_none());
        assert!(v.index_of("grow").is_some());
    }

    #[test]
    fn max_features_keeps_most_frequent() {
        let docs = ["alpha beta", "alpha gamma", "alpha beta"];
        let c = VectorizerConfig {
            max_features: 2,
            min_df: 1,
            max_df: 1.0,
            ngram_max: 1,
            stop_words: true,
        };
        let v = TfidfVectorizer::fit(&docs, &c).unwrap();
        assert_eq!(v.vocabulary_size(), 2);
        assert!(v.index_of("alpha").is_some());
        assert!(v.index_of("beta").is_some());
        assert!(v.index_of("gamma").is_none());
    }

    #[test]
    fn transform_is_unit_length_and_deterministic() {
        let v = TfidfVectorizer::fit(&corpus(), &cfg(1, 1.0)).unwrap();
        let a = v.transform("photosynthesis in green plants").unwrap();
        let b = v.transform("photosynthesis in green plants").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.dim(), v.vocabulary_size());
        assert!((a.norm() - 1.0).abs() < 1e-5);
        // Bigram of adjacent content terms is part of the vocabulary.
        assert!(v.index_of("photosynthesis plants").is_some());
    }

    #[test]
    fn unknown_terms_give_zero_vector() {
        let v = TfidfVectorizer::fit(&corpus(), &cfg(1, 1.0)).unwrap();
        let fv = v.transform("quantum chromodynamics").unwrap();
        assert!(fv.is_zero());
        assert_eq!(fv.dim(), v.vocabulary_size());
    }

    #[test]
    fn empty_or_nul_text_is_invalid() {
        let v = TfidfVectorizer::fit(&corpus(), &cfg(1, 1.0)).unwrap();
        assert!(matches!(v.transform("   "), Err(GuardrailError::InvalidInput(_))));
        assert!(matches!(v.transform("a\0b"), Err(GuardrailError::InvalidInput(_))));
    }

    #[test]
    fn empty_vocabulary_is_an_error() {
        let docs = ["the and of", "is was were"];
        assert!(matches!(
            TfidfVectorizer::fit(&docs, &cfg(1, 1.0)),
            Err(GuardrailError::EmptyVocabulary { .. })
        ));
    }

    #[test]
    fn bytes_round_trip_keeps_fingerprint() {
        let v = TfidfVectorizer::fit(&corpus(), &cfg(1, 1.0)).unwrap();
        let back = TfidfVectorizer::from_bytes(&v.to_bytes().unwrap()).unwrap();
        assert_eq!(back.fingerprint(), v.fingerprint());
        assert_eq!(
            back.transform("photosynthesis").unwrap(),
            v.transform("photosynthesis").unwrap()
        );
    }

    #[test]
    fn sparse_constructor_sorts_and_drops_zeros() {
        let fv = FeatureVector::from_sparse(5, vec![(3, 0.5), (1, 0.0), (0, 0.25)]);
        assert_eq!(fv.entries(), &[(0, 0.25), (3, 0.5)]);
        assert_eq!(fv.get(3), 0.5);
        assert_eq!(fv.get(1), 0.0);
    }
}
