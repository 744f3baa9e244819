//! Exact Euclidean k-NN over an immutable list of (embedding, chunk) pairs.
//!
//! The index is built append-only through [`PassageIndexBuilder`] and frozen
//! by [`PassageIndexBuilder::build`]. Queries scan every entry; results are
//! ordered by distance with ties kept in insertion order.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use services::artifact::{self, ArtifactHeader};
use services::storage::ArtifactStorage;
use tracing::{debug, info};

use crate::embed::EmbeddingsProvider;
use crate::errors::IndexError;
use crate::record::{SearchHit, TextChunk};

/// Storage key of the index artifact.
pub const INDEX_KEY: &str = "index/passages.bin";
/// Writer-lock scope for the index artifact.
pub const INDEX_SCOPE: &str = "index";

const INDEX_KIND: &str = "passage-index";
const INDEX_FORMAT: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct IndexEntry {
    embedding: Vec<f32>,
    chunk: TextChunk,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct IndexBody {
    embedder: String,
    dim: usize,
    entries: Vec<IndexEntry>,
}

/// Append-only collector used during ingestion.
#[derive(Debug)]
pub struct PassageIndexBuilder {
    body: IndexBody,
    ids: HashSet<u64>,
}

impl PassageIndexBuilder {
    pub fn new(embedder: impl Into<String>, dim: usize) -> Self {
        Self {
            body: IndexBody {
                embedder: embedder.into(),
                dim,
                entries: Vec::new(),
            },
            ids: HashSet::new(),
        }
    }

    /// Builder matching `provider`'s identity and dimension.
    pub fn for_provider(provider: &dyn EmbeddingsProvider) -> Self {
        Self::new(provider.model_id(), provider.dim())
    }

    /// Append one pair. Duplicate ids and wrong dimensions are rejected.
    pub fn push(&mut self, embedding: Vec<f32>, chunk: TextChunk) -> Result<(), IndexError> {
        if embedding.len() != self.body.dim {
            return Err(IndexError::VectorSizeMismatch {
                got: embedding.len(),
                want: self.body.dim,
            });
        }
        if !self.ids.insert(chunk.chunk_id) {
            return Err(IndexError::DuplicateChunkId(chunk.chunk_id));
        }
        self.body.entries.push(IndexEntry { embedding, chunk });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.body.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.entries.is_empty()
    }

    /// Freeze into an immutable index.
    pub fn build(self) -> PassageIndex {
        PassageIndex::from_body(self.body)
    }
}

/// Immutable passage index.
#[derive(Clone, Debug)]
pub struct PassageIndex {
    body: IndexBody,
    by_id: HashMap<u64, usize>,
}

impl PartialEq for PassageIndex {
    fn eq(&self, other: &Self) -> bool {
        self.body == other.body
    }
}

impl PassageIndex {
    /// Index with no entries.
    pub fn empty(embedder: impl Into<String>, dim: usize) -> Self {
        PassageIndexBuilder::new(embedder, dim).build()
    }

    fn from_body(body: IndexBody) -> Self {
        let by_id = body
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.chunk.chunk_id, i))
            .collect();
        Self { body, by_id }
    }

    /// `k` nearest entries to `embedding`, ascending by distance.
    pub fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        self.scan(embedding, k, |_| true)
    }

    /// Like [`query`](Self::query), restricted to chunks tagged `grade` and `subject`.
    pub fn query_scoped(
        &self,
        embedding: &[f32],
        k: usize,
        grade: &str,
        subject: &str,
    ) -> Result<Vec<SearchHit>, IndexError> {
        self.scan(embedding, k, |c| c.matches_scope(grade, subject))
    }

    fn scan(
        &self,
        embedding: &[f32],
        k: usize,
        keep: impl Fn(&TextChunk) -> bool,
    ) -> Result<Vec<SearchHit>, IndexError> {
        if embedding.len() != self.body.dim {
            return Err(IndexError::VectorSizeMismatch {
                got: embedding.len(),
                want: self.body.dim,
            });
        }
        let mut hits: Vec<SearchHit> = self
            .body
            .entries
            .iter()
            .filter(|e| keep(&e.chunk))
            .map(|e| SearchHit {
                chunk_id: e.chunk.chunk_id,
                distance: euclidean(&e.embedding, embedding),
            })
            .collect();

        // Stable: equal distances keep insertion order.
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);

        debug!(
            target: "passage_index::query",
            k,
            returned = hits.len(),
            best = ?hits.first().map(|h| h.distance),
            "index scanned"
        );
        Ok(hits)
    }

    pub fn chunk(&self, chunk_id: u64) -> Option<&TextChunk> {
        self.by_id
            .get(&chunk_id)
            .map(|&i| &self.body.entries[i].chunk)
    }

    /// Chunks for `hits`, in hit order.
    pub fn resolve(&self, hits: &[SearchHit]) -> Vec<TextChunk> {
        hits.iter()
            .filter_map(|h| self.chunk(h.chunk_id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.body.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.entries.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.body.dim
    }

    pub fn embedder_id(&self) -> &str {
        &self.body.embedder
    }

    /// Entry counts per (grade, subject), sorted.
    pub fn scopes(&self) -> BTreeMap<(String, String), usize> {
        let mut out = BTreeMap::new();
        for e in &self.body.entries {
            *out.entry((e.chunk.grade.clone(), e.chunk.subject.clone()))
                .or_insert(0) += 1;
        }
        out
    }

    /// Fails unless `provider` produced this index's embeddings.
    pub fn ensure_compatible(&self, provider: &dyn EmbeddingsProvider) -> Result<(), IndexError> {
        if provider.dim() != self.body.dim {
            return Err(IndexError::VectorSizeMismatch {
                got: provider.dim(),
                want: self.body.dim,
            });
        }
        if provider.model_id() != self.body.embedder {
            return Err(IndexError::EmbedderMismatch {
                index: self.body.embedder.clone(),
                query: provider.model_id(),
            });
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, IndexError> {
        let body_bytes = bincode::serialize(&self.body).map_err(artifact::CodecError::from)?;
        let header = ArtifactHeader::new(INDEX_KIND, INDEX_FORMAT, artifact::fingerprint(&body_bytes));
        Ok(artifact::encode(&header, &self.body)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IndexError> {
        let (header, body): (ArtifactHeader, IndexBody) =
            artifact::decode(bytes, INDEX_KIND, INDEX_FORMAT)?;

        let mut seen = HashSet::with_capacity(body.entries.len());
        for e in &body.entries {
            if e.embedding.len() != body.dim {
                return Err(IndexError::VectorSizeMismatch {
                    got: e.embedding.len(),
                    want: body.dim,
                });
            }
            if !seen.insert(e.chunk.chunk_id) {
                return Err(IndexError::DuplicateChunkId(e.chunk.chunk_id));
            }
        }
        debug!(
            target: "passage_index::load",
            fingerprint = header.short_fingerprint(),
            created_at = %header.created_at,
            "index artifact decoded"
        );
        Ok(Self::from_body(body))
    }

    /// Persist under [`INDEX_KEY`]. Caller holds the `index` writer lock.
    pub fn save(&self, storage: &dyn ArtifactStorage) -> Result<(), IndexError> {
        storage.save(INDEX_KEY, &self.to_bytes()?)?;
        info!(
            target: "passage_index::save",
            entries = self.len(),
            dim = self.dim(),
            "index saved"
        );
        Ok(())
    }

    /// Load from [`INDEX_KEY`]; a missing artifact is [`IndexError::NotBuilt`].
    pub fn load(storage: &dyn ArtifactStorage) -> Result<Self, IndexError> {
        if !storage.exists(INDEX_KEY)? {
            return Err(IndexError::NotBuilt);
        }
        let index = Self::from_bytes(&storage.load(INDEX_KEY)?)?;
        info!(
            target: "passage_index::load",
            entries = index.len(),
            dim = index.dim(),
            embedder = %index.embedder_id(),
            "index loaded"
        );
        Ok(index)
    }
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use services::storage::InMemoryArtifactStorage;

    fn chunk(id: u64, grade: &str, subject: &str) -> TextChunk {
        TextChunk {
            chunk_id: id,
            content: format!("chunk {id}"),
            word_count: 2,
            page_number: id as u32 + 1,
            end_page_number: id as u32 + 1,
            grade: grade.into(),
            subject: subject.into(),
            ordinal: id as usize,
            start_word: 0,
            end_word: 2,
        }
    }

    fn sample() -> PassageIndex {
        let mut b = PassageIndexBuilder::new("test", 2);
        b.push(vec![0.0, 0.0], chunk(0, "Grade 10", "Science")).unwrap();
        b.push(vec![3.0, 4.0], chunk(1, "Grade 10", "Science")).unwrap();
        b.push(vec![0.0, 1.0], chunk(2, "Grade 9", "History")).unwrap();
        b.push(vec![1.0, 0.0], chunk(3, "Grade 10", "Science")).unwrap();
        b.build()
    }

    #[test]
    fn results_ascend_with_insertion_order_ties() {
        let idx = sample();
        let hits = idx.query(&[0.0, 0.0], 10).unwrap();
        let ids: Vec<u64> = hits.iter().map(|h| h.chunk_id).collect();
        // Chunks 2 and 3 are both at distance 1; 2 was inserted first.
        assert_eq!(ids, vec![0, 2, 3, 1]);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert_eq!(hits[3].distance, 5.0);
    }

    #[test]
    fn k_limits_and_small_indexes_return_fewer() {
        let idx = sample();
        assert_eq!(idx.query(&[0.0, 0.0], 2).unwrap().len(), 2);
        assert!(PassageIndex::empty("test", 2).query(&[0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn scoped_query_filters_by_grade_and_subject() {
        let idx = sample();
        let hits = idx.query_scoped(&[0.0, 0.0], 10, "Grade 10", "Science").unwrap();
        let ids: Vec<u64> = hits.iter().map(|h| h.chunk_id).collect();
        assert_eq!(ids, vec![0, 3, 1]);
        assert!(idx.query_scoped(&[0.0, 0.0], 10, "Grade 6", "Science").unwrap().is_empty());
    }

    #[test]
    fn builder_rejects_duplicates_and_wrong_dimension() {
        let mut b = PassageIndexBuilder::new("test", 2);
        b.push(vec![0.0, 0.0], chunk(0, "Grade 6", "Tamil")).unwrap();
        assert!(matches!(
            b.push(vec![1.0, 1.0], chunk(0, "Grade 6", "Tamil")),
            Err(IndexError::DuplicateChunkId(0))
        ));
        assert!(matches!(
            b.push(vec![1.0], chunk(1, "Grade 6", "Tamil")),
            Err(IndexError::VectorSizeMismatch { got: 1, want: 2 })
        ));
        assert!(matches!(
            b.build().query(&[1.0, 2.0, 3.0], 1),
            Err(IndexError::VectorSizeMismatch { .. })
        ));
    }

    #[test]
    fn save_then_load_answers_queries_identically() {
        let idx = sample();
        let storage = InMemoryArtifactStorage::new();
        idx.save(&storage).unwrap();
        let back = PassageIndex::load(&storage).unwrap();

        assert_eq!(back, idx);
        for q in [[0.0, 0.0], [0.3, 0.7], [2.0, 2.0]] {
            assert_eq!(back.query(&q, 3).unwrap(), idx.query(&q, 3).unwrap());
        }
        assert_eq!(back.chunk(3), idx.chunk(3));
    }

    #[test]
    fn missing_artifact_is_not_built() {
        assert!(matches!(
            PassageIndex::load(&InMemoryArtifactStorage::new()),
            Err(IndexError::NotBuilt)
        ));
    }
}
