//! Deterministic local embedder: signed feature hashing of content-word
//! unigrams and bigrams, L2-normalised.

use services::text::{content_terms, ngrams};

use super::EmbeddingsProvider;
use crate::errors::IndexError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Result<Self, IndexError> {
        if dim == 0 {
            return Err(IndexError::Config("embedding dim must be > 0".into()));
        }
        Ok(Self { dim })
    }

    fn bucket(&self, term: &str) -> (usize, f32) {
        let hash = blake3::hash(term.as_bytes());
        let bytes = hash.as_bytes();
        let mut head = [0u8; 8];
        head.copy_from_slice(&bytes[..8]);
        let bucket = (u64::from_le_bytes(head) % self.dim as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        (bucket, sign)
    }
}

impl EmbeddingsProvider for HashingEmbedder {
    fn model_id(&self) -> String {
        format!("hashing-blake3-v1/{}", self.dim)
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        let mut v = vec![0.0f32; self.dim];
        for term in ngrams(&content_terms(text), 2) {
            let (i, sign) = self.bucket(&term);
            v[i] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dist(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
    }

    #[test]
    fn embeddings_are_deterministic_and_unit_length() {
        let e = HashingEmbedder::new(384).unwrap();
        let a = e.embed("Photosynthesis converts light energy").unwrap();
        assert_eq!(a, e.embed("Photosynthesis converts light energy").unwrap());
        assert_eq!(a.len(), 384);
        let norm = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn shared_terms_are_closer() {
        let e = HashingEmbedder::new(384).unwrap();
        let q = e.embed("What is photosynthesis?").unwrap();
        let near = e.embed("Photosynthesis, photosynthesis and more photosynthesis").unwrap();
        let far = e.embed("The French Revolution began in 1789.").unwrap();
        assert!(dist(&q, &near) < dist(&q, &far));
    }

    #[test]
    fn stop_words_only_gives_zero_vector() {
        let e = HashingEmbedder::new(16).unwrap();
        assert!(e.embed("what is it").unwrap().iter().all(|x| *x == 0.0));
        assert!(HashingEmbedder::new(0).is_err());
    }
}
