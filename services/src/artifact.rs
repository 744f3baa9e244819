//! Versioned binary envelope for persisted artifacts.
//!
//! Layout: a bincode-encoded [`ArtifactHeader`] immediately followed by the
//! bincode-encoded body. The header is decoded and checked first so that a
//! blob of the wrong kind or format version fails with a precise error
//! instead of a garbled body decode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Errors raised while encoding or decoding an artifact envelope.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Binary (de)serialization failed.
    #[error("artifact codec error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Blob holds a different artifact kind.
    #[error("artifact kind mismatch: expected '{expected}', found '{found}'")]
    KindMismatch { expected: String, found: String },

    /// Blob was written by an unsupported format version.
    #[error("unsupported {kind} format version {found} (supported: {supported})")]
    UnsupportedVersion {
        kind: String,
        found: u32,
        supported: u32,
    },
}

/// Metadata stored in front of every artifact body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    /// Artifact kind, e.g. `"tfidf-vectorizer"`.
    pub kind: String,
    /// Body layout version.
    pub format_version: u32,
    /// Content fingerprint (blake3 hex) identifying this exact artifact.
    pub fingerprint: String,
    /// When the artifact was produced.
    pub created_at: DateTime<Utc>,
}

impl ArtifactHeader {
    pub fn new(kind: &str, format_version: u32, fingerprint: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            format_version,
            fingerprint: fingerprint.into(),
            created_at: Utc::now(),
        }
    }

    /// First 12 hex chars of the fingerprint, for logs and status output.
    pub fn short_fingerprint(&self) -> &str {
        let end = self.fingerprint.len().min(12);
        &self.fingerprint[..end]
    }
}

/// Encode `header` + `body` into a single blob.
pub fn encode<T: Serialize>(header: &ArtifactHeader, body: &T) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    bincode::serialize_into(&mut out, header)?;
    bincode::serialize_into(&mut out, body)?;
    Ok(out)
}

/// Decode a blob, checking kind and format version before the body.
pub fn decode<T: DeserializeOwned>(
    bytes: &[u8],
    kind: &str,
    format_version: u32,
) -> Result<(ArtifactHeader, T), CodecError> {
    let mut cursor = bytes;
    let header: ArtifactHeader = bincode::deserialize_from(&mut cursor)?;
    if header.kind != kind {
        return Err(CodecError::KindMismatch {
            expected: kind.into(),
            found: header.kind,
        });
    }
    if header.format_version != format_version {
        return Err(CodecError::UnsupportedVersion {
            kind: header.kind,
            found: header.format_version,
            supported: format_version,
        });
    }
    let body: T = bincode::deserialize_from(&mut cursor)?;
    Ok((header, body))
}

/// blake3 hex digest of `bytes`.
pub fn fingerprint(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Body {
        values: Vec<f32>,
        name: String,
    }

    #[test]
    fn encode_decode_preserves_body_bits() {
        let body = Body {
            values: vec![0.1, f32::MIN_POSITIVE, -0.0, 1.0 / 3.0],
            name: "x".into(),
        };
        let header = ArtifactHeader::new("test-kind", 1, fingerprint(b"abc"));
        let bytes = encode(&header, &body).unwrap();

        let (h, b): (ArtifactHeader, Body) = decode(&bytes, "test-kind", 1).unwrap();
        assert_eq!(h, header);
        let bits = |v: &[f32]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&b.values), bits(&body.values));
    }

    #[test]
    fn wrong_kind_or_version_is_rejected() {
        let header = ArtifactHeader::new("a", 2, "f");
        let bytes = encode(&header, &1u32).unwrap();
        assert!(matches!(
            decode::<u32>(&bytes, "b", 2),
            Err(CodecError::KindMismatch { .. })
        ));
        assert!(matches!(
            decode::<u32>(&bytes, "a", 1),
            Err(CodecError::UnsupportedVersion { found: 2, .. })
        ));
    }

    #[test]
    fn fingerprint_is_stable_hex() {
        let a = fingerprint(b"vocabulary");
        assert_eq!(a, fingerprint(b"vocabulary"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, fingerprint(b"vocabularies"));
    }
}
