//! End-to-end ingestion: documents → chunks → embeddings → frozen index.

use std::path::Path;
use std::time::Instant;

use services::storage::ArtifactStorage;
use tracing::{debug, info, warn};

use crate::chunker::chunk;
use crate::config::ChunkingConfig;
use crate::embed::EmbeddingsProvider;
use crate::errors::IndexError;
use crate::index::{INDEX_SCOPE, PassageIndex, PassageIndexBuilder};
use crate::io_jsonl::read_documents;
use crate::progress::Progress;
use crate::record::{Document, TextChunk};

/// Ingestion counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub documents: usize,
    pub pages: usize,
    pub chunks: usize,
    /// Documents with no words.
    pub skipped: usize,
    pub duration_ms: u128,
}

/// Chunk every document, embed each chunk, and freeze the index.
///
/// Chunk ids are assigned sequentially across documents in input order.
pub fn build_index(
    docs: &[Document],
    chunking: &ChunkingConfig,
    provider: &dyn EmbeddingsProvider,
    progress: &dyn Progress,
) -> Result<(PassageIndex, IngestStats), IndexError> {
    let started = Instant::now();
    let mut stats = IngestStats {
        documents: docs.len(),
        pages: docs.iter().map(|d| d.pages.len()).sum(),
        ..IngestStats::default()
    };

    // Chunk first so the progress bar knows its length.
    let mut chunks: Vec<TextChunk> = Vec::new();
    for doc in docs {
        let before = chunks.len();
        chunks.extend(chunk(doc, chunking)?.starting_at(before as u64));
        let produced = chunks.len() - before;
        if produced == 0 {
            stats.skipped += 1;
            warn!(target: "passage_index::ingest", source = %doc.source, "document has no text");
        } else {
            debug!(
                target: "passage_index::ingest",
                source = %doc.source,
                grade = %doc.grade,
                subject = %doc.subject,
                chunks = produced,
                "document chunked"
            );
        }
    }

    progress.set_total(chunks.len() as u64);
    let mut builder = PassageIndexBuilder::for_provider(provider);
    for c in chunks {
        let embedding = provider.embed(&c.content)?;
        progress.step(&format!("{} p.{}", c.subject, c.page_number));
        builder.push(embedding, c)?;
    }
    stats.chunks = builder.len();
    progress.finish("embedded");

    let index = builder.build();
    stats.duration_ms = started.elapsed().as_millis();
    info!(
        target: "passage_index::ingest",
        documents = stats.documents,
        pages = stats.pages,
        chunks = stats.chunks,
        skipped = stats.skipped,
        duration_ms = stats.duration_ms,
        "index built"
    );
    Ok((index, stats))
}

/// Read page JSONL, build the index, and save it while holding the index
/// writer lock.
pub fn ingest_file(
    jsonl_path: impl AsRef<Path>,
    chunking: &ChunkingConfig,
    provider: &dyn EmbeddingsProvider,
    storage: &dyn ArtifactStorage,
    progress: &dyn Progress,
) -> Result<IngestStats, IndexError> {
    let _lock = storage.lock(INDEX_SCOPE)?;
    let docs = read_documents(jsonl_path)?;
    let (index, stats) = build_index(&docs, chunking, provider, progress)?;
    index.save(storage)?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashingEmbedder;
    use crate::progress::NoopProgress;
    use services::storage::InMemoryArtifactStorage;

    #[test]
    fn ids_are_unique_across_documents() {
        let docs = vec![
            Document::new("a.pdf", "Grade 10", "Science").with_page(1, "one two three four five"),
            Document::new("b.pdf", "Grade 9", "History").with_page(1, "six seven eight"),
            Document::new("c.pdf", "Grade 9", "History").with_page(1, " "),
        ];
        let cfg = ChunkingConfig::new(2, 3, 1).unwrap();
        let embedder = HashingEmbedder::new(32).unwrap();
        let (index, stats) = build_index(&docs, &cfg, &embedder, &NoopProgress).unwrap();

        // a: [0..3), [2..5) ; b: [0..3)
        assert_eq!(stats.chunks, 3);
        assert_eq!(stats.skipped, 1);
        assert_eq!(index.len(), 3);
        assert_eq!(index.chunk(2).map(|c| c.subject.as_str()), Some("History"));
        assert!(index.ensure_compatible(&embedder).is_ok());
    }

    #[test]
    fn ingest_file_writes_the_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pages.jsonl");
        std::fs::write(
            &path,
            r#"{"source":"s.pdf","grade":"Grade 10","subject":"Science","page_number":4,"text":"Photosynthesis happens in leaves."}"#,
        )
        .unwrap();
        let storage = InMemoryArtifactStorage::new();
        let embedder = HashingEmbedder::new(64).unwrap();

        let stats = ingest_file(&path, &ChunkingConfig::default(), &embedder, &storage, &NoopProgress)
            .unwrap();
        assert_eq!(stats.chunks, 1);

        let index = PassageIndex::load(&storage).unwrap();
        assert_eq!(index.chunk(0).map(|c| c.page_number), Some(4));
    }
}
