use passage_index::{
    ChunkingConfig, Document, EmbeddingsProvider, HashingEmbedder, NoopProgress, PassageIndex,
    build_index, chunk,
};
use services::storage::FsArtifactStorage;

fn textbook() -> Vec<Document> {
    vec![
        Document::new("science-10.pdf", "Grade 10", "Science")
            .with_page(12, "Photosynthesis is the process by which green plants make food using light energy.")
            .with_page(13, "Chlorophyll in the leaves absorbs sunlight. Oxygen is released as a by-product.")
            .with_page(14, "Respiration releases energy from glucose in every living cell."),
        Document::new("history-9.pdf", "Grade 9", "History")
            .with_page(3, "The Anuradhapura kingdom was an early centre of civilisation in Sri Lanka."),
    ]
}

#[test]
fn chunk_coverage_holds_for_many_window_sizes() {
    let words: Vec<String> = (0..257).map(|i| format!("t{i}")).collect();
    let mut doc = Document::new("d.pdf", "Grade 8", "Geography");
    for (p, page) in words.chunks(40).enumerate() {
        doc = doc.with_page(p as u32 + 1, page.join(" "));
    }

    for (min, max, overlap) in [(1, 1, 0), (5, 10, 3), (30, 64, 0), (100, 120, 119), (300, 500, 50)] {
        let cfg = ChunkingConfig::new(min, max, overlap).unwrap();
        let chunks: Vec<_> = chunk(&doc, &cfg).unwrap().collect();

        let mut covered = 0;
        let mut rebuilt: Vec<String> = Vec::new();
        for c in &chunks {
            assert!(c.word_count <= max);
            assert!(c.start_word <= covered, "gap before chunk {}", c.ordinal);
            let skip = covered - c.start_word;
            rebuilt.extend(c.content.split(' ').skip(skip).map(str::to_string));
            covered = c.end_word;
        }
        assert_eq!(rebuilt, words, "window ({min}, {max}, {overlap})");
        // Every chunk but the last honours the minimum.
        for c in &chunks[..chunks.len() - 1] {
            assert!(c.word_count >= min);
        }
    }
}

#[test]
fn nearest_chunk_mentions_the_question_topic() {
    let embedder = HashingEmbedder::new(384).unwrap();
    let cfg = ChunkingConfig::new(5, 16, 4).unwrap();
    let (index, _) = build_index(&textbook(), &cfg, &embedder, &NoopProgress).unwrap();

    let q = embedder.embed("photosynthesis light energy").unwrap();
    let hits = index.query_scoped(&q, 3, "Grade 10", "Science").unwrap();
    assert!(!hits.is_empty());
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));

    let top = index.chunk(hits[0].chunk_id).unwrap();
    assert!(top.content.contains("light energy"));
    assert_eq!(top.page_number, 12);
}

#[test]
fn filesystem_round_trip_preserves_query_results() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FsArtifactStorage::new(dir.path());
    let embedder = HashingEmbedder::new(384).unwrap();
    let cfg = ChunkingConfig::new(5, 16, 4).unwrap();
    let (index, stats) = build_index(&textbook(), &cfg, &embedder, &NoopProgress).unwrap();
    assert_eq!(stats.documents, 2);

    index.save(&storage).unwrap();
    let back = PassageIndex::load(&storage).unwrap();
    assert_eq!(back, index);

    for q in ["chlorophyll sunlight", "kingdom civilisation", "glucose", "unrelated words"] {
        let v = embedder.embed(q).unwrap();
        assert_eq!(back.query(&v, 4).unwrap(), index.query(&v, 4).unwrap());
    }
    assert_eq!(back.scopes(), index.scopes());
}
