use std::sync::Arc;

use answer_engine::{AskService, EngineConfig};
use api::{AppState, router};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use guardrail::{
    ForestConfig, GuardrailConfig, MaxFeatures, TrainingExample, VectorizerConfig, train,
};
use passage_index::{ChunkingConfig, Document, HashingEmbedder, NoopProgress, build_index};
use serde_json::Value;
use services::storage::{ArtifactStorage, InMemoryArtifactStorage};
use tower::ServiceExt;

fn storage_with_artifacts() -> Arc<InMemoryArtifactStorage> {
    let in_scope = [
        "What is photosynthesis?",
        "what is photosynthesis",
        "Photosynthesis?",
        "Explain photosynthesis in plants",
        "How do plants absorb light energy?",
    ];
    let out_of_scope = [
        "How do I become rich?",
        "How can I become rich?",
        "become rich",
        "buy cryptocurrency",
        "best video games",
    ];
    let examples: Vec<TrainingExample> = in_scope
        .iter()
        .map(|q| TrainingExample::new(*q, true))
        .chain(out_of_scope.iter().map(|q| TrainingExample::new(*q, false)))
        .collect();
    let cfg = GuardrailConfig {
        vectorizer: VectorizerConfig {
            min_df: 1,
            max_df: 1.0,
            ..VectorizerConfig::default()
        },
        forest: ForestConfig {
            n_trees: 15,
            max_depth: 8,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            seed: Some(3),
        },
    };

    let storage = Arc::new(InMemoryArtifactStorage::new());
    train(&examples, &cfg).unwrap().save(&*storage).unwrap();

    let docs = vec![
        Document::new("science-10.pdf", "Grade 10", "Science")
            .with_page(12, "Photosynthesis is the process by which green plants make food using light energy."),
    ];
    let embedder = HashingEmbedder::new(128).unwrap();
    let (index, _) = build_index(&docs, &ChunkingConfig::new(5, 16, 4).unwrap(), &embedder, &NoopProgress)
        .unwrap();
    index.save(&*storage).unwrap();
    storage
}

fn app() -> Router {
    let storage = storage_with_artifacts();
    let cfg = EngineConfig::default();
    let service = AskService::load(&*storage, cfg.clone()).unwrap();
    let storage: Arc<dyn ArtifactStorage> = storage;
    router(Arc::new(AppState::new(service, storage, cfg)))
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json(res: axum::response::Response) -> Value {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn ask_answers_in_scope_questions() {
    let res = app()
        .oneshot(post_json(
            "/api/v1/ask",
            r#"{"grade":"Grade 10","subject":"Science","question":"What is photosynthesis?"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = json(res).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["is_in_syllabus"], true);
    assert_eq!(body["page_references"][0], 12);
    assert_eq!(body["source_chunks"][0]["grade"], "Grade 10");
}

#[tokio::test]
async fn refusals_are_still_200() {
    let res = app()
        .oneshot(post_json(
            "/api/v1/ask",
            r#"{"grade":"Grade 10","subject":"Mathematics","question":"How do I become rich?"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = json(res).await;
    assert_eq!(body["status"], "out_of_syllabus");
    assert_eq!(
        body["answer"],
        "This question is not covered in your selected textbook."
    );
}

#[tokio::test]
async fn empty_question_is_a_400_envelope() {
    let res = app()
        .oneshot(post_json(
            "/api/v1/ask",
            r#"{"grade":"Grade 10","subject":"Science","question":""}"#,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body = json(res).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
    assert_eq!(body["error"]["details"][0]["path"], "question");
}

#[tokio::test]
async fn malformed_json_is_enveloped() {
    let res = app()
        .oneshot(post_json("/api/v1/ask", "{not json"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(res.headers().contains_key("X-Request-Id"));

    let body = json(res).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn health_and_status_describe_loaded_artifacts() {
    let app = app();

    let res = app.clone().oneshot(get("/api/v1/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = json(res).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["services"]["guardrail"], "loaded");

    let res = app.oneshot(get("/api/v1/status")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = json(res).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["service"]["trees"], 15);
    assert_eq!(body["data"]["service"]["index_dim"], 128);
}

#[tokio::test]
async fn reload_swaps_in_stored_artifacts() {
    let res = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/admin/reload")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = json(res).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["embedder"], "hashing-blake3-v1/128");
}
