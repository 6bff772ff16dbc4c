use std::sync::Arc;
use std::time::Duration;

use hybrid_retrieval::{
    Config, EmbeddingProvider, Error, HttpEmbeddingProvider, HybridRetrieval, HybridStore, NewNode,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "nomic-embed-text";

fn provider(server: &MockServer, max_retries: u32) -> HttpEmbeddingProvider {
    HttpEmbeddingProvider::new(
        &format!("{}/api/embeddings", server.uri()),
        MODEL,
        4,
        max_retries,
        Duration::from_secs(5),
    )
    .unwrap()
    .with_initial_backoff(Duration::from_millis(5))
}

fn embedding_body(embedding: Vec<f64>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "embedding": embedding }))
}

#[tokio::test]
async fn test_embed_sends_model_and_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .and(body_json(json!({"model": MODEL, "prompt": "rocket factory"})))
        .respond_with(embedding_body(vec![0.1, 0.2, 0.3, 0.4]))
        .expect(1)
        .mount(&server)
        .await;

    let embedding = provider(&server, 0).embed("rocket factory").await.unwrap();
    assert_eq!(embedding, vec![0.1, 0.2, 0.3, 0.4]);
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(embedding_body(vec![1.0, 0.0, 0.0, 0.0]))
        .expect(1)
        .mount(&server)
        .await;

    let embedding = provider(&server, 2).embed("retry me").await.unwrap();
    assert_eq!(embedding, vec![1.0, 0.0, 0.0, 0.0]);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = provider(&server, 2).embed("unavailable").await.unwrap_err();
    assert!(matches!(err, Error::Embedding(_)));
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(400).set_body_string("unknown model"))
        .expect(1)
        .mount(&server)
        .await;

    let err = provider(&server, 3).embed("bad request").await.unwrap_err();
    match err {
        Error::Embedding(message) => assert!(message.contains("unknown model")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_wrong_dimension_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(embedding_body(vec![1.0, 2.0]))
        .expect(1)
        .mount(&server)
        .await;

    let err = provider(&server, 3).embed("short").await.unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 4, actual: 2 }));
}

#[tokio::test]
async fn test_store_embeds_nodes_and_queries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .and(body_json(json!({"model": MODEL, "prompt": "SpaceX is in Hawthorne"})))
        .respond_with(embedding_body(vec![0.6, 0.8, 0.0, 0.0]))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(embedding_body(vec![1.0, 0.0, 0.0, 0.0]))
        .mount(&server)
        .await;

    let store = HybridStore::new(Config::for_testing())
        .unwrap()
        .with_embedding_provider(Arc::new(provider(&server, 0)));

    let n0 = store.create_node(NewNode::new("Elon Musk founded SpaceX")).await.unwrap();
    let n1 = store.create_node(NewNode::new("SpaceX is in Hawthorne")).await.unwrap();
    assert_eq!(
        store.get_node(&n1).await.unwrap().embedding,
        Some(vec![0.6, 0.8, 0.0, 0.0])
    );

    let response = store.local_search("who founded it", None, 2).await.unwrap();
    assert_eq!(response.results[0].node_id, n0);
    assert!((response.results[1].vector_score.unwrap() - 0.6).abs() < 1e-12);

    let hybrid = store
        .hybrid_search("hawthorne", None, 2, 0.6, 0.4, false)
        .await
        .unwrap();
    assert_eq!(hybrid.results.len(), 2);
    assert!(hybrid.results.iter().all(|r| r.vector_score.is_some()));
}
