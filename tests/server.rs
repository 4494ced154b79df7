//! HTTP API tests against an in-process server on an ephemeral port.

mod common;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use common::{fixture, pdf_with_text, Fixture, HashEmbedder};
use ragchat::augment::Augmenter;
use ragchat::config::RetrievalConfig;
use ragchat::generate::{ChatModel, GenerateError};
use ragchat::ingest::spawn_ingest_worker;
use ragchat::server::{build_router, AppState, UPLOAD_SUCCESS_MESSAGE, WELCOME_MESSAGE};
use ragchat_core::models::document_id;
use ragchat_core::prompt::GREETING_INSTRUCTION;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use tempfile::TempDir;

struct EchoChat;

#[async_trait]
impl ChatModel for EchoChat {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        Ok(format!("echo: {}", prompt))
    }
}

struct BrokenChat;

#[async_trait]
impl ChatModel for BrokenChat {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerateError> {
        Err(GenerateError::InvalidResponse("empty completion".to_string()))
    }
}

struct TestServer {
    base: String,
    fx: Fixture,
    upload_dir: PathBuf,
    _dir: TempDir,
}

async fn start(chat: Arc<dyn ChatModel>) -> TestServer {
    let dir = TempDir::new().unwrap();
    let upload_dir = dir.path().join("uploads");
    let fx = fixture(0);

    let (handle, _task) = spawn_ingest_worker(fx.pipeline.clone());
    let state = AppState {
        augmenter: Arc::new(Augmenter::new(
            Arc::new(HashEmbedder),
            fx.store.clone(),
            RetrievalConfig::default(),
            fx.stats.clone(),
        )),
        chat,
        ingest: handle,
        upload_dir: upload_dir.clone(),
        stats: fx.stats.clone(),
    };
    let router = build_router(state, 1024 * 1024);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestServer {
        base: format!("http://{}", addr),
        fx,
        upload_dir,
        _dir: dir,
    }
}

fn file_form(name: &str, bytes: Vec<u8>) -> Form {
    Form::new()
        .percent_encode_noop()
        .part("file", Part::bytes(bytes).file_name(name.to_string()))
}

#[tokio::test]
async fn root_and_health() {
    let srv = start(Arc::new(EchoChat)).await;
    let client = reqwest::Client::new();

    let root: Value = client
        .get(&srv.base)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(root, json!({ "message": WELCOME_MESSAGE }));

    let health: Value = client
        .get(format!("{}/health", srv.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert!(health["version"].is_string());
}

#[tokio::test]
async fn chat_without_query_is_rejected() {
    let srv = start(Arc::new(EchoChat)).await;
    let client = reqwest::Client::new();
    let url = format!("{}/api/chat", srv.base);

    for body in ["{}", r#"{"query":""}"#, "not json", r#"{"query":42}"#] {
        let resp = client
            .post(&url)
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "body {}", body);
        let json: Value = resp.json().await.unwrap();
        assert_eq!(json, json!({ "error": "No query provided" }));
    }
}

#[tokio::test]
async fn chat_returns_response_and_augmented_query() {
    let srv = start(Arc::new(EchoChat)).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/api/chat", srv.base))
        .json(&json!({ "query": "Hello" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["augmentedQuery"], GREETING_INSTRUCTION);
    assert_eq!(json["response"], format!("echo: {}", GREETING_INSTRUCTION));
}

#[tokio::test]
async fn generation_failure_is_a_500() {
    let srv = start(Arc::new(BrokenChat)).await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/chat", srv.base))
        .json(&json!({ "query": "refund policy" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json, json!({ "error": "Failed to generate response" }));

    let stats: Value = client
        .get(format!("{}/api/stats", srv.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["failures"]["generation"], 1);
    assert_eq!(stats["last_failure"]["class"], "generation");
}

#[tokio::test]
async fn non_pdf_upload_is_rejected_without_store_mutation() {
    let srv = start(Arc::new(EchoChat)).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/api/upload", srv.base))
        .multipart(file_form("notes.txt", b"plain text".to_vec()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let json: Value = resp.json().await.unwrap();
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("Invalid file type"));

    assert!(srv.fx.store.is_empty());
    assert!(!srv.upload_dir.join("notes.txt").exists());
}

#[tokio::test]
async fn upload_without_file_part() {
    let srv = start(Arc::new(EchoChat)).await;
    let client = reqwest::Client::new();
    let url = format!("{}/api/upload", srv.base);

    let form = Form::new().text("other", "value");
    let resp = client.post(&url).multipart(form).send().await.unwrap();
    assert_eq!(resp.status(), 400);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json, json!({ "error": "No file part" }));

    let resp = client.post(&url).body("raw").send().await.unwrap();
    assert_eq!(resp.status(), 400);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json, json!({ "error": "No file part" }));
}

#[tokio::test]
async fn upload_with_empty_file_name() {
    let srv = start(Arc::new(EchoChat)).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/api/upload", srv.base))
        .multipart(file_form("", b"%PDF".to_vec()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json, json!({ "error": "No selected file" }));
}

#[tokio::test]
async fn pdf_upload_is_saved_and_indexed() {
    let srv = start(Arc::new(EchoChat)).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/api/upload", srv.base))
        .multipart(file_form(
            "../../Handbook.PDF",
            pdf_with_text("Vacation requests need two weeks notice"),
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json, json!({ "message": UPLOAD_SUCCESS_MESSAGE }));

    assert!(srv.upload_dir.join("Handbook.PDF").exists());
    assert_eq!(srv.fx.store.ids(), vec![document_id("Handbook.PDF")]);
}

#[tokio::test]
async fn unreadable_pdf_upload_is_a_500() {
    let srv = start(Arc::new(EchoChat)).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/api/upload", srv.base))
        .multipart(file_form("broken.pdf", b"definitely not a pdf".to_vec()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let json: Value = resp.json().await.unwrap();
    assert!(json["error"].as_str().unwrap().contains("broken.pdf"));
    assert!(srv.fx.store.is_empty());
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let srv = start(Arc::new(EchoChat)).await;
    let resp = reqwest::Client::new()
        .get(format!("{}/health", srv.base))
        .header("Origin", "http://localhost:3000")
        .send()
        .await
        .unwrap();
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}
