#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

use std::fs;
use std::io::Cursor;

use local_rag::RagError;
use local_rag::config::Config;
use local_rag::database::VectorStore;
use local_rag::ingest::{IngestOptions, Ingestor};
use local_rag::llm::UNSUPPORTED_MODEL_MESSAGE;
use local_rag::qa::QaSession;
use serde_json::{Value, json};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const SKY_TEXT: &str = "The sky is blue. Grass is green.";

/// Word-count features, enough for a deterministic toy embedding
fn embed(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    vec![
        lower.matches("sky").count() as f32 + 0.1,
        lower.matches("grass").count() as f32 + 0.1,
        lower.matches("color").count() as f32 + 0.1,
    ]
}

fn embed_responder(request: &Request) -> ResponseTemplate {
    let body: Value = serde_json::from_slice(&request.body).expect("embed request is JSON");
    let embeddings: Vec<Vec<f32>> = body["input"]
        .as_array()
        .expect("input is an array")
        .iter()
        .map(|text| embed(text.as_str().unwrap_or_default()))
        .collect();

    ResponseTemplate::new(200).set_body_json(json!({ "embeddings": embeddings }))
}

/// One mock server plays both the embedding and the LlamaCpp runtime
async fn start_runtime() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(embed_responder)
        .mount(&server)
        .await;

    let stream = [
        json!({ "response": "The sky", "done": false }),
        json!({ "response": " is blue.", "done": false }),
        json!({ "response": "", "done": true }),
    ]
    .iter()
    .map(|chunk| format!("{}\n", chunk))
    .collect::<String>();

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(stream, "application/x-ndjson"))
        .mount(&server)
        .await;

    server
}

fn workspace(server: &MockServer) -> (Config, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    config
        .embeddings
        .set_url(&server.uri())
        .expect("mock server uri should be valid");
    config.model.llama_cpp_url = Url::parse(&server.uri()).expect("mock server uri is a URL");

    let source_dir = config.source_directory_path();
    fs::create_dir_all(&source_dir).expect("should create source dir");
    fs::write(source_dir.join("sky.txt"), SKY_TEXT).expect("should write document");

    (config, temp_dir)
}

async fn ingest(config: &Config, wipe: bool) {
    let mut out = Vec::new();
    Ingestor::new(config)
        .expect("should create ingestor")
        .run(IngestOptions { wipe }, &mut out)
        .await
        .expect("ingestion should succeed");
}

async fn ask(config: &Config, input: &str) -> (Result<(), RagError>, String) {
    let session = QaSession::from_config(config)
        .await
        .expect("session should start");

    let mut output = Vec::new();
    let result = session
        .run(Cursor::new(input.to_string()), &mut output)
        .await
        .map(|_| ());
    (
        result,
        String::from_utf8(output).expect("session output is UTF-8"),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn ingest_then_answer_with_sources() {
    let server = start_runtime().await;
    let (config, _temp_dir) = workspace(&server);

    ingest(&config, false).await;

    let store = VectorStore::new(&config)
        .await
        .expect("should open vector store");
    let records = store.list_records().await.expect("should list records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].content, SKY_TEXT);
    let source = config
        .source_directory_path()
        .join("sky.txt")
        .display()
        .to_string();
    assert_eq!(records[0].source, source);

    let (result, output) = ask(&config, "What color is the sky?\nexit\n").await;
    result.expect("query should succeed");

    assert!(output.contains("The sky is blue.\n\n> Question:\nWhat color is the sky?\n"));
    assert!(output.contains("\n> Answer:\nThe sky is blue.\n"));
    assert_eq!(output.matches("\n> ").count(), 3, "question, answer, one source");
    assert!(output.contains(&format!("\n> {}:\n{}\n", source, SKY_TEXT)));
}

#[tokio::test(flavor = "multi_thread")]
async fn wipe_flag_controls_accumulation() {
    let server = start_runtime().await;
    let (config, _temp_dir) = workspace(&server);

    ingest(&config, false).await;
    ingest(&config, false).await;
    let store = VectorStore::new(&config)
        .await
        .expect("should open vector store");
    assert_eq!(store.count().await.expect("should count"), 2);

    ingest(&config, true).await;
    let store = VectorStore::new(&config)
        .await
        .expect("should open vector store");
    assert_eq!(store.count().await.expect("should count"), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn unsupported_model_fails_only_when_asked() {
    let server = start_runtime().await;
    let (mut config, _temp_dir) = workspace(&server);
    config.model.model_type = "Falcon".to_string();

    ingest(&config, false).await;

    let (result, output) = ask(&config, "exit\n").await;
    assert!(result.is_ok());
    assert!(output.starts_with(UNSUPPORTED_MODEL_MESSAGE));

    let (result, _) = ask(&config, "What color is the sky?\n").await;
    assert!(matches!(result, Err(RagError::ModelUnavailable(model)) if model == "Falcon"));
}
