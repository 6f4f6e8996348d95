use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use brain_core::adapter::PresetAdapter;
use brain_core::catalog::DeviceCatalog;
use brain_core::extract::ResponseFormat;
use brain_core::gemini::{
    clamp_timeout_secs, ApiKeyError, GeminiClient, GeminiConfig, GenerationError, TextGenerator,
};
use brain_core::handler::{PresetOutcome, PresetService};
use clap::Parser;
use preset_protocol::PresetRequest;
use preset_server::{ConfigError, PresetServer, ServerArgs};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
struct SeenRequest {
    call: String,
    api_key: Option<String>,
    body: Value,
}

/// Stand-in for the `generateContent` endpoint.
#[derive(Clone)]
struct FakeGemini {
    status: StatusCode,
    reply: Value,
    delay: Duration,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl FakeGemini {
    fn answering(text: &str) -> Self {
        Self::raw(
            StatusCode::OK,
            json!({ "candidates": [ { "content": { "parts": [ { "text": text } ] } } ] }),
        )
    }

    fn raw(status: StatusCode, reply: Value) -> Self {
        Self {
            status,
            reply,
            delay: Duration::ZERO,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn stalling(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::answering("{\"preset\":[]}")
        }
    }

    fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

async fn generate_content(
    State(fake): State<FakeGemini>,
    Path(call): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    fake.seen.lock().unwrap().push(SeenRequest {
        call,
        api_key: headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });
    tokio::time::sleep(fake.delay).await;
    (fake.status, Json(fake.reply.clone())).into_response()
}

async fn spawn_fake(fake: FakeGemini) -> SocketAddr {
    let app = Router::new()
        .route("/v1beta/models/:call", post(generate_content))
        .with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    addr
}

fn client_for(addr: SocketAddr, json_mode: bool) -> GeminiClient {
    GeminiClient::new(GeminiConfig {
        model: "gemini-test".to_string(),
        base_url: format!("http://{addr}/v1beta/"),
        timeout: Duration::from_secs(5),
        json_mode,
        ..GeminiConfig::new("test-key")
    })
    .unwrap()
}

fn timed_client(addr: SocketAddr, timeout: Duration) -> GeminiClient {
    GeminiClient::new(GeminiConfig {
        base_url: format!("http://{addr}/v1beta"),
        timeout,
        ..GeminiConfig::new("test-key")
    })
    .unwrap()
}

fn temp_key_file(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("preset_server_{}_{name}", std::process::id()));
    std::fs::write(&path, contents).unwrap();
    path
}

#[tokio::test]
async fn json_mode_request_shape() {
    let fake = FakeGemini::answering("{\"preset\":[]}");
    let addr = spawn_fake(fake.clone()).await;

    let text = client_for(addr, true).generate_text("make it chime").await.unwrap();
    assert_eq!(text, "{\"preset\":[]}");

    let seen = fake.requests();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].call, "gemini-test:generateContent");
    assert_eq!(seen[0].api_key.as_deref(), Some("test-key"));
    assert_eq!(seen[0].body["contents"][0]["parts"][0]["text"], "make it chime");
    assert_eq!(
        seen[0].body["generationConfig"]["responseMimeType"],
        "application/json"
    );
}

#[tokio::test]
async fn free_text_mode_omits_generation_config() {
    let fake = FakeGemini::answering("```json\n{}\n```");
    let addr = spawn_fake(fake.clone()).await;

    client_for(addr, false).generate_text("x").await.unwrap();
    assert!(fake.requests()[0].body.get("generationConfig").is_none());
}

#[tokio::test]
async fn multi_part_text_is_joined() {
    let fake = FakeGemini::raw(
        StatusCode::OK,
        json!({ "candidates": [ { "content": { "parts": [ { "text": "{\"pre" }, { "text": "set\":[]}" } ] } } ] }),
    );
    let addr = spawn_fake(fake).await;
    let text = client_for(addr, true).generate_text("x").await.unwrap();
    assert_eq!(text, "{\"preset\":[]}");
}

#[tokio::test]
async fn error_status_is_not_retried() {
    let fake = FakeGemini::raw(
        StatusCode::TOO_MANY_REQUESTS,
        json!({ "error": { "message": "quota" } }),
    );
    let addr = spawn_fake(fake.clone()).await;

    match client_for(addr, true).generate_text("x").await {
        Err(GenerationError::BadStatus { status, body }) => {
            assert_eq!(status.as_u16(), 429);
            assert!(body.contains("quota"));
        }
        other => panic!("expected bad status, got: {other:?}"),
    }
    assert_eq!(fake.requests().len(), 1);
}

#[tokio::test]
async fn empty_candidates_are_an_envelope_error() {
    let fake = FakeGemini::raw(StatusCode::OK, json!({ "candidates": [] }));
    let addr = spawn_fake(fake).await;
    let err = client_for(addr, true).generate_text("x").await.unwrap_err();
    assert!(matches!(err, GenerationError::Envelope(_)), "{err}");
}

#[tokio::test]
async fn server_built_from_args_talks_to_gemini() {
    let reply = json!({
        "preset": [
            { "fx-block-name": "DS/OD", "effect-name": "Blues DR", "on/off": "on", "setting": { "Gain": 4.5 } }
        ]
    });
    let fake = FakeGemini::answering(&reply.to_string());
    let gemini_addr = spawn_fake(fake.clone()).await;
    let key_file = temp_key_file("key", "  file-key \n");

    let args = ServerArgs::try_parse_from([
        "preset_server".to_string(),
        "--bind".to_string(),
        "127.0.0.1:0".to_string(),
        "--gemini-model".to_string(),
        "gemini-e2e".to_string(),
        "--gemini-base-url".to_string(),
        format!("http://{gemini_addr}/v1beta"),
        "--api-key-file".to_string(),
        key_file.display().to_string(),
    ])
    .unwrap();
    let service = args.build_service().unwrap();
    let server = PresetServer::bind(args.bind, service).await.unwrap();

    let resp = reqwest::Client::new()
        .post(format!("http://{}/", server.listen_addr()))
        .json(&json!({ "selectedPedal": "Mooer GE150 Pro", "toneDescription": "warm blues overdrive" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, reply["preset"]);

    let seen = fake.requests();
    assert_eq!(seen[0].call, "gemini-e2e:generateContent");
    assert_eq!(seen[0].api_key.as_deref(), Some("file-key"));
    let prompt = seen[0].body["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap();
    assert!(prompt.contains("warm blues overdrive"));
    assert!(prompt.contains("\"Device\":\"Mooer GE150 Pro\""));

    server.shutdown().await.unwrap();
    let _ = std::fs::remove_file(key_file);
}

#[test]
fn blank_api_key_file_is_rejected() {
    let key_file = temp_key_file("blank", "   \n");
    let args = ServerArgs::try_parse_from([
        "preset_server".to_string(),
        "--api-key-file".to_string(),
        key_file.display().to_string(),
    ])
    .unwrap();
    assert!(matches!(args.api_key(), Err(ConfigError::ApiKey(ApiKeyError::Missing))));
    assert!(matches!(
        args.build_service(),
        Err(ConfigError::ApiKey(ApiKeyError::Missing))
    ));
    let _ = std::fs::remove_file(key_file);
}

#[test]
fn response_format_flag() {
    let args = ServerArgs::try_parse_from(["preset_server", "--response-format", "fenced-json"])
        .unwrap();
    assert_eq!(args.response_format.to_string(), "fenced-json");
    assert!(!args.gemini_config("k".to_string()).json_mode);

    assert!(ServerArgs::try_parse_from(["preset_server", "--response-format", "xml"]).is_err());
}

#[test]
fn http_timeout_is_clamped() {
    assert_eq!(clamp_timeout_secs(0), Duration::from_secs(5));
    assert_eq!(clamp_timeout_secs(5), Duration::from_secs(5));
    assert_eq!(clamp_timeout_secs(60), Duration::from_secs(60));
    assert_eq!(clamp_timeout_secs(300), Duration::from_secs(300));
    assert_eq!(clamp_timeout_secs(1000), Duration::from_secs(300));
}

#[tokio::test]
async fn slow_upstream_times_out_as_http_error() {
    let fake = FakeGemini::stalling(Duration::from_secs(3));
    let addr = spawn_fake(fake.clone()).await;

    let err = timed_client(addr, Duration::from_millis(200))
        .generate_text("x")
        .await
        .unwrap_err();
    match err {
        GenerationError::Http(e) => assert!(e.is_timeout(), "{e}"),
        other => panic!("expected http error, got: {other:?}"),
    }
    assert_eq!(fake.requests().len(), 1);
}

#[tokio::test]
async fn refused_connection_is_http_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = timed_client(addr, Duration::from_secs(5))
        .generate_text("x")
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Http(_)), "{err}");
}

#[tokio::test]
async fn transport_failure_maps_to_generation_failed() {
    let fake = FakeGemini::stalling(Duration::from_secs(3));
    let addr = spawn_fake(fake).await;

    let client = timed_client(addr, Duration::from_millis(200));
    let service = PresetService::new(
        Arc::new(DeviceCatalog::builtin().unwrap()),
        PresetAdapter::new(Arc::new(client), ResponseFormat::RawJson),
    );
    let outcome = service
        .handle(&PresetRequest {
            selected_device_id: "Mooer GE150 Pro".to_string(),
            tone_description: "warm blues overdrive".to_string(),
        })
        .await;

    assert_eq!(outcome, PresetOutcome::Failed);
    assert_eq!(outcome.status().as_u16(), 500);
    assert_eq!(
        outcome.error_envelope().map(|e| e.error),
        Some("Failed to generate preset".to_string())
    );
}
