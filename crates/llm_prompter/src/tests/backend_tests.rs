use super::*;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use std::sync::Arc;
use tokio::{
    net::TcpListener,
    sync::{oneshot, Mutex},
};

#[derive(Clone)]
struct GenerateServerState {
    tx: Arc<Mutex<Option<oneshot::Sender<GenerateRequest>>>>,
    reply_error: Option<String>,
}

async fn handle_generate(
    State(state): State<GenerateServerState>,
    Json(request): Json<GenerateRequest>,
) -> (StatusCode, Json<GenerateResponse>) {
    let prompt = request.prompt.clone();
    if let Some(tx) = state.tx.lock().await.take() {
        let _ = tx.send(request);
    }
    match state.reply_error {
        Some(error) => (
            StatusCode::NOT_FOUND,
            Json(GenerateResponse {
                response: None,
                error: Some(error),
            }),
        ),
        None => (
            StatusCode::OK,
            Json(GenerateResponse {
                response: Some(format!("echo: {prompt}")),
                error: None,
            }),
        ),
    }
}

async fn spawn_generate_server(
    reply_error: Option<String>,
) -> Result<(String, oneshot::Receiver<GenerateRequest>)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (tx, rx) = oneshot::channel();
    let state = GenerateServerState {
        tx: Arc::new(Mutex::new(Some(tx))),
        reply_error,
    };
    let app = Router::new()
        .route("/api/generate", post(handle_generate))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), rx))
}

#[tokio::test]
async fn posts_non_streaming_generate_request() {
    let (base_url, request_rx) = spawn_generate_server(None).await.expect("spawn server");
    let client = OllamaClient::new();

    let response = client
        .generate(&base_url, &GenerateRequest::new("llama3.2", "hello"))
        .await
        .expect("generate");
    assert_eq!(response.response.as_deref(), Some("echo: hello"));
    assert!(response.error.is_none());

    let seen = request_rx.await.expect("request captured");
    assert_eq!(
        seen,
        GenerateRequest {
            model: "llama3.2".into(),
            prompt: "hello".into(),
            stream: false,
        }
    );
}

#[tokio::test]
async fn error_body_is_returned_even_on_failure_status() {
    let (base_url, _request_rx) = spawn_generate_server(Some("model 'nope' not found".into()))
        .await
        .expect("spawn server");

    let response = OllamaClient::default()
        .generate(&base_url, &GenerateRequest::new("nope", "hello"))
        .await
        .expect("error body still parses");
    assert_eq!(response.error.as_deref(), Some("model 'nope' not found"));
    assert!(response.response.is_none());
}

#[tokio::test]
async fn unreachable_server_is_an_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let result = OllamaClient::new()
        .generate(&format!("http://{addr}"), &GenerateRequest::new("m", "p"))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn missing_backend_always_fails() {
    let result = MissingGenerateBackend
        .generate("http://localhost:11434", &GenerateRequest::new("m", "p"))
        .await;
    assert!(result
        .expect_err("unavailable")
        .to_string()
        .contains("unavailable"));
}
