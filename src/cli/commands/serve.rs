//! HTTP API server for integration with other systems.
//!
//! Provides REST endpoints for questions, index rebuilds and status.

use crate::cli::Output;
use crate::config::{EmbeddingProvider, Settings};
use crate::error::PulsError;
use crate::orchestrator::{Orchestrator, RebuildDocument};
use crate::rag::{Generator, OpenAIGenerator, RagEngine, Source};
use crate::vector_store::IndexStats;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Largest `k` accepted by `/ask`.
const MAX_K: usize = 20;

/// Shared application state.
pub struct AppState {
    orchestrator: Orchestrator,
    engine: RagEngine,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, generator: Arc<dyn Generator>) -> Self {
        let engine = orchestrator.rag_engine(generator);
        Self {
            orchestrator,
            engine,
        }
    }
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let generator = Arc::new(OpenAIGenerator::from_settings(&settings.generation)?);
    let orchestrator = Orchestrator::new(settings)?;

    match orchestrator.try_load_index(None)? {
        Some(stats) => Output::success(&format!(
            "Loaded index with {} vectors ({})",
            stats.vector_count, stats.provider
        )),
        None => Output::warning("No index loaded. POST /rebuild or run 'puls index' first."),
    }

    let state = Arc::new(AppState::new(orchestrator, generator));
    let app = router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Puls API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Stats", "GET  /stats");
    Output::kv("Ask", "POST /ask");
    Output::kv("Rebuild", "POST /rebuild");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/ask", post(ask))
        .route("/rebuild", post(rebuild))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default = "default_k")]
    k: usize,
}

fn default_k() -> usize {
    3
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    sources: Vec<Source>,
    num_sources: usize,
}

#[derive(Deserialize)]
struct RebuildRequest {
    docs: Vec<RebuildDocument>,
    #[serde(default)]
    persist_path: Option<String>,
    #[serde(default)]
    embedding_provider: Option<String>,
}

#[derive(Serialize)]
struct StatsResponse {
    loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<IndexStats>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// HTTP status for a library error.
fn status_for(e: &PulsError) -> StatusCode {
    match e {
        PulsError::NotBuilt => StatusCode::SERVICE_UNAVAILABLE,
        PulsError::ConfigNotFound(_) => StatusCode::NOT_FOUND,
        PulsError::ProviderMismatch { .. } => StatusCode::CONFLICT,
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        PulsError::Retrieval(_)
        | PulsError::Generation(_)
        | PulsError::Embedding(_)
        | PulsError::OpenAI(_)
        | PulsError::Http(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn library_error(e: PulsError) -> Response {
    let status = status_for(&e);
    if status.is_server_error() {
        error!("Request failed: {}", e);
    }
    error_response(status, e.to_string())
}

// === Handlers ===

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "index_loaded": state.orchestrator.active_index().is_loaded(),
    }))
}

async fn stats(State(state): State<Arc<AppState>>) -> Response {
    match state.orchestrator.stats() {
        Ok(stats) => Json(StatsResponse {
            loaded: stats.is_some(),
            stats,
        })
        .into_response(),
        Err(e) => library_error(e),
    }
}

async fn ask(State(state): State<Arc<AppState>>, Json(req): Json<AskRequest>) -> Response {
    if req.question.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "question must not be empty");
    }
    if !(1..=MAX_K).contains(&req.k) {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("k must be between 1 and {}", MAX_K),
        );
    }

    match state.engine.ask(&req.question, Some(req.k)).await {
        Ok(response) => Json(AskResponse {
            answer: response.answer,
            num_sources: response.num_sources,
            sources: response.sources,
        })
        .into_response(),
        Err(e) => library_error(e),
    }
}

async fn rebuild(State(state): State<Arc<AppState>>, Json(req): Json<RebuildRequest>) -> Response {
    if req.docs.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "docs must not be empty");
    }

    let provider = match req.embedding_provider.as_deref().map(str::parse::<EmbeddingProvider>) {
        Some(Ok(p)) => Some(p),
        Some(Err(e)) => return error_response(StatusCode::BAD_REQUEST, e),
        None => None,
    };
    let path: Option<PathBuf> = req.persist_path.as_deref().map(Settings::expand_path);

    info!("Rebuild requested with {} documents", req.docs.len());
    match state
        .orchestrator
        .rebuild(req.docs, path.as_deref(), provider)
        .await
    {
        Ok(report) => Json(report).into_response(),
        Err(e) => library_error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmbeddingSettings, Prompts};
    use crate::embedding::create_embedder;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    struct EchoGenerator;

    #[async_trait]
    impl Generator for EchoGenerator {
        async fn complete(&self, _system: &str, user: &str) -> crate::error::Result<String> {
            Ok(format!("réponse ({} caractères de contexte)", user.len()))
        }
    }

    fn app(dir: &std::path::Path) -> Router {
        let mut settings = Settings::default();
        settings.embedding = EmbeddingSettings::for_provider(EmbeddingProvider::Hashing);
        settings.index.path = dir.join("index").to_string_lossy().to_string();
        let embedder = create_embedder(&settings.embedding).unwrap();
        let orchestrator =
            Orchestrator::with_components(settings, Prompts::default(), embedder).unwrap();
        router(Arc::new(AppState::new(orchestrator, Arc::new(EchoGenerator))))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(req).await.expect("request failed");
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn docs() -> Value {
        serde_json::json!({
            "docs": [
                {"text": "Concert de l'orchestre national", "metadata": {"title": "Orchestre", "location_city": "Lille", "date_start": "2024-10-05"}},
                {"text": "Salon des vins naturels", "metadata": {"title": "Salon", "location_city": "Angers", "date_start": "2025-02-01"}}
            ]
        })
    }

    #[tokio::test]
    async fn test_health_and_stats_before_index() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let (status, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["index_loaded"], false);

        let (status, body) = call(&app, "GET", "/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["loaded"], false);
    }

    #[tokio::test]
    async fn test_ask_validation() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let (status, _) = call(&app, "POST", "/ask", Some(serde_json::json!({"question": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &app,
            "POST",
            "/ask",
            Some(serde_json::json!({"question": "jazz", "k": 21})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, "POST", "/ask", Some(serde_json::json!({"question": "jazz"}))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_rebuild_then_ask() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let (status, _) = call(&app, "POST", "/rebuild", Some(serde_json::json!({"docs": []}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&app, "POST", "/rebuild", Some(docs())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["count"], 2);
        assert_eq!(body["provider"], "hashing:d384");

        let (status, body) = call(
            &app,
            "POST",
            "/ask",
            Some(serde_json::json!({"question": "Concert de l'orchestre en 2024", "k": 2})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["answer"].as_str().unwrap().starts_with("réponse"));
        assert_eq!(body["sources"][0]["title"], "Orchestre");

        let (_, body) = call(
            &app,
            "POST",
            "/ask",
            Some(serde_json::json!({"question": "Concert en 2031"})),
        )
        .await;
        assert_eq!(body["answer"], crate::rag::NO_MATCH_ANSWER);
        assert_eq!(body["num_sources"], 0);

        let (_, body) = call(&app, "GET", "/stats", None).await;
        assert_eq!(body["stats"]["vector_count"], 2);
    }

    #[tokio::test]
    async fn test_rebuild_unknown_provider() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let mut request = docs();
        request["embedding_provider"] = Value::from("word2vec");
        let (status, _) = call(&app, "POST", "/rebuild", Some(request)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
