//! Quro API Gateway
//!
//! HTTP front end for the research assistant. Composes the pipeline ports
//! from configuration and exposes one orchestrator per session.
//! Handles:
//! - Session lifecycle and routing
//! - Rate limiting
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;
mod state;
mod telemetry;

use anyhow::Context;
use axum::{
    routing::{delete, get, post},
    Router,
};
use quro_common::{
    config::AppConfig,
    embeddings::create_embedder,
    llm::create_generator,
};
use quro_context::PipelinePorts;
use quro_ingestion::FileExtractor;
use quro_search::{create_vector_index, create_web_searcher};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{signal, sync::Notify};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::middleware::{metrics::track_requests, rate_limit};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    telemetry::init_tracing(&config.observability);
    info!("Starting Quro API Gateway v{}", quro_common::VERSION);

    // Initialize metrics
    let metrics_router = telemetry::setup_metrics(&config.observability)?;

    // Wire the pipeline backends
    let ports = build_ports(&config).await.map_err(|e| {
        error!(error = %e, "Failed to initialize pipeline backends");
        e
    })?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    let metrics_port = config.observability.metrics_port;
    let shutdown_timeout = config.shutdown_timeout();

    let state = AppState::new(config, ports);
    let app = create_router(state);

    if let Some(metrics_router) = metrics_router {
        let metrics_addr = SocketAddr::new(addr.ip(), metrics_port);
        let listener = tokio::net::TcpListener::bind(metrics_addr).await?;
        info!("Metrics listening on {}", metrics_addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, metrics_router).await {
                error!(error = %e, "Metrics server failed");
            }
        });
    }

    // Start the server
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let draining = Arc::new(Notify::new());
    let server = axum::serve(listener, app).with_graceful_shutdown({
        let draining = draining.clone();
        async move {
            shutdown_signal().await;
            draining.notify_one();
        }
    });

    tokio::select! {
        result = server.into_future() => result?,
        _ = async {
            draining.notified().await;
            tokio::time::sleep(shutdown_timeout).await;
        } => warn!("Shutdown timeout elapsed, dropping open connections"),
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Build the collaborators every session shares
async fn build_ports(config: &AppConfig) -> quro_common::Result<PipelinePorts> {
    Ok(PipelinePorts {
        generator: create_generator(&config.llm)?,
        embedder: create_embedder(&config.embedding)?,
        index: create_vector_index(config).await?,
        searcher: create_web_searcher(config)?,
        extractor: Arc::new(FileExtractor::new()),
    })
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API routes
    let api_routes = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Session endpoints
        .route("/sessions", post(handlers::sessions::create_session))
        .route("/sessions/{id}", delete(handlers::sessions::delete_session))
        .route("/sessions/{id}/query", post(handlers::sessions::query))
        .route("/sessions/{id}/upload", post(handlers::sessions::upload))
        .route("/sessions/{id}/reset", post(handlers::sessions::reset))
        .route("/sessions/{id}/history", delete(handlers::sessions::clear_history));

    let mut router = Router::new().nest("/v2", api_routes);

    if state.config.rate_limit.enabled {
        let limiter = rate_limit::create_rate_limiter(&state.config.rate_limit);
        router = router.layer(axum::middleware::from_fn_with_state(
            limiter,
            rate_limit::rate_limit_middleware,
        ));
    }

    // Compose the app; the request id is set before tracing so spans carry it
    router
        .layer(axum::middleware::from_fn(track_requests))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors),
        )
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        response::Response,
    };
    use quro_common::{
        embeddings::MockEmbedder,
        llm::{GenerationOptions, Generator, MockGenerator},
        models::ExternalResult,
        retrieval::{VectorHit, VectorIndex, WebSearcher},
    };
    use serde_json::{json, Value};
    use tokio_test::assert_ok;
    use tower::ServiceExt;

    struct EmptyIndex;

    #[async_trait]
    impl VectorIndex for EmptyIndex {
        async fn search(&self, _vector: &[f32], _limit: usize, _min_score: f32) -> quro_common::Result<Vec<VectorHit>> {
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "empty"
        }
    }

    struct EmptySearcher;

    #[async_trait]
    impl WebSearcher for EmptySearcher {
        async fn search(&self, _query: &str, _limit: usize) -> quro_common::Result<Vec<ExternalResult>> {
            Ok(Vec::new())
        }
    }

    /// Generator whose calls never complete
    struct StalledGenerator;

    #[async_trait]
    impl Generator for StalledGenerator {
        async fn generate(&self, _prompt: &str, _options: &GenerationOptions) -> quro_common::Result<String> {
            std::future::pending().await
        }

        fn model_name(&self) -> &str {
            "stalled"
        }
    }

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.rate_limit.enabled = false;
        config
    }

    fn test_app(config: AppConfig) -> Router {
        test_app_with(config, Arc::new(MockGenerator))
    }

    fn test_app_with(config: AppConfig, generator: Arc<dyn Generator>) -> Router {
        let ports = PipelinePorts {
            generator,
            embedder: Arc::new(MockEmbedder::new(8)),
            index: Arc::new(EmptyIndex),
            searcher: Arc::new(EmptySearcher),
            extractor: Arc::new(FileExtractor::new()),
        };
        create_router(AppState::new(config, ports))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create_session(app: &Router) -> String {
        let response = send(app, "POST", "/v2/sessions", None).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["mode"], "corpus");
        body["session_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(test_config());
        let response = send(&app, "GET", "/v2/health", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(json_body(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_ready_counts_sessions() {
        let app = test_app(test_config());
        create_session(&app).await;
        create_session(&app).await;

        let body = json_body(send(&app, "GET", "/v2/ready", None).await).await;
        assert_eq!(body["status"], "ready");
        assert_eq!(body["active_sessions"], 2);
        assert_eq!(body["web_search_enabled"], false);
    }

    #[tokio::test]
    async fn test_query_without_evidence() {
        let app = test_app(test_config());
        let id = create_session(&app).await;

        let response = send(
            &app,
            "POST",
            &format!("/v2/sessions/{}/query", id),
            Some(json!({"text": "How does microgravity affect bone density?"})),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["resolution_method"], "no_results");
        assert_eq!(body["mode"], "corpus");
        assert_eq!(body["source_list"], json!([]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_timeout() {
        let mut config = test_config();
        config.server.request_timeout_secs = 5;
        let app = test_app_with(config, Arc::new(StalledGenerator));
        let id = create_session(&app).await;

        let response = send(
            &app,
            "POST",
            &format!("/v2/sessions/{}/query", id),
            Some(json!({"text": "How does microgravity affect bone density?"})),
        )
        .await;

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "REQUEST_TIMEOUT");
    }

    #[tokio::test]
    async fn test_query_validation() {
        let app = test_app(test_config());
        let id = create_session(&app).await;
        let uri = format!("/v2/sessions/{}/query", id);

        let empty = send(&app, "POST", &uri, Some(json!({"text": ""}))).await;
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

        let long = send(&app, "POST", &uri, Some(json!({"text": "a".repeat(4001)}))).await;
        assert_eq!(long.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let app = test_app(test_config());
        let uri = format!("/v2/sessions/{}/query", uuid::Uuid::new_v4());

        let response = send(&app, "POST", &uri, Some(json!({"text": "bone loss"}))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert!(body["error"]["message"].as_str().unwrap().contains("Session not found"));
    }

    #[tokio::test]
    async fn test_upload_failure_keeps_corpus_mode() {
        let app = test_app(test_config());
        let id = create_session(&app).await;

        let response = send(
            &app,
            "POST",
            &format!("/v2/sessions/{}/upload", id),
            Some(json!({"path": "/nonexistent/paper.pdf"})),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert_eq!(body["uploaded"], false);
        assert_eq!(body["mode"], "corpus");
    }

    #[tokio::test]
    async fn test_upload_then_reset() {
        let app = test_app(test_config());
        let id = create_session(&app).await;

        let path = std::env::temp_dir().join(format!("quro-gateway-{}.txt", uuid::Uuid::new_v4()));
        assert_ok!(std::fs::write(
            &path,
            "Bone density declines in orbit [1].\nReferences\n[1] https://doi.org/10.1/bone\n",
        ));

        let response = send(
            &app,
            "POST",
            &format!("/v2/sessions/{}/upload", id),
            Some(json!({"path": path.display().to_string()})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["uploaded"], true);
        assert_eq!(body["mode"], "document");

        let response = send(&app, "POST", &format!("/v2/sessions/{}/reset", id), None).await;
        assert_eq!(json_body(response).await["mode"], "corpus");

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_clear_history_and_delete() {
        let app = test_app(test_config());
        let id = create_session(&app).await;

        let response = send(&app, "DELETE", &format!("/v2/sessions/{}/history", id), None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&app, "DELETE", &format!("/v2/sessions/{}", id), None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&app, "DELETE", &format!("/v2/sessions/{}", id), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_session_limit() {
        let mut config = test_config();
        config.server.max_sessions = 1;
        let app = test_app(config);
        create_session(&app).await;

        let response = send(&app, "POST", "/v2/sessions", None).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let mut config = test_config();
        config.rate_limit.enabled = true;
        config.rate_limit.requests_per_second = 1;
        config.rate_limit.burst = 1;
        let app = test_app(config);

        assert_eq!(send(&app, "GET", "/v2/health", None).await.status(), StatusCode::OK);
        let response = send(&app, "GET", "/v2/health", None).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
