//! RagForge API Gateway
//!
//! HTTP entry point for document search and chat.
//! Handles:
//! - Request validation and routing
//! - Wiring of search engine, embedder, language model and localization
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;

use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use ragforge_common::{
    config::AppConfig,
    context::{ChatOrchestrator, OpenAiCompatibleModel},
    localization::JsonLocalizedResources,
    metrics::{self, metric_name, LATENCY_BUCKETS, UPSTREAM_BUCKETS},
    search::SearchService,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub search: Arc<SearchService>,
    pub chat: Arc<ChatOrchestrator>,
}

impl AppState {
    /// Build all services from configuration
    pub fn from_config(config: AppConfig) -> ragforge_common::Result<Self> {
        let search = Arc::new(SearchService::from_config(&config)?);
        let model = Arc::new(OpenAiCompatibleModel::new(config.llm.clone())?);
        let strings = Arc::new(JsonLocalizedResources::from_config(&config.localization)?);
        let chat = Arc::new(ChatOrchestrator::new(&config, search.clone(), model, strings));

        Ok(Self {
            config: Arc::new(config),
            search,
            chat,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    init_tracing(&config);
    info!("Starting RagForge API Gateway v{}", ragforge_common::VERSION);

    // Initialize metrics
    if config.observability.metrics_port > 0 {
        install_metrics_exporter(config.observability.metrics_port)?;
    }
    metrics::register_metrics();

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!(
        search_url = %config.search_url(),
        hybrid = config.search_engine.hybrid_enabled,
        embedding_provider = %config.embedding.provider,
        "Search configured"
    );

    let state = AppState::from_config(config)?;
    let app = create_router(state);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// JSON or human-readable logs filtered by `RUST_LOG`, else the configured level
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Serve Prometheus metrics on a separate port
fn install_metrics_exporter(port: u16) -> anyhow::Result<()> {
    let upstream = [metric_name("embedding_duration_seconds"), metric_name("llm_duration_seconds")];
    let local = [metric_name("request_duration_seconds"), metric_name("search_duration_seconds")];

    let mut builder = PrometheusBuilder::new().with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)));
    for name in upstream {
        builder = builder.set_buckets_for_metric(Matcher::Full(name), UPSTREAM_BUCKETS)?;
    }
    for name in local {
        builder = builder.set_buckets_for_metric(Matcher::Full(name), LATENCY_BUCKETS)?;
    }
    builder.install()?;

    info!(port, "Prometheus exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let api_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/search", post(handlers::search::search))
        .route("/chat", post(handlers::chat::chat))
        .route_layer(axum::middleware::from_fn(middleware::metrics::track_metrics));

    Router::new()
        .nest("/api", api_routes)
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
    };
    use ragforge_common::{
        context::MockLanguageModel,
        errors::{AppError, Result},
        search::SearchEngine,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct StaticEngine {
        up: bool,
    }

    #[async_trait]
    impl SearchEngine for StaticEngine {
        async fn search(&self, _body: &Value) -> Result<String> {
            if !self.up {
                return Err(AppError::SearchEngineUnavailable { message: "down".into() });
            }
            Ok(json!({
                "hits": {
                    "total": { "value": 1 },
                    "hits": [{
                        "_id": "1",
                        "_score": 1.0,
                        "_source": { "content": "Invoices are due in 14 days.", "sourceFile": "invoices.pdf" }
                    }]
                }
            })
            .to_string())
        }

        async fn ping(&self) -> Result<()> {
            if self.up {
                Ok(())
            } else {
                Err(AppError::SearchEngineUnavailable { message: "down".into() })
            }
        }
    }

    fn app(engine_up: bool) -> Router {
        let config = AppConfig::default();
        let search = Arc::new(SearchService::new(&config, Arc::new(StaticEngine { up: engine_up }), None));
        let strings = Arc::new(JsonLocalizedResources::builtin("en").unwrap());
        let chat = Arc::new(ChatOrchestrator::new(
            &config,
            search.clone(),
            Arc::new(MockLanguageModel::new()),
            strings,
        ));

        create_router(AppState {
            config: Arc::new(config),
            search,
            chat,
        })
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(app(true), "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_ready_reflects_engine() {
        let (status, body) = send(app(true), "GET", "/api/ready", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["search_engine"]["status"], "up");

        let (status, body) = send(app(false), "GET", "/api/ready", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "not_ready");
    }

    #[tokio::test]
    async fn test_search() {
        let (status, body) = send(
            app(true),
            "POST",
            "/api/search",
            Some(json!({ "query": "invoice due date", "limit": 5 })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["results"][0]["file_name"], "invoices.pdf");
    }

    #[tokio::test]
    async fn test_search_validation() {
        let (status, body) = send(app(true), "POST", "/api/search", Some(json!({ "query": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["field"], "query");

        let (status, _) = send(
            app(true),
            "POST",
            "/api/search",
            Some(json!({ "query": "invoice", "limit": 500 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_search_engine_down() {
        let (status, body) = send(app(false), "POST", "/api/search", Some(json!({ "query": "invoice" }))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "SEARCH_ENGINE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_chat_survives_engine_outage() {
        let (status, body) = send(
            app(false),
            "POST",
            "/api/chat",
            Some(json!({ "message": "When are invoices due?" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["documents_used"], 0);
        assert_eq!(body["response_language"], "en");
    }

    #[tokio::test]
    async fn test_chat_validation() {
        let message = "x".repeat(4001);
        let (status, _) = send(app(true), "POST", "/api/chat", Some(json!({ "message": message }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
