//! Router assembly, shared state and the common response envelope.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::forge::ForgeOrchestrator;
use crate::knowledge::KnowledgeManager;
use crate::llm::{LlmClient, PollinationsClient};
use crate::memory::{EpisodicStore, MetricsCollector, SriProtocol};
use crate::orchestrator::{Orchestrator, OrchestratorError, Worker};
use crate::scheduler::{ConcurrentTaskManager, TimeoutManager};
use crate::task::{create_task_store, TaskStore, TaskStoreKind};
use crate::tools::ToolRegistry;

use super::{forge, knowledge, media, memory, tasks};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn TaskStore>,
    pub orchestrator: Arc<Orchestrator>,
    pub knowledge: Arc<KnowledgeManager>,
    pub tools: Arc<ToolRegistry>,
    pub sri: Arc<SriProtocol>,
    pub metrics: Arc<MetricsCollector>,
    pub forge: Arc<ForgeOrchestrator>,
    pub pollinations: Arc<PollinationsClient>,
}

impl AppState {
    /// Wire every subsystem from the configuration.
    pub async fn initialize(config: Config) -> Result<Arc<Self>, String> {
        let kind = TaskStoreKind::from_str(&config.task_store);
        let store: Arc<dyn TaskStore> =
            Arc::from(create_task_store(kind, config.data_dir.clone()).await?);
        tracing::info!(?kind, persistent = store.is_persistent(), "task store ready");

        let pollinations = Arc::new(PollinationsClient::new(
            config.image_base_url.clone(),
            config.text_base_url.clone(),
            config.api_key.clone(),
        ));
        let client: Arc<dyn LlmClient> = pollinations.clone();

        let knowledge = Arc::new(KnowledgeManager::new());
        let tools = Arc::new(ToolRegistry::new());

        let episodic = Arc::new(EpisodicStore::new(config.memory.clone()));
        let sri = Arc::new(SriProtocol::new(episodic, config.memory.clone()));
        let metrics = Arc::new(MetricsCollector::new());

        let timeout_config = config.timeout_config();
        let tool_timeout = timeout_config.tool_timeout;
        let (timeouts, timeout_rx) = TimeoutManager::new(timeout_config);
        let (scheduler, scheduler_rx) =
            ConcurrentTaskManager::new(timeouts, timeout_rx, config.max_concurrent_tasks);

        let workspace = config.data_dir.join("workspace");
        tokio::fs::create_dir_all(&workspace)
            .await
            .map_err(|e| format!("Failed to create workspace dir: {}", e))?;

        let worker = Arc::new(Worker::new(
            Arc::clone(&client),
            Arc::clone(&knowledge),
            Arc::clone(&tools),
            workspace,
            tool_timeout,
        ));
        let orchestrator = Orchestrator::new(
            Arc::clone(&store),
            scheduler,
            scheduler_rx,
            worker,
            config.max_task_depth,
            config.max_retries,
        );

        let forge = ForgeOrchestrator::new(
            client,
            Arc::clone(&tools),
            Arc::clone(&store),
            &config.data_dir,
        )
        .await?;

        Ok(Arc::new(Self {
            config,
            store,
            orchestrator,
            knowledge,
            tools,
            sri,
            metrics,
            forge,
            pollinations,
        }))
    }
}

/// Start the HTTP server and block until shutdown.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let state = AppState::initialize(config)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    let addr = format!("{}:{}", state.config.host, state.config.port);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Flui API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/v1/tasks", post(tasks::create_task).get(tasks::list_tasks))
        .route("/v1/tasks/:id", get(tasks::get_task))
        .route("/v1/tasks/:id/status", get(tasks::get_task_status))
        .route("/v1/tasks/:id/execute", post(tasks::execute_task))
        .route("/v1/tasks/:id/delegate", post(tasks::delegate_task))
        .route("/v1/tasks/:id/retry", post(tasks::retry_task))
        .route("/v1/tasks/:id/cancel", post(tasks::cancel_task))
        .route("/v1/tasks/:id/events", get(tasks::get_task_events))
        .route("/v1/stream/:id", get(tasks::stream_task))
        .route("/v1/queue", get(tasks::queue_status))
        .route("/v1/tools", get(list_tools))
        .route(
            "/v1/knowledge",
            post(knowledge::create_source).get(knowledge::list_sources),
        )
        .route("/v1/knowledge/active", get(knowledge::active_sources))
        .route("/v1/knowledge/contextual", post(knowledge::contextual_knowledge))
        .route("/v1/knowledge/search/:query", get(knowledge::search_sources))
        .route(
            "/v1/knowledge/:id",
            get(knowledge::get_source)
                .put(knowledge::update_source)
                .delete(knowledge::delete_source),
        )
        .route("/v1/memory/stats", get(memory::memory_stats))
        .route("/v1/memory/clear", post(memory::clear_memory))
        .route("/v1/memory/optimize", post(memory::optimize_context))
        .route("/v1/analytics/performance", get(memory::performance_summary))
        .route("/v1/analytics/metrics", get(memory::metrics_range))
        .route("/v1/analytics/alerts", get(memory::list_alerts))
        .route("/v1/analytics/agents", get(memory::agent_metrics))
        .route("/v1/forge/process-input", post(forge::process_input))
        .route("/v1/forge/process-answers", post(forge::process_answers))
        .route("/v1/forge/create-project", post(forge::create_project))
        .route("/v1/forge/interactive-message", post(forge::interactive_message))
        .route("/v1/forge/projects", get(forge::list_projects))
        .route("/v1/forge/project/:id", get(forge::get_project))
        .route("/v1/forge/modification/:id", get(forge::get_modification))
        .route("/v1/forge/conversation/:user_id", get(forge::get_conversation))
        .route("/v1/images/generations", post(media::generate_images))
        .route("/v1/chat/completions", post(media::chat_completions))
        .route("/v1/audio/speech", post(media::audio_speech))
        .route("/v1/models", get(media::list_models))
        .route("/v1/models/:id", get(media::get_model))
        .route("/v1/media/health", get(media::media_health))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

async fn index() -> Json<Value> {
    Json(json!({
        "service": "flui",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "tasks": "/v1/tasks",
            "stream": "/v1/stream/:id",
            "queue": "/v1/queue",
            "tools": "/v1/tools",
            "knowledge": "/v1/knowledge",
            "memory": "/v1/memory/stats",
            "analytics": "/v1/analytics/performance",
            "forge": "/v1/forge/projects",
            "images": "/v1/images/generations",
            "chat": "/v1/chat/completions",
            "audio": "/v1/audio/speech",
            "models": "/v1/models",
        },
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let store_healthy = state.store.health_check().await.is_ok();
    let queue = state.orchestrator.queue_status().await;
    ok(json!({
        "status": if store_healthy { "ok" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "store": {
            "kind": state.config.task_store,
            "persistent": state.store.is_persistent(),
            "healthy": store_healthy,
        },
        "queue": queue,
        "limits": {
            "max_task_depth": state.config.max_task_depth,
            "max_retries": state.config.max_retries,
            "max_concurrent_tasks": state.config.max_concurrent_tasks,
            "task_timeout_ms": state.config.task_timeout_ms,
        },
        "timestamp": Utc::now(),
    }))
}

async fn list_tools(State(state): State<Arc<AppState>>) -> Json<Value> {
    let tools = state.tools.list_tools();
    ok(json!({ "tools": tools, "count": tools.len() }))
}

async fn not_found() -> (StatusCode, Json<Value>) {
    fail(StatusCode::NOT_FOUND, "Route not found")
}

pub(crate) type ApiResult<T> = Result<T, (StatusCode, Json<Value>)>;

pub(crate) fn ok(data: Value) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

pub(crate) fn fail(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({ "success": false, "error": message.into() })),
    )
}

pub(crate) fn orchestrator_error(err: OrchestratorError) -> (StatusCode, Json<Value>) {
    let status = match err {
        OrchestratorError::TaskNotFound(_) => StatusCode::NOT_FOUND,
        OrchestratorError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    fail(status, err.to_string())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    use async_trait::async_trait;
    use bytes::Bytes;
    use tempfile::TempDir;

    use crate::llm::{
        ChatMessage, ChatOptions, ChatResponse, ImageOptions, LlmError, TextOptions,
    };
    use crate::task::InMemoryTaskStore;

    pub(crate) struct StubClient;

    #[async_trait]
    impl LlmClient for StubClient {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _options: ChatOptions,
        ) -> Result<ChatResponse, LlmError> {
            Ok(ChatResponse {
                content: "stub reply".to_string(),
                finish_reason: None,
                model: None,
                usage: None,
            })
        }

        async fn generate_text(&self, _: &str, _: &TextOptions) -> Result<String, LlmError> {
            Ok("stub text".to_string())
        }

        async fn generate_image(&self, _: &str, _: &ImageOptions) -> Result<Bytes, LlmError> {
            Ok(Bytes::from_static(b"img"))
        }

        async fn generate_audio(&self, _: &str, _: &str) -> Result<Bytes, LlmError> {
            Ok(Bytes::from_static(b"aud"))
        }
    }

    /// A fully wired state over an in-memory store and a stubbed LLM. The
    /// Pollinations client points at an unroutable address, so only handlers
    /// that never reach upstream are testable through it.
    pub(crate) async fn test_state() -> (TempDir, Arc<AppState>) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf());

        let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
        let client: Arc<dyn LlmClient> = Arc::new(StubClient);
        let pollinations = Arc::new(PollinationsClient::new(
            "http://127.0.0.1:9".to_string(),
            "http://127.0.0.1:9".to_string(),
            None,
        ));

        let knowledge = Arc::new(KnowledgeManager::new());
        let tools = Arc::new(ToolRegistry::new());
        let episodic = Arc::new(EpisodicStore::new(config.memory.clone()));
        let sri = Arc::new(SriProtocol::new(episodic, config.memory.clone()));
        let metrics = Arc::new(MetricsCollector::new());

        let timeout_config = config.timeout_config();
        let (timeouts, timeout_rx) = TimeoutManager::new(timeout_config);
        let (scheduler, scheduler_rx) =
            ConcurrentTaskManager::new(timeouts, timeout_rx, config.max_concurrent_tasks);

        let worker = Arc::new(Worker::new(
            Arc::clone(&client),
            Arc::clone(&knowledge),
            Arc::clone(&tools),
            dir.path().join("workspace"),
            std::time::Duration::from_secs(5),
        ));
        let orchestrator = Orchestrator::new(
            Arc::clone(&store),
            scheduler,
            scheduler_rx,
            worker,
            config.max_task_depth,
            config.max_retries,
        );

        let forge = ForgeOrchestrator::new(
            client,
            Arc::clone(&tools),
            Arc::clone(&store),
            dir.path(),
        )
        .await
        .unwrap();

        let state = Arc::new(AppState {
            config,
            store,
            orchestrator,
            knowledge,
            tools,
            sri,
            metrics,
            forge,
            pollinations,
        });
        (dir, state)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::test_state;
    use super::*;

    #[tokio::test]
    async fn health_reports_store_and_queue() {
        let (_dir, state) = test_state().await;
        let Json(body) = health(State(state)).await;

        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"]["status"], json!("ok"));
        assert_eq!(body["data"]["store"]["persistent"], json!(false));
        assert_eq!(body["data"]["queue"]["active"], json!(0));
        assert_eq!(body["data"]["limits"]["max_retries"], json!(3));
    }

    #[tokio::test]
    async fn index_lists_endpoint_groups() {
        let Json(body) = index().await;
        assert_eq!(body["service"], json!("flui"));
        assert_eq!(body["endpoints"]["tasks"], json!("/v1/tasks"));
    }

    #[tokio::test]
    async fn tools_listing_is_enveloped() {
        let (_dir, state) = test_state().await;
        let Json(body) = list_tools(State(state)).await;

        assert_eq!(body["success"], json!(true));
        assert!(body["data"]["count"].as_u64().unwrap() >= 4);
        let names: Vec<&str> = body["data"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"write_file"));
        assert!(names.contains(&"run_command"));
    }

    #[tokio::test]
    async fn fallback_is_json() {
        let (status, Json(body)) = not_found().await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], json!(false));
    }

    #[test]
    fn orchestrator_errors_map_to_status_codes() {
        let (status, _) = orchestrator_error(OrchestratorError::TaskNotFound(uuid::Uuid::new_v4()));
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, Json(body)) = orchestrator_error(OrchestratorError::Store("disk".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], json!("store error: disk"));
    }
}
