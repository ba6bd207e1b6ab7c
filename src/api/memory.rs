//! Episodic memory and analytics endpoints.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::llm::ChatMessage;
use crate::memory::TimeRange;

use super::routes::{fail, ok, ApiResult, AppState};

/// Store statistics plus the collector's running average reduction.
pub async fn memory_stats(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mut stats = json!(state.sri.stats().await);
    stats["token_reduction"] = json!(state.metrics.performance().await.average_reduction);
    ok(stats)
}

pub async fn clear_memory(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.sri.clear().await;
    ok(json!({ "cleared": true }))
}

#[derive(Debug, Deserialize)]
pub struct OptimizeRequest {
    pub messages: Vec<ChatMessage>,
    pub task_id: Option<String>,
    pub agent_id: Option<String>,
}

/// Run strip/recall/inject over a conversation and record the outcome in
/// the metrics collector.
pub async fn optimize_context(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OptimizeRequest>,
) -> ApiResult<Json<Value>> {
    if req.messages.is_empty() {
        return Err(fail(
            StatusCode::BAD_REQUEST,
            "At least one message is required",
        ));
    }

    let task_id = req.task_id.as_deref().unwrap_or("adhoc");
    let result = state
        .sri
        .optimize_context(req.agent_id.as_deref(), &req.messages, task_id)
        .await;
    state
        .metrics
        .record(&result, task_id, req.agent_id.as_deref())
        .await;
    Ok(ok(json!(result)))
}

pub async fn performance_summary(State(state): State<Arc<AppState>>) -> Json<Value> {
    ok(json!(state.metrics.performance().await))
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub time_range: Option<String>,
}

pub async fn metrics_range(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<Value>> {
    let raw = query.time_range.as_deref().unwrap_or("24h");
    let Some(range) = TimeRange::parse(raw) else {
        return Err(fail(
            StatusCode::BAD_REQUEST,
            format!("Invalid time_range '{}', expected 1h|24h|7d|30d", raw),
        ));
    };

    let records = state.metrics.for_range(range).await;
    Ok(ok(json!({
        "time_range": raw,
        "metrics": records,
        "count": records.len(),
    })))
}

pub async fn list_alerts(State(state): State<Arc<AppState>>) -> Json<Value> {
    let alerts = state.metrics.alerts().await;
    ok(json!({ "alerts": alerts, "count": alerts.len() }))
}

#[derive(Debug, Deserialize)]
pub struct AgentQuery {
    pub agent_id: Option<String>,
}

/// Per-agent records when `agent_id` is given, otherwise the ranked agent
/// summary.
pub async fn agent_metrics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AgentQuery>,
) -> Json<Value> {
    match query.agent_id.as_deref() {
        Some(agent_id) => {
            let records = state.metrics.for_agent(agent_id).await;
            ok(json!({
                "agent_id": agent_id,
                "metrics": records,
                "count": records.len(),
            }))
        }
        None => {
            let summary = state.metrics.performance().await;
            ok(json!({ "agents": summary.top_agents }))
        }
    }
}
