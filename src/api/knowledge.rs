//! Knowledge source endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::knowledge::{CreateKnowledgeRequest, UpdateKnowledgeRequest};

use super::routes::{fail, ok, ApiResult, AppState};

pub async fn create_source(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateKnowledgeRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    if req.title.trim().is_empty() || req.content.trim().is_empty() {
        return Err(fail(
            StatusCode::BAD_REQUEST,
            "Title and content are required",
        ));
    }
    let source = state.knowledge.create(req).await;
    Ok((StatusCode::CREATED, ok(json!(source))))
}

pub async fn list_sources(State(state): State<Arc<AppState>>) -> Json<Value> {
    let sources = state.knowledge.list().await;
    ok(json!({ "sources": sources, "count": sources.len() }))
}

pub async fn active_sources(State(state): State<Arc<AppState>>) -> Json<Value> {
    let sources = state.knowledge.active().await;
    ok(json!({ "sources": sources, "count": sources.len() }))
}

pub async fn get_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    match state.knowledge.get(id).await {
        Some(source) => Ok(ok(json!(source))),
        None => Err(not_found(id)),
    }
}

pub async fn update_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateKnowledgeRequest>,
) -> ApiResult<Json<Value>> {
    match state.knowledge.update(id, req).await {
        Some(source) => Ok(ok(json!(source))),
        None => Err(not_found(id)),
    }
}

pub async fn delete_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    if state.knowledge.delete(id).await {
        Ok(ok(json!({ "deleted": true, "id": id })))
    } else {
        Err(not_found(id))
    }
}

pub async fn search_sources(
    State(state): State<Arc<AppState>>,
    Path(query): Path<String>,
) -> Json<Value> {
    let results = state.knowledge.search(&query).await;
    ok(json!({ "query": query, "results": results, "count": results.len() }))
}

#[derive(Debug, Deserialize)]
pub struct ContextualRequest {
    pub prompt: String,
    pub max_sources: Option<usize>,
}

pub async fn contextual_knowledge(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ContextualRequest>,
) -> ApiResult<Json<Value>> {
    if req.prompt.trim().is_empty() {
        return Err(fail(StatusCode::BAD_REQUEST, "Prompt is required"));
    }
    let block = state
        .knowledge
        .contextual(&req.prompt, req.max_sources.unwrap_or(3))
        .await;
    Ok(ok(json!({ "knowledge": block })))
}

fn not_found(id: Uuid) -> (StatusCode, Json<Value>) {
    fail(
        StatusCode::NOT_FOUND,
        format!("Knowledge source {} not found", id),
    )
}
