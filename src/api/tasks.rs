//! Task pipeline endpoints.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, Sse},
        Json,
    },
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::task::{TaskFilter, TaskResult};

use super::routes::{fail, ok, orchestrator_error, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub prompt: Option<String>,
    pub metadata: Option<Value>,
}

pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let prompt = match req.prompt.as_deref().map(str::trim) {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => return Err(fail(StatusCode::BAD_REQUEST, "Prompt is required")),
    };

    let task = state
        .orchestrator
        .create_task(&prompt, req.metadata)
        .await
        .map_err(orchestrator_error)?;
    Ok((StatusCode::CREATED, ok(json!(task))))
}

pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<TaskFilter>,
) -> ApiResult<Json<Value>> {
    let tasks = state
        .orchestrator
        .list_tasks(&filter)
        .await
        .map_err(orchestrator_error)?;
    Ok(ok(json!({
        "tasks": tasks,
        "count": tasks.len(),
        "filter": {
            "status": filter.status,
            "type": filter.task_type,
            "depth": filter.depth,
        },
    })))
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    match state
        .orchestrator
        .get_task(id)
        .await
        .map_err(orchestrator_error)?
    {
        Some(task) => Ok(ok(json!(task))),
        None => Err(fail(
            StatusCode::NOT_FOUND,
            format!("Task {} not found", id),
        )),
    }
}

pub async fn get_task_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let report = state
        .orchestrator
        .get_task_status(id)
        .await
        .map_err(orchestrator_error)?;
    Ok(ok(json!(report)))
}

/// Execution results are already `{success, data|error}` shaped, so they go
/// out as the response body unchanged.
pub async fn execute_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let result = state
        .orchestrator
        .execute_task(id)
        .await
        .map_err(orchestrator_error)?;
    record_memory(&state, id, &result).await;
    Ok(Json(json!(result)))
}

pub async fn delegate_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let result = state
        .orchestrator
        .delegate_task(id)
        .await
        .map_err(orchestrator_error)?;
    Ok(Json(json!(result)))
}

pub async fn retry_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let result = state
        .orchestrator
        .retry_task(id)
        .await
        .map_err(orchestrator_error)?;
    record_memory(&state, id, &result).await;
    Ok(Json(json!(result)))
}

pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let task = state
        .orchestrator
        .cancel_task(id)
        .await
        .map_err(orchestrator_error)?;
    Ok(ok(json!(task)))
}

pub async fn get_task_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    if state
        .orchestrator
        .get_task(id)
        .await
        .map_err(orchestrator_error)?
        .is_none()
    {
        return Err(fail(
            StatusCode::NOT_FOUND,
            format!("Task {} not found", id),
        ));
    }

    let events = state
        .orchestrator
        .get_task_events(id)
        .await
        .map_err(orchestrator_error)?;
    Ok(ok(json!({ "events": events, "count": events.len() })))
}

pub async fn queue_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    ok(json!(state.orchestrator.queue_status().await))
}

/// SSE stream for one task: a `connected` event, the historical event log,
/// a `stream_start` marker, then new events polled from the log until the
/// task reaches a terminal status and `stream_end` closes the stream.
pub async fn stream_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    if state
        .orchestrator
        .get_task(id)
        .await
        .map_err(orchestrator_error)?
        .is_none()
    {
        return Err(fail(
            StatusCode::NOT_FOUND,
            format!("Task {} not found", id),
        ));
    }

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("connected")
            .json_data(json!({ "task_id": id }))
            .unwrap());

        let mut seen = 0;
        if let Ok(events) = state.orchestrator.get_task_events(id).await {
            for event in &events {
                yield Ok(Event::default()
                    .event(&event.event_type)
                    .json_data(event)
                    .unwrap());
            }
            seen = events.len();
        }

        yield Ok(Event::default()
            .event("stream_start")
            .json_data(json!({ "task_id": id }))
            .unwrap());

        loop {
            if let Ok(events) = state.orchestrator.get_task_events(id).await {
                for event in events.iter().skip(seen) {
                    yield Ok(Event::default()
                        .event(&event.event_type)
                        .json_data(event)
                        .unwrap());
                }
                seen = seen.max(events.len());
            }

            match state.orchestrator.get_task(id).await {
                Ok(Some(task)) if task.is_terminal() => {
                    yield Ok(Event::default()
                        .event("stream_end")
                        .json_data(json!({ "task_id": id, "status": task.status }))
                        .unwrap());
                    break;
                }
                Ok(Some(_)) => {}
                _ => break,
            }

            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    };

    Ok(Sse::new(stream))
}

/// Feed an execution outcome into episodic memory. The task prompt is the
/// memory context; missing tasks are skipped silently.
async fn record_memory(state: &AppState, id: Uuid, result: &TaskResult) {
    if let Ok(Some(task)) = state.orchestrator.get_task(id).await {
        state
            .sri
            .record_outcome(&id.to_string(), &task.prompt, result)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::testing::test_state;
    use crate::task::TaskStatus;

    async fn create(state: &Arc<AppState>, prompt: &str) -> Uuid {
        let (status, Json(body)) = create_task(
            State(Arc::clone(state)),
            Json(CreateTaskRequest {
                prompt: Some(prompt.to_string()),
                metadata: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        serde_json::from_value(body["data"]["id"].clone()).unwrap()
    }

    #[tokio::test]
    async fn create_requires_a_prompt() {
        let (_dir, state) = test_state().await;

        let (status, Json(body)) = create_task(
            State(Arc::clone(&state)),
            Json(CreateTaskRequest {
                prompt: None,
                metadata: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));

        let (status, _) = create_task(
            State(state),
            Json(CreateTaskRequest {
                prompt: Some("   ".to_string()),
                metadata: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_and_fetch_roundtrip() {
        let (_dir, state) = test_state().await;
        let id = create(&state, "Hello there").await;

        let Json(body) = get_task(State(state), Path(id)).await.unwrap();
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"]["prompt"], json!("Hello there"));
        assert_eq!(body["data"]["type"], json!("conversation"));
        assert_eq!(body["data"]["status"], json!("pending"));
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let (_dir, state) = test_state().await;
        let id = Uuid::new_v4();

        let (status, _) = get_task(State(Arc::clone(&state)), Path(id)).await.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = execute_task(State(Arc::clone(&state)), Path(id))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = get_task_events(State(state), Path(id)).await.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn execute_returns_the_result_envelope() {
        let (_dir, state) = test_state().await;
        let id = create(&state, "Hello there").await;

        let Json(body) = execute_task(State(Arc::clone(&state)), Path(id))
            .await
            .unwrap();
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"], json!("stub reply"));

        let Json(status) = get_task_status(State(state), Path(id)).await.unwrap();
        assert_eq!(status["data"]["progress"], json!(100));
        assert_eq!(status["data"]["status"], json!("completed"));
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let (_dir, state) = test_state().await;
        let done = create(&state, "Hello there").await;
        create(&state, "Another greeting").await;
        execute_task(State(Arc::clone(&state)), Path(done))
            .await
            .unwrap();

        let filter = TaskFilter {
            status: Some(TaskStatus::Completed),
            ..Default::default()
        };
        let Json(body) = list_tasks(State(state), Query(filter)).await.unwrap();
        assert_eq!(body["data"]["count"], json!(1));
        assert_eq!(body["data"]["filter"]["status"], json!("completed"));
        assert_eq!(body["data"]["tasks"][0]["id"], json!(done));
    }

    #[tokio::test]
    async fn cancel_marks_the_task_failed() {
        let (_dir, state) = test_state().await;
        let id = create(&state, "Hello there").await;

        let Json(body) = cancel_task(State(state), Path(id)).await.unwrap();
        assert_eq!(body["data"]["status"], json!("failed"));
        assert_eq!(body["data"]["error"], json!("cancelled"));
    }

    #[tokio::test]
    async fn event_log_covers_the_execution() {
        let (_dir, state) = test_state().await;
        let id = create(&state, "Hello there").await;
        execute_task(State(Arc::clone(&state)), Path(id))
            .await
            .unwrap();

        let Json(body) = get_task_events(State(state), Path(id)).await.unwrap();
        let types: Vec<&str> = body["data"]["events"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["event_type"].as_str().unwrap())
            .collect();
        assert!(types.contains(&"task_created"));
        assert!(types.contains(&"task_started"));
        assert!(types.contains(&"task_completed"));
    }

    #[tokio::test]
    async fn queue_reports_capacity() {
        let (_dir, state) = test_state().await;
        let Json(body) = queue_status(State(state)).await;
        assert_eq!(body["data"]["max_concurrent"], json!(3));
        assert_eq!(body["data"]["queued"], json!(0));
    }
}
