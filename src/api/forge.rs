//! CodeForge project builder endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::forge::Intent;

use super::routes::{fail, ok, ApiResult, AppState};

fn user_or_default(user_id: &Option<String>) -> &str {
    user_id
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or("default")
}

#[derive(Debug, Deserialize)]
pub struct ProcessInputRequest {
    pub input: Option<String>,
    pub user_id: Option<String>,
}

pub async fn process_input(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProcessInputRequest>,
) -> ApiResult<Json<Value>> {
    let Some(input) = req.input.as_deref().map(str::trim).filter(|i| !i.is_empty()) else {
        return Err(fail(StatusCode::BAD_REQUEST, "Input is required"));
    };

    let result = state
        .forge
        .process_input(input, user_or_default(&req.user_id))
        .await;
    Ok(ok(json!(result)))
}

#[derive(Debug, Deserialize)]
pub struct ProcessAnswersRequest {
    pub answers: Option<Map<String, Value>>,
    pub user_id: Option<String>,
}

pub async fn process_answers(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProcessAnswersRequest>,
) -> ApiResult<Json<Value>> {
    let Some(answers) = req.answers.as_ref().filter(|a| !a.is_empty()) else {
        return Err(fail(StatusCode::BAD_REQUEST, "Answers are required"));
    };

    let result = state
        .forge
        .process_answers(answers, user_or_default(&req.user_id))
        .await;
    Ok(ok(json!(result)))
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub intent: Intent,
    pub user_id: Option<String>,
}

pub async fn create_project(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let project = state
        .forge
        .create_project(req.intent, user_or_default(&req.user_id))
        .await
        .map_err(|e| fail(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    Ok((StatusCode::CREATED, ok(json!(project))))
}

#[derive(Debug, Deserialize)]
pub struct InteractiveMessageRequest {
    pub message: Option<String>,
    pub user_id: Option<String>,
}

/// The reply carries its own `{success, response, ...}` shape, so it is the
/// response body unchanged.
pub async fn interactive_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InteractiveMessageRequest>,
) -> ApiResult<Json<Value>> {
    let Some(message) = req
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
    else {
        return Err(fail(StatusCode::BAD_REQUEST, "Message is required"));
    };

    let reply = state
        .forge
        .interactive_message(message, user_or_default(&req.user_id))
        .await;
    Ok(Json(json!(reply)))
}

pub async fn list_projects(State(state): State<Arc<AppState>>) -> Json<Value> {
    let projects = state.forge.list_projects().await;
    ok(json!({ "projects": projects, "count": projects.len() }))
}

pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    match state.forge.get_project(id).await {
        Some(project) => Ok(ok(json!(project))),
        None => Err(fail(
            StatusCode::NOT_FOUND,
            format!("Project {} not found", id),
        )),
    }
}

pub async fn get_modification(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    match state.forge.get_modification(id).await {
        Some(modification) => Ok(ok(json!(modification))),
        None => Err(fail(
            StatusCode::NOT_FOUND,
            format!("Modification {} not found", id),
        )),
    }
}

pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Value>> {
    match state.forge.get_conversation(&user_id).await {
        Some(context) => Ok(ok(json!(context))),
        None => Err(fail(
            StatusCode::NOT_FOUND,
            format!("No conversation for user {}", user_id),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::testing::test_state;

    #[tokio::test]
    async fn process_input_requires_input() {
        let (_dir, state) = test_state().await;
        let (status, _) = process_input(
            State(state),
            Json(ProcessInputRequest {
                input: None,
                user_id: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn process_input_then_read_conversation() {
        let (_dir, state) = test_state().await;
        let Json(body) = process_input(
            State(Arc::clone(&state)),
            Json(ProcessInputRequest {
                input: Some("build a react website".to_string()),
                user_id: Some("alice".to_string()),
            }),
        )
        .await
        .unwrap();

        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"]["intent"]["domain"], json!("frontend"));

        let Json(convo) = get_conversation(State(Arc::clone(&state)), Path("alice".to_string()))
            .await
            .unwrap();
        assert_eq!(convo["data"]["user_id"], json!("alice"));
        assert_eq!(convo["data"]["history"].as_array().unwrap().len(), 1);

        let (status, _) = get_conversation(State(state), Path("nobody".to_string()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn process_answers_requires_answers() {
        let (_dir, state) = test_state().await;
        let (status, _) = process_answers(
            State(state),
            Json(ProcessAnswersRequest {
                answers: Some(Map::new()),
                user_id: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_project_and_fetch_it() {
        let (_dir, state) = test_state().await;

        let intent = Intent {
            domain: "frontend".to_string(),
            technology: Some("react".to_string()),
            language: Some("typescript".to_string()),
            framework: None,
            purpose: None,
            complexity: None,
            features: vec![],
            requirements: vec![],
        };
        let (status, Json(body)) = create_project(
            State(Arc::clone(&state)),
            Json(CreateProjectRequest {
                intent,
                user_id: Some("alice".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["name"], json!("react-project"));
        assert_eq!(body["data"]["status"], json!("ready"));

        let id: Uuid = serde_json::from_value(body["data"]["id"].clone()).unwrap();
        let Json(fetched) = get_project(State(Arc::clone(&state)), Path(id)).await.unwrap();
        assert_eq!(fetched["data"]["id"], json!(id));

        let Json(listing) = list_projects(State(state)).await;
        assert_eq!(listing["data"]["count"], json!(1));
    }

    #[tokio::test]
    async fn interactive_message_tracks_modifications() {
        let (_dir, state) = test_state().await;

        let intent = Intent {
            domain: "frontend".to_string(),
            technology: Some("react".to_string()),
            language: None,
            framework: None,
            purpose: None,
            complexity: None,
            features: vec![],
            requirements: vec![],
        };
        create_project(
            State(Arc::clone(&state)),
            Json(CreateProjectRequest {
                intent,
                user_id: Some("bob".to_string()),
            }),
        )
        .await
        .unwrap();

        let Json(reply) = interactive_message(
            State(Arc::clone(&state)),
            Json(InteractiveMessageRequest {
                message: Some("please add a dark mode toggle".to_string()),
                user_id: Some("bob".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(reply["success"], json!(true));
        assert_eq!(reply["modification"]["type"], json!("add_feature"));

        let modification_id: Uuid =
            serde_json::from_value(reply["modification"]["id"].clone()).unwrap();
        let Json(fetched) = get_modification(State(state), Path(modification_id))
            .await
            .unwrap();
        assert_eq!(fetched["data"]["status"], json!("pending"));
    }

    #[tokio::test]
    async fn unknown_project_is_not_found() {
        let (_dir, state) = test_state().await;
        let (status, _) = get_project(State(state), Path(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
