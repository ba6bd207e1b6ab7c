//! OpenAI-compatible media gateway backed by Pollinations.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Json, Response,
    },
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::llm::{ImageOptions, LlmClient, LlmError, ModelScope};

use super::routes::{fail, ApiResult, AppState};

const ALLOWED_SIZES: [&str; 5] = ["256x256", "512x512", "1024x1024", "1792x1024", "1024x1792"];
const VOICES: [&str; 6] = ["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

#[derive(Debug, Deserialize)]
pub struct ImageGenerationRequest {
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub n: Option<u32>,
    pub size: Option<String>,
    pub quality: Option<String>,
    pub seed: Option<u64>,
}

pub async fn generate_images(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ImageGenerationRequest>,
) -> ApiResult<Json<Value>> {
    let Some(prompt) = req.prompt.as_deref().map(str::trim).filter(|p| !p.is_empty()) else {
        return Err(fail(StatusCode::BAD_REQUEST, "Prompt is required"));
    };
    if req.n.unwrap_or(1) != 1 {
        return Err(fail(StatusCode::BAD_REQUEST, "Only n=1 is supported"));
    }

    let size = req.size.as_deref().unwrap_or("1024x1024");
    let Some((width, height)) = parse_size(size) else {
        return Err(fail(
            StatusCode::BAD_REQUEST,
            format!(
                "Unsupported size '{}', expected one of {}",
                size,
                ALLOWED_SIZES.join(", ")
            ),
        ));
    };

    let options = ImageOptions {
        width: Some(width),
        height: Some(height),
        model: Some(map_image_model(req.model.as_deref())),
        seed: req.seed,
        nologo: true,
        enhance: matches!(req.quality.as_deref(), Some("hd")),
    };
    let bytes = state
        .pollinations
        .generate_image(prompt, &options)
        .await
        .map_err(gateway_error)?;

    Ok(Json(json!({
        "created": Utc::now().timestamp(),
        "data": [{
            "url": format!("data:image/jpeg;base64,{}", BASE64.encode(&bytes)),
            "revised_prompt": prompt,
        }],
    })))
}

/// Proxies the OpenAI-shaped body upstream with the model name rewritten.
/// Non-stream responses pass through unchanged; `stream: true` replays the
/// completed response in the streaming wire shape.
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    Json(mut body): Json<Value>,
) -> ApiResult<Response> {
    let has_messages = body
        .get("messages")
        .and_then(Value::as_array)
        .map(|m| !m.is_empty())
        .unwrap_or(false);
    if !has_messages {
        return Err(fail(StatusCode::BAD_REQUEST, "messages is required"));
    }
    let Some(requested) = body.get("model").and_then(Value::as_str).map(str::to_string) else {
        return Err(fail(StatusCode::BAD_REQUEST, "model is required"));
    };

    let stream = body.get("stream").and_then(Value::as_bool).unwrap_or(false);
    if let Some(obj) = body.as_object_mut() {
        obj.insert("model".to_string(), json!(map_chat_model(&requested)));
        obj.remove("stream");
    }

    let response = state
        .pollinations
        .chat_raw(&body)
        .await
        .map_err(gateway_error)?;

    if stream {
        Ok(replay_as_sse(response).into_response())
    } else {
        Ok(Json(response).into_response())
    }
}

fn replay_as_sse(response: Value) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        yield Ok(Event::default().data(response.to_string()));
        yield Ok(Event::default().data("[DONE]"));
    };
    Sse::new(stream)
}

#[derive(Debug, Deserialize)]
pub struct SpeechRequest {
    pub input: Option<String>,
    pub text: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
}

pub async fn audio_speech(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SpeechRequest>,
) -> ApiResult<Response> {
    let text = req
        .input
        .as_deref()
        .or(req.text.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty());
    let Some(text) = text else {
        return Err(fail(StatusCode::BAD_REQUEST, "input text is required"));
    };
    if req
        .model
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .is_none()
    {
        return Err(fail(StatusCode::BAD_REQUEST, "model is required"));
    }

    let voice = req.voice.as_deref().unwrap_or("alloy");
    if !VOICES.contains(&voice) {
        return Err(fail(
            StatusCode::BAD_REQUEST,
            format!("Unknown voice '{}', expected one of {}", voice, VOICES.join(", ")),
        ));
    }

    let bytes = state
        .pollinations
        .generate_audio(text, voice)
        .await
        .map_err(gateway_error)?;
    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], bytes).into_response())
}

#[derive(Debug, Deserialize)]
pub struct ModelsQuery {
    #[serde(rename = "type")]
    pub scope: Option<String>,
}

pub async fn list_models(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ModelsQuery>,
) -> ApiResult<Json<Value>> {
    let ids = match query.scope.as_deref() {
        Some("image") => scoped_ids(&state, ModelScope::Image).await?,
        Some("text") => scoped_ids(&state, ModelScope::Text).await?,
        Some(other) => {
            return Err(fail(
                StatusCode::BAD_REQUEST,
                format!("Unknown model type '{}', expected image or text", other),
            ))
        }
        None => {
            let mut ids = scoped_ids(&state, ModelScope::Text).await?;
            ids.extend(scoped_ids(&state, ModelScope::Image).await?);
            ids
        }
    };

    let data: Vec<Value> = ids.iter().map(|id| model_entry(id)).collect();
    Ok(Json(json!({ "object": "list", "data": data })))
}

pub async fn get_model(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let mut ids = scoped_ids(&state, ModelScope::Text).await?;
    ids.extend(scoped_ids(&state, ModelScope::Image).await?);

    if ids.iter().any(|known| known == &id) {
        Ok(Json(model_entry(&id)))
    } else {
        Err((
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "error": format!("The model '{}' does not exist", id),
                "code": "model_not_found",
            })),
        ))
    }
}

pub async fn media_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!(state.pollinations.health().await))
}

async fn scoped_ids(
    state: &AppState,
    scope: ModelScope,
) -> Result<Vec<String>, (StatusCode, Json<Value>)> {
    let listing = state
        .pollinations
        .list_models(scope)
        .await
        .map_err(gateway_error)?;
    Ok(model_ids(&listing))
}

/// Upstream listings are either arrays of id strings or arrays of objects
/// carrying a `name`.
fn model_ids(listing: &Value) -> Vec<String> {
    listing
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| match entry {
                    Value::String(name) => Some(name.clone()),
                    Value::Object(obj) => {
                        obj.get("name").and_then(Value::as_str).map(str::to_string)
                    }
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn model_entry(id: &str) -> Value {
    json!({
        "id": id,
        "object": "model",
        "created": Utc::now().timestamp(),
        "owned_by": "pollinations",
    })
}

fn parse_size(size: &str) -> Option<(u32, u32)> {
    if !ALLOWED_SIZES.contains(&size) {
        return None;
    }
    let (w, h) = size.split_once('x')?;
    Some((w.parse().ok()?, h.parse().ok()?))
}

fn map_image_model(model: Option<&str>) -> String {
    match model {
        Some(m) if m.starts_with("dall-e") => "flux".to_string(),
        Some(m) => m.to_string(),
        None => "flux".to_string(),
    }
}

fn map_chat_model(requested: &str) -> &'static str {
    if requested.starts_with("gpt-") {
        "openai"
    } else if requested.starts_with("claude-3") {
        "claude-hybridspace"
    } else if requested.contains("mistral") {
        "mistral"
    } else {
        "openai"
    }
}

fn gateway_error(err: LlmError) -> (StatusCode, Json<Value>) {
    let status = StatusCode::from_u16(err.gateway_status()).unwrap_or(StatusCode::BAD_GATEWAY);
    fail(status, err.to_string())
}
