//! Pollinations API client with automatic retry for transient errors.
//!
//! Covers the four upstream surfaces: prompt-in-URL image and text
//! generation, the OpenAI-compatible chat endpoint, and model listings.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::{classify_http_status, LlmError, LlmErrorKind, RetryConfig};
use super::{
    ChatMessage, ChatOptions, ChatResponse, ImageOptions, LlmClient, TextOptions, TokenUsage,
};

const IMAGE_TIMEOUT: Duration = Duration::from_secs(300);
const TEXT_TIMEOUT: Duration = Duration::from_secs(30);
const AUDIO_TIMEOUT: Duration = Duration::from_secs(300);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Model used by the upstream for speech synthesis.
const AUDIO_MODEL: &str = "openai-audio";
/// Chat model used when the caller does not pick one.
const DEFAULT_CHAT_MODEL: &str = "openai";

/// Which upstream base URL a model listing comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelScope {
    Image,
    Text,
}

/// Pollinations API client with automatic retry for transient errors.
pub struct PollinationsClient {
    client: Client,
    image_base: String,
    text_base: String,
    api_key: Option<String>,
    retry_config: RetryConfig,
}

impl PollinationsClient {
    /// Create a new client with default retry configuration.
    pub fn new(image_base: String, text_base: String, api_key: Option<String>) -> Self {
        Self::with_retry_config(image_base, text_base, api_key, RetryConfig::default())
    }

    /// Create a new client with custom retry configuration.
    pub fn with_retry_config(
        image_base: String,
        text_base: String,
        api_key: Option<String>,
        retry_config: RetryConfig,
    ) -> Self {
        Self {
            client: Client::new(),
            image_base: image_base.trim_end_matches('/').to_string(),
            text_base: text_base.trim_end_matches('/').to_string(),
            api_key,
            retry_config,
        }
    }

    /// Forward an OpenAI-style chat request body verbatim and return the
    /// upstream response JSON unchanged.
    pub async fn chat_raw(&self, body: &serde_json::Value) -> Result<serde_json::Value, LlmError> {
        let url = format!("{}/openai", self.text_base);

        let request = self
            .authorized(self.client.post(&url))
            .json(body)
            .timeout(TEXT_TIMEOUT);

        let response = self.send_with_retry(request).await?;
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::network_error(format!("Failed to read chat body: {}", e)))?;
        serde_json::from_str(&text)
            .map_err(|e| LlmError::parse_error(format!("Invalid chat response: {}: {}", e, text)))
    }

    /// List available models for the given scope.
    pub async fn list_models(&self, scope: ModelScope) -> Result<serde_json::Value, LlmError> {
        let base = match scope {
            ModelScope::Image => &self.image_base,
            ModelScope::Text => &self.text_base,
        };
        let url = format!("{}/models", base);

        let request = self
            .authorized(self.client.get(&url))
            .header("Accept", "application/json")
            .timeout(TEXT_TIMEOUT);

        let response = self.send_with_retry(request).await?;
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::network_error(format!("Failed to read models body: {}", e)))?;
        serde_json::from_str(&text)
            .map_err(|e| LlmError::parse_error(format!("Invalid models response: {}", e)))
    }

    /// Probe the upstream with a cheap request. Never retries and never
    /// fails; the outcome is folded into the report.
    pub async fn health(&self) -> HealthReport {
        let url = format!("{}/models", self.image_base);
        let probe = self
            .authorized(self.client.get(&url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await;

        match probe {
            Ok(response) if response.status().is_success() => HealthReport {
                ok: true,
                upstream: UpstreamStatus::Ok,
                error: None,
                timestamp: Utc::now(),
            },
            Ok(response) => HealthReport {
                ok: false,
                upstream: UpstreamStatus::Error,
                error: Some(format!("upstream returned HTTP {}", response.status())),
                timestamp: Utc::now(),
            },
            Err(e) => HealthReport {
                ok: false,
                upstream: UpstreamStatus::Error,
                error: Some(e.to_string()),
                timestamp: Utc::now(),
            },
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }

    /// Parse Retry-After header if present.
    fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
        headers
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok().map(Duration::from_secs))
    }

    /// Create an LlmError from HTTP response status and body.
    fn create_error(
        status: reqwest::StatusCode,
        body: &str,
        retry_after: Option<Duration>,
    ) -> LlmError {
        let status_code = status.as_u16();
        match classify_http_status(status_code) {
            LlmErrorKind::RateLimited => LlmError::rate_limited(body.to_string(), retry_after),
            LlmErrorKind::ServerError => LlmError::server_error(status_code, body.to_string()),
            LlmErrorKind::ClientError => LlmError::client_error(status_code, body.to_string()),
            _ => LlmError::server_error(status_code, body.to_string()),
        }
    }

    /// Execute a single request without retry.
    async fn dispatch(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, LlmError> {
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                if e.is_timeout() {
                    return Err(LlmError::network_error(format!("Request timeout: {}", e)));
                } else if e.is_connect() {
                    return Err(LlmError::network_error(format!("Connection failed: {}", e)));
                } else {
                    return Err(LlmError::network_error(format!("Request failed: {}", e)));
                }
            }
        };

        let status = response.status();
        if !status.is_success() {
            let retry_after = Self::parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(Self::create_error(status, &body, retry_after));
        }

        Ok(response)
    }

    /// Execute a request with automatic retry for transient errors.
    ///
    /// Only server-side (5xx) and network failures are retried; client
    /// errors and rate limits go straight back to the caller.
    async fn send_with_retry(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, LlmError> {
        let mut attempt = 0u32;

        loop {
            let this_try = request.try_clone().ok_or_else(|| {
                LlmError::network_error("Request body is not replayable".to_string())
            })?;

            match self.dispatch(this_try).await {
                Ok(response) => {
                    if attempt > 0 {
                        tracing::info!("Upstream request succeeded after {} retries", attempt);
                    }
                    return Ok(response);
                }
                Err(error) => {
                    let should_retry = self.retry_config.should_retry(&error)
                        && attempt < self.retry_config.max_retries;

                    if !should_retry {
                        if attempt > 0 {
                            tracing::error!(
                                "Upstream request failed after {} retries: {}",
                                attempt,
                                error
                            );
                        } else {
                            tracing::error!("Upstream request failed (non-retryable): {}", error);
                        }
                        return Err(error);
                    }

                    let delay = self.retry_config.backoff_delay(&error, attempt);
                    tracing::warn!(
                        "Upstream attempt {} failed with {}, retrying in {:?}",
                        attempt + 1,
                        error.kind,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl LlmClient for PollinationsClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> Result<ChatResponse, LlmError> {
        let request = ChatRequest {
            model: options
                .model
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            messages: messages.to_vec(),
            temperature: options.temperature,
            seed: options.seed,
            max_tokens: options.max_tokens,
        };

        tracing::debug!("Sending chat request: model={}", request.model);

        let body = serde_json::to_value(&request)
            .map_err(|e| LlmError::parse_error(format!("Failed to encode request: {}", e)))?;
        let raw = self.chat_raw(&body).await?;

        let parsed: ChatCompletion = serde_json::from_value(raw)
            .map_err(|e| LlmError::parse_error(format!("Failed to parse response: {}", e)))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::parse_error("No choices in response".to_string()))?;

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason,
            model: parsed.model.or(Some(request.model)),
            usage: parsed
                .usage
                .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens)),
        })
    }

    async fn generate_text(
        &self,
        prompt: &str,
        options: &TextOptions,
    ) -> Result<String, LlmError> {
        let url = format!("{}/{}", self.text_base, urlencoding::encode(prompt));

        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(ref model) = options.model {
            params.push(("model", model.clone()));
        }
        if let Some(ref system) = options.system {
            params.push(("system", system.clone()));
        }
        if let Some(temperature) = options.temperature {
            params.push(("temperature", temperature.to_string()));
        }
        if let Some(seed) = options.seed {
            params.push(("seed", seed.to_string()));
        }
        if options.json {
            params.push(("json", "true".to_string()));
        }

        let request = self
            .authorized(self.client.get(&url))
            .query(&params)
            .header("Accept", "text/plain")
            .timeout(TEXT_TIMEOUT);

        let response = self.send_with_retry(request).await?;
        response
            .text()
            .await
            .map_err(|e| LlmError::network_error(format!("Failed to read text body: {}", e)))
    }

    async fn generate_image(
        &self,
        prompt: &str,
        options: &ImageOptions,
    ) -> Result<Bytes, LlmError> {
        let url = format!("{}/prompt/{}", self.image_base, urlencoding::encode(prompt));

        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(width) = options.width {
            params.push(("width", width.to_string()));
        }
        if let Some(height) = options.height {
            params.push(("height", height.to_string()));
        }
        if let Some(ref model) = options.model {
            params.push(("model", model.clone()));
        }
        if let Some(seed) = options.seed {
            params.push(("seed", seed.to_string()));
        }
        if options.nologo {
            params.push(("nologo", "true".to_string()));
        }
        if options.enhance {
            params.push(("enhance", "true".to_string()));
        }

        let request = self
            .authorized(self.client.get(&url))
            .query(&params)
            .header("Accept", "image/*")
            .timeout(IMAGE_TIMEOUT);

        let response = self.send_with_retry(request).await?;
        response
            .bytes()
            .await
            .map_err(|e| LlmError::network_error(format!("Failed to read image body: {}", e)))
    }

    async fn generate_audio(&self, text: &str, voice: &str) -> Result<Bytes, LlmError> {
        let url = format!("{}/{}", self.text_base, urlencoding::encode(text));

        let params = [("model", AUDIO_MODEL), ("voice", voice)];
        let request = self
            .authorized(self.client.get(&url))
            .query(&params)
            .header("Accept", "audio/*")
            .timeout(AUDIO_TIMEOUT);

        let response = self.send_with_retry(request).await?;
        response
            .bytes()
            .await
            .map_err(|e| LlmError::network_error(format!("Failed to read audio body: {}", e)))
    }
}

/// Result of an upstream health probe.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub ok: bool,
    pub upstream: UpstreamStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: chrono::DateTime<Utc>,
}

/// Reachability of the upstream API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamStatus {
    Ok,
    Error,
}

/// OpenAI-compatible chat request body.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
}

/// OpenAI-compatible chat response body.
#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_urls_trimmed() {
        let client = PollinationsClient::new(
            "https://image.example/".to_string(),
            "https://text.example/".to_string(),
            None,
        );
        assert_eq!(client.image_base, "https://image.example");
        assert_eq!(client.text_base, "https://text.example");
    }

    #[test]
    fn test_chat_completion_parsing() {
        let raw = serde_json::json!({
            "choices": [
                {"message": {"role": "assistant", "content": "hello"}, "finish_reason": "stop"}
            ],
            "model": "openai",
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });

        let parsed: ChatCompletion = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.choices.len(), 1);
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hello"));
        assert_eq!(parsed.usage.as_ref().unwrap().prompt_tokens, 10);
    }
}
