//! Client module for the Pollinations generative APIs.
//!
//! Provides a trait-based abstraction for text, image and audio generation
//! plus a concrete client that also covers the model-listing and health
//! endpoints.

mod error;
mod pollinations;

pub use error::{classify_http_status, LlmError, LlmErrorKind, RetryConfig};
pub use pollinations::{HealthReport, ModelScope, PollinationsClient, UpstreamStatus};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Role in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Optional parameters for the text generation endpoint.
///
/// Everything here maps to a query parameter on the upstream GET route;
/// unset fields are simply omitted.
#[derive(Debug, Clone, Default)]
pub struct TextOptions {
    /// Model id (upstream default applies when unset).
    pub model: Option<String>,
    /// System prompt.
    pub system: Option<String>,
    /// Sampling temperature (0 = deterministic).
    pub temperature: Option<f64>,
    /// Seed for reproducible output.
    pub seed: Option<u64>,
    /// Ask the upstream for a JSON response body.
    pub json: bool,
}

/// Optional parameters for the image generation endpoint.
#[derive(Debug, Clone, Default)]
pub struct ImageOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub model: Option<String>,
    pub seed: Option<u64>,
    /// Suppress the upstream watermark.
    pub nologo: bool,
    /// Let the upstream rewrite the prompt for quality.
    pub enhance: bool,
}

/// Optional parameters for chat completions.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub seed: Option<u64>,
    pub max_tokens: Option<u64>,
}

/// Response from a chat completion.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub finish_reason: Option<String>,
    pub model: Option<String>,
    pub usage: Option<TokenUsage>,
}

/// Token usage information (if provided by the upstream).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Create a usage object ensuring `total_tokens` is consistent.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Trait for generation clients.
///
/// The task pipeline only needs these four calls, so tests can swap in a
/// canned implementation without touching the network.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a chat completion request.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> Result<ChatResponse, LlmError>;

    /// Generate text from a single prompt.
    async fn generate_text(&self, prompt: &str, options: &TextOptions)
        -> Result<String, LlmError>;

    /// Generate an image for a prompt. Returns the raw encoded image bytes.
    async fn generate_image(&self, prompt: &str, options: &ImageOptions)
        -> Result<Bytes, LlmError>;

    /// Generate speech audio for a text. Returns the raw encoded audio bytes.
    async fn generate_audio(&self, text: &str, voice: &str) -> Result<Bytes, LlmError>;
}
