//! Configuration management for Flui.
//!
//! Configuration can be set via environment variables:
//! - `HOST` - Optional. Server host. Defaults to `0.0.0.0`.
//! - `PORT` - Optional. Server port. Defaults to `5000`.
//! - `FLUI_DATA_DIR` - Optional. Root directory for tasks, contexts and projects. Defaults to `./data`.
//! - `FLUI_TASK_STORE` - Optional. Task store backend: `memory`, `file` or `sqlite`. Defaults to `file`.
//! - `MAX_TASK_DEPTH` - Optional. Maximum delegation depth. Defaults to `5`.
//! - `MAX_RETRIES` - Optional. Maximum retry count per task. Defaults to `3`.
//! - `TASK_TIMEOUT_MS` - Optional. Long-running task timeout in milliseconds. Defaults to `300000`.
//! - `MAX_CONCURRENT_TASKS` - Optional. Scheduler concurrency cap. Defaults to `3`.
//! - `POLLINATIONS_TEXT_URL` - Optional. Text/chat upstream base. Defaults to `https://text.pollinations.ai`.
//! - `POLLINATIONS_IMAGE_URL` - Optional. Image upstream base. Defaults to `https://image.pollinations.ai`.
//! - `POLLINATIONS_API_KEY` - Optional. Bearer token forwarded to the upstream.
//! - `MEMORY_EMOTION_THRESHOLD` - Optional. Minimum emotional intensity stored. Defaults to `0.7`.
//! - `MEMORY_MAX_MEMORIES` - Optional. Episodic store capacity. Defaults to `1000`.

use std::path::PathBuf;
use thiserror::Error;

use crate::memory::MemoryConfig;
use crate::scheduler::TimeoutConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Root directory for on-disk state (tasks, contexts, projects)
    pub data_dir: PathBuf,

    /// Task store backend name (`memory`, `file`, `sqlite`)
    pub task_store: String,

    /// Maximum delegation depth
    pub max_task_depth: u32,

    /// Maximum retry count per task
    pub max_retries: u32,

    /// Long-running task timeout in milliseconds
    pub task_timeout_ms: u64,

    /// Scheduler concurrency cap
    pub max_concurrent_tasks: usize,

    /// Base URL for the text/chat upstream
    pub text_base_url: String,

    /// Base URL for the image upstream
    pub image_base_url: String,

    /// Bearer token forwarded to the upstream, if any
    pub api_key: Option<String>,

    /// Episodic memory tuning
    pub memory: MemoryConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let data_dir = std::env::var("FLUI_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let task_store =
            std::env::var("FLUI_TASK_STORE").unwrap_or_else(|_| "file".to_string());

        let max_task_depth = parse_env("MAX_TASK_DEPTH", "5")?;
        let max_retries = parse_env("MAX_RETRIES", "3")?;
        let task_timeout_ms = parse_env("TASK_TIMEOUT_MS", "300000")?;
        let max_concurrent_tasks = parse_env("MAX_CONCURRENT_TASKS", "3")?;

        let text_base_url = std::env::var("POLLINATIONS_TEXT_URL")
            .unwrap_or_else(|_| "https://text.pollinations.ai".to_string());

        let image_base_url = std::env::var("POLLINATIONS_IMAGE_URL")
            .unwrap_or_else(|_| "https://image.pollinations.ai".to_string());

        let api_key = std::env::var("POLLINATIONS_API_KEY").ok();

        let memory = MemoryConfig {
            emotion_threshold: parse_env("MEMORY_EMOTION_THRESHOLD", "0.7")?,
            max_memories: parse_env("MEMORY_MAX_MEMORIES", "1000")?,
            ..MemoryConfig::default()
        };

        Ok(Self {
            host,
            port,
            data_dir,
            task_store,
            max_task_depth,
            max_retries,
            task_timeout_ms,
            max_concurrent_tasks,
            text_base_url,
            image_base_url,
            api_key,
            memory,
        })
    }

    /// Timeout settings derived from this configuration.
    pub fn timeout_config(&self) -> TimeoutConfig {
        TimeoutConfig {
            long_running_timeout: std::time::Duration::from_millis(self.task_timeout_ms),
            ..TimeoutConfig::default()
        }
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            data_dir,
            task_store: "memory".to_string(),
            max_task_depth: 5,
            max_retries: 3,
            task_timeout_ms: 300_000,
            max_concurrent_tasks: 3,
            text_base_url: "https://text.pollinations.ai".to_string(),
            image_base_url: "https://image.pollinations.ai".to_string(),
            api_key: None,
            memory: MemoryConfig::default(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    std::env::var(var)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue(var.to_string(), format!("{}", e)))
}
