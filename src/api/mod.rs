//! HTTP API for the Flui backend.
//!
//! ## Endpoints
//!
//! Task pipeline:
//! - `POST /v1/tasks` - Create a task from a prompt
//! - `GET /v1/tasks` - List tasks, filterable by status / type / depth
//! - `GET /v1/tasks/:id` - Fetch a single task
//! - `GET /v1/tasks/:id/status` - Progress snapshot
//! - `POST /v1/tasks/:id/execute` - Run a task to completion
//! - `POST /v1/tasks/:id/delegate` - Split a composite task into subtasks
//! - `POST /v1/tasks/:id/retry` - Re-run a failed task
//! - `POST /v1/tasks/:id/cancel` - Cancel a queued or running task
//! - `GET /v1/tasks/:id/events` - Task event log
//! - `GET /v1/stream/:id` - Stream task events via SSE
//! - `GET /v1/queue` - Scheduler queue counters
//! - `GET /v1/tools` - List registered worker tools
//!
//! Knowledge sources:
//! - `POST /v1/knowledge`, `GET /v1/knowledge`, `GET /v1/knowledge/active`
//! - `GET|PUT|DELETE /v1/knowledge/:id`
//! - `GET /v1/knowledge/search/:query`, `POST /v1/knowledge/contextual`
//!
//! Episodic memory and analytics:
//! - `GET /v1/memory/stats`, `POST /v1/memory/clear`, `POST /v1/memory/optimize`
//! - `GET /v1/analytics/performance|metrics|alerts|agents`
//!
//! CodeForge project builder:
//! - `POST /v1/forge/process-input|process-answers|create-project|interactive-message`
//! - `GET /v1/forge/projects`, `/v1/forge/project/:id`,
//!   `/v1/forge/modification/:id`, `/v1/forge/conversation/:user_id`
//!
//! OpenAI-compatible media gateway:
//! - `POST /v1/images/generations`, `POST /v1/chat/completions`, `POST /v1/audio/speech`
//! - `GET /v1/models`, `GET /v1/models/:id`, `GET /v1/media/health`

pub mod forge;
pub mod knowledge;
pub mod media;
pub mod memory;
mod routes;
pub mod tasks;

pub use routes::{serve, AppState};
