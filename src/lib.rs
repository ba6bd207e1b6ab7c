//! # Flui
//!
//! LLM task orchestration backend with a Pollinations media gateway.
//!
//! This library provides:
//! - A task pipeline (classify, review, execute, delegate) over pluggable
//!   task stores
//! - A scheduler with per-task watchdog timers and a bounded active set
//! - Episodic memory with strip/recall/inject context optimization
//! - A conversational project builder (CodeForge)
//! - An OpenAI-compatible HTTP surface for Pollinations text, image and
//!   audio generation
//!
//! ## Task Flow
//! 1. A prompt arrives via `POST /v1/tasks` and is classified
//! 2. The supervisor reviews it for risk, then the worker executes it
//!    against the LLM client and the tool registry
//! 3. Composite prompts are delegated into subtasks
//! 4. Outcomes feed episodic memory; events stream over SSE
//!
//! ## Modules
//! - `orchestrator`: classifier, planner, supervisor, worker and the
//!   pipeline around them
//! - `scheduler`: timeout watchdogs and the concurrent task queue
//! - `memory`: episodic store, SRI protocol and optimization metrics
//! - `forge`: conversational project builder
//! - `llm`: Pollinations client and typed LLM errors
//! - `api`: the axum HTTP surface

pub mod api;
pub mod config;
pub mod forge;
pub mod knowledge;
pub mod llm;
pub mod memory;
pub mod orchestrator;
pub mod scheduler;
pub mod task;
pub mod tools;

pub use config::Config;
