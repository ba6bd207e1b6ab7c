//! Timer-based task scheduler.
//!
//! Two cooperating pieces: `TimeoutManager` owns per-task watchdog timers
//! and the retry/backoff bookkeeping, `ConcurrentTaskManager` enforces the
//! concurrency cap and drains a FIFO queue as slots free up. They talk over
//! an mpsc channel; the orchestrator consumes the combined event stream.

mod concurrent;
mod timeout;

pub use concurrent::{ConcurrentTaskManager, QueueStatus, ScheduledTask, Submission};
pub use timeout::{TaskTimeoutInfo, TimeoutManager};

use std::time::Duration;

/// Timeout and retry settings for the scheduler.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Watchdog timeout for ordinary tasks
    pub default_timeout: Duration,
    /// Timeout applied to individual tool invocations
    pub tool_timeout: Duration,
    /// Watchdog timeout for tasks flagged as long-running
    pub long_running_timeout: Duration,
    /// Timeouts tolerated before a task is failed
    pub max_retries: u32,
    /// Base delay before a retry notification; doubles per attempt
    pub retry_delay: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            tool_timeout: Duration::from_secs(30),
            long_running_timeout: Duration::from_secs(300),
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// What a piece of user input wants from the scheduler while a task is
/// already active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptKind {
    NewTask,
    StatusCheck,
    Interrupt,
    Continue,
}

/// Result of analyzing user input against the currently active task.
#[derive(Debug, Clone)]
pub struct ConcurrentRequest {
    pub kind: InterruptKind,
    /// The active task the input refers to, when there is one
    pub original_task_id: Option<String>,
    /// The input itself, when it should become a new task
    pub new_prompt: Option<String>,
    pub reason: &'static str,
}

/// Events produced by the timeout watchdogs.
#[derive(Debug, Clone)]
pub enum TimeoutEvent {
    /// A timed-out task may be retried after the given backoff delay.
    Retry {
        task_id: String,
        retry_count: u32,
        delay: Duration,
    },
    /// A task exhausted its retries and is failed.
    Failed {
        task_id: String,
        retry_count: u32,
        total_time: Duration,
        long_running: bool,
    },
    /// A task was completed from outside its normal flow.
    ForceCompleted {
        task_id: String,
        reason: String,
        total_time: Duration,
    },
}

/// Events produced by the scheduler as a whole. The orchestrator folds
/// these into the per-task event log.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    Started {
        task_id: String,
        prompt: String,
        queued: bool,
    },
    Queued {
        task_id: String,
        prompt: String,
        queue_position: usize,
    },
    Retry {
        task_id: String,
        retry_count: u32,
        delay: Duration,
    },
    Failed {
        task_id: String,
        retry_count: u32,
        total_time: Duration,
    },
    Interrupted {
        task_id: String,
        reason: String,
    },
    Continued {
        task_id: String,
    },
    ForceCompleted {
        task_id: String,
        reason: String,
    },
    StatusResponse {
        task_id: String,
        status: String,
        message: String,
        long_running: bool,
        retry_count: u32,
    },
}

impl SchedulerEvent {
    /// Task this event concerns.
    pub fn task_id(&self) -> &str {
        match self {
            SchedulerEvent::Started { task_id, .. }
            | SchedulerEvent::Queued { task_id, .. }
            | SchedulerEvent::Retry { task_id, .. }
            | SchedulerEvent::Failed { task_id, .. }
            | SchedulerEvent::Interrupted { task_id, .. }
            | SchedulerEvent::Continued { task_id }
            | SchedulerEvent::ForceCompleted { task_id, .. }
            | SchedulerEvent::StatusResponse { task_id, .. } => task_id,
        }
    }
}
