//! Per-task watchdog timers with retry backoff.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use super::{ConcurrentRequest, InterruptKind, TimeoutConfig, TimeoutEvent};

const STATUS_KEYWORDS: &[&str] = &["status", "stuck", "still working", "still running", "finished yet"];
const INTERRUPT_KEYWORDS: &[&str] = &["stop", "cancel", "interrupt", "abort"];
const NEW_TASK_KEYWORDS: &[&str] = &["also", "additionally", "in addition", "besides"];
const CONTINUE_KEYWORDS: &[&str] = &["continue", "proceed", "keep going"];

/// Timer bookkeeping for one tracked task.
#[derive(Debug, Clone)]
pub struct TaskTimeoutInfo {
    pub task_id: String,
    pub started_at: Instant,
    pub timeout: Duration,
    pub long_running: bool,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

impl TaskTimeoutInfo {
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.elapsed())
    }
}

struct TaskEntry {
    info: TaskTimeoutInfo,
    watchdog: JoinHandle<()>,
}

/// Owns the watchdog timer for every tracked task.
///
/// When a watchdog fires the retry count is bumped; below the ceiling a
/// retry notification goes out after an exponentially growing delay and the
/// watchdog is re-armed, at the ceiling the task is failed. Emitted events
/// land on the channel handed out by [`TimeoutManager::new`].
pub struct TimeoutManager {
    config: TimeoutConfig,
    tasks: Mutex<HashMap<String, TaskEntry>>,
    events: mpsc::UnboundedSender<TimeoutEvent>,
}

impl TimeoutManager {
    pub fn new(config: TimeoutConfig) -> (Arc<Self>, mpsc::UnboundedReceiver<TimeoutEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let manager = Arc::new(Self {
            config,
            tasks: Mutex::new(HashMap::new()),
            events,
        });
        (manager, rx)
    }

    pub fn config(&self) -> &TimeoutConfig {
        &self.config
    }

    /// Start timeout tracking for a task. Starting an already tracked task
    /// restarts it from scratch.
    pub async fn start(self: &Arc<Self>, task_id: &str, long_running: bool) {
        let timeout = if long_running {
            self.config.long_running_timeout
        } else {
            self.config.default_timeout
        };

        let mut tasks = self.tasks.lock().await;
        if let Some(previous) = tasks.remove(task_id) {
            previous.watchdog.abort();
        }

        let info = TaskTimeoutInfo {
            task_id: task_id.to_string(),
            started_at: Instant::now(),
            timeout,
            long_running,
            retry_count: 0,
            last_error: None,
        };
        let watchdog = self.arm_watchdog(task_id.to_string(), timeout);
        tasks.insert(task_id.to_string(), TaskEntry { info, watchdog });

        tracing::debug!(
            "Started timeout tracking for task {} ({:?}, long_running: {})",
            task_id,
            timeout,
            long_running
        );
    }

    /// Re-arm the watchdog with a new timeout, e.g. when the user asks to
    /// keep a task going.
    pub async fn update_timeout(self: &Arc<Self>, task_id: &str, new_timeout: Duration) {
        let mut tasks = self.tasks.lock().await;
        let Some(entry) = tasks.get_mut(task_id) else {
            return;
        };

        entry.watchdog.abort();
        entry.info.timeout = new_timeout;
        entry.watchdog = self.arm_watchdog(task_id.to_string(), new_timeout);

        tracing::debug!("Updated timeout for task {} to {:?}", task_id, new_timeout);
    }

    /// Mark a task as completed, cancelling its watchdog. No-op for
    /// untracked tasks.
    pub async fn complete(&self, task_id: &str) {
        let mut tasks = self.tasks.lock().await;
        if let Some(entry) = tasks.remove(task_id) {
            entry.watchdog.abort();
            tracing::debug!("Task {} completed, timeout cleared", task_id);
        }
    }

    /// Complete a task from outside its normal flow, emitting a
    /// force-completed event.
    pub async fn force_complete(&self, task_id: &str, reason: &str) {
        let mut tasks = self.tasks.lock().await;
        if let Some(entry) = tasks.remove(task_id) {
            entry.watchdog.abort();
            tracing::info!("Force completing task {}: {}", task_id, reason);
            let _ = self.events.send(TimeoutEvent::ForceCompleted {
                task_id: task_id.to_string(),
                reason: reason.to_string(),
                total_time: entry.info.started_at.elapsed(),
            });
        }
    }

    /// Check whether the same error keeps recurring for a task that has
    /// already burned through its retries.
    pub async fn detect_error_loop(&self, task_id: &str, error: &str) -> bool {
        let mut tasks = self.tasks.lock().await;
        let Some(entry) = tasks.get_mut(task_id) else {
            return false;
        };

        if entry.info.last_error.as_deref() == Some(error) && entry.info.retry_count >= 3 {
            tracing::warn!("Error loop detected for task {}: {}", task_id, error);
            return true;
        }

        entry.info.last_error = Some(error.to_string());
        false
    }

    pub async fn status(&self, task_id: &str) -> Option<TaskTimeoutInfo> {
        self.tasks.lock().await.get(task_id).map(|e| e.info.clone())
    }

    pub async fn active_tasks(&self) -> Vec<TaskTimeoutInfo> {
        self.tasks
            .lock()
            .await
            .values()
            .map(|e| e.info.clone())
            .collect()
    }

    pub async fn is_long_running(&self, task_id: &str) -> bool {
        self.tasks
            .lock()
            .await
            .get(task_id)
            .map_or(false, |e| e.info.long_running)
    }

    /// Classify user input arriving while a task may already be active.
    ///
    /// Keyword-driven: status inquiries win over interruptions, which win
    /// over requests for an additional task, which win over continuations.
    /// Unmatched input becomes a new task when nothing is active and a
    /// status check otherwise.
    pub fn analyze_request(&self, input: &str, current_task_id: Option<&str>) -> ConcurrentRequest {
        let lower = input.to_lowercase();
        let original = current_task_id.map(str::to_string);

        if STATUS_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return ConcurrentRequest {
                kind: InterruptKind::StatusCheck,
                original_task_id: original,
                new_prompt: None,
                reason: "User asking about task status",
            };
        }

        if INTERRUPT_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return ConcurrentRequest {
                kind: InterruptKind::Interrupt,
                original_task_id: original,
                new_prompt: None,
                reason: "User requesting task interruption",
            };
        }

        if NEW_TASK_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return ConcurrentRequest {
                kind: InterruptKind::NewTask,
                original_task_id: original,
                new_prompt: Some(input.to_string()),
                reason: "User requesting additional task",
            };
        }

        if CONTINUE_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return ConcurrentRequest {
                kind: InterruptKind::Continue,
                original_task_id: original,
                new_prompt: None,
                reason: "User requesting task continuation",
            };
        }

        if current_task_id.is_none() {
            return ConcurrentRequest {
                kind: InterruptKind::NewTask,
                original_task_id: None,
                new_prompt: Some(input.to_string()),
                reason: "New task request",
            };
        }

        ConcurrentRequest {
            kind: InterruptKind::StatusCheck,
            original_task_id: original,
            new_prompt: None,
            reason: "Ambiguous input with active task",
        }
    }

    fn arm_watchdog(self: &Arc<Self>, task_id: String, timeout: Duration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            manager.handle_timeout(&task_id).await;
        })
    }

    async fn handle_timeout(self: &Arc<Self>, task_id: &str) {
        let mut tasks = self.tasks.lock().await;

        let Some(entry) = tasks.get_mut(task_id) else {
            return;
        };
        entry.info.retry_count += 1;
        let retry_count = entry.info.retry_count;
        let timeout = entry.info.timeout;

        tracing::warn!(
            "Task {} timed out (attempt {}/{})",
            task_id,
            retry_count,
            self.config.max_retries
        );

        if retry_count < self.config.max_retries {
            let delay = self.config.retry_delay * 2u32.saturating_pow(retry_count - 1);
            tracing::info!("Scheduling retry for task {} in {:?}", task_id, delay);

            let events = self.events.clone();
            let id = task_id.to_string();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = events.send(TimeoutEvent::Retry {
                    task_id: id,
                    retry_count,
                    delay,
                });
            });

            // Keep watching so an unresponsive task walks to the ceiling.
            entry.watchdog = self.arm_watchdog(task_id.to_string(), timeout);
        } else {
            tracing::error!(
                "Task {} failed after {} attempts",
                task_id,
                self.config.max_retries
            );
            let info = entry.info.clone();
            let _ = self.events.send(TimeoutEvent::Failed {
                task_id: task_id.to_string(),
                retry_count,
                total_time: info.started_at.elapsed(),
                long_running: info.long_running,
            });
            tasks.remove(task_id);
        }
    }
}
