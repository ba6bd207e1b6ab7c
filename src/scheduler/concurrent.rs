//! Concurrency cap and FIFO queue on top of the timeout manager.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex};

use super::timeout::{TaskTimeoutInfo, TimeoutManager};
use super::{InterruptKind, SchedulerEvent, TimeoutEvent};

const LONG_RUNNING_KEYWORDS: &[&str] = &[
    "web scraping",
    "scraping",
    "browser",
    "headless",
    "crawl",
    "download",
    "upload",
    "batch processing",
    "full analysis",
    "extensive research",
    "data collection",
    "data mining",
];

/// The slice of a task the scheduler cares about.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub id: String,
    pub prompt: String,
}

/// Outcome of submitting a task.
#[derive(Debug, Clone)]
pub struct Submission {
    pub task_id: String,
    pub queued: bool,
}

/// Where a task currently sits in the scheduler.
#[derive(Debug, Clone)]
pub struct ScheduleStatus {
    pub task: Option<ScheduledTask>,
    pub timeout: Option<TaskTimeoutInfo>,
    pub queued: bool,
}

/// Scheduler occupancy snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub queued: usize,
    pub active: usize,
    pub max_concurrent: usize,
}

struct State {
    active: HashMap<String, ScheduledTask>,
    queue: VecDeque<ScheduledTask>,
}

/// Admits tasks up to a concurrency cap and queues the rest.
///
/// Slots free up when the timeout manager reports a failure or a force
/// completion, or when the owner calls [`complete`](Self::complete); each
/// of those drains one task from the front of the queue.
pub struct ConcurrentTaskManager {
    timeouts: Arc<TimeoutManager>,
    max_concurrent: usize,
    state: Mutex<State>,
    events: mpsc::UnboundedSender<SchedulerEvent>,
}

impl ConcurrentTaskManager {
    pub fn new(
        timeouts: Arc<TimeoutManager>,
        timeout_events: mpsc::UnboundedReceiver<TimeoutEvent>,
        max_concurrent: usize,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<SchedulerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let manager = Arc::new(Self {
            timeouts,
            max_concurrent,
            state: Mutex::new(State {
                active: HashMap::new(),
                queue: VecDeque::new(),
            }),
            events,
        });
        manager.spawn_event_pump(timeout_events);
        (manager, rx)
    }

    /// Timeout manager backing this scheduler.
    pub fn timeouts(&self) -> &Arc<TimeoutManager> {
        &self.timeouts
    }

    /// Submit a task. With user input and an active task, the input is
    /// first classified: status checks and interruptions act on the active
    /// task instead of admitting the new one, continuations extend the
    /// active task's timeout, and only a new-task classification falls
    /// through to admission.
    pub async fn submit(&self, task: ScheduledTask, user_input: Option<&str>) -> Submission {
        let current = self.current_active_id().await;

        if let (Some(input), Some(current_id)) = (user_input, current) {
            let request = self.timeouts.analyze_request(input, Some(&current_id));
            match request.kind {
                InterruptKind::StatusCheck => return self.answer_status_check(&current_id).await,
                InterruptKind::Interrupt => return self.interrupt(&current_id).await,
                InterruptKind::Continue => return self.continue_task(&current_id).await,
                InterruptKind::NewTask => {}
            }
        }

        self.admit(task).await
    }

    /// Normal completion path: clear the watchdog, free the slot, drain
    /// the queue. A task that finished before the scheduler ever started
    /// it is dropped from the queue instead.
    pub async fn complete(&self, task_id: &str) {
        self.timeouts.complete(task_id).await;
        let removed = {
            let mut state = self.state.lock().await;
            state.queue.retain(|t| t.id != task_id);
            state.active.remove(task_id).is_some()
        };
        if removed {
            self.process_next_queued().await;
        }
    }

    pub async fn status(&self, task_id: &str) -> ScheduleStatus {
        let (task, queued) = {
            let state = self.state.lock().await;
            (
                state.active.get(task_id).cloned(),
                state.queue.iter().any(|t| t.id == task_id),
            )
        };
        let timeout = self.timeouts.status(task_id).await;
        ScheduleStatus {
            task,
            timeout,
            queued,
        }
    }

    pub async fn active_tasks(&self) -> Vec<ScheduledTask> {
        self.state.lock().await.active.values().cloned().collect()
    }

    pub async fn queue_status(&self) -> QueueStatus {
        let state = self.state.lock().await;
        QueueStatus {
            queued: state.queue.len(),
            active: state.active.len(),
            max_concurrent: self.max_concurrent,
        }
    }

    async fn admit(&self, task: ScheduledTask) -> Submission {
        let mut state = self.state.lock().await;
        if state.active.len() < self.max_concurrent {
            self.run_now(&mut state, task).await
        } else {
            let queue_position = state.queue.len() + 1;
            tracing::info!("Task {} queued (position {})", task.id, queue_position);
            let _ = self.events.send(SchedulerEvent::Queued {
                task_id: task.id.clone(),
                prompt: task.prompt.clone(),
                queue_position,
            });
            let task_id = task.id.clone();
            state.queue.push_back(task);
            Submission {
                task_id,
                queued: true,
            }
        }
    }

    async fn run_now(&self, state: &mut State, task: ScheduledTask) -> Submission {
        let long_running = detect_long_running(&task.prompt);
        state.active.insert(task.id.clone(), task.clone());
        self.timeouts.start(&task.id, long_running).await;

        tracing::info!("Executing task immediately: {}", task.id);
        let _ = self.events.send(SchedulerEvent::Started {
            task_id: task.id.clone(),
            prompt: task.prompt,
            queued: false,
        });

        Submission {
            task_id: task.id,
            queued: false,
        }
    }

    async fn answer_status_check(&self, task_id: &str) -> Submission {
        let known = self.state.lock().await.active.contains_key(task_id);
        if !known {
            let _ = self.events.send(SchedulerEvent::StatusResponse {
                task_id: task_id.to_string(),
                status: "not_found".to_string(),
                message: "Task not found or already completed".to_string(),
                long_running: false,
                retry_count: 0,
            });
            return Submission {
                task_id: task_id.to_string(),
                queued: false,
            };
        }

        let info = self.timeouts.status(task_id).await;
        let long_running = info.as_ref().map_or(false, |i| i.long_running);
        let retry_count = info.as_ref().map_or(0, |i| i.retry_count);
        let message = match &info {
            Some(info) => {
                let elapsed = info.elapsed().as_secs();
                let remaining = info.remaining().as_secs();
                let mut message = if info.long_running {
                    format!(
                        "Task is running (long-running operation). Elapsed: {}s, Remaining: {}s",
                        elapsed, remaining
                    )
                } else {
                    format!(
                        "Task is running. Elapsed: {}s, Remaining: {}s",
                        elapsed, remaining
                    )
                };
                if info.retry_count > 0 {
                    message.push_str(&format!(
                        " (retry {}/{})",
                        info.retry_count,
                        self.timeouts.config().max_retries
                    ));
                }
                message
            }
            None => "Task is running normally".to_string(),
        };

        let _ = self.events.send(SchedulerEvent::StatusResponse {
            task_id: task_id.to_string(),
            status: "running".to_string(),
            message,
            long_running,
            retry_count,
        });

        Submission {
            task_id: task_id.to_string(),
            queued: false,
        }
    }

    async fn interrupt(&self, task_id: &str) -> Submission {
        tracing::info!("User requested interruption of task {}", task_id);
        // Slot removal and queue drain happen when the force-completed
        // event comes back through the pump.
        self.timeouts
            .force_complete(task_id, "User requested interruption")
            .await;
        let _ = self.events.send(SchedulerEvent::Interrupted {
            task_id: task_id.to_string(),
            reason: "User requested interruption".to_string(),
        });
        Submission {
            task_id: task_id.to_string(),
            queued: false,
        }
    }

    async fn continue_task(&self, task_id: &str) -> Submission {
        tracing::info!("User requested continuation of task {}", task_id);
        let active = self.state.lock().await.active.contains_key(task_id);
        if active {
            let long = self.timeouts.config().long_running_timeout;
            self.timeouts.update_timeout(task_id, long).await;
            let _ = self.events.send(SchedulerEvent::Continued {
                task_id: task_id.to_string(),
            });
        }
        Submission {
            task_id: task_id.to_string(),
            queued: false,
        }
    }

    async fn process_next_queued(&self) {
        let mut state = self.state.lock().await;
        if state.active.len() < self.max_concurrent {
            if let Some(next) = state.queue.pop_front() {
                self.run_now(&mut state, next).await;
            }
        }
    }

    async fn current_active_id(&self) -> Option<String> {
        self.state.lock().await.active.keys().next().cloned()
    }

    fn spawn_event_pump(self: &Arc<Self>, mut timeout_events: mpsc::UnboundedReceiver<TimeoutEvent>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = timeout_events.recv().await {
                match event {
                    TimeoutEvent::Retry {
                        task_id,
                        retry_count,
                        delay,
                    } => {
                        tracing::info!("Retrying task {} (attempt {})", task_id, retry_count);
                        let _ = manager.events.send(SchedulerEvent::Retry {
                            task_id,
                            retry_count,
                            delay,
                        });
                    }
                    TimeoutEvent::Failed {
                        task_id,
                        retry_count,
                        total_time,
                        ..
                    } => {
                        tracing::error!(
                            "Task {} failed after {} retries ({:?})",
                            task_id,
                            retry_count,
                            total_time
                        );
                        manager.state.lock().await.active.remove(&task_id);
                        let _ = manager.events.send(SchedulerEvent::Failed {
                            task_id,
                            retry_count,
                            total_time,
                        });
                        manager.process_next_queued().await;
                    }
                    TimeoutEvent::ForceCompleted {
                        task_id, reason, ..
                    } => {
                        tracing::info!("Task {} force completed: {}", task_id, reason);
                        manager.state.lock().await.active.remove(&task_id);
                        let _ = manager.events.send(SchedulerEvent::ForceCompleted {
                            task_id,
                            reason,
                        });
                        manager.process_next_queued().await;
                    }
                }
            }
        });
    }
}

/// Keyword check for operations that deserve the long watchdog timeout.
fn detect_long_running(prompt: &str) -> bool {
    let lower = prompt.to_lowercase();
    LONG_RUNNING_KEYWORDS.iter().any(|k| lower.contains(k))
}
