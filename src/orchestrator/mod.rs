//! Task pipeline: classify, review, execute, delegate.
//!
//! The orchestrator ties the pipeline stages together around the task store:
//! prompts are classified into typed tasks, the supervisor reviews them
//! before execution, the worker produces results, and composite tasks are
//! planned and delegated into child tasks. Scheduler events (watchdog
//! retries, queue admissions, interruptions) are folded into the same
//! per-task event log the pipeline writes to.

pub mod classifier;
pub mod planner;
pub mod supervisor;
pub mod worker;

pub use classifier::{Classification, Classifier};
pub use planner::{Complexity, Plan, PlannedSubtask, Planner};
pub use supervisor::{ReviewResult, RiskLevel, Supervisor, Verdict};
pub use worker::Worker;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::scheduler::{ConcurrentTaskManager, QueueStatus, ScheduledTask, SchedulerEvent};
use crate::task::{Task, TaskEvent, TaskFilter, TaskResult, TaskStatus, TaskStore};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Task {0} not found")]
    TaskNotFound(Uuid),
    #[error("store error: {0}")]
    Store(String),
}

/// Snapshot returned by the task status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatusReport {
    pub id: Uuid,
    pub status: TaskStatus,
    pub progress: u8,
    pub estimated_completion: DateTime<Utc>,
    pub metadata: Value,
}

/// Coordinates the classifier, supervisor, worker and planner around the
/// task store and the scheduler.
pub struct Orchestrator {
    store: Arc<dyn TaskStore>,
    scheduler: Arc<ConcurrentTaskManager>,
    classifier: Classifier,
    planner: Planner,
    supervisor: Supervisor,
    worker: Arc<Worker>,
    max_depth: u32,
    max_retries: u32,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn TaskStore>,
        scheduler: Arc<ConcurrentTaskManager>,
        scheduler_events: mpsc::UnboundedReceiver<SchedulerEvent>,
        worker: Arc<Worker>,
        max_depth: u32,
        max_retries: u32,
    ) -> Arc<Self> {
        let orchestrator = Arc::new(Self {
            store,
            scheduler,
            classifier: Classifier::new(),
            planner: Planner::new(),
            supervisor: Supervisor::new(),
            worker,
            max_depth,
            max_retries,
        });
        orchestrator.spawn_event_fold(scheduler_events);
        orchestrator
    }

    /// Classify a prompt into a task, persist it and admit it to the
    /// scheduler. Extra metadata from the caller lands on top of the
    /// extracted classification parameters.
    pub async fn create_task(
        &self,
        prompt: &str,
        extra_metadata: Option<Value>,
    ) -> Result<Task, OrchestratorError> {
        let task = self.build_task(prompt, extra_metadata.as_ref());
        self.store
            .save_task(&task)
            .await
            .map_err(OrchestratorError::Store)?;
        self.log(task.id, "task_created", json!({ "task": &task })).await;

        tracing::info!("Created task {} ({:?})", task.id, task.task_type);

        let submission = self
            .scheduler
            .submit(
                ScheduledTask {
                    id: task.id.to_string(),
                    prompt: task.prompt.clone(),
                },
                None,
            )
            .await;
        if submission.queued {
            tracing::info!("Task {} admitted to the queue", task.id);
        }

        Ok(task)
    }

    /// Run a task through review and the worker.
    ///
    /// Completed tasks return their cached result and failed tasks over the
    /// retry ceiling return the stored error, so the call is idempotent for
    /// terminal tasks.
    pub async fn execute_task(&self, id: Uuid) -> Result<TaskResult, OrchestratorError> {
        let mut task = self.require(id).await?;

        if task.status == TaskStatus::Completed {
            let data = task.result.as_ref().and_then(|r| r.data.clone());
            return Ok(TaskResult {
                success: true,
                data,
                error: None,
                metadata: Some(task.metadata),
            });
        }

        if task.status == TaskStatus::Failed && task.retries >= task.max_retries {
            let error = task
                .error
                .clone()
                .unwrap_or_else(|| "Max retries exceeded".to_string());
            return Ok(TaskResult {
                success: false,
                data: None,
                error: Some(error),
                metadata: Some(task.metadata),
            });
        }

        let review = self.supervisor.review(&task);
        match review.verdict {
            Verdict::Reject => {
                self.log_review(id, &review).await;
                return self.fail(task, review.feedback).await;
            }
            Verdict::Warn => {
                tracing::warn!(
                    "Supervisor flagged task {}: {}",
                    id,
                    review.feedback
                );
                self.log_review(id, &review).await;
            }
            Verdict::Approve => {}
        }

        if task.depth >= task.max_depth {
            return self.fail(task, "Max depth exceeded").await;
        }

        task.mark_running();
        self.store
            .save_task(&task)
            .await
            .map_err(OrchestratorError::Store)?;
        self.log(id, "task_started", json!({ "task": &task })).await;

        let result = self.worker.execute(&task).await;

        if result.success {
            task.complete_with(result.clone());
            self.store
                .save_task(&task)
                .await
                .map_err(OrchestratorError::Store)?;
            self.scheduler.complete(&id.to_string()).await;
            self.log(id, "task_completed", json!({ "task": &task, "result": &result }))
                .await;
            Ok(result)
        } else {
            let error = result
                .error
                .clone()
                .unwrap_or_else(|| "Task execution failed".to_string());
            self.fail(task, error).await
        }
    }

    /// Split a task into child tasks according to the planner.
    ///
    /// Children are classified from their own prompts, linked to the parent
    /// and admitted to the scheduler; execution stays with the caller.
    pub async fn delegate_task(&self, id: Uuid) -> Result<TaskResult, OrchestratorError> {
        let mut task = self.require(id).await?;

        let plan = self.planner.plan(&task);
        if let Err(reason) = self.planner.validate(&plan) {
            return Ok(TaskResult::fail(format!("Invalid plan: {}", reason))
                .with_metadata(json!({ "task_id": id })));
        }

        if !self.worker.is_available() {
            return Ok(TaskResult::fail("No workers available")
                .with_metadata(json!({ "task_id": id })));
        }

        let mut subtasks = Vec::with_capacity(plan.subtasks.len());
        for planned in &plan.subtasks {
            let mut child = self.build_task(&planned.prompt, None);
            child.parent_task_id = Some(task.id);
            child.depth = task.depth + 1;
            task.child_tasks.push(child.id);

            self.store
                .save_task(&child)
                .await
                .map_err(OrchestratorError::Store)?;
            self.log(child.id, "task_created", json!({ "task": &child }))
                .await;
            self.scheduler
                .submit(
                    ScheduledTask {
                        id: child.id.to_string(),
                        prompt: child.prompt.clone(),
                    },
                    None,
                )
                .await;
            subtasks.push(child);
        }

        task.updated_at = Utc::now();
        self.store
            .save_task(&task)
            .await
            .map_err(OrchestratorError::Store)?;

        let listing: Vec<Value> = subtasks
            .iter()
            .map(|t| json!({ "id": t.id, "prompt": t.prompt }))
            .collect();
        self.log(id, "task_delegated", json!({ "subtasks": &listing }))
            .await;

        tracing::info!("Delegated task {} into {} subtasks", id, subtasks.len());

        Ok(TaskResult::ok(json!({ "subtasks": listing })).with_metadata(json!({
            "plan": plan_summary(&plan),
            "subtask_count": subtasks.len(),
        })))
    }

    /// Re-run a failed task, consuming one retry.
    pub async fn retry_task(&self, id: Uuid) -> Result<TaskResult, OrchestratorError> {
        let mut task = self.require(id).await?;

        if task.retries >= task.max_retries {
            return Ok(TaskResult::fail("Max retries exceeded").with_metadata(json!({
                "task_id": id,
                "retries": task.retries,
                "max_retries": task.max_retries,
            })));
        }

        task.retries += 1;
        task.status = TaskStatus::Pending;
        task.updated_at = Utc::now();
        self.store
            .save_task(&task)
            .await
            .map_err(OrchestratorError::Store)?;
        self.log(id, "task_retried", json!({ "retry_count": task.retries }))
            .await;

        self.execute_task(id).await
    }

    /// Cancel a pending or running task: release its scheduler slot and mark
    /// it failed. Cancelling a terminal task is a no-op.
    pub async fn cancel_task(&self, id: Uuid) -> Result<Task, OrchestratorError> {
        let mut task = self.require(id).await?;
        if task.is_terminal() {
            return Ok(task);
        }

        let key = id.to_string();
        self.scheduler
            .timeouts()
            .force_complete(&key, "User requested cancellation")
            .await;
        // Covers tasks that were still queued and never got a watchdog.
        self.scheduler.complete(&key).await;

        task.fail_with("cancelled");
        self.store
            .save_task(&task)
            .await
            .map_err(OrchestratorError::Store)?;
        self.log(id, "task_cancelled", json!({ "reason": "User requested cancellation" }))
            .await;

        Ok(task)
    }

    pub async fn get_task(&self, id: Uuid) -> Result<Option<Task>, OrchestratorError> {
        self.store.get_task(id).await.map_err(OrchestratorError::Store)
    }

    pub async fn get_task_status(&self, id: Uuid) -> Result<TaskStatusReport, OrchestratorError> {
        let task = self.require(id).await?;

        let estimated_completion = match task.status {
            TaskStatus::Completed => task.completed_at.unwrap_or(task.updated_at),
            TaskStatus::Failed => Utc::now(),
            TaskStatus::Pending | TaskStatus::Running => {
                Utc::now() + chrono::Duration::seconds(task.estimated_remaining().as_secs() as i64)
            }
        };

        Ok(TaskStatusReport {
            id: task.id,
            status: task.status,
            progress: task.progress_percent(),
            estimated_completion,
            metadata: task.metadata,
        })
    }

    pub async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, OrchestratorError> {
        self.store
            .list_tasks(filter)
            .await
            .map_err(OrchestratorError::Store)
    }

    pub async fn get_task_events(&self, id: Uuid) -> Result<Vec<TaskEvent>, OrchestratorError> {
        self.store
            .get_events(id)
            .await
            .map_err(OrchestratorError::Store)
    }

    pub async fn queue_status(&self) -> QueueStatus {
        self.scheduler.queue_status().await
    }

    fn build_task(&self, prompt: &str, extra_metadata: Option<&Value>) -> Task {
        let classification = self.classifier.classify(prompt);
        let mut task = Task::new(
            prompt,
            classification.task_type,
            self.max_depth,
            self.max_retries,
        );

        if let Some(params) = classification.parameters.as_object() {
            for (key, value) in params {
                task.metadata[key.as_str()] = value.clone();
            }
        }
        task.metadata["classification"] = json!({
            "task_type": classification.task_type,
            "confidence": classification.confidence,
            "parameters": classification.parameters,
        });
        if let Some(Value::Object(extra)) = extra_metadata {
            for (key, value) in extra {
                task.metadata[key.as_str()] = value.clone();
            }
        }

        task
    }

    async fn require(&self, id: Uuid) -> Result<Task, OrchestratorError> {
        self.store
            .get_task(id)
            .await
            .map_err(OrchestratorError::Store)?
            .ok_or(OrchestratorError::TaskNotFound(id))
    }

    /// Mark a task failed, release its scheduler slot and log the failure.
    async fn fail(
        &self,
        mut task: Task,
        error: impl Into<String>,
    ) -> Result<TaskResult, OrchestratorError> {
        let error = error.into();
        task.fail_with(error.clone());
        self.store
            .save_task(&task)
            .await
            .map_err(OrchestratorError::Store)?;
        self.scheduler.complete(&task.id.to_string()).await;
        self.log(task.id, "task_failed", json!({ "task": &task, "error": &error }))
            .await;

        Ok(TaskResult {
            success: false,
            data: None,
            error: Some(error),
            metadata: Some(task.metadata),
        })
    }

    async fn log_review(&self, task_id: Uuid, review: &ReviewResult) {
        self.log(
            task_id,
            "task_reviewed",
            json!({
                "verdict": review.verdict,
                "risk_level": review.risk_level,
                "feedback": review.feedback,
                "suggestions": review.suggestions,
            }),
        )
        .await;
    }

    async fn log(&self, task_id: Uuid, event_type: &str, data: Value) {
        let event = TaskEvent::new(task_id, event_type, data);
        if let Err(err) = self.store.log_event(&event).await {
            tracing::warn!(
                "Failed to log event {} for task {}: {}",
                event_type,
                task_id,
                err
            );
        }
    }

    fn spawn_event_fold(self: &Arc<Self>, mut events: mpsc::UnboundedReceiver<SchedulerEvent>) {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                orchestrator.fold_scheduler_event(event).await;
            }
        });
    }

    /// Scheduler events land in the same event log as pipeline events so a
    /// task's timeline reads in one place.
    async fn fold_scheduler_event(&self, event: SchedulerEvent) {
        let Ok(task_id) = Uuid::parse_str(event.task_id()) else {
            return;
        };

        match event {
            SchedulerEvent::Started { queued, .. } => {
                self.log(task_id, "scheduler_started", json!({ "queued": queued }))
                    .await;
            }
            SchedulerEvent::Queued { queue_position, .. } => {
                self.log(
                    task_id,
                    "scheduler_queued",
                    json!({ "queue_position": queue_position }),
                )
                .await;
            }
            SchedulerEvent::Retry {
                retry_count, delay, ..
            } => {
                self.log(
                    task_id,
                    "scheduler_retry",
                    json!({
                        "retry_count": retry_count,
                        "delay_ms": delay.as_millis() as u64,
                    }),
                )
                .await;
            }
            SchedulerEvent::Failed {
                retry_count,
                total_time,
                ..
            } => {
                self.log(
                    task_id,
                    "scheduler_failed",
                    json!({
                        "retry_count": retry_count,
                        "total_time_ms": total_time.as_millis() as u64,
                    }),
                )
                .await;
                self.mark_timed_out(task_id, retry_count).await;
            }
            SchedulerEvent::Interrupted { reason, .. } => {
                self.log(task_id, "scheduler_interrupted", json!({ "reason": reason }))
                    .await;
            }
            SchedulerEvent::Continued { .. } => {
                self.log(task_id, "scheduler_continued", json!({})).await;
            }
            SchedulerEvent::ForceCompleted { reason, .. } => {
                self.log(
                    task_id,
                    "scheduler_force_completed",
                    json!({ "reason": reason }),
                )
                .await;
            }
            SchedulerEvent::StatusResponse {
                status, message, ..
            } => {
                self.log(
                    task_id,
                    "scheduler_status",
                    json!({ "status": status, "message": message }),
                )
                .await;
            }
        }
    }

    /// A task whose watchdog burned through every retry is failed in the
    /// store unless it already reached a terminal state on its own.
    async fn mark_timed_out(&self, task_id: Uuid, retry_count: u32) {
        let Ok(Some(mut task)) = self.store.get_task(task_id).await else {
            return;
        };
        if task.is_terminal() {
            return;
        }

        task.fail_with(format!("Task timed out after {} retries", retry_count));
        if let Err(err) = self.store.save_task(&task).await {
            tracing::warn!("Failed to persist timeout failure for {}: {}", task_id, err);
        }
    }
}

fn plan_summary(plan: &Plan) -> Value {
    json!({
        "subtasks": plan
            .subtasks
            .iter()
            .map(|s| json!({
                "id": s.id,
                "type": s.task_type,
                "prompt": s.prompt,
                "dependencies": s.dependencies,
            }))
            .collect::<Vec<_>>(),
        "estimated_duration_secs": plan.estimated_duration.as_secs(),
        "complexity": plan.complexity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::KnowledgeManager;
    use crate::llm::{
        ChatMessage, ChatOptions, ChatResponse, ImageOptions, LlmClient, LlmError, TextOptions,
    };
    use crate::scheduler::{TimeoutConfig, TimeoutManager};
    use crate::task::{InMemoryTaskStore, TaskType};
    use crate::tools::ToolRegistry;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::time::Duration;

    struct StubClient;

    #[async_trait]
    impl LlmClient for StubClient {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _options: ChatOptions,
        ) -> Result<ChatResponse, LlmError> {
            Ok(ChatResponse {
                content: "stub reply".to_string(),
                finish_reason: Some("stop".to_string()),
                model: None,
                usage: None,
            })
        }

        async fn generate_text(
            &self,
            _prompt: &str,
            _options: &TextOptions,
        ) -> Result<String, LlmError> {
            Ok("stub text".to_string())
        }

        async fn generate_image(
            &self,
            _prompt: &str,
            _options: &ImageOptions,
        ) -> Result<Bytes, LlmError> {
            Ok(Bytes::from_static(b"stub image"))
        }

        async fn generate_audio(&self, _text: &str, _voice: &str) -> Result<Bytes, LlmError> {
            Ok(Bytes::from_static(b"stub audio"))
        }
    }

    fn build_orchestrator() -> Arc<Orchestrator> {
        let (timeouts, timeout_rx) = TimeoutManager::new(TimeoutConfig::default());
        let (scheduler, scheduler_rx) = ConcurrentTaskManager::new(timeouts, timeout_rx, 3);
        let worker = Arc::new(Worker::new(
            Arc::new(StubClient),
            Arc::new(KnowledgeManager::default()),
            Arc::new(ToolRegistry::empty()),
            std::env::temp_dir(),
            Duration::from_secs(5),
        ));
        Orchestrator::new(
            Arc::new(InMemoryTaskStore::new()),
            scheduler,
            scheduler_rx,
            worker,
            5,
            3,
        )
    }

    async fn has_event(orchestrator: &Orchestrator, task_id: Uuid, event_type: &str) -> bool {
        for _ in 0..40 {
            let events = orchestrator.get_task_events(task_id).await.unwrap();
            if events.iter().any(|e| e.event_type == event_type) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        false
    }

    #[tokio::test]
    async fn create_and_execute_returns_cached_result_on_repeat() {
        let orchestrator = build_orchestrator();

        let task = orchestrator.create_task("Hello there", None).await.unwrap();
        assert_eq!(task.task_type, TaskType::Conversation);
        assert_eq!(task.metadata["classification"]["confidence"], json!(0.95));

        let first = orchestrator.execute_task(task.id).await.unwrap();
        assert!(first.success);
        assert_eq!(first.data, Some(json!("stub reply")));

        let stored = orchestrator.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);

        let second = orchestrator.execute_task(task.id).await.unwrap();
        assert!(second.success);
        assert_eq!(second.data, Some(json!("stub reply")));

        assert!(has_event(&orchestrator, task.id, "task_created").await);
        assert!(has_event(&orchestrator, task.id, "task_started").await);
        assert!(has_event(&orchestrator, task.id, "task_completed").await);
        assert!(has_event(&orchestrator, task.id, "scheduler_started").await);
    }

    #[tokio::test]
    async fn high_risk_task_is_rejected_before_execution() {
        let orchestrator = build_orchestrator();

        let task = orchestrator
            .create_task("Delete the password file right now", None)
            .await
            .unwrap();

        let result = orchestrator.execute_task(task.id).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("High risk task detected"));

        let stored = orchestrator.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Failed);

        assert!(has_event(&orchestrator, task.id, "task_reviewed").await);
        assert!(has_event(&orchestrator, task.id, "task_failed").await);
        let events = orchestrator.get_task_events(task.id).await.unwrap();
        let review = events
            .iter()
            .find(|e| e.event_type == "task_reviewed")
            .unwrap();
        assert_eq!(review.data["verdict"], json!("reject"));
    }

    #[tokio::test]
    async fn delegate_creates_linked_children() {
        let orchestrator = build_orchestrator();

        let task = orchestrator
            .create_task(
                "draw a cat then write a poem about it finally convert it to speech",
                None,
            )
            .await
            .unwrap();
        assert_eq!(task.task_type, TaskType::CompositeTask);

        let result = orchestrator.delegate_task(task.id).await.unwrap();
        assert!(result.success);
        assert_eq!(result.metadata.as_ref().unwrap()["subtask_count"], json!(3));

        let parent = orchestrator.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(parent.child_tasks.len(), 3);

        for child_id in &parent.child_tasks {
            let child = orchestrator.get_task(*child_id).await.unwrap().unwrap();
            assert_eq!(child.depth, 1);
            assert_eq!(child.parent_task_id, Some(task.id));
        }

        let first_child = orchestrator
            .get_task(parent.child_tasks[0])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first_child.task_type, TaskType::ImageGeneration);

        assert!(has_event(&orchestrator, task.id, "task_delegated").await);
    }

    #[tokio::test]
    async fn depth_ceiling_fails_execution() {
        let orchestrator = build_orchestrator();

        let task = orchestrator.create_task("Hello there", None).await.unwrap();
        let mut deep = orchestrator.get_task(task.id).await.unwrap().unwrap();
        deep.depth = 5;
        orchestrator.store.save_task(&deep).await.unwrap();

        let result = orchestrator.execute_task(task.id).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Max depth exceeded"));
    }

    #[tokio::test]
    async fn retry_consumes_attempts_and_reexecutes() {
        let orchestrator = build_orchestrator();

        let task = orchestrator.create_task("Hello there", None).await.unwrap();
        let mut failed = orchestrator.get_task(task.id).await.unwrap().unwrap();
        failed.fail_with("transient upstream error");
        orchestrator.store.save_task(&failed).await.unwrap();

        let result = orchestrator.retry_task(task.id).await.unwrap();
        assert!(result.success);

        let stored = orchestrator.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
        assert_eq!(stored.retries, 1);
        assert!(has_event(&orchestrator, task.id, "task_retried").await);

        let mut exhausted = orchestrator.get_task(task.id).await.unwrap().unwrap();
        exhausted.retries = 3;
        orchestrator.store.save_task(&exhausted).await.unwrap();

        let refused = orchestrator.retry_task(task.id).await.unwrap();
        assert!(!refused.success);
        assert_eq!(refused.error.as_deref(), Some("Max retries exceeded"));
    }

    #[tokio::test]
    async fn cancel_marks_failed_and_frees_slot() {
        let orchestrator = build_orchestrator();

        let task = orchestrator.create_task("Hello there", None).await.unwrap();
        assert_eq!(orchestrator.queue_status().await.active, 1);

        let cancelled = orchestrator.cancel_task(task.id).await.unwrap();
        assert_eq!(cancelled.status, TaskStatus::Failed);
        assert_eq!(cancelled.error.as_deref(), Some("cancelled"));
        assert!(has_event(&orchestrator, task.id, "task_cancelled").await);

        for _ in 0..40 {
            if orchestrator.queue_status().await.active == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        assert_eq!(orchestrator.queue_status().await.active, 0);
    }

    #[tokio::test]
    async fn status_report_tracks_progress() {
        let orchestrator = build_orchestrator();

        let task = orchestrator.create_task("Hello there", None).await.unwrap();
        let report = orchestrator.get_task_status(task.id).await.unwrap();
        assert_eq!(report.progress, 0);
        assert_eq!(report.status, TaskStatus::Pending);

        orchestrator.execute_task(task.id).await.unwrap();
        let report = orchestrator.get_task_status(task.id).await.unwrap();
        assert_eq!(report.progress, 100);
        assert_eq!(report.status, TaskStatus::Completed);

        let missing = orchestrator.get_task_status(Uuid::new_v4()).await;
        assert!(matches!(
            missing,
            Err(OrchestratorError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_tasks_applies_filter() {
        let orchestrator = build_orchestrator();

        let first = orchestrator.create_task("Hello there", None).await.unwrap();
        orchestrator
            .create_task("draw a lighthouse", None)
            .await
            .unwrap();

        orchestrator.execute_task(first.id).await.unwrap();

        let all = orchestrator.list_tasks(&TaskFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let completed = orchestrator
            .list_tasks(&TaskFilter {
                status: Some(TaskStatus::Completed),
                ..TaskFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, first.id);
    }
}
