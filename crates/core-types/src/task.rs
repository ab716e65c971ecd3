use crate::dataset::TaskPayload;
use crate::enums::{Algorithm, TaskStatus};
use crate::error::CoreError;
use crate::results::TaskResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub type TaskId = Uuid;

/// Identity of the worker currently owning a task.
pub type WorkerId = String;

/// Task name recorded for asynchronous volatility batches.
pub const VOLATILITY_TASK_NAME: &str = "volatility.calculate_batch";

/// Error recorded on tasks cancelled by request.
pub const REVOKED_MESSAGE: &str = "Task revoked by request";

/// Seconds elapsed between two instants, clamped at zero.
pub fn execution_seconds(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start)
        .num_microseconds()
        .map(|us| us as f64 / 1_000_000.0)
        .unwrap_or(0.0)
        .max(0.0)
}

/// A task as handed to the store at submission time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub task_id: TaskId,
    pub task_name: String,
    pub algorithm: Algorithm,
    pub payload: TaskPayload,
    pub created_at: DateTime<Utc>,
}

impl NewTask {
    pub fn volatility(payload: TaskPayload, created_at: DateTime<Utc>) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            task_name: VOLATILITY_TASK_NAME.to_string(),
            algorithm: Algorithm::Volatility,
            payload,
            created_at,
        }
    }
}

/// The persisted state of one task.
///
/// All mutations go through the transition methods below, which enforce the
/// state machine in `TaskStatus::can_transition_to` and keep the result,
/// error, and timing fields consistent with the status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    /// Store-assigned surrogate key, increasing with insertion order.
    pub id: i64,
    pub task_id: TaskId,
    pub task_name: String,
    pub algorithm: Algorithm,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Number of times the task has been requeued.
    pub retries: u32,
    #[serde(skip)]
    pub claimed_by: Option<WorkerId>,
    #[serde(skip)]
    pub payload: TaskPayload,
}

impl TaskRecord {
    pub fn from_new(id: i64, task: NewTask) -> Self {
        Self {
            id,
            task_id: task.task_id,
            task_name: task.task_name,
            algorithm: task.algorithm,
            status: TaskStatus::Pending,
            result: None,
            error_message: None,
            execution_time: None,
            start_time: None,
            end_time: None,
            created_at: task.created_at,
            updated_at: task.created_at,
            retries: 0,
            claimed_by: None,
            payload: task.payload,
        }
    }

    pub fn is_claimed_by(&self, worker: &str) -> bool {
        self.status == TaskStatus::Started && self.claimed_by.as_deref() == Some(worker)
    }

    fn ensure_transition(&self, next: TaskStatus) -> Result<(), CoreError> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                from: self.status,
                to: next,
            })
        }
    }

    /// Records the end of the current attempt.
    fn close_attempt(&mut self, at: DateTime<Utc>) {
        self.end_time = Some(at);
        self.execution_time = self.start_time.map(|start| execution_seconds(start, at));
        self.claimed_by = None;
        self.updated_at = at;
    }

    /// PENDING/RETRY -> STARTED, owned by `worker`. A retried task keeps the
    /// previous attempt's `execution_time` until the new attempt closes.
    pub fn start(&mut self, worker: &str, at: DateTime<Utc>) -> Result<(), CoreError> {
        self.ensure_transition(TaskStatus::Started)?;
        self.status = TaskStatus::Started;
        self.start_time = Some(at);
        self.end_time = None;
        self.claimed_by = Some(worker.to_string());
        self.updated_at = at;
        Ok(())
    }

    pub fn succeed(&mut self, result: TaskResult, at: DateTime<Utc>) -> Result<(), CoreError> {
        self.ensure_transition(TaskStatus::Success)?;
        self.close_attempt(at);
        self.status = TaskStatus::Success;
        self.result = Some(result);
        self.error_message = None;
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>, at: DateTime<Utc>) -> Result<(), CoreError> {
        self.ensure_transition(TaskStatus::Failure)?;
        self.close_attempt(at);
        self.status = TaskStatus::Failure;
        self.result = None;
        self.error_message = Some(message.into());
        Ok(())
    }

    /// STARTED -> RETRY; the task becomes claimable again.
    pub fn requeue(&mut self, at: DateTime<Utc>) -> Result<(), CoreError> {
        self.ensure_transition(TaskStatus::Retry)?;
        self.close_attempt(at);
        self.status = TaskStatus::Retry;
        self.retries += 1;
        Ok(())
    }

    /// Cancels the task. The cancellation reason is stored as the error so
    /// that every terminal record carries exactly one of result or error.
    pub fn revoke(&mut self, at: DateTime<Utc>) -> Result<(), CoreError> {
        self.ensure_transition(TaskStatus::Revoked)?;
        if self.status == TaskStatus::Started {
            self.close_attempt(at);
        } else {
            // No attempt is open; time spent queued is not execution time.
            self.end_time = Some(at);
            self.claimed_by = None;
            self.updated_at = at;
        }
        self.status = TaskStatus::Revoked;
        self.result = None;
        self.error_message = Some(REVOKED_MESSAGE.to_string());
        Ok(())
    }
}
