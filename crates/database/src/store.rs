use crate::error::DbError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{NewTask, Page, PageRequest, TaskFilter, TaskId, TaskRecord, TaskResult};

/// How a worker's attempt at a task ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Success(TaskResult),
    Failure(String),
    /// Hand the task back to the queue for another attempt.
    Retry,
}

/// Which STARTED tasks a recovery pass applies to.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimScope {
    /// Tasks claimed by workers whose id starts with this pool prefix.
    Pool(String),
    /// Tasks whose current attempt started before `cutoff`, skipping those
    /// claimed by workers whose id starts with `except`.
    StartedBefore {
        cutoff: DateTime<Utc>,
        except: Option<String>,
    },
}

/// Outcome of a recovery pass over STARTED tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Recovery {
    pub requeued: u64,
    pub failed: u64,
}

/// Error message stored when a task runs out of retries during recovery.
pub const RETRY_LIMIT_MESSAGE: &str = "retry limit exceeded: worker stopped during execution";

/// The durable record of every task.
///
/// Implementations must apply each method as one atomic step: readers see a
/// task either before or after a change, never in between, and a claim hands
/// a task to exactly one worker.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persists a new PENDING task and returns the stored record.
    async fn insert(&self, task: NewTask) -> Result<TaskRecord, DbError>;

    async fn get(&self, task_id: TaskId) -> Result<Option<TaskRecord>, DbError>;

    /// Moves the oldest PENDING or RETRY task to STARTED, owned by `worker`.
    async fn claim_next(&self, worker: &str, at: DateTime<Utc>)
        -> Result<Option<TaskRecord>, DbError>;

    /// Ends the current attempt. Fails with `Conflict` unless the task is
    /// STARTED and owned by `worker`.
    async fn complete(
        &self,
        task_id: TaskId,
        worker: &str,
        outcome: Completion,
        at: DateTime<Utc>,
    ) -> Result<TaskRecord, DbError>;

    /// Cancels a task that has not finished. Fails with `NotFound` or, when
    /// the task is already terminal, `Conflict`.
    async fn revoke(&self, task_id: TaskId, at: DateTime<Utc>) -> Result<TaskRecord, DbError>;

    /// Returns STARTED tasks in `scope` to the queue as RETRY, or fails them
    /// once they have been retried `max_retries` times.
    async fn requeue_started(
        &self,
        scope: ClaimScope,
        max_retries: u32,
        at: DateTime<Utc>,
    ) -> Result<Recovery, DbError>;

    /// One page of matching tasks, newest first.
    async fn list(&self, filter: &TaskFilter, page: PageRequest)
        -> Result<Page<TaskRecord>, DbError>;

    /// Every matching task, read as one consistent snapshot.
    async fn snapshot(&self, filter: &TaskFilter) -> Result<Vec<TaskRecord>, DbError>;

    /// The `limit` most recently created tasks.
    async fn recent(&self, limit: u32) -> Result<Vec<TaskRecord>, DbError>;

    /// Deletes terminal tasks created before `cutoff`; returns how many.
    async fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DbError>;
}
