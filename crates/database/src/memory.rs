//! An in-process `TaskStore`.
//!
//! Every task lives in one map behind a single `RwLock`. Each trait method
//! takes the lock once, so a reader always sees whole transitions and a claim
//! can never hand the same task to two workers. Data does not survive a
//! restart; configure a database URL for that.

use crate::error::DbError;
use crate::store::{ClaimScope, Completion, Recovery, TaskStore, RETRY_LIMIT_MESSAGE};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{NewTask, Page, PageRequest, TaskFilter, TaskId, TaskRecord, TaskStatus};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryState {
    last_id: i64,
    tasks: HashMap<TaskId, TaskRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(a: &TaskRecord, b: &TaskRecord) -> Ordering {
    b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
}

fn in_scope(task: &TaskRecord, scope: &ClaimScope) -> bool {
    match scope {
        ClaimScope::Pool(prefix) => task
            .claimed_by
            .as_deref()
            .is_some_and(|worker| worker.starts_with(prefix.as_str())),
        ClaimScope::StartedBefore { cutoff, except } => {
            let excluded = match (except, task.claimed_by.as_deref()) {
                (Some(prefix), Some(worker)) => worker.starts_with(prefix.as_str()),
                _ => false,
            };
            !excluded && task.start_time.is_some_and(|start| start < *cutoff)
        }
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn insert(&self, task: NewTask) -> Result<TaskRecord, DbError> {
        let mut state = self.state.write().await;
        state.last_id += 1;
        let record = TaskRecord::from_new(state.last_id, task);
        state.tasks.insert(record.task_id, record.clone());
        Ok(record)
    }

    async fn get(&self, task_id: TaskId) -> Result<Option<TaskRecord>, DbError> {
        Ok(self.state.read().await.tasks.get(&task_id).cloned())
    }

    async fn claim_next(
        &self,
        worker: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<TaskRecord>, DbError> {
        let mut state = self.state.write().await;
        let next = state
            .tasks
            .values_mut()
            .filter(|task| task.status.is_claimable())
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        match next {
            Some(task) => {
                task.start(worker, at)?;
                Ok(Some(task.clone()))
            }
            None => Ok(None),
        }
    }

    async fn complete(
        &self,
        task_id: TaskId,
        worker: &str,
        outcome: Completion,
        at: DateTime<Utc>,
    ) -> Result<TaskRecord, DbError> {
        let mut state = self.state.write().await;
        let task = state.tasks.get_mut(&task_id).ok_or(DbError::NotFound(task_id))?;
        if !task.is_claimed_by(worker) {
            return Err(DbError::Conflict {
                task_id,
                status: task.status,
            });
        }

        // Apply to a copy so a rejected transition leaves the stored task untouched.
        let mut next = task.clone();
        match outcome {
            Completion::Success(result) => next.succeed(result, at)?,
            Completion::Failure(message) => next.fail(message, at)?,
            Completion::Retry => next.requeue(at)?,
        }
        *task = next.clone();
        Ok(next)
    }

    async fn revoke(&self, task_id: TaskId, at: DateTime<Utc>) -> Result<TaskRecord, DbError> {
        let mut state = self.state.write().await;
        let task = state.tasks.get_mut(&task_id).ok_or(DbError::NotFound(task_id))?;
        if task.status.is_terminal() {
            return Err(DbError::Conflict {
                task_id,
                status: task.status,
            });
        }
        task.revoke(at)?;
        Ok(task.clone())
    }

    async fn requeue_started(
        &self,
        scope: ClaimScope,
        max_retries: u32,
        at: DateTime<Utc>,
    ) -> Result<Recovery, DbError> {
        let mut state = self.state.write().await;
        let mut recovery = Recovery::default();

        for task in state.tasks.values_mut() {
            if task.status != TaskStatus::Started || !in_scope(task, &scope) {
                continue;
            }
            if task.retries < max_retries {
                task.requeue(at)?;
                recovery.requeued += 1;
            } else {
                task.fail(RETRY_LIMIT_MESSAGE, at)?;
                recovery.failed += 1;
            }
        }
        Ok(recovery)
    }

    async fn list(
        &self,
        filter: &TaskFilter,
        page: PageRequest,
    ) -> Result<Page<TaskRecord>, DbError> {
        let state = self.state.read().await;
        let mut matching: Vec<&TaskRecord> =
            state.tasks.values().filter(|task| filter.matches(task)).collect();
        matching.sort_by(|a, b| newest_first(a, b));

        let total = matching.len() as u64;
        let records = matching
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(page.page_size as usize)
            .cloned()
            .collect();
        Ok(Page::new(records, total, page))
    }

    async fn snapshot(&self, filter: &TaskFilter) -> Result<Vec<TaskRecord>, DbError> {
        let state = self.state.read().await;
        Ok(state
            .tasks
            .values()
            .filter(|task| filter.matches(task))
            .cloned()
            .collect())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<TaskRecord>, DbError> {
        let state = self.state.read().await;
        let mut all: Vec<&TaskRecord> = state.tasks.values().collect();
        all.sort_by(|a, b| newest_first(a, b));
        Ok(all.into_iter().take(limit as usize).cloned().collect())
    }

    async fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
        let mut state = self.state.write().await;
        let before = state.tasks.len();
        state
            .tasks
            .retain(|_, task| !(task.status.is_terminal() && task.created_at < cutoff));
        Ok((before - state.tasks.len()) as u64)
    }
}
