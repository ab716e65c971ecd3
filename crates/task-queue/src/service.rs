use crate::error::QueueError;
use crate::validator::DatasetValidator;
use analytics::{compose_dashboard, compute_statistics, run_batch, VolatilityModel};
use chrono::{TimeDelta, Utc};
use configuration::{RetentionSettings, Settings, TaskSettings};
use core_types::{
    Dashboard, NewTask, Page, PageRequest, TaskFilter, TaskId, TaskPayload, TaskRecord,
    TaskStatistics, VolatilityBatchResult, VolatilityRequest,
};
use database::TaskStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Entry point for everything a client can ask of the task subsystem.
///
/// Submission only validates and stores; execution happens in the
/// `WorkerPool`, which shares the same store.
#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn TaskStore>,
    model: Arc<dyn VolatilityModel>,
    validator: DatasetValidator,
    tasks: TaskSettings,
    retention: RetentionSettings,
}

impl TaskService {
    pub fn new(
        store: Arc<dyn TaskStore>,
        model: Arc<dyn VolatilityModel>,
        settings: &Settings,
    ) -> Self {
        Self {
            store,
            model,
            validator: DatasetValidator::new(&settings.tasks),
            tasks: settings.tasks.clone(),
            retention: settings.retention.clone(),
        }
    }

    pub fn store(&self) -> Arc<dyn TaskStore> {
        Arc::clone(&self.store)
    }

    /// Validates a batch and enqueues it as one PENDING task.
    pub async fn submit(&self, request: VolatilityRequest) -> Result<TaskRecord, QueueError> {
        let datasets = self.validator.validate(&request).map_err(|issues| {
            warn!(issues = issues.len(), "Rejected volatility batch.");
            QueueError::Validation(issues)
        })?;
        let dataset_count = datasets.len();

        let task = NewTask::volatility(TaskPayload::Volatility { datasets }, Utc::now());
        let record = self.store.insert(task).await?;
        info!(task_id = %record.task_id, datasets = dataset_count, "Task submitted.");
        Ok(record)
    }

    /// The current state of a task. Never mutates it.
    pub async fn status(&self, task_id: TaskId) -> Result<TaskRecord, QueueError> {
        self.store
            .get(task_id)
            .await?
            .ok_or(QueueError::NotFound(task_id))
    }

    /// The persisted record of a task.
    pub async fn record(&self, task_id: TaskId) -> Result<TaskRecord, QueueError> {
        self.status(task_id).await
    }

    /// Cancels a task that has not finished yet.
    pub async fn revoke(&self, task_id: TaskId) -> Result<TaskRecord, QueueError> {
        let record = self.store.revoke(task_id, Utc::now()).await?;
        info!(task_id = %task_id, "Task revoked.");
        Ok(record)
    }

    /// One page of records, newest first. Missing paging parameters take the
    /// configured defaults.
    pub async fn list_records(
        &self,
        filter: &TaskFilter,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Page<TaskRecord>, QueueError> {
        let page = page.unwrap_or(1);
        let page_size = page_size.unwrap_or(self.tasks.default_page_size);
        if page < 1 {
            return Err(QueueError::InvalidArgument("page must be at least 1".to_string()));
        }
        if page_size < 1 || page_size > self.tasks.max_page_size {
            return Err(QueueError::InvalidArgument(format!(
                "page_size must be between 1 and {}",
                self.tasks.max_page_size
            )));
        }

        Ok(self.store.list(filter, PageRequest { page, page_size }).await?)
    }

    pub async fn statistics(&self, filter: &TaskFilter) -> Result<TaskStatistics, QueueError> {
        let snapshot = self.store.snapshot(filter).await?;
        Ok(compute_statistics(&snapshot))
    }

    /// Unfiltered statistics plus the most recently created tasks.
    pub async fn dashboard(&self) -> Result<Dashboard, QueueError> {
        let statistics = self.statistics(&TaskFilter::default()).await?;
        let recent = self.store.recent(self.tasks.recent_tasks_limit).await?;
        Ok(compose_dashboard(statistics, recent))
    }

    /// Deletes finished tasks created more than `days` days ago and returns
    /// how many were removed. Unfinished tasks are never deleted.
    pub async fn cleanup(&self, days: Option<i64>) -> Result<u64, QueueError> {
        let days = days.unwrap_or(self.retention.default_days);
        if days <= 0 {
            return Err(QueueError::InvalidArgument(
                "days must be a positive integer".to_string(),
            ));
        }
        let age = TimeDelta::try_days(days)
            .ok_or_else(|| QueueError::InvalidArgument(format!("days is too large: {days}")))?;
        let cutoff = Utc::now()
            .checked_sub_signed(age)
            .ok_or_else(|| QueueError::InvalidArgument(format!("days is too large: {days}")))?;

        let deleted = self.store.delete_terminal_before(cutoff).await?;
        info!(days, deleted, "Task cleanup finished.");
        Ok(deleted)
    }

    /// Validates and computes a batch immediately, without creating a task.
    pub async fn calculate(
        &self,
        request: VolatilityRequest,
    ) -> Result<VolatilityBatchResult, QueueError> {
        let datasets = self
            .validator
            .validate(&request)
            .map_err(QueueError::Validation)?;
        let model = Arc::clone(&self.model);

        tokio::task::spawn_blocking(move || run_batch(model.as_ref(), &datasets))
            .await
            .map_err(|e| QueueError::Execution(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics::AnalyticsEngine;
    use chrono::Duration;
    use core_types::{TaskStatus, VolatilityDataset};
    use database::{Completion, InMemoryTaskStore};

    fn service_with(store: InMemoryTaskStore) -> TaskService {
        TaskService::new(Arc::new(store), Arc::new(AnalyticsEngine::new()), &Settings::default())
    }

    fn valid_request() -> VolatilityRequest {
        VolatilityRequest {
            datasets: vec![VolatilityDataset::from_returns(vec![0.01, -0.02, 0.015, 0.005])],
            default_trading_days_per_year: Some(252.0),
        }
    }

    #[tokio::test]
    async fn submit_creates_a_pending_task() {
        let service = service_with(InMemoryTaskStore::new());
        let record = service.submit(valid_request()).await.unwrap();
        assert_eq!(record.status, TaskStatus::Pending);
        assert_eq!(service.status(record.task_id).await.unwrap().task_id, record.task_id);
    }

    #[tokio::test]
    async fn task_ids_are_unique() {
        let service = service_with(InMemoryTaskStore::new());
        let a = service.submit(valid_request()).await.unwrap();
        let b = service.submit(valid_request()).await.unwrap();
        assert_ne!(a.task_id, b.task_id);
    }

    #[tokio::test]
    async fn rejected_batch_creates_no_task() {
        let service = service_with(InMemoryTaskStore::new());
        let request = VolatilityRequest {
            datasets: vec![VolatilityDataset::from_returns(vec![0.01])],
            default_trading_days_per_year: None,
        };

        let err = service.submit(request).await.unwrap_err();
        assert!(matches!(err, QueueError::Validation(ref issues) if issues[0].index == Some(0)));
        let stats = service.statistics(&TaskFilter::default()).await.unwrap();
        assert_eq!(stats.total_count, 0);
    }

    #[tokio::test]
    async fn unknown_task_is_not_found() {
        let service = service_with(InMemoryTaskStore::new());
        let id = TaskId::new_v4();
        assert!(matches!(service.status(id).await, Err(QueueError::NotFound(found)) if found == id));
        assert!(matches!(service.revoke(id).await, Err(QueueError::NotFound(_))));
    }

    #[tokio::test]
    async fn revoking_a_finished_task_conflicts() {
        let store = InMemoryTaskStore::new();
        let service = service_with(store.clone());
        let record = service.submit(valid_request()).await.unwrap();
        store.claim_next("w", Utc::now()).await.unwrap();
        store
            .complete(record.task_id, "w", Completion::Failure("boom".into()), Utc::now())
            .await
            .unwrap();

        let err = service.revoke(record.task_id).await.unwrap_err();
        assert!(matches!(err, QueueError::Conflict { status: TaskStatus::Failure, .. }));
        let unchanged = service.status(record.task_id).await.unwrap();
        assert_eq!(unchanged.error_message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn paging_parameters_are_checked() {
        let service = service_with(InMemoryTaskStore::new());
        let filter = TaskFilter::default();
        assert!(matches!(
            service.list_records(&filter, Some(0), None).await,
            Err(QueueError::InvalidArgument(_))
        ));
        assert!(matches!(
            service.list_records(&filter, None, Some(0)).await,
            Err(QueueError::InvalidArgument(_))
        ));
        assert!(matches!(
            service.list_records(&filter, None, Some(101)).await,
            Err(QueueError::InvalidArgument(_))
        ));

        let page = service.list_records(&filter, None, None).await.unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 20);
        assert_eq!(page.total_pages, 0);
    }

    #[tokio::test]
    async fn cleanup_rejects_non_positive_days_before_deleting() {
        let store = InMemoryTaskStore::new();
        let service = service_with(store.clone());
        let old = NewTask::volatility(
            TaskPayload::Volatility { datasets: vec![] },
            Utc::now() - Duration::days(90),
        );
        let old = store.insert(old).await.unwrap();
        store.revoke(old.task_id, Utc::now()).await.unwrap();

        assert!(matches!(service.cleanup(Some(0)).await, Err(QueueError::InvalidArgument(_))));
        assert!(matches!(service.cleanup(Some(-3)).await, Err(QueueError::InvalidArgument(_))));
        assert!(matches!(
            service.cleanup(Some(i64::MAX)).await,
            Err(QueueError::InvalidArgument(_))
        ));
        assert!(store.get(old.task_id).await.unwrap().is_some());

        assert_eq!(service.cleanup(None).await.unwrap(), 1);
        assert!(store.get(old.task_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dashboard_limits_the_recent_feed() {
        let service = service_with(InMemoryTaskStore::new());
        for _ in 0..12 {
            service.submit(valid_request()).await.unwrap();
        }
        let dashboard = service.dashboard().await.unwrap();
        assert_eq!(dashboard.recent_tasks.len(), 10);
        assert_eq!(dashboard.statistics.total_count, 12);
        assert_eq!(dashboard.statistics.pending_count, 12);
        assert_eq!(dashboard.summary.total_tasks, 12);
    }

    #[tokio::test]
    async fn calculate_runs_without_creating_a_task() {
        let service = service_with(InMemoryTaskStore::new());
        let result = service.calculate(valid_request()).await.unwrap();
        assert_eq!(result.total_count, 1);
        assert_eq!(result.success_count, 1);
        assert_eq!(result.results[0].data_points, 4);
        assert!(result.results[0].volatility > 0.0);

        let stats = service.statistics(&TaskFilter::default()).await.unwrap();
        assert_eq!(stats.total_count, 0);
    }
}
