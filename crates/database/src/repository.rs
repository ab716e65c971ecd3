use crate::store::{ClaimScope, Completion, Recovery, TaskStore, RETRY_LIMIT_MESSAGE};
use crate::DbError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{
    NewTask, Page, PageRequest, TaskFilter, TaskId, TaskPayload, TaskRecord, TaskResult,
    TaskStatus, REVOKED_MESSAGE,
};
use sqlx::postgres::{PgPool, Postgres};
use sqlx::types::Json;
use sqlx::{FromRow, QueryBuilder};
use uuid::Uuid;

/// Columns selected or returned for every task query, in `TaskRow` order.
const TASK_COLUMNS: &str = "id, task_id, task_name, algorithm, status, result, error_message, \
    execution_time, start_time, end_time, created_at, updated_at, retries, claimed_by, payload";

/// Seconds between the current attempt's start and `$at`, never negative.
/// Expects the instant to be bound as the placeholder named in `at`.
fn elapsed_since_start(at: &str) -> String {
    format!("GREATEST(EXTRACT(EPOCH FROM ({at} - start_time))::float8, 0)")
}

/// The `DbRepository` is the PostgreSQL-backed `TaskStore`.
///
/// Every state change is a single conditional `UPDATE ... RETURNING`, so the
/// row lock taken by PostgreSQL is what makes claims exclusive and keeps
/// revocations and late worker results from overwriting each other.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: PgPool,
}

/// A row of the `tasks` table.
#[derive(Debug, Clone, FromRow)]
struct TaskRow {
    id: i64,
    task_id: Uuid,
    task_name: String,
    algorithm: String,
    status: String,
    result: Option<Json<TaskResult>>,
    error_message: Option<String>,
    execution_time: Option<f64>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    retries: i32,
    claimed_by: Option<String>,
    payload: Json<TaskPayload>,
}

impl TryFrom<TaskRow> for TaskRecord {
    type Error = DbError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let task_id = row.task_id;
        let corrupt = |e: core_types::CoreError| DbError::Corrupt(format!("task {task_id}: {e}"));
        Ok(TaskRecord {
            id: row.id,
            task_id,
            task_name: row.task_name,
            algorithm: row.algorithm.parse().map_err(corrupt)?,
            status: row.status.parse().map_err(corrupt)?,
            result: row.result.map(|Json(result)| result),
            error_message: row.error_message,
            execution_time: row.execution_time,
            start_time: row.start_time,
            end_time: row.end_time,
            created_at: row.created_at,
            updated_at: row.updated_at,
            retries: u32::try_from(row.retries)
                .map_err(|_| DbError::Corrupt(format!("task {task_id}: negative retries")))?,
            claimed_by: row.claimed_by,
            payload: row.payload.0,
        })
    }
}

fn into_records(rows: Vec<TaskRow>) -> Result<Vec<TaskRecord>, DbError> {
    rows.into_iter().map(TaskRecord::try_from).collect()
}

/// Appends the `WHERE` clause for `filter`.
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &TaskFilter) {
    builder.push(" WHERE TRUE");
    if let Some(algorithm) = filter.algorithm {
        builder.push(" AND algorithm = ").push_bind(algorithm.as_str());
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(from) = filter.created_from {
        builder.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.created_to {
        builder.push(" AND created_at <= ").push_bind(to);
    }
}

impl DbRepository {
    /// Creates a new `DbRepository` with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Turns "no row updated" into the error the caller should see.
    async fn explain_missed_update(&self, task_id: TaskId) -> DbError {
        match self.get(task_id).await {
            Ok(Some(task)) => DbError::Conflict {
                task_id,
                status: task.status,
            },
            Ok(None) => DbError::NotFound(task_id),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl TaskStore for DbRepository {
    async fn insert(&self, task: NewTask) -> Result<TaskRecord, DbError> {
        let sql = format!(
            r#"
            INSERT INTO tasks (task_id, task_name, algorithm, status, payload, created_at, updated_at, retries)
            VALUES ($1, $2, $3, $4, $5, $6, $6, 0)
            RETURNING {TASK_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(task.task_id)
            .bind(&task.task_name)
            .bind(task.algorithm.as_str())
            .bind(TaskStatus::Pending.as_str())
            .bind(Json(&task.payload))
            .bind(task.created_at)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn get(&self, task_id: TaskId) -> Result<Option<TaskRecord>, DbError> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE task_id = $1");
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TaskRecord::try_from).transpose()
    }

    async fn claim_next(
        &self,
        worker: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<TaskRecord>, DbError> {
        // SKIP LOCKED lets concurrent pollers pass over a row another
        // transaction is claiming instead of waiting on it.
        let sql = format!(
            r#"
            UPDATE tasks
            SET status = 'STARTED', start_time = $2, end_time = NULL, claimed_by = $1, updated_at = $2
            WHERE id = (
                SELECT id FROM tasks
                WHERE status IN ('PENDING', 'RETRY')
                ORDER BY created_at, id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {TASK_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(worker)
            .bind(at)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TaskRecord::try_from).transpose()
    }

    async fn complete(
        &self,
        task_id: TaskId,
        worker: &str,
        outcome: Completion,
        at: DateTime<Utc>,
    ) -> Result<TaskRecord, DbError> {
        let elapsed = elapsed_since_start("$3");
        let ownership = "WHERE task_id = $1 AND status = 'STARTED' AND claimed_by = $2";

        let row = match outcome {
            Completion::Success(result) => {
                let sql = format!(
                    r#"
                    UPDATE tasks
                    SET status = 'SUCCESS', result = $4, error_message = NULL, end_time = $3,
                        execution_time = {elapsed}, claimed_by = NULL, updated_at = $3
                    {ownership}
                    RETURNING {TASK_COLUMNS}
                    "#
                );
                sqlx::query_as::<_, TaskRow>(&sql)
                    .bind(task_id)
                    .bind(worker)
                    .bind(at)
                    .bind(Json(result))
                    .fetch_optional(&self.pool)
                    .await?
            }
            Completion::Failure(message) => {
                let sql = format!(
                    r#"
                    UPDATE tasks
                    SET status = 'FAILURE', result = NULL, error_message = $4, end_time = $3,
                        execution_time = {elapsed}, claimed_by = NULL, updated_at = $3
                    {ownership}
                    RETURNING {TASK_COLUMNS}
                    "#
                );
                sqlx::query_as::<_, TaskRow>(&sql)
                    .bind(task_id)
                    .bind(worker)
                    .bind(at)
                    .bind(message)
                    .fetch_optional(&self.pool)
                    .await?
            }
            Completion::Retry => {
                let sql = format!(
                    r#"
                    UPDATE tasks
                    SET status = 'RETRY', retries = retries + 1, end_time = $3,
                        execution_time = {elapsed}, claimed_by = NULL, updated_at = $3
                    {ownership}
                    RETURNING {TASK_COLUMNS}
                    "#
                );
                sqlx::query_as::<_, TaskRow>(&sql)
                    .bind(task_id)
                    .bind(worker)
                    .bind(at)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };

        match row {
            Some(row) => row.try_into(),
            None => Err(self.explain_missed_update(task_id).await),
        }
    }

    async fn revoke(&self, task_id: TaskId, at: DateTime<Utc>) -> Result<TaskRecord, DbError> {
        // Only an open attempt accrues execution time; queued time does not.
        let elapsed = elapsed_since_start("$3");
        let sql = format!(
            r#"
            UPDATE tasks
            SET status = 'REVOKED', result = NULL, error_message = $2, end_time = $3,
                execution_time = CASE WHEN status = 'STARTED' THEN {elapsed} ELSE execution_time END,
                claimed_by = NULL, updated_at = $3
            WHERE task_id = $1 AND status IN ('PENDING', 'STARTED', 'RETRY')
            RETURNING {TASK_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(task_id)
            .bind(REVOKED_MESSAGE)
            .bind(at)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row.try_into(),
            None => Err(self.explain_missed_update(task_id).await),
        }
    }

    async fn requeue_started(
        &self,
        scope: ClaimScope,
        max_retries: u32,
        at: DateTime<Utc>,
    ) -> Result<Recovery, DbError> {
        let max_retries = i32::try_from(max_retries).unwrap_or(i32::MAX);

        // Right-hand sides of SET all see the row as it was before the update.
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE tasks SET status = CASE WHEN retries < ");
        builder
            .push_bind(max_retries)
            .push(" THEN 'RETRY' ELSE 'FAILURE' END, retries = CASE WHEN retries < ")
            .push_bind(max_retries)
            .push(" THEN retries + 1 ELSE retries END, error_message = CASE WHEN retries < ")
            .push_bind(max_retries)
            .push(" THEN NULL ELSE ")
            .push_bind(RETRY_LIMIT_MESSAGE)
            .push(" END, end_time = ")
            .push_bind(at)
            .push(", execution_time = GREATEST(EXTRACT(EPOCH FROM (")
            .push_bind(at)
            .push(" - start_time))::float8, 0), claimed_by = NULL, updated_at = ")
            .push_bind(at)
            .push(" WHERE status = 'STARTED'");

        match scope {
            ClaimScope::Pool(prefix) => {
                builder.push(" AND starts_with(claimed_by, ").push_bind(prefix).push(")");
            }
            ClaimScope::StartedBefore { cutoff, except } => {
                builder.push(" AND start_time < ").push_bind(cutoff);
                if let Some(prefix) = except {
                    builder
                        .push(" AND NOT starts_with(claimed_by, ")
                        .push_bind(prefix)
                        .push(")");
                }
            }
        }
        builder.push(" RETURNING status");

        let statuses: Vec<String> = builder
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await?;

        let mut recovery = Recovery::default();
        for status in statuses {
            if status == TaskStatus::Retry.as_str() {
                recovery.requeued += 1;
            } else {
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
        // Count and page come from the same snapshot.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tasks");
        push_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *tx).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {TASK_COLUMNS} FROM tasks"));
        push_filter(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(page.page_size))
            .push(" OFFSET ")
            .push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));
        let rows: Vec<TaskRow> = select.build_query_as().fetch_all(&mut *tx).await?;
        tx.commit().await?;

        Ok(Page::new(into_records(rows)?, total.max(0) as u64, page))
    }

    async fn snapshot(&self, filter: &TaskFilter) -> Result<Vec<TaskRecord>, DbError> {
        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {TASK_COLUMNS} FROM tasks"));
        push_filter(&mut select, filter);
        let rows: Vec<TaskRow> = select.build_query_as().fetch_all(&self.pool).await?;
        into_records(rows)
    }

    async fn recent(&self, limit: u32) -> Result<Vec<TaskRecord>, DbError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at DESC, id DESC LIMIT $1"
        );
        let rows = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        into_records(rows)
    }

    async fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
        let result = sqlx::query(
            "DELETE FROM tasks WHERE status IN ('SUCCESS', 'FAILURE', 'REVOKED') AND created_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
