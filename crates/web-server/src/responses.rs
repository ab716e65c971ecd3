use chrono::{DateTime, Utc};
use core_types::{TaskId, TaskRecord, TaskResult, TaskStatus};
use serde::Serialize;

/// Envelope used by every `/tasks/*` endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: &'static str,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 200,
            message: "success",
            data,
        }
    }
}

/// Where a client can follow up on a task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskLinks {
    pub status: String,
    pub record: String,
}

impl TaskLinks {
    pub fn new(api_prefix: &str, task_id: TaskId) -> Self {
        Self {
            status: format!("{api_prefix}/task/{task_id}"),
            record: format!("{api_prefix}/tasks/{task_id}/record"),
        }
    }
}

/// Body of `POST /volatility/async`.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub links: TaskLinks,
}

impl SubmitResponse {
    pub fn new(record: &TaskRecord, api_prefix: &str) -> Self {
        Self {
            task_id: record.task_id,
            status: record.status,
            message: format!(
                "Volatility task accepted with {} dataset(s)",
                record.payload.dataset_count()
            ),
            created_at: record.created_at,
            links: TaskLinks::new(api_prefix, record.task_id),
        }
    }
}

/// Body of `GET /task/{task_id}`.
#[derive(Debug, Serialize)]
pub struct TaskStatusResponse {
    pub task_id: TaskId,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub message: &'static str,
    pub links: TaskLinks,
}

impl TaskStatusResponse {
    pub fn new(record: TaskRecord, api_prefix: &str) -> Self {
        Self {
            task_id: record.task_id,
            status: record.status,
            links: TaskLinks::new(api_prefix, record.task_id),
            message: record.status.progress_message(),
            result: record.result,
            error: record.error_message,
        }
    }
}

/// Body of `POST /task/{task_id}/revoke`.
#[derive(Debug, Serialize)]
pub struct RevokeResponse {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub deleted_count: u64,
}
