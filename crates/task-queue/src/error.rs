use core_types::{DatasetIssue, TaskId, TaskStatus};
use database::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    /// The batch was rejected before anything was stored.
    #[error("The submitted datasets are invalid: {}", summarize(.0))]
    Validation(Vec<DatasetIssue>),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Task {0} was not found.")]
    NotFound(TaskId),

    #[error("Task {task_id} is already {status}.")]
    Conflict { task_id: TaskId, status: TaskStatus },

    /// A synchronous computation could not be completed.
    #[error("Computation failed: {0}")]
    Execution(String),

    #[error("Task store error: {0}")]
    Store(DbError),
}

fn summarize(issues: &[DatasetIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<DbError> for QueueError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(task_id) => QueueError::NotFound(task_id),
            DbError::Conflict { task_id, status } => QueueError::Conflict { task_id, status },
            other => QueueError::Store(other),
        }
    }
}
