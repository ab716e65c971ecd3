use core_types::{CoreError, TaskId, TaskStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to load environment variables for database connection: {0}")]
    ConnectionConfigError(String),

    #[error("Failed to connect to the database: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("An error occurred during JSON serialization/deserialization: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Task {0} was not found.")]
    NotFound(TaskId),

    /// The task is not in a state that allows the requested change,
    /// e.g. it already finished or is owned by another worker.
    #[error("Task {task_id} is {status}; the change was not applied.")]
    Conflict { task_id: TaskId, status: TaskStatus },

    #[error("Invalid task state change: {0}")]
    Transition(#[from] CoreError),

    #[error("Stored record is malformed: {0}")]
    Corrupt(String),
}
