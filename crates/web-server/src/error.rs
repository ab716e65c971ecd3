use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use task_queue::QueueError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Converts our custom `AppError` into an HTTP response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Queue(QueueError::Validation(issues)) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "The submitted datasets are invalid", "details": issues }),
            ),
            AppError::Queue(QueueError::InvalidArgument(message)) | AppError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, json!({ "error": message }))
            }
            AppError::Queue(QueueError::NotFound(task_id)) => (
                StatusCode::NOT_FOUND,
                json!({ "error": format!("Task {} not found", task_id) }),
            ),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, json!({ "error": message })),
            AppError::Queue(QueueError::Conflict { task_id, status }) => (
                StatusCode::CONFLICT,
                json!({
                    "error": format!("Task {} has already finished", task_id),
                    "status": status,
                }),
            ),
            AppError::Queue(QueueError::Execution(message)) => {
                tracing::error!(error = %message, "Computation error.");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "The computation could not be completed" }),
                )
            }
            AppError::Queue(QueueError::Store(db_err)) => {
                tracing::error!(error = ?db_err, "Database error.");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "An internal database error occurred" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
