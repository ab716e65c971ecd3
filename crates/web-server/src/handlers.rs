use crate::responses::{
    ApiResponse, CleanupResponse, RevokeResponse, SubmitResponse, TaskStatusResponse,
};
use crate::{error::AppError, AppState};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use core_types::{
    Dashboard, Page, TaskId, TaskRecord, TaskStatistics, VolatilityBatchResult, VolatilityRequest,
};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use task_queue::build_filter;

#[derive(Debug, Default, Deserialize)]
pub struct RecordsQuery {
    page: Option<String>,
    page_size: Option<String>,
    algorithm: Option<String>,
    status: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatisticsQuery {
    algorithm: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CleanupQuery {
    days: Option<String>,
}

/// An unparseable task id cannot name an existing task.
fn parse_task_id(raw: &str) -> Result<TaskId, AppError> {
    TaskId::parse_str(raw).map_err(|_| AppError::NotFound(format!("Task {} not found", raw)))
}

/// Parses an optional numeric query parameter; blank counts as absent.
fn parse_param<T: FromStr>(name: &str, raw: Option<&str>) -> Result<Option<T>, AppError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(value) => value.parse().map(Some).map_err(|_| {
            AppError::BadRequest(format!("{} must be a positive integer, got '{}'", name, value))
        }),
    }
}

fn json_body(
    payload: Result<Json<VolatilityRequest>, JsonRejection>,
) -> Result<VolatilityRequest, AppError> {
    payload
        .map(|Json(request)| request)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

/// # POST /api/volatility/async
/// Validates the batch and queues it; the task runs in the worker pool.
pub async fn submit_volatility(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<VolatilityRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let record = state.service.submit(json_body(payload)?).await?;
    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse::new(&record, &state.api_prefix)),
    ))
}

/// # POST /api/algorithms/volatility
/// Computes the batch in the request cycle, without creating a task.
pub async fn calculate_volatility(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<VolatilityRequest>, JsonRejection>,
) -> Result<Json<VolatilityBatchResult>, AppError> {
    let result = state.service.calculate(json_body(payload)?).await?;
    Ok(Json(result))
}

/// # GET /api/task/:task_id
pub async fn get_task_status(
    Path(task_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<TaskStatusResponse>, AppError> {
    let record = state.service.status(parse_task_id(&task_id)?).await?;
    Ok(Json(TaskStatusResponse::new(record, &state.api_prefix)))
}

/// # POST /api/task/:task_id/revoke
pub async fn revoke_task(
    Path(task_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<RevokeResponse>, AppError> {
    let record = state.service.revoke(parse_task_id(&task_id)?).await?;
    Ok(Json(RevokeResponse {
        task_id: record.task_id,
        status: record.status,
        message: record.status.progress_message(),
    }))
}

/// # GET /api/tasks/records
pub async fn list_records(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecordsQuery>,
) -> Result<Json<ApiResponse<Page<TaskRecord>>>, AppError> {
    let filter = build_filter(
        query.algorithm.as_deref(),
        query.status.as_deref(),
        query.start_date.as_deref(),
        query.end_date.as_deref(),
    )?;
    let page = parse_param::<u32>("page", query.page.as_deref())?;
    let page_size = parse_param::<u32>("page_size", query.page_size.as_deref())?;

    let records = state.service.list_records(&filter, page, page_size).await?;
    Ok(Json(ApiResponse::success(records)))
}

/// # GET /api/tasks/:task_id/record
pub async fn get_record(
    Path(task_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<TaskRecord>>, AppError> {
    let record = state.service.record(parse_task_id(&task_id)?).await?;
    Ok(Json(ApiResponse::success(record)))
}

/// # GET /api/tasks/statistics
pub async fn get_statistics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<ApiResponse<TaskStatistics>>, AppError> {
    let filter = build_filter(
        query.algorithm.as_deref(),
        None,
        query.start_date.as_deref(),
        query.end_date.as_deref(),
    )?;
    let statistics = state.service.statistics(&filter).await?;
    Ok(Json(ApiResponse::success(statistics)))
}

/// # GET /api/tasks/dashboard
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Dashboard>>, AppError> {
    let dashboard = state.service.dashboard().await?;
    Ok(Json(ApiResponse::success(dashboard)))
}

/// # DELETE /api/tasks/cleanup
/// Deletes finished tasks older than `days` (default from configuration).
pub async fn cleanup_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CleanupQuery>,
) -> Result<Json<ApiResponse<CleanupResponse>>, AppError> {
    let days = parse_param::<i64>("days", query.days.as_deref())?;
    let deleted_count = state.service.cleanup(days).await?;
    Ok(Json(ApiResponse::success(CleanupResponse { deleted_count })))
}
