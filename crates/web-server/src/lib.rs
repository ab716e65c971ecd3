use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use configuration::ServerSettings;
use std::future::Future;
use std::sync::Arc;
use task_queue::TaskService;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, Any, CorsLayer, ExposeHeaders},
    trace::TraceLayer,
};

pub mod error;
pub mod handlers;
pub mod responses;

/// The shared application state that all handlers can access.
#[derive(Clone)]
pub struct AppState {
    pub service: TaskService,
    /// Prefix the routes are mounted under, used to build links.
    pub api_prefix: String,
}

/// Builds the application router with every route mounted under
/// `settings.api_prefix`.
pub fn build_router(service: TaskService, settings: &ServerSettings) -> Router {
    let api_prefix = settings.api_prefix.trim_end_matches('/').to_string();
    let app_state = Arc::new(AppState {
        service,
        api_prefix: api_prefix.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(Any)
        .allow_headers(AllowHeaders::any())
        .expose_headers(ExposeHeaders::any());

    let api = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/volatility/async", post(handlers::submit_volatility))
        .route("/algorithms/volatility", post(handlers::calculate_volatility))
        .route("/task/:task_id", get(handlers::get_task_status))
        .route("/task/:task_id/revoke", post(handlers::revoke_task))
        .route("/tasks/records", get(handlers::list_records))
        .route("/tasks/statistics", get(handlers::get_statistics))
        .route("/tasks/dashboard", get(handlers::get_dashboard))
        .route("/tasks/cleanup", delete(handlers::cleanup_tasks))
        .route("/tasks/:task_id/record", get(handlers::get_record))
        .with_state(app_state);

    // axum refuses to nest at the root, so an empty prefix merges instead.
    let app = if api_prefix.is_empty() {
        Router::new().merge(api)
    } else {
        Router::new().nest(&api_prefix, api)
    };

    app.layer(cors)
        // This middleware will automatically log information about every incoming request.
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(settings.body_limit_bytes))
}

/// Serves the API until `shutdown` resolves, then finishes in-flight requests.
pub async fn run_server(
    service: TaskService,
    settings: &ServerSettings,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = settings.socket_addr()?;
    let app = build_router(service, settings);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(prefix = %settings.api_prefix, "Web server listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Web server stopped.");
    Ok(())
}
