use crate::error::DbError;
use configuration::DatabaseSettings;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

/// Establishes a connection pool to the PostgreSQL database described by
/// `settings`. The pool is shared by the web server and every worker.
pub async fn connect(settings: &DatabaseSettings) -> Result<PgPool, DbError> {
    let database_url = settings.url.as_deref().ok_or_else(|| {
        DbError::ConnectionConfigError("database.url or DATABASE_URL must be set.".to_string())
    })?;

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .connect(database_url)
        .await?;

    tracing::info!(max_connections = settings.max_connections, "Connected to PostgreSQL.");
    Ok(pool)
}

/// Applies the embedded migrations, creating the `tasks` table on first start.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
