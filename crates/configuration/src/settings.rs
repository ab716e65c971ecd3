use crate::error::ConfigError;
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

/// The root configuration structure for the entire application.
///
/// Every section is optional; a missing key falls back to the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub workers: WorkerSettings,
    pub tasks: TaskSettings,
    pub retention: RetentionSettings,
    pub logging: LoggingSettings,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Prefix mounted in front of every route, e.g. `/api`.
    pub api_prefix: String,
    pub body_limit_bytes: usize,
}

/// Task store settings. Without a `url` the service keeps tasks in memory.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

/// Worker pool settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Number of concurrent worker loops.
    pub concurrency: usize,
    /// Back-off between claim attempts when the queue is empty.
    pub poll_interval_ms: u64,
    /// How many times a task may be requeued before it is failed.
    pub max_retries: u32,
    /// Budget for one execution attempt.
    pub task_timeout_secs: u64,
    /// How long in-flight attempts may run after shutdown is requested.
    pub shutdown_grace_secs: u64,
}

/// Submission and query settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    pub max_datasets: usize,
    pub default_trading_days_per_year: f64,
    /// Number of tasks shown in the dashboard's recent feed.
    pub recent_tasks_limit: u32,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetentionSettings {
    /// Age threshold used by cleanup when the caller gives none.
    pub default_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Enables daily rolling log files in this directory.
    pub directory: Option<String>,
    pub file_prefix: String,
}

// --- Default Implementations ---

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            api_prefix: "/api".to_string(),
            body_limit_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            acquire_timeout_secs: 5,
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            poll_interval_ms: 200,
            max_retries: 3,
            task_timeout_secs: 300,
            shutdown_grace_secs: 10,
        }
    }
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            max_datasets: 1000,
            default_trading_days_per_year: 252.0,
            recent_tasks_limit: 10,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self { default_days: 30 }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "meridian.log".to_string(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::ValidationError(format!("invalid server address: {}", e)))
    }
}

impl WorkerSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Settings {
    /// Rejects settings the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

        if self.server.port == 0 {
            return fail("server.port must not be 0");
        }
        if !self.server.api_prefix.starts_with('/') {
            return fail("server.api_prefix must start with '/'");
        }
        if self.workers.concurrency == 0 {
            return fail("workers.concurrency must be at least 1");
        }
        if self.workers.task_timeout_secs == 0 {
            return fail("workers.task_timeout_secs must be at least 1");
        }
        if self.tasks.max_datasets == 0 {
            return fail("tasks.max_datasets must be at least 1");
        }
        let days = self.tasks.default_trading_days_per_year;
        if !(days.is_finite() && days > 0.0) {
            return fail("tasks.default_trading_days_per_year must be positive");
        }
        if self.tasks.recent_tasks_limit == 0 {
            return fail("tasks.recent_tasks_limit must be at least 1");
        }
        if self.tasks.default_page_size == 0
            || self.tasks.default_page_size > self.tasks.max_page_size
        {
            return fail("tasks.default_page_size must be between 1 and tasks.max_page_size");
        }
        if self.retention.default_days < 1 {
            return fail("retention.default_days must be at least 1");
        }
        if self.database.max_connections == 0 {
            return fail("database.max_connections must be at least 1");
        }
        Ok(())
    }
}
