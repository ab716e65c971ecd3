use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;
pub mod telemetry;

// Re-export the core types to provide a clean public API.
pub use settings::{
    DatabaseSettings, LoggingSettings, RetentionSettings, ServerSettings, Settings, TaskSettings,
    WorkerSettings,
};
pub use telemetry::init_tracing;

/// Prefix of environment variables that override file settings,
/// e.g. `MERIDIAN__WORKERS__CONCURRENCY=8`.
pub const ENV_PREFIX: &str = "MERIDIAN";

/// Command-line flag pointing at the configuration file.
#[cfg_attr(feature = "clap", derive(clap::Args))]
#[derive(Debug, Clone)]
pub struct ConfigArgs {
    /// Path to the TOML configuration file. A missing file means "use defaults".
    #[cfg_attr(feature = "clap", arg(long, short, global = true, default_value = "config.toml"))]
    pub config: std::path::PathBuf,
}

/// Loads the application settings.
///
/// Layers, lowest precedence first: built-in defaults, the TOML file at `path`
/// (optional), `MERIDIAN__*` environment variables. When no database URL is
/// configured, the conventional `DATABASE_URL` variable is honoured as well.
pub fn load_settings(path: &Path) -> Result<settings::Settings, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let mut settings = builder.try_deserialize::<settings::Settings>()?;
    if settings.database.url.is_none() {
        settings.database.url = std::env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());
    }

    settings.validate()?;
    Ok(settings)
}

/// Parses settings from an in-memory TOML document, without environment overrides.
pub fn settings_from_toml(document: &str) -> Result<settings::Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from_str(document, config::FileFormat::Toml))
        .build()?
        .try_deserialize::<settings::Settings>()?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let settings = settings_from_toml("").unwrap();
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.server.api_prefix, "/api");
        assert_eq!(settings.workers.max_retries, 3);
        assert_eq!(settings.tasks.recent_tasks_limit, 10);
        assert_eq!(settings.retention.default_days, 30);
        assert!(settings.database.url.is_none());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let settings = settings_from_toml(
            r#"
            [workers]
            concurrency = 8

            [tasks]
            default_trading_days_per_year = 365.0
            "#,
        )
        .unwrap();
        assert_eq!(settings.workers.concurrency, 8);
        assert_eq!(settings.workers.poll_interval_ms, 200);
        assert_eq!(settings.tasks.default_trading_days_per_year, 365.0);
        assert_eq!(settings.tasks.max_page_size, 100);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = settings_from_toml("[workers]\nconcurrency = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        let err = settings_from_toml("[server]\napi_prefix = \"api\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        let err = settings_from_toml("[retention]\ndefault_days = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let settings = load_settings(Path::new("definitely-missing-meridian.toml")).unwrap();
        assert_eq!(settings.workers.concurrency, 4);
    }
}
