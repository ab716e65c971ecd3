use analytics::AnalyticsEngine;
use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use configuration::{init_tracing, load_settings, ConfigArgs, Settings};
use core_types::TaskStatistics;
use database::{DbRepository, InMemoryTaskStore, TaskStore};
use std::sync::Arc;
use task_queue::{build_filter, PoolConfig, TaskService, WorkerPool};

/// The main entry point for the Meridian task service.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment may already be set.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = load_settings(&cli.config.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.config.display()))?;
    let _log_guard = init_tracing(&settings.logging).context("Failed to initialise logging")?;

    let store = open_store(&settings).await?;
    let service = TaskService::new(Arc::clone(&store), Arc::new(AnalyticsEngine::new()), &settings);

    match cli.command {
        Commands::Serve => handle_serve(service, &settings).await,
        Commands::Cleanup(args) => handle_cleanup(service, args).await,
        Commands::Stats(args) => handle_stats(service, args).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Asynchronous computation tasks: submission, execution and statistics.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API together with the worker pool.
    Serve,
    /// Delete finished tasks older than a number of days.
    Cleanup(CleanupArgs),
    /// Print task statistics.
    Stats(StatsArgs),
}

#[derive(Parser)]
struct CleanupArgs {
    /// Age threshold in days (default: retention.default_days).
    #[arg(long)]
    days: Option<i64>,
}

#[derive(Parser)]
struct StatsArgs {
    /// Only count tasks of this algorithm (e.g., "volatility").
    #[arg(long)]
    algorithm: Option<String>,

    /// Only count tasks created on or after this date (YYYY-MM-DD or RFC 3339).
    #[arg(long)]
    from: Option<String>,

    /// Only count tasks created on or before this date (YYYY-MM-DD or RFC 3339).
    #[arg(long)]
    to: Option<String>,

    /// Print the statistics as JSON instead of tables.
    #[arg(long)]
    json: bool,
}

/// PostgreSQL when a database URL is configured, otherwise an in-process store.
async fn open_store(settings: &Settings) -> anyhow::Result<Arc<dyn TaskStore>> {
    if settings.database.url.is_none() {
        tracing::warn!("No database configured; tasks are kept in memory and lost on exit.");
        return Ok(Arc::new(InMemoryTaskStore::new()));
    }

    let pool = database::connect(&settings.database)
        .await
        .context("Failed to connect to the database")?;
    database::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    Ok(Arc::new(DbRepository::new(pool)))
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn handle_serve(service: TaskService, settings: &Settings) -> anyhow::Result<()> {
    let pool = WorkerPool::start(
        service.store(),
        Arc::new(AnalyticsEngine::new()),
        PoolConfig::from(&settings.workers),
    )
    .await
    .context("Failed to start the worker pool")?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for the shutdown signal.");
            return;
        }
        tracing::info!("Shutdown requested.");
    };

    // The pool is drained even when the server fails.
    let served = web_server::run_server(service, &settings.server, shutdown).await;
    pool.shutdown().await.context("Failed to drain the worker pool")?;
    served
}

async fn handle_cleanup(service: TaskService, args: CleanupArgs) -> anyhow::Result<()> {
    let deleted = service.cleanup(args.days).await?;
    println!("Deleted {} finished task(s).", deleted);
    Ok(())
}

async fn handle_stats(service: TaskService, args: StatsArgs) -> anyhow::Result<()> {
    let filter = build_filter(
        args.algorithm.as_deref(),
        None,
        args.from.as_deref(),
        args.to.as_deref(),
    )?;
    let statistics = service.statistics(&filter).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&statistics)?);
    } else {
        print_statistics(&statistics);
    }
    Ok(())
}

fn percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

fn seconds(value: f64) -> String {
    format!("{:.3}s", value)
}

fn print_statistics(statistics: &TaskStatistics) {
    let mut summary = Table::new();
    summary.load_preset(UTF8_FULL).set_header(vec![
        "Total", "Success", "Failure", "Pending", "Running", "Success rate", "Avg time",
        "Min time", "Max time",
    ]);
    summary.add_row(vec![
        statistics.total_count.to_string(),
        statistics.success_count.to_string(),
        statistics.failure_count.to_string(),
        statistics.pending_count.to_string(),
        statistics.running_count.to_string(),
        percent(statistics.success_rate),
        seconds(statistics.avg_execution_time),
        seconds(statistics.min_execution_time),
        seconds(statistics.max_execution_time),
    ]);
    println!("{summary}");

    if statistics.algorithm_stats.is_empty() {
        return;
    }
    let mut per_algorithm = Table::new();
    per_algorithm.load_preset(UTF8_FULL).set_header(vec![
        "Algorithm", "Total", "Success", "Failure", "Success rate", "Avg time",
    ]);
    for stat in &statistics.algorithm_stats {
        per_algorithm.add_row(vec![
            stat.algorithm.to_string(),
            stat.total_count.to_string(),
            stat.success_count.to_string(),
            stat.failure_count.to_string(),
            percent(stat.success_rate),
            seconds(stat.avg_execution_time),
        ]);
    }
    println!("{per_algorithm}");
}
