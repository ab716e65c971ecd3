use crate::error::QueueError;
use analytics::{run_batch_until, VolatilityModel};
use chrono::{DateTime, Utc};
use configuration::WorkerSettings;
use core_types::{TaskPayload, TaskRecord, TaskResult, VolatilityBatchResult};
use database::{ClaimScope, Completion, DbError, Recovery, TaskStore};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Runtime parameters of a worker pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub concurrency: usize,
    pub poll_interval: Duration,
    pub max_retries: u32,
    pub task_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl From<&WorkerSettings> for PoolConfig {
    fn from(settings: &WorkerSettings) -> Self {
        Self {
            concurrency: settings.concurrency,
            poll_interval: settings.poll_interval(),
            max_retries: settings.max_retries,
            task_timeout: settings.task_timeout(),
            shutdown_grace: settings.shutdown_grace(),
        }
    }
}

impl PoolConfig {
    /// A STARTED task of another pool older than this is presumed orphaned.
    /// Attempts stop at the first dataset boundary after `task_timeout`.
    fn stale_after(&self) -> Duration {
        self.task_timeout + self.shutdown_grace
    }
}

/// Why an attempt ended without a result.
#[derive(Debug, Clone, PartialEq)]
enum ExecutionFault {
    /// Worth another attempt, e.g. the attempt ran out of time.
    Transient(String),
    /// Another attempt would fail the same way, e.g. the engine panicked.
    Fatal(String),
    /// The pool is shutting down; the task is left for the drain requeue.
    Halted,
}

struct WorkerContext {
    store: Arc<dyn TaskStore>,
    model: Arc<dyn VolatilityModel>,
    config: PoolConfig,
    pool_id: String,
    /// Interrupts in-flight computations once the drain grace has run out.
    halt: CancellationToken,
}

/// A running set of worker loops sharing one task store.
///
/// Each loop claims the oldest claimable task, runs it off the async runtime
/// under a time budget, and writes the outcome back. All writes are
/// conditional on the loop still owning the task, so a task revoked
/// mid-flight keeps its REVOKED status.
pub struct WorkerPool {
    context: Arc<WorkerContext>,
    cancel: CancellationToken,
    workers: JoinSet<()>,
}

impl WorkerPool {
    /// Recovers orphaned tasks, then starts `concurrency` worker loops and a
    /// sweeper that periodically recovers tasks whose worker vanished.
    pub async fn start(
        store: Arc<dyn TaskStore>,
        model: Arc<dyn VolatilityModel>,
        config: PoolConfig,
    ) -> Result<Self, QueueError> {
        let pool_id = format!("pool-{}", Uuid::new_v4().simple());
        let context = Arc::new(WorkerContext {
            store,
            model,
            config,
            pool_id,
            halt: CancellationToken::new(),
        });

        let recovery = context.recover_stale(Utc::now()).await?;
        if recovery != Recovery::default() {
            info!(
                requeued = recovery.requeued,
                failed = recovery.failed,
                "Recovered tasks left running by a previous process."
            );
        }

        let cancel = CancellationToken::new();
        let mut workers = JoinSet::new();
        for n in 0..context.config.concurrency {
            let context = Arc::clone(&context);
            let cancel = cancel.clone();
            workers.spawn(async move { context.run_worker(n, cancel).await });
        }
        {
            let context = Arc::clone(&context);
            let cancel = cancel.clone();
            workers.spawn(async move { context.run_sweeper(cancel).await });
        }

        info!(
            pool = %context.pool_id,
            workers = context.config.concurrency,
            "Worker pool started."
        );
        Ok(Self {
            context,
            cancel,
            workers,
        })
    }

    pub fn pool_id(&self) -> &str {
        &self.context.pool_id
    }

    /// Stops claiming and gives in-flight attempts the grace period to
    /// finish. Attempts still running are then interrupted at their next
    /// dataset and returned to the queue.
    pub async fn shutdown(mut self) -> Result<Recovery, QueueError> {
        info!(pool = %self.context.pool_id, "Draining worker pool.");
        self.cancel.cancel();

        let grace = self.context.config.shutdown_grace;
        if tokio::time::timeout(grace, drain(&mut self.workers)).await.is_err() {
            warn!(
                pool = %self.context.pool_id,
                grace_secs = grace.as_secs_f64(),
                "In-flight tasks did not finish within the grace period; interrupting them."
            );
            self.context.halt.cancel();
            if tokio::time::timeout(grace, drain(&mut self.workers)).await.is_err() {
                error!(pool = %self.context.pool_id, "Worker loops did not stop; aborting them.");
                self.workers.shutdown().await;
            }
        }

        let scope = ClaimScope::Pool(format!("{}/", self.context.pool_id));
        let recovery = self
            .context
            .store
            .requeue_started(scope, self.context.config.max_retries, Utc::now())
            .await?;
        info!(
            pool = %self.context.pool_id,
            requeued = recovery.requeued,
            failed = recovery.failed,
            "Worker pool stopped."
        );
        Ok(recovery)
    }
}

impl WorkerContext {
    async fn recover_stale(&self, now: DateTime<Utc>) -> Result<Recovery, DbError> {
        let stale_after = chrono::Duration::from_std(self.config.stale_after())
            .unwrap_or(chrono::Duration::MAX);
        let cutoff = now.checked_sub_signed(stale_after).unwrap_or(DateTime::<Utc>::MIN_UTC);
        // Our own attempts are alive as long as the pool is.
        let scope = ClaimScope::StartedBefore {
            cutoff,
            except: Some(format!("{}/", self.pool_id)),
        };
        self.store
            .requeue_started(scope, self.config.max_retries, now)
            .await
    }

    async fn run_sweeper(&self, cancel: CancellationToken) {
        let interval = self.config.stale_after();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {
                    match self.recover_stale(Utc::now()).await {
                        Ok(recovery) if recovery == Recovery::default() => {}
                        Ok(recovery) => warn!(
                            requeued = recovery.requeued,
                            failed = recovery.failed,
                            "Recovered stale tasks."
                        ),
                        Err(e) => error!(error = %e, "Stale task sweep failed."),
                    }
                }
            }
        }
    }

    async fn run_worker(&self, n: usize, cancel: CancellationToken) {
        let worker_id = format!("{}/{}", self.pool_id, n);
        debug!(worker = %worker_id, "Worker started.");

        while !cancel.is_cancelled() {
            match self.store.claim_next(&worker_id, Utc::now()).await {
                Ok(Some(task)) => self.execute(&worker_id, task).await,
                Ok(None) => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
                Err(e) => {
                    error!(worker = %worker_id, error = %e, "Failed to claim a task.");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
            }
        }
        debug!(worker = %worker_id, "Worker stopped.");
    }

    async fn execute(&self, worker_id: &str, task: TaskRecord) {
        info!(
            task_id = %task.task_id,
            worker = %worker_id,
            attempt = task.retries + 1,
            "Task started."
        );

        let outcome = match self.attempt(&task).await {
            Ok(result) => Completion::Success(result),
            Err(ExecutionFault::Halted) => {
                info!(task_id = %task.task_id, "Attempt interrupted by shutdown.");
                return;
            }
            Err(ExecutionFault::Fatal(cause)) => Completion::Failure(cause),
            Err(ExecutionFault::Transient(cause)) if task.retries < self.config.max_retries => {
                warn!(task_id = %task.task_id, cause = %cause, "Attempt failed; task will be retried.");
                Completion::Retry
            }
            Err(ExecutionFault::Transient(cause)) => {
                Completion::Failure(format!("retry limit exceeded: {cause}"))
            }
        };
        self.finish(worker_id, &task, outcome).await;
    }

    /// Runs one attempt. The claim is only given up once the computation
    /// has actually stopped, so a task never runs twice at the same time.
    async fn attempt(&self, task: &TaskRecord) -> Result<TaskResult, ExecutionFault> {
        let TaskPayload::Volatility { datasets } = task.payload.clone();
        let model = Arc::clone(&self.model);
        let stop = self.halt.child_token();
        let stop_flag = stop.clone();
        let mut job = tokio::task::spawn_blocking(move || {
            run_batch_until(model.as_ref(), &datasets, || stop_flag.is_cancelled())
        });

        let first = tokio::time::timeout(self.config.task_timeout, &mut job).await;
        match first {
            Ok(joined) => self.settle(joined, false),
            Err(_) => {
                stop.cancel();
                self.settle(job.await, true)
            }
        }
    }

    /// Maps how the computation ended to the outcome of the attempt.
    fn settle(
        &self,
        joined: Result<Option<VolatilityBatchResult>, JoinError>,
        timed_out: bool,
    ) -> Result<TaskResult, ExecutionFault> {
        match joined {
            Ok(Some(batch)) if !timed_out => Ok(TaskResult::from(batch)),
            Err(join_error) if join_error.is_panic() => Err(ExecutionFault::Fatal(format!(
                "computation panicked: {}",
                panic_message(join_error.into_panic())
            ))),
            _ if self.halt.is_cancelled() => Err(ExecutionFault::Halted),
            Ok(_) if timed_out => Err(ExecutionFault::Transient(format!(
                "attempt exceeded the {:.1}s time limit",
                self.config.task_timeout.as_secs_f64()
            ))),
            Ok(_) => Err(ExecutionFault::Halted),
            Err(join_error) => Err(ExecutionFault::Transient(join_error.to_string())),
        }
    }

    /// Writes the outcome of an attempt. A store error is retried once; if
    /// the second write fails too the task stays STARTED until a sweep
    /// recovers it.
    async fn finish(&self, worker_id: &str, task: &TaskRecord, outcome: Completion) {
        for attempt in 1..=2 {
            match self
                .store
                .complete(task.task_id, worker_id, outcome.clone(), Utc::now())
                .await
            {
                Ok(record) => {
                    info!(
                        task_id = %record.task_id,
                        status = %record.status,
                        execution_time = record.execution_time.unwrap_or_default(),
                        "Task attempt finished."
                    );
                    return;
                }
                Err(DbError::Conflict { status, .. }) => {
                    warn!(
                        task_id = %task.task_id,
                        status = %status,
                        "Task changed while running; result discarded."
                    );
                    return;
                }
                Err(DbError::NotFound(_)) => {
                    warn!(task_id = %task.task_id, "Task deleted while running; result discarded.");
                    return;
                }
                Err(e) if attempt == 1 => {
                    warn!(task_id = %task.task_id, error = %e, "Failed to store task outcome; retrying.");
                }
                Err(e) => {
                    error!(task_id = %task.task_id, error = %e, "Failed to store task outcome.");
                }
            }
        }
    }
}

async fn drain(workers: &mut JoinSet<()>) {
    while workers.join_next().await.is_some() {}
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
