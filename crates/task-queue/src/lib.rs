//! # Meridian Task Queue
//!
//! Admission, execution and querying of asynchronous computation tasks.
//!
//! ## Architectural Principles
//!
//! - **Layer 3 Orchestration:** This crate wires the validator, the numeric
//!   engine (`analytics`) and the task store (`database`) together. It owns no
//!   state of its own; everything durable lives behind `TaskStore`.
//! - **Decoupled Execution:** `TaskService::submit` only validates and stores.
//!   A `WorkerPool` claims tasks from the same store and runs them, so the
//!   pool can live in the same process as the HTTP server or in another one.
//!
//! ## Public API
//!
//! - `TaskService`: submit, status, revoke, records, statistics, dashboard, cleanup.
//! - `WorkerPool` / `PoolConfig`: the workers and their graceful drain.
//! - `DatasetValidator`: resolves submitted datasets into returns series.
//! - `build_filter` / `parse_date_bound`: turn query parameters into a `TaskFilter`.
//! - `QueueError`: The specific error types that can be returned from this crate.

pub mod error;
pub mod query;
pub mod service;
pub mod validator;
pub mod worker;

pub use error::QueueError;
pub use query::{build_filter, parse_date_bound, Bound};
pub use service::TaskService;
pub use validator::DatasetValidator;
pub use worker::{PoolConfig, WorkerPool};
