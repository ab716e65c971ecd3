//! # Meridian Core Types
//!
//! The shared vocabulary of the task subsystem. Every other crate speaks in
//! these types: the `TaskRecord` entity and its `TaskStatus` state machine,
//! the dataset shapes accepted at submission, the per-algorithm result
//! variants, and the derived statistics returned to clients.
//!
//! As a Layer 0 crate it has no knowledge of storage, HTTP, or scheduling.

pub mod dataset;
pub mod enums;
pub mod error;
pub mod query;
pub mod results;
pub mod statistics;
pub mod task;

// Re-export the core types to provide a clean public API.
pub use dataset::{DatasetIssue, NormalizedDataset, TaskPayload, VolatilityDataset, VolatilityRequest};
pub use enums::{Algorithm, TaskStatus};
pub use error::CoreError;
pub use query::{Page, PageRequest, TaskFilter};
pub use results::{DatasetFailure, TaskResult, VolatilityBatchResult, VolatilityItem};
pub use statistics::{AlgorithmStat, Dashboard, DashboardSummary, TaskStatistics};
pub use task::{execution_seconds, NewTask, TaskRecord, TaskId, WorkerId, REVOKED_MESSAGE, VOLATILITY_TASK_NAME};
