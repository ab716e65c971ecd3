//! # Meridian Analytics
//!
//! The numeric side of the task subsystem. It computes volatility for the
//! datasets of a task and rolls stored task records up into statistics.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** This is a pure logic crate. It has no knowledge of storage
//!   or scheduling. It depends only on `core-types` (Layer 0).
//! - **Stateless Calculation:** Everything here is a function of its inputs. The
//!   worker pool hands in a batch and gets a `VolatilityBatchResult` back; the
//!   task service hands in a snapshot of records and gets `TaskStatistics` back.
//!
//! ## Public API
//!
//! - `VolatilityModel`: The seam through which workers reach the numeric engine.
//! - `AnalyticsEngine`: The default `VolatilityModel`.
//! - `run_batch` / `run_batch_until`: Compute every dataset of a batch independently,
//!   the latter giving up between datasets when asked to stop.
//! - `compute_statistics` / `compose_dashboard`: The statistics aggregator.
//! - `AnalyticsError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod batch;
pub mod engine;
pub mod error;
pub mod statistics;

// Re-export the key components to create a clean, public-facing API.
pub use batch::{run_batch, run_batch_until};
pub use engine::{AnalyticsEngine, VolatilityModel};
pub use error::AnalyticsError;
pub use statistics::{compose_dashboard, compute_statistics};
