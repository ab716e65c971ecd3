//! # Meridian Database Crate
//!
//! The durable record of every computation task. Everything above this crate
//! talks to the `TaskStore` trait; the two implementations are:
//!
//! - `DbRepository`: PostgreSQL, used whenever a database URL is configured.
//!   Claims use `FOR UPDATE SKIP LOCKED`, so any number of worker processes
//!   can share one table.
//! - `InMemoryTaskStore`: a single-process store for development and tests.
//!
//! ## Public API
//!
//! - `connect` / `run_migrations`: pool setup and schema migration.
//! - `TaskStore`, `Completion`, `ClaimScope`, `Recovery`: the store contract.
//! - `DbError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod memory;
pub mod repository;
pub mod store;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, run_migrations};
pub use error::DbError;
pub use memory::InMemoryTaskStore;
pub use repository::DbRepository;
pub use store::{ClaimScope, Completion, Recovery, TaskStore, RETRY_LIMIT_MESSAGE};
