//! Storage layer for the Reweave modification engine (`PostgreSQL`).
//!
//! Activities are recorded by the host as they happen; this crate
//! resolves queries over that history into the ordered lists the queue
//! engine replays, and persists reversal flags after a completing run.
//!
//! # Modules
//!
//! - [`postgres`] -- Connection pool, configuration, schema setup
//! - [`activity_store`] -- Query resolution and reversal-flag persistence
//! - [`memory`] -- In-memory store for tests and hostless runs
//! - [`error`] -- Shared error types

pub mod activity_store;
pub mod error;
pub mod memory;
pub mod postgres;

// Re-export primary types for convenience.
pub use activity_store::{row_to_activity, ActivityRow, PostgresActivityStore};
pub use error::StoreError;
pub use memory::MemoryActivityStore;
pub use postgres::{PostgresConfig, PostgresPool};
