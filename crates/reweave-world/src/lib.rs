//! Live-world mutation boundary for the Reweave modification engine.
//!
//! The engine replays recorded activities against a continuously-simulated
//! world it does not own. Everything it needs from that world -- block
//! reads/writes, preview rendering, entity and item primitives, and the
//! region sweeps around a completing run -- is expressed by the
//! [`WorldMutator`] trait. Hosts adapt their server behind it;
//! [`MemoryWorld`] backs tests and local runs.
//!
//! # Modules
//!
//! - [`mutator`] -- The [`WorldMutator`] trait
//! - [`memory`] -- In-memory implementation with fault injection
//! - [`error`] -- Shared error type

pub mod error;
pub mod memory;
pub mod mutator;

// Re-export primary types for convenience.
pub use error::WorldError;
pub use memory::{air, MemoryWorld, AIR};
pub use mutator::WorldMutator;
