//! Shared type definitions for the Reweave modification engine.
//!
//! This crate is the single source of truth for the data model shared
//! across the Reweave workspace: identifiers, activity records, world
//! value types, and outcome records.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe identifier wrappers
//! - [`enums`] -- Enumeration types (modes, statuses, orderings)
//! - [`world`] -- Materials, block states, snapshots, coordinates, regions
//! - [`activity`] -- Activity records, action kinds/payloads, queries
//! - [`results`] -- Per-entry results and queue-level aggregates

pub mod activity;
pub mod enums;
pub mod ids;
pub mod results;
pub mod world;

// Re-export all public types at crate root for convenience.
pub use activity::{ActionKind, ActionPayload, ActionRecord, ActionRecordError, Activity, ActivityQuery};
pub use enums::{
    ActionFamily, ActionResultKind, ModificationKind, ModificationQueueMode, ModificationStatus,
    QueryOrdering,
};
pub use ids::{ActivityId, OwnerId, QueueId, WorldId};
pub use results::{
    ModificationQueueResult, ModificationReason, ModificationResult, SideEffectTotals,
    StateChange, StatusCounts,
};
pub use world::{BlockState, EntityKind, EntitySnapshot, ItemStack, Material, Region, WorldPoint};
