//! Error types for the `reweave-world` crate.
//!
//! All fallible operations in this crate return [`WorldError`] through the
//! standard [`Result`] type alias.

use reweave_types::WorldPoint;

/// Errors that can occur while mutating the live world.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The world refused a mutation at the given point (protected chunk,
    /// unloaded region, or similar host-side rejection).
    #[error("mutation rejected at {point}")]
    MutationRejected {
        /// Where the rejected mutation targeted.
        point: WorldPoint,
    },

    /// A host-adapter failure that does not map to a specific point.
    #[error("world host error: {0}")]
    Host(String),
}
