//! The [`WorldMutator`] trait: everything the engine needs from the live
//! world, and nothing else.
//!
//! The modification engine runs cooperatively on the host's simulation
//! thread and touches the world only through this boundary. A production
//! implementation adapts a real game server; [`MemoryWorld`] backs tests
//! and local runs.
//!
//! [`MemoryWorld`]: crate::memory::MemoryWorld

use std::collections::BTreeSet;

use reweave_types::{
    BlockState, EntityKind, EntitySnapshot, ItemStack, Material, OwnerId, Region, WorldPoint,
};

use crate::error::WorldError;

/// Mutation and inspection operations against one live world.
///
/// Single-target operations back the per-activity apply handlers. Region
/// sweeps back the pre/post side-effect passes of a completing run; each
/// returns how many targets it affected.
///
/// Implementations must be callable from the host's simulation thread;
/// the engine never invokes two operations concurrently for one queue.
pub trait WorldMutator: Send + Sync {
    // -- single-target operations -------------------------------------------

    /// Read the live block at a point.
    fn block_at(&self, point: WorldPoint) -> Result<BlockState, WorldError>;

    /// Durably write a block.
    fn set_block(&self, point: WorldPoint, state: &BlockState) -> Result<(), WorldError>;

    /// Render a client-local fake block to the owner. Never durable.
    fn preview_block(
        &self,
        owner: OwnerId,
        point: WorldPoint,
        state: &BlockState,
    ) -> Result<(), WorldError>;

    /// Revert a previously rendered fake block to the true live state.
    fn clear_preview(&self, owner: OwnerId, point: WorldPoint) -> Result<(), WorldError>;

    /// Re-spawn an entity from a snapshot.
    fn spawn_entity(&self, point: WorldPoint, snapshot: &EntitySnapshot) -> Result<(), WorldError>;

    /// Remove one entity of the given kind at a point. Returns whether an
    /// entity was found and removed.
    fn remove_entity_at(&self, point: WorldPoint, kind: &EntityKind) -> Result<bool, WorldError>;

    /// Insert a stack into the container at a point. Returns `false` if no
    /// container exists there anymore.
    fn insert_item(
        &self,
        point: WorldPoint,
        stack: &ItemStack,
        slot: Option<u32>,
    ) -> Result<bool, WorldError>;

    /// Remove a stack from the container at a point. Returns `false` if
    /// the container or the stack is gone.
    fn remove_item(
        &self,
        point: WorldPoint,
        stack: &ItemStack,
        slot: Option<u32>,
    ) -> Result<bool, WorldError>;

    // -- region sweeps ------------------------------------------------------

    /// Remove every block matching one of the materials within the region.
    fn remove_blocks(
        &self,
        region: &Region,
        materials: &BTreeSet<Material>,
    ) -> Result<u64, WorldError>;

    /// Remove item and xp drops within the region.
    fn remove_drops(&self, region: &Region) -> Result<u64, WorldError>;

    /// Drain fluid blocks of the given material within the region.
    fn drain_fluid(&self, region: &Region, material: &Material) -> Result<u64, WorldError>;

    /// Relocate living entities within the region to safe ground outside it.
    fn move_entities_to_safety(&self, region: &Region) -> Result<u64, WorldError>;
}
