//! An in-memory [`WorldMutator`] for tests and local runs.
//!
//! Blocks live in a point-keyed map (absent means air). Previews are kept
//! in a per-owner overlay that never touches the durable map, mirroring a
//! client-local fake render. Write failures can be injected per point so
//! the engine's error-isolation path is exercisable without a real host.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use reweave_types::{
    BlockState, EntityKind, EntitySnapshot, ItemStack, Material, OwnerId, Region, WorldPoint,
};

use crate::error::WorldError;
use crate::mutator::WorldMutator;

/// The material representing an empty block.
pub const AIR: &str = "air";

/// An air block state.
pub fn air() -> BlockState {
    BlockState::of(AIR)
}

#[derive(Debug, Default)]
struct WorldState {
    blocks: BTreeMap<WorldPoint, BlockState>,
    previews: BTreeMap<(OwnerId, WorldPoint), BlockState>,
    entities: BTreeMap<WorldPoint, Vec<EntitySnapshot>>,
    containers: BTreeMap<WorldPoint, Vec<ItemStack>>,
    drops: Vec<WorldPoint>,
    relocated: Vec<EntitySnapshot>,
    fail_writes: BTreeSet<WorldPoint>,
}

/// In-memory world backing tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryWorld {
    state: Mutex<WorldState>,
}

impl MemoryWorld {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WorldState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- seeding and inspection helpers -------------------------------------

    /// Seed a durable block.
    pub fn seed_block(&self, point: WorldPoint, state: BlockState) {
        self.lock().blocks.insert(point, state);
    }

    /// Register an empty container at a point.
    pub fn add_container(&self, point: WorldPoint) {
        self.lock().containers.entry(point).or_default();
    }

    /// The stacks in the container at a point, if one exists.
    pub fn container_at(&self, point: WorldPoint) -> Option<Vec<ItemStack>> {
        self.lock().containers.get(&point).cloned()
    }

    /// Drop an item/xp orb entity at a point.
    pub fn add_drop(&self, point: WorldPoint) {
        self.lock().drops.push(point);
    }

    /// Place a living entity at a point.
    pub fn add_entity(&self, point: WorldPoint, snapshot: EntitySnapshot) {
        self.lock().entities.entry(point).or_default().push(snapshot);
    }

    /// The entities currently at a point.
    pub fn entities_at(&self, point: WorldPoint) -> Vec<EntitySnapshot> {
        self.lock().entities.get(&point).cloned().unwrap_or_default()
    }

    /// The owner's preview overlay at a point, if any.
    pub fn preview_at(&self, owner: OwnerId, point: WorldPoint) -> Option<BlockState> {
        self.lock().previews.get(&(owner, point)).cloned()
    }

    /// Number of preview overlays currently held for the owner.
    pub fn preview_count(&self, owner: OwnerId) -> usize {
        self.lock()
            .previews
            .keys()
            .filter(|(o, _)| *o == owner)
            .count()
    }

    /// Number of entities relocated out of swept regions so far.
    pub fn relocated_count(&self) -> usize {
        self.lock().relocated.len()
    }

    /// Inject a write failure: every `set_block` at this point errors.
    pub fn fail_writes_at(&self, point: WorldPoint) {
        self.lock().fail_writes.insert(point);
    }
}

fn count_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

impl WorldMutator for MemoryWorld {
    fn block_at(&self, point: WorldPoint) -> Result<BlockState, WorldError> {
        Ok(self.lock().blocks.get(&point).cloned().unwrap_or_else(air))
    }

    fn set_block(&self, point: WorldPoint, state: &BlockState) -> Result<(), WorldError> {
        let mut world = self.lock();
        if world.fail_writes.contains(&point) {
            return Err(WorldError::MutationRejected { point });
        }
        if state.material.as_str() == AIR {
            world.blocks.remove(&point);
        } else {
            world.blocks.insert(point, state.clone());
        }
        Ok(())
    }

    fn preview_block(
        &self,
        owner: OwnerId,
        point: WorldPoint,
        state: &BlockState,
    ) -> Result<(), WorldError> {
        self.lock().previews.insert((owner, point), state.clone());
        Ok(())
    }

    fn clear_preview(&self, owner: OwnerId, point: WorldPoint) -> Result<(), WorldError> {
        self.lock().previews.remove(&(owner, point));
        Ok(())
    }

    fn spawn_entity(&self, point: WorldPoint, snapshot: &EntitySnapshot) -> Result<(), WorldError> {
        self.lock()
            .entities
            .entry(point)
            .or_default()
            .push(snapshot.clone());
        Ok(())
    }

    fn remove_entity_at(&self, point: WorldPoint, kind: &EntityKind) -> Result<bool, WorldError> {
        let mut world = self.lock();
        let Some(here) = world.entities.get_mut(&point) else {
            return Ok(false);
        };
        let Some(index) = here.iter().position(|e| e.kind == *kind) else {
            return Ok(false);
        };
        here.remove(index);
        Ok(true)
    }

    fn insert_item(
        &self,
        point: WorldPoint,
        stack: &ItemStack,
        _slot: Option<u32>,
    ) -> Result<bool, WorldError> {
        let mut world = self.lock();
        match world.containers.get_mut(&point) {
            Some(contents) => {
                contents.push(stack.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove_item(
        &self,
        point: WorldPoint,
        stack: &ItemStack,
        _slot: Option<u32>,
    ) -> Result<bool, WorldError> {
        let mut world = self.lock();
        let Some(contents) = world.containers.get_mut(&point) else {
            return Ok(false);
        };
        let Some(index) = contents
            .iter()
            .position(|s| s.material == stack.material && s.count == stack.count)
        else {
            return Ok(false);
        };
        contents.remove(index);
        Ok(true)
    }

    fn remove_blocks(
        &self,
        region: &Region,
        materials: &BTreeSet<Material>,
    ) -> Result<u64, WorldError> {
        let mut world = self.lock();
        let doomed: Vec<WorldPoint> = world
            .blocks
            .iter()
            .filter(|(point, state)| region.contains(**point) && materials.contains(&state.material))
            .map(|(point, _)| *point)
            .collect();
        for point in &doomed {
            world.blocks.remove(point);
        }
        debug!(count = doomed.len(), "removed hazard blocks in region");
        Ok(count_u64(doomed.len()))
    }

    fn remove_drops(&self, region: &Region) -> Result<u64, WorldError> {
        let mut world = self.lock();
        let before = world.drops.len();
        world.drops.retain(|point| !region.contains(*point));
        let removed = before.saturating_sub(world.drops.len());
        debug!(count = removed, "removed drops in region");
        Ok(count_u64(removed))
    }

    fn drain_fluid(&self, region: &Region, material: &Material) -> Result<u64, WorldError> {
        let mut world = self.lock();
        let doomed: Vec<WorldPoint> = world
            .blocks
            .iter()
            .filter(|(point, state)| region.contains(**point) && state.material == *material)
            .map(|(point, _)| *point)
            .collect();
        for point in &doomed {
            world.blocks.remove(point);
        }
        debug!(count = doomed.len(), fluid = %material, "drained fluid in region");
        Ok(count_u64(doomed.len()))
    }

    fn move_entities_to_safety(&self, region: &Region) -> Result<u64, WorldError> {
        let mut world = self.lock();
        let points: Vec<WorldPoint> = world
            .entities
            .keys()
            .filter(|point| region.contains(**point))
            .copied()
            .collect();
        let mut moved = 0_u64;
        for point in points {
            if let Some(here) = world.entities.remove(&point) {
                moved = moved.saturating_add(count_u64(here.len()));
                world.relocated.extend(here);
            }
        }
        debug!(count = moved, "relocated entities out of region");
        Ok(moved)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reweave_types::WorldId;

    fn point(world: WorldId, x: i32) -> WorldPoint {
        WorldPoint::new(world, x, 64, 0)
    }

    #[test]
    fn blocks_read_back_and_air_clears() {
        let world = MemoryWorld::new();
        let w = WorldId::new();
        let p = point(w, 1);

        world.set_block(p, &BlockState::of("stone")).unwrap();
        assert_eq!(world.block_at(p).unwrap().material.as_str(), "stone");

        world.set_block(p, &air()).unwrap();
        assert_eq!(world.block_at(p).unwrap().material.as_str(), AIR);
    }

    #[test]
    fn injected_failures_reject_writes() {
        let world = MemoryWorld::new();
        let p = point(WorldId::new(), 2);
        world.fail_writes_at(p);
        let err = world.set_block(p, &BlockState::of("stone")).unwrap_err();
        assert!(matches!(err, WorldError::MutationRejected { .. }));
    }

    #[test]
    fn previews_overlay_without_touching_durable_state() {
        let world = MemoryWorld::new();
        let owner = OwnerId::new();
        let p = point(WorldId::new(), 3);
        world.seed_block(p, BlockState::of("dirt"));

        world.preview_block(owner, p, &BlockState::of("stone")).unwrap();
        assert_eq!(
            world.preview_at(owner, p).unwrap().material.as_str(),
            "stone"
        );
        assert_eq!(world.block_at(p).unwrap().material.as_str(), "dirt");

        world.clear_preview(owner, p).unwrap();
        assert!(world.preview_at(owner, p).is_none());
    }

    #[test]
    fn container_items_insert_and_remove() {
        let world = MemoryWorld::new();
        let p = point(WorldId::new(), 4);
        let stack = ItemStack::of("diamond", 3);

        // No container yet: target missing, not an error.
        assert!(!world.insert_item(p, &stack, None).unwrap());

        world.add_container(p);
        assert!(world.insert_item(p, &stack, None).unwrap());
        assert_eq!(world.container_at(p).unwrap().len(), 1);

        assert!(world.remove_item(p, &stack, None).unwrap());
        assert!(world.container_at(p).unwrap().is_empty());
        assert!(!world.remove_item(p, &stack, None).unwrap());
    }

    #[test]
    fn region_sweeps_count_their_targets() {
        let world = MemoryWorld::new();
        let w = WorldId::new();
        let region = Region::spanning(w, (0, 0, 0), (10, 128, 10));

        world.seed_block(point(w, 1), BlockState::of("fire"));
        world.seed_block(point(w, 2), BlockState::of("tnt"));
        world.seed_block(point(w, 3), BlockState::of("stone"));
        world.seed_block(point(w, 5), BlockState::of("lava"));
        world.add_drop(point(w, 6));
        world.add_drop(WorldPoint::new(w, 50, 64, 50));
        world.add_entity(point(w, 7), EntitySnapshot::of("sheep"));

        let hazards: BTreeSet<Material> =
            [Material::from("fire"), Material::from("tnt")].into_iter().collect();
        assert_eq!(world.remove_blocks(&region, &hazards).unwrap(), 2);
        assert_eq!(world.remove_drops(&region).unwrap(), 1);
        assert_eq!(world.drain_fluid(&region, &Material::from("lava")).unwrap(), 1);
        assert_eq!(world.move_entities_to_safety(&region).unwrap(), 1);
        assert_eq!(world.relocated_count(), 1);

        // The non-hazard block survives every sweep.
        assert_eq!(world.block_at(point(w, 3)).unwrap().material.as_str(), "stone");
    }

    #[test]
    fn entity_removal_reports_absence() {
        let world = MemoryWorld::new();
        let p = point(WorldId::new(), 8);
        let kind = EntityKind::from("zombie");

        assert!(!world.remove_entity_at(p, &kind).unwrap());
        world.add_entity(p, EntitySnapshot::of("zombie"));
        assert!(world.remove_entity_at(p, &kind).unwrap());
        assert!(world.entities_at(p).is_empty());
    }
}
