//! World-facing value types: materials, block states, entity and item
//! snapshots, coordinates, and bounding regions.
//!
//! These are pure data. The behavior that reads and writes the live world
//! lives behind the `WorldMutator` trait in `reweave-world`.

use std::cmp::{max, min};

use serde::{Deserialize, Serialize};

use crate::ids::WorldId;

// ---------------------------------------------------------------------------
// Materials and block state
// ---------------------------------------------------------------------------

/// A namespaced material identifier (e.g. `"stone"`, `"lava"`, `"tnt"`).
///
/// Kept as an open string rather than a closed enum: the engine replays
/// whatever the host simulation recorded, including materials it has
/// never seen.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Material(pub String);

impl Material {
    /// Create a material from its identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The material identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Material {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Material {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// A captured block: material plus optional state document (orientation,
/// waterlogging, container inventory, whatever the host records).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockState {
    /// The block's material.
    pub material: Material,
    /// Host-specific block state, if any.
    pub data: Option<serde_json::Value>,
}

impl BlockState {
    /// Create a block state with no extra data.
    pub fn of(material: impl Into<Material>) -> Self {
        Self {
            material: material.into(),
            data: None,
        }
    }

    /// Attach a state document.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

// ---------------------------------------------------------------------------
// Entities and items
// ---------------------------------------------------------------------------

/// A kind of entity (e.g. `"zombie"`, `"armor_stand"`). Open string for
/// the same reason as [`Material`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKind(pub String);

impl EntityKind {
    /// Create an entity kind from its identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The entity kind identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityKind {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// A serialized entity captured at recording time, sufficient to re-spawn
/// the entity during rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// The entity's kind.
    pub kind: EntityKind,
    /// Host-specific entity data (NBT-like document).
    pub data: Option<serde_json::Value>,
}

impl EntitySnapshot {
    /// Create a snapshot with no extra data.
    pub fn of(kind: impl Into<EntityKind>) -> Self {
        Self {
            kind: kind.into(),
            data: None,
        }
    }
}

/// An item stack captured at recording time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    /// The item's material.
    pub material: Material,
    /// Stack size.
    pub count: u32,
    /// Host-specific item data, if any.
    pub data: Option<serde_json::Value>,
}

impl ItemStack {
    /// Create a stack of the given material and count, with no extra data.
    pub fn of(material: impl Into<Material>, count: u32) -> Self {
        Self {
            material: material.into(),
            count,
            data: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Coordinates and regions
// ---------------------------------------------------------------------------

/// A block coordinate in one world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorldPoint {
    /// The world this point belongs to.
    pub world: WorldId,
    /// Block x coordinate.
    pub x: i32,
    /// Block y coordinate.
    pub y: i32,
    /// Block z coordinate.
    pub z: i32,
}

impl WorldPoint {
    /// Create a point in the given world.
    pub const fn new(world: WorldId, x: i32, y: i32, z: i32) -> Self {
        Self { world, x, y, z }
    }
}

impl core::fmt::Display for WorldPoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {}, {})@{}", self.x, self.y, self.z, self.world)
    }
}

/// An axis-aligned bounding box in one world.
///
/// Corners are normalized on construction so `min` is component-wise less
/// than or equal to `max`. Side-effect sweeps (hazard removal, drop
/// clearing, lava draining, entity relocation) operate over a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// The world this region belongs to.
    pub world: WorldId,
    /// Minimum corner (inclusive).
    pub min: (i32, i32, i32),
    /// Maximum corner (inclusive).
    pub max: (i32, i32, i32),
}

impl Region {
    /// Create a region spanning the two corners, in either order.
    pub fn spanning(world: WorldId, a: (i32, i32, i32), b: (i32, i32, i32)) -> Self {
        Self {
            world,
            min: (min(a.0, b.0), min(a.1, b.1), min(a.2, b.2)),
            max: (max(a.0, b.0), max(a.1, b.1), max(a.2, b.2)),
        }
    }

    /// Create a degenerate region containing a single point.
    pub const fn at(point: WorldPoint) -> Self {
        Self {
            world: point.world,
            min: (point.x, point.y, point.z),
            max: (point.x, point.y, point.z),
        }
    }

    /// Whether the region contains the given point.
    pub fn contains(&self, point: WorldPoint) -> bool {
        point.world == self.world
            && point.x >= self.min.0
            && point.x <= self.max.0
            && point.y >= self.min.1
            && point.y <= self.max.1
            && point.z >= self.min.2
            && point.z <= self.max.2
    }

    /// Grow the region so it also contains the given point.
    ///
    /// Points from a different world leave the region unchanged.
    #[must_use]
    pub fn expand_to_include(self, point: WorldPoint) -> Self {
        if point.world != self.world {
            return self;
        }
        Self {
            world: self.world,
            min: (
                min(self.min.0, point.x),
                min(self.min.1, point.y),
                min(self.min.2, point.z),
            ),
            max: (
                max(self.max.0, point.x),
                max(self.max.1, point.y),
                max(self.max.2, point.z),
            ),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn world() -> WorldId {
        WorldId::new()
    }

    #[test]
    fn region_normalizes_corners() {
        let region = Region::spanning(world(), (10, 5, -3), (-2, 8, 7));
        assert_eq!(region.min, (-2, 5, -3));
        assert_eq!(region.max, (10, 8, 7));
    }

    #[test]
    fn region_containment_respects_world_and_bounds() {
        let w = world();
        let region = Region::spanning(w, (0, 0, 0), (10, 10, 10));
        assert!(region.contains(WorldPoint::new(w, 0, 0, 0)));
        assert!(region.contains(WorldPoint::new(w, 10, 10, 10)));
        assert!(!region.contains(WorldPoint::new(w, 11, 5, 5)));
        assert!(!region.contains(WorldPoint::new(world(), 5, 5, 5)));
    }

    #[test]
    fn region_expands_to_include_points() {
        let w = world();
        let region =
            Region::at(WorldPoint::new(w, 3, 3, 3)).expand_to_include(WorldPoint::new(w, -1, 7, 3));
        assert_eq!(region.min, (-1, 3, 3));
        assert_eq!(region.max, (3, 7, 3));

        // A point in another world is ignored.
        let unchanged = region.expand_to_include(WorldPoint::new(world(), 100, 100, 100));
        assert_eq!(unchanged, region);
    }
}
