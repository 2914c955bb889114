//! Activity records: the immutable history entries the engine replays.
//!
//! An [`Activity`] is one past world mutation. Its [`ActionRecord`] carries
//! the polymorphic payload describing what changed and how to reverse or
//! reapply it. Activities are never mutated after creation; replay only
//! reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{ActionFamily, ActionResultKind, QueryOrdering};
use crate::ids::{ActivityId, OwnerId, WorldId};
use crate::world::{BlockState, EntitySnapshot, ItemStack, Material, Region, WorldPoint};

// ---------------------------------------------------------------------------
// Action kinds
// ---------------------------------------------------------------------------

/// The registered type of an action.
///
/// A kind declares its payload family, whether the action is reversible,
/// and whether its effect created or removed something. Only reversible
/// kinds are ever replayed; irreversible kinds are always reported as
/// skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionKind {
    /// Registry key (e.g. `"block-break"`).
    pub key: String,
    /// The payload family this kind carries.
    pub family: ActionFamily,
    /// Whether the action can be replayed at all.
    pub reversible: bool,
    /// Whether the recorded effect created or removed something.
    pub result: ActionResultKind,
}

impl ActionKind {
    /// Register a custom kind.
    pub fn new(
        key: impl Into<String>,
        family: ActionFamily,
        reversible: bool,
        result: ActionResultKind,
    ) -> Self {
        Self {
            key: key.into(),
            family,
            reversible,
            result,
        }
    }

    /// A block was broken.
    pub fn block_break() -> Self {
        Self::new(
            "block-break",
            ActionFamily::Block,
            true,
            ActionResultKind::Removes,
        )
    }

    /// A block was placed.
    pub fn block_place() -> Self {
        Self::new(
            "block-place",
            ActionFamily::Block,
            true,
            ActionResultKind::Creates,
        )
    }

    /// An entity was killed.
    pub fn entity_kill() -> Self {
        Self::new(
            "entity-kill",
            ActionFamily::Entity,
            true,
            ActionResultKind::Removes,
        )
    }

    /// An entity was spawned.
    pub fn entity_spawn() -> Self {
        Self::new(
            "entity-spawn",
            ActionFamily::Entity,
            true,
            ActionResultKind::Creates,
        )
    }

    /// An item was removed from a container.
    pub fn item_remove() -> Self {
        Self::new(
            "item-remove",
            ActionFamily::Item,
            true,
            ActionResultKind::Removes,
        )
    }

    /// An item was inserted into a container.
    pub fn item_insert() -> Self {
        Self::new(
            "item-insert",
            ActionFamily::Item,
            true,
            ActionResultKind::Creates,
        )
    }

    /// A chat message was sent. Irreversible: recorded for audit only.
    pub fn chat() -> Self {
        Self::new(
            "chat",
            ActionFamily::Generic,
            false,
            ActionResultKind::Creates,
        )
    }
}

// ---------------------------------------------------------------------------
// Action payloads
// ---------------------------------------------------------------------------

/// Type-specific payload of an action record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionPayload {
    /// No world payload.
    Generic,
    /// Prior and new block data. Rollback re-applies `before`; restore
    /// re-applies `after`.
    Block {
        /// The block before the recorded mutation.
        before: BlockState,
        /// The block after the recorded mutation.
        after: BlockState,
    },
    /// A serialized entity.
    Entity {
        /// The entity as it existed when recorded.
        snapshot: EntitySnapshot,
    },
    /// An item stack and the container slot it occupied.
    Item {
        /// The recorded stack.
        stack: ItemStack,
        /// The container slot, if known.
        slot: Option<u32>,
    },
}

impl ActionPayload {
    /// The family this payload belongs to.
    pub const fn family(&self) -> ActionFamily {
        match self {
            Self::Generic => ActionFamily::Generic,
            Self::Block { .. } => ActionFamily::Block,
            Self::Entity { .. } => ActionFamily::Entity,
            Self::Item { .. } => ActionFamily::Item,
        }
    }
}

// ---------------------------------------------------------------------------
// Action records
// ---------------------------------------------------------------------------

/// Errors raised when constructing an [`ActionRecord`].
#[derive(Debug, thiserror::Error)]
pub enum ActionRecordError {
    /// The payload family does not match the kind's declared family.
    #[error("kind {key} expects a {expected:?} payload, got {actual:?}")]
    PayloadMismatch {
        /// The offending kind's registry key.
        key: String,
        /// The family the kind declares.
        expected: ActionFamily,
        /// The family the payload actually belongs to.
        actual: ActionFamily,
    },
}

/// The polymorphic payload of an activity: what changed and how to
/// reverse or reapply it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// The registered kind.
    pub kind: ActionKind,
    /// Optional human-readable descriptor (e.g. a sign's text).
    pub descriptor: Option<String>,
    /// Optional host-specific metadata.
    pub metadata: Option<serde_json::Value>,
    /// The type-specific payload.
    pub payload: ActionPayload,
}

impl ActionRecord {
    /// Create a record, validating payload/kind coherence.
    ///
    /// # Errors
    ///
    /// Returns [`ActionRecordError::PayloadMismatch`] if the payload's
    /// family differs from the kind's declared family.
    pub fn new(kind: ActionKind, payload: ActionPayload) -> Result<Self, ActionRecordError> {
        if payload.family() != kind.family {
            return Err(ActionRecordError::PayloadMismatch {
                key: kind.key,
                expected: kind.family,
                actual: payload.family(),
            });
        }
        Ok(Self {
            kind,
            descriptor: None,
            metadata: None,
            payload,
        })
    }

    /// Attach a human-readable descriptor.
    #[must_use]
    pub fn with_descriptor(mut self, descriptor: impl Into<String>) -> Self {
        self.descriptor = Some(descriptor.into());
        self
    }

    /// Attach host-specific metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

// ---------------------------------------------------------------------------
// Activities
// ---------------------------------------------------------------------------

/// An immutable record of one past world mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// What changed and how to reverse/reapply it.
    pub action: ActionRecord,
    /// Where the mutation happened.
    pub location: WorldPoint,
    /// Free-text cause (e.g. `"explosion"`, a plugin name).
    pub cause: String,
    /// The actor, if the mutation was player-caused.
    pub player: Option<OwnerId>,
    /// When the mutation happened.
    pub occurred_at: DateTime<Utc>,
    /// Storage primary key. Present only for single, non-grouped
    /// activities; required for marking reversal state.
    pub store_id: Option<ActivityId>,
}

impl Activity {
    /// Create an activity occurring now, with no actor and no storage key.
    pub fn new(action: ActionRecord, location: WorldPoint, cause: impl Into<String>) -> Self {
        Self {
            action,
            location,
            cause: cause.into(),
            player: None,
            occurred_at: Utc::now(),
            store_id: None,
        }
    }

    /// Attribute the activity to a player.
    #[must_use]
    pub const fn by_player(mut self, player: OwnerId) -> Self {
        self.player = Some(player);
        self
    }

    /// Set the recorded timestamp.
    #[must_use]
    pub const fn at_time(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    /// Set the storage primary key.
    #[must_use]
    pub const fn with_store_id(mut self, store_id: ActivityId) -> Self {
        self.store_id = Some(store_id);
        self
    }
}

// ---------------------------------------------------------------------------
// Activity queries
// ---------------------------------------------------------------------------

/// The ordering and filters a storage collaborator resolved to produce a
/// queue's activity list.
///
/// The queue never re-queries storage; the query rides along so the
/// engine knows the affected bounding region and can audit what was
/// requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityQuery {
    /// The world the query targets.
    pub world: WorldId,
    /// Bounding region, if the query was spatially bounded.
    pub region: Option<Region>,
    /// Lower time bound (inclusive), if any.
    pub since: Option<DateTime<Utc>>,
    /// Upper time bound (inclusive), if any.
    pub until: Option<DateTime<Utc>>,
    /// Actor filter: match activities by any of these players.
    pub actors: Vec<OwnerId>,
    /// Material filter: match activities touching any of these materials.
    pub materials: Vec<Material>,
    /// Resolution ordering.
    pub ordering: QueryOrdering,
    /// Whether rows were grouped (grouped rows carry no storage key).
    pub grouped: bool,
}

impl ActivityQuery {
    /// A query ordered for rollback (newest first).
    pub const fn rollback(world: WorldId) -> Self {
        Self::with_ordering(world, QueryOrdering::NewestFirst)
    }

    /// A query ordered for restore (oldest first).
    pub const fn restore(world: WorldId) -> Self {
        Self::with_ordering(world, QueryOrdering::OldestFirst)
    }

    const fn with_ordering(world: WorldId, ordering: QueryOrdering) -> Self {
        Self {
            world,
            region: None,
            since: None,
            until: None,
            actors: Vec::new(),
            materials: Vec::new(),
            ordering,
            grouped: false,
        }
    }

    /// Bound the query to a region.
    #[must_use]
    pub const fn in_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    /// Bound the query to a time window.
    #[must_use]
    pub const fn between(mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }

    /// Add an actor filter.
    #[must_use]
    pub fn for_actor(mut self, actor: OwnerId) -> Self {
        self.actors.push(actor);
        self
    }

    /// Add a material filter.
    #[must_use]
    pub fn for_material(mut self, material: impl Into<Material>) -> Self {
        self.materials.push(material.into());
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn point() -> WorldPoint {
        WorldPoint::new(WorldId::new(), 1, 64, -3)
    }

    #[test]
    fn record_accepts_matching_payload() {
        let record = ActionRecord::new(
            ActionKind::block_break(),
            ActionPayload::Block {
                before: BlockState::of("stone"),
                after: BlockState::of("air"),
            },
        );
        assert!(record.is_ok());
    }

    #[test]
    fn record_rejects_mismatched_payload() {
        let result = ActionRecord::new(
            ActionKind::item_remove(),
            ActionPayload::Block {
                before: BlockState::of("stone"),
                after: BlockState::of("air"),
            },
        );
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            ActionRecordError::PayloadMismatch {
                expected: ActionFamily::Item,
                actual: ActionFamily::Block,
                ..
            }
        ));
    }

    #[test]
    fn activity_builder_sets_optional_fields() {
        let record =
            ActionRecord::new(ActionKind::chat(), ActionPayload::Generic).unwrap();
        let player = OwnerId::new();
        let activity = Activity::new(record, point(), "chat")
            .by_player(player)
            .with_store_id(ActivityId::from(7));
        assert_eq!(activity.player, Some(player));
        assert_eq!(activity.store_id, Some(ActivityId::from(7)));
    }

    #[test]
    fn query_constructors_fix_ordering() {
        let world = WorldId::new();
        assert_eq!(
            ActivityQuery::rollback(world).ordering,
            QueryOrdering::NewestFirst
        );
        assert_eq!(
            ActivityQuery::restore(world).ordering,
            QueryOrdering::OldestFirst
        );
    }
}
