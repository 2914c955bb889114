//! Enumeration types for the modification engine.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Action classification
// ---------------------------------------------------------------------------

/// Whether an action's recorded effect created or removed something.
///
/// Drives inverse selection for entity and item payloads: rolling back a
/// removal re-creates the target, rolling back a creation removes it, and
/// restore does the opposite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActionResultKind {
    /// The action brought something into the world (block placed, entity
    /// spawned, item inserted).
    Creates,
    /// The action took something out of the world (block broken, entity
    /// killed, item removed).
    Removes,
}

/// The payload family an action kind belongs to.
///
/// Used to validate payload/kind coherence when an action record is
/// constructed: a block payload under an item kind is a recording bug,
/// caught before the record ever reaches a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActionFamily {
    /// No world payload (chat, commands, sign text).
    Generic,
    /// Block mutations carrying prior/new block data.
    Block,
    /// Entity mutations carrying an entity snapshot.
    Entity,
    /// Item mutations carrying an item stack.
    Item,
}

// ---------------------------------------------------------------------------
// Queue lifecycle
// ---------------------------------------------------------------------------

/// The execution mode of a modification queue.
///
/// A queue is created [`Undecided`] and transitions exactly once, on first
/// execution, to either [`Planning`] or [`Completing`]. It never returns
/// to [`Undecided`].
///
/// [`Undecided`]: ModificationQueueMode::Undecided
/// [`Planning`]: ModificationQueueMode::Planning
/// [`Completing`]: ModificationQueueMode::Completing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModificationQueueMode {
    /// Created but not yet started.
    Undecided,
    /// Preview: non-destructive or client-local-only changes. Entries are
    /// read but never removed, so the same queue can be confirmed later.
    Planning,
    /// Real, durable application. Entries are consumed as they are
    /// processed so partial progress is never reprocessed.
    Completing,
}

/// Which direction a queue replays its activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModificationKind {
    /// Replay the inverse effect, newest-first.
    Rollback,
    /// Replay the original effect, oldest-first.
    Restore,
}

// ---------------------------------------------------------------------------
// Per-entry outcomes
// ---------------------------------------------------------------------------

/// The outcome status of one modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModificationStatus {
    /// The change was durably applied to the live world.
    Applied,
    /// The change was previewed without durable mutation.
    Planned,
    /// The change was applied incompletely (e.g. the target container for
    /// an item re-insertion no longer exists).
    Partial,
    /// The entry was not applied (irreversible action or blacklisted
    /// target) and produced no side effect.
    Skipped,
    /// The apply attempt failed; the failure was recorded and the batch
    /// continued.
    Errored,
}

// ---------------------------------------------------------------------------
// Query ordering
// ---------------------------------------------------------------------------

/// The ordering of activities resolved by an activity query.
///
/// Ordering is a correctness requirement, not a style choice: reversing a
/// layered sequence of changes must undo the most recent layer first, or
/// intermediate states become inconsistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryOrdering {
    /// Descending by timestamp. Required by rollback queues.
    NewestFirst,
    /// Ascending by timestamp. Required by restore queues.
    OldestFirst,
}
