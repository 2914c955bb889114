//! Outcome records: per-activity results and queue-level aggregates.

use serde::{Deserialize, Serialize};

use crate::activity::Activity;
use crate::enums::{ModificationKind, ModificationQueueMode, ModificationStatus};
use crate::ids::{OwnerId, QueueId};
use crate::world::{BlockState, EntityKind, Material, WorldPoint};

// ---------------------------------------------------------------------------
// State changes
// ---------------------------------------------------------------------------

/// A recorded old/new block value at one point.
///
/// Captured for every block modification. For planning-mode results this
/// is what allows a discarded preview to be reverted: the fake render at
/// `location` is cleared back to the true live state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    /// Where the change happened (or would happen).
    pub location: WorldPoint,
    /// The live value before the modification.
    pub old: BlockState,
    /// The value the modification wrote (or previewed).
    pub new: BlockState,
}

// ---------------------------------------------------------------------------
// Skip / partial / error reasons
// ---------------------------------------------------------------------------

/// Why a modification was skipped, partial, or errored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModificationReason {
    /// The action's kind is not reversible.
    Irreversible,
    /// The target block material is blacklisted by the ruleset.
    BlacklistedBlock(Material),
    /// The target entity kind is blacklisted by the ruleset.
    BlacklistedEntity(EntityKind),
    /// The target (container, entity) no longer exists in the world.
    TargetMissing(String),
    /// The apply attempt failed with the given error text.
    ApplyFailed(String),
}

impl core::fmt::Display for ModificationReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Irreversible => write!(f, "action is not reversible"),
            Self::BlacklistedBlock(material) => {
                write!(f, "block material {material} is blacklisted")
            }
            Self::BlacklistedEntity(kind) => write!(f, "entity kind {kind} is blacklisted"),
            Self::TargetMissing(what) => write!(f, "target missing: {what}"),
            Self::ApplyFailed(message) => write!(f, "apply failed: {message}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-activity results
// ---------------------------------------------------------------------------

/// The outcome of applying (or previewing) one activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModificationResult {
    /// The outcome status.
    pub status: ModificationStatus,
    /// The source activity.
    pub activity: Activity,
    /// Recorded old/new block value, used to support later
    /// preview-cancellation.
    pub state_change: Option<StateChange>,
    /// Why the entry was skipped, partial, or errored.
    pub reason: Option<ModificationReason>,
    /// Human-readable target description (e.g. `"zombie"`).
    pub target: Option<String>,
}

impl ModificationResult {
    const fn bare(status: ModificationStatus, activity: Activity) -> Self {
        Self {
            status,
            activity,
            state_change: None,
            reason: None,
            target: None,
        }
    }

    /// The change was durably applied.
    pub const fn applied(activity: Activity) -> Self {
        Self::bare(ModificationStatus::Applied, activity)
    }

    /// The change was previewed without durable mutation.
    pub const fn planned(activity: Activity) -> Self {
        Self::bare(ModificationStatus::Planned, activity)
    }

    /// The change was applied incompletely.
    pub fn partial(activity: Activity, reason: ModificationReason) -> Self {
        let mut result = Self::bare(ModificationStatus::Partial, activity);
        result.reason = Some(reason);
        result
    }

    /// The entry was not applied and produced no side effect.
    pub fn skipped(activity: Activity, reason: ModificationReason) -> Self {
        let mut result = Self::bare(ModificationStatus::Skipped, activity);
        result.reason = Some(reason);
        result
    }

    /// The apply attempt failed.
    pub fn errored(activity: Activity, reason: ModificationReason) -> Self {
        let mut result = Self::bare(ModificationStatus::Errored, activity);
        result.reason = Some(reason);
        result
    }

    /// Attach a recorded state change.
    #[must_use]
    pub fn with_state_change(mut self, change: StateChange) -> Self {
        self.state_change = Some(change);
        self
    }

    /// Attach a human-readable target description.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Per-status counts across one queue run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    /// Entries durably applied.
    pub applied: u64,
    /// Entries previewed.
    pub planned: u64,
    /// Entries applied incompletely.
    pub partial: u64,
    /// Entries skipped.
    pub skipped: u64,
    /// Entries whose apply attempt failed.
    pub errored: u64,
}

impl StatusCounts {
    /// Bump the counter matching the given status.
    pub const fn record(&mut self, status: ModificationStatus) {
        match status {
            ModificationStatus::Applied => self.applied = self.applied.saturating_add(1),
            ModificationStatus::Planned => self.planned = self.planned.saturating_add(1),
            ModificationStatus::Partial => self.partial = self.partial.saturating_add(1),
            ModificationStatus::Skipped => self.skipped = self.skipped.saturating_add(1),
            ModificationStatus::Errored => self.errored = self.errored.saturating_add(1),
        }
    }

    /// Total entries recorded.
    pub const fn total(&self) -> u64 {
        self.applied
            .saturating_add(self.planned)
            .saturating_add(self.partial)
            .saturating_add(self.skipped)
            .saturating_add(self.errored)
    }
}

/// Counts of pre/post side effects performed around a completing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEffectTotals {
    /// Hazard blocks removed before the run.
    pub removed_blocks: u64,
    /// Item/xp drops removed before the run.
    pub removed_drops: u64,
    /// Lava blocks drained after the run.
    pub drained_lava: u64,
    /// Living entities relocated out of the region after the run.
    pub moved_entities: u64,
}

/// The aggregate outcome of one queue run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModificationQueueResult {
    /// The queue that produced this result.
    pub queue_id: QueueId,
    /// Rollback or restore.
    pub kind: ModificationKind,
    /// The mode the queue ran in.
    pub mode: ModificationQueueMode,
    /// The owner the run belongs to.
    pub owner: OwnerId,
    /// Per-entry results, in processing order.
    pub results: Vec<ModificationResult>,
    /// Per-status counts.
    pub counts: StatusCounts,
    /// Side-effect counters.
    pub side_effects: SideEffectTotals,
}

impl ModificationQueueResult {
    /// Whether any entry errored during the run.
    pub const fn has_errors(&self) -> bool {
        self.counts.errored > 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::activity::{ActionKind, ActionPayload, ActionRecord};
    use crate::ids::WorldId;

    fn chat_activity() -> Activity {
        let record = ActionRecord::new(ActionKind::chat(), ActionPayload::Generic).unwrap();
        Activity::new(record, WorldPoint::new(WorldId::new(), 0, 0, 0), "test")
    }

    #[test]
    fn status_counts_record_each_status_once() {
        let mut counts = StatusCounts::default();
        counts.record(ModificationStatus::Applied);
        counts.record(ModificationStatus::Applied);
        counts.record(ModificationStatus::Skipped);
        counts.record(ModificationStatus::Errored);
        assert_eq!(counts.applied, 2);
        assert_eq!(counts.skipped, 1);
        assert_eq!(counts.errored, 1);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn constructors_set_status_and_reason() {
        let skipped =
            ModificationResult::skipped(chat_activity(), ModificationReason::Irreversible);
        assert_eq!(skipped.status, ModificationStatus::Skipped);
        assert_eq!(skipped.reason, Some(ModificationReason::Irreversible));
        assert!(skipped.state_change.is_none());

        let errored = ModificationResult::errored(
            chat_activity(),
            ModificationReason::ApplyFailed("boom".to_owned()),
        );
        assert_eq!(errored.status, ModificationStatus::Errored);
    }
}
