//! Entity apply handler.
//!
//! An entity record carries a single snapshot; the action kind's result
//! classification picks the inverse. Rolling back a removal re-spawns
//! the snapshot, rolling back a creation removes it again, and restore
//! mirrors both.
//!
//! Preview contract: entities cannot be faked client-locally, so
//! planning performs no world call at all and reports the prospective
//! target only.

use reweave_types::{
    ActionResultKind, Activity, EntitySnapshot, ModificationKind, ModificationQueueMode,
    ModificationReason, ModificationResult,
};

use super::{ApplyContext, ApplyError};

pub(super) fn apply(
    ctx: &ApplyContext<'_>,
    activity: &Activity,
    snapshot: &EntitySnapshot,
    direction: ModificationKind,
) -> Result<ModificationResult, ApplyError> {
    if ctx.ruleset.entity_blacklist.contains(&snapshot.kind) {
        return Ok(ModificationResult::skipped(
            activity.clone(),
            ModificationReason::BlacklistedEntity(snapshot.kind.clone()),
        ));
    }

    if ctx.mode == ModificationQueueMode::Planning {
        return Ok(
            ModificationResult::planned(activity.clone()).with_target(snapshot.kind.as_str())
        );
    }

    let respawn = matches!(
        (direction, activity.action.kind.result),
        (ModificationKind::Rollback, ActionResultKind::Removes)
            | (ModificationKind::Restore, ActionResultKind::Creates)
    );

    let result = if respawn {
        ctx.world.spawn_entity(activity.location, snapshot)?;
        ModificationResult::applied(activity.clone())
    } else if ctx.world.remove_entity_at(activity.location, &snapshot.kind)? {
        ModificationResult::applied(activity.clone())
    } else {
        ModificationResult::partial(
            activity.clone(),
            ModificationReason::TargetMissing(format!(
                "no {} at {}",
                snapshot.kind, activity.location
            )),
        )
    };

    Ok(result.with_target(snapshot.kind.as_str()))
}
