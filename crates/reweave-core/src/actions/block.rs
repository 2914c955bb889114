//! Block apply handler.
//!
//! A block record carries both the prior and the new block data, so the
//! payload orientation encodes the inverse directly: rollback re-applies
//! `before`, restore re-applies `after`.
//!
//! Preview contract: in planning mode the target state is rendered as a
//! client-local fake to the owner only; persisted world state is never
//! touched. The recorded [`StateChange`] (live value vs target value) is
//! what a later preview-cancellation replays in reverse.

use reweave_types::{
    Activity, BlockState, ModificationKind, ModificationQueueMode, ModificationReason,
    ModificationResult, StateChange,
};

use super::{ApplyContext, ApplyError};

pub(super) fn apply(
    ctx: &ApplyContext<'_>,
    activity: &Activity,
    before: &BlockState,
    after: &BlockState,
    direction: ModificationKind,
) -> Result<ModificationResult, ApplyError> {
    let target = match direction {
        ModificationKind::Rollback => before,
        ModificationKind::Restore => after,
    };

    if ctx.ruleset.block_blacklist.contains(&target.material) {
        return Ok(ModificationResult::skipped(
            activity.clone(),
            ModificationReason::BlacklistedBlock(target.material.clone()),
        ));
    }

    let live = ctx.world.block_at(activity.location)?;
    let change = StateChange {
        location: activity.location,
        old: live,
        new: target.clone(),
    };

    let result = if ctx.mode == ModificationQueueMode::Planning {
        ctx.world.preview_block(ctx.owner, activity.location, target)?;
        ModificationResult::planned(activity.clone())
    } else {
        ctx.world.set_block(activity.location, target)?;
        ModificationResult::applied(activity.clone())
    };

    Ok(result
        .with_state_change(change)
        .with_target(target.material.as_str()))
}
