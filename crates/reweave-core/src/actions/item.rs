//! Item apply handler.
//!
//! An item record carries the stack and its container slot; the action
//! kind's result classification picks the inverse, exactly as for
//! entities. A missing container is not an error: the run carries on and
//! the entry is reported partial.
//!
//! Preview contract: container contents cannot be faked client-locally,
//! so planning performs no world call and reports the prospective target
//! only.

use reweave_types::{
    ActionResultKind, Activity, ItemStack, ModificationKind, ModificationQueueMode,
    ModificationReason, ModificationResult,
};

use super::{ApplyContext, ApplyError};

pub(super) fn apply(
    ctx: &ApplyContext<'_>,
    activity: &Activity,
    stack: &ItemStack,
    slot: Option<u32>,
    direction: ModificationKind,
) -> Result<ModificationResult, ApplyError> {
    if ctx.mode == ModificationQueueMode::Planning {
        return Ok(
            ModificationResult::planned(activity.clone()).with_target(stack.material.as_str())
        );
    }

    let insert = matches!(
        (direction, activity.action.kind.result),
        (ModificationKind::Rollback, ActionResultKind::Removes)
            | (ModificationKind::Restore, ActionResultKind::Creates)
    );

    let found = if insert {
        ctx.world.insert_item(activity.location, stack, slot)?
    } else {
        ctx.world.remove_item(activity.location, stack, slot)?
    };

    let result = if found {
        ModificationResult::applied(activity.clone())
    } else {
        ModificationResult::partial(
            activity.clone(),
            ModificationReason::TargetMissing(format!("no container at {}", activity.location)),
        )
    };

    Ok(result.with_target(stack.material.as_str()))
}
