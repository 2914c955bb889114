//! Apply dispatch: turning one recorded activity into one world mutation.
//!
//! The queue engine depends on exactly two entry points,
//! [`apply_rollback`] and [`apply_restore`]. Dispatch fans out over the
//! action payload union; each variant's handler decides what its inverse
//! is, honors the ruleset blacklists, and distinguishes preview from
//! durable application.
//!
//! Handlers never panic and never abort a batch: every world failure
//! surfaces as an [`ApplyError`] that the queue folds into an errored
//! result for that single entry.

mod block;
mod entity;
mod item;

use reweave_types::{
    Activity, ModificationKind, ModificationQueueMode, ModificationResult, OwnerId,
};
use reweave_world::{WorldError, WorldMutator};

use crate::ruleset::ModificationRuleset;

/// Errors raised while applying one activity.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// The world rejected or failed the mutation.
    #[error(transparent)]
    World(#[from] WorldError),
}

/// Shared context threaded through the per-variant handlers.
pub(crate) struct ApplyContext<'a> {
    /// The live world boundary.
    pub world: &'a dyn WorldMutator,
    /// The policy bounding this operation.
    pub ruleset: &'a ModificationRuleset,
    /// Who the operation belongs to (previews render to this owner).
    pub owner: OwnerId,
    /// Planning or completing.
    pub mode: ModificationQueueMode,
}

/// Apply the inverse of the recorded activity.
///
/// # Errors
///
/// Returns [`ApplyError`] if the world rejects the mutation; the caller
/// records it against this entry and continues the batch.
pub fn apply_rollback(
    world: &dyn WorldMutator,
    ruleset: &ModificationRuleset,
    owner: OwnerId,
    activity: &Activity,
    mode: ModificationQueueMode,
) -> Result<ModificationResult, ApplyError> {
    apply(ModificationKind::Rollback, world, ruleset, owner, activity, mode)
}

/// Re-apply the recorded activity's original effect.
///
/// # Errors
///
/// Returns [`ApplyError`] if the world rejects the mutation; the caller
/// records it against this entry and continues the batch.
pub fn apply_restore(
    world: &dyn WorldMutator,
    ruleset: &ModificationRuleset,
    owner: OwnerId,
    activity: &Activity,
    mode: ModificationQueueMode,
) -> Result<ModificationResult, ApplyError> {
    apply(ModificationKind::Restore, world, ruleset, owner, activity, mode)
}

fn apply(
    direction: ModificationKind,
    world: &dyn WorldMutator,
    ruleset: &ModificationRuleset,
    owner: OwnerId,
    activity: &Activity,
    mode: ModificationQueueMode,
) -> Result<ModificationResult, ApplyError> {
    let ctx = ApplyContext {
        world,
        ruleset,
        owner,
        mode,
    };
    match &activity.action.payload {
        reweave_types::ActionPayload::Generic => Ok(generic(&ctx, activity)),
        reweave_types::ActionPayload::Block { before, after } => {
            block::apply(&ctx, activity, before, after, direction)
        }
        reweave_types::ActionPayload::Entity { snapshot } => {
            entity::apply(&ctx, activity, snapshot, direction)
        }
        reweave_types::ActionPayload::Item { stack, slot } => {
            item::apply(&ctx, activity, stack, *slot, direction)
        }
    }
}

/// Generic records carry no world payload; the record itself is what
/// gets marked reversed.
fn generic(ctx: &ApplyContext<'_>, activity: &Activity) -> ModificationResult {
    let target = activity
        .action
        .descriptor
        .clone()
        .unwrap_or_else(|| activity.action.kind.key.clone());
    let result = if ctx.mode == ModificationQueueMode::Planning {
        ModificationResult::planned(activity.clone())
    } else {
        ModificationResult::applied(activity.clone())
    };
    result.with_target(target)
}
