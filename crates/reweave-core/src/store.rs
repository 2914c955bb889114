//! The storage-adapter seam.
//!
//! After a completing run, the queue marks the affected persisted
//! activities as reversed (rollback) or un-reversed (restore) so a later
//! restore/rollback can find them. The engine only needs this one
//! operation; resolving queries to activity lists happens before a queue
//! is ever constructed and lives with the storage implementation
//! (`reweave-db`).

use reweave_types::ActivityId;
use tracing::debug;

/// Persistence operations the queue engine consumes.
///
/// `mark_reversed` is fire-and-forget from the scheduler's perspective:
/// implementations may persist asynchronously, must never block the
/// simulation thread, and must swallow (and log) their own failures --
/// a persistence failure does not affect an already-completed operation.
pub trait ActivityStore: Send + Sync {
    /// Flag the given storage rows as reversed or not.
    fn mark_reversed(&self, keys: &[ActivityId], reversed: bool);
}

/// A store for hosts without persistence; logs and drops every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopActivityStore;

impl NoopActivityStore {
    /// Create a no-op store.
    pub const fn new() -> Self {
        Self
    }
}

impl ActivityStore for NoopActivityStore {
    fn mark_reversed(&self, keys: &[ActivityId], reversed: bool) {
        debug!(count = keys.len(), reversed, "dropping reversal flags (no store configured)");
    }
}
