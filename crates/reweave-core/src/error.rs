//! Error types for the `reweave-core` crate.
//!
//! Only structural violations surface as errors to the caller: starting a
//! queue while one is active, starting the same queue twice, or feeding a
//! queue a query with the wrong ordering. Failures inside a single entry
//! are captured as data in the result set and never propagate.

use reweave_types::{ModificationKind, ModificationQueueMode, OwnerId, QueryOrdering};

use crate::ruleset::RulesetError;

/// Errors raised by queue construction and lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// A queue is already active process-wide, owned by someone else.
    #[error("a modification queue is already active for owner {owner}")]
    QueueInUse {
        /// The owner of the active queue.
        owner: OwnerId,
    },

    /// The queue was already started and cannot restart in this mode.
    #[error("queue already started (mode {mode:?})")]
    AlreadyStarted {
        /// The mode the queue is in.
        mode: ModificationQueueMode,
    },

    /// The query's ordering does not match what the queue kind requires.
    #[error("{kind:?} queue requires {expected:?} ordering, query is {actual:?}")]
    WrongOrdering {
        /// The queue kind being constructed.
        kind: ModificationKind,
        /// The ordering that kind requires.
        expected: QueryOrdering,
        /// The ordering the query carries.
        actual: QueryOrdering,
    },

    /// The ruleset failed validation.
    #[error("invalid ruleset: {source}")]
    Ruleset {
        /// The underlying validation error.
        #[from]
        source: RulesetError,
    },
}
