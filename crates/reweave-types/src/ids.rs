//! Type-safe identifier wrappers.
//!
//! Opaque identities (owners, worlds, queues) are strongly-typed UUID
//! newtypes to prevent accidental mixing at compile time. UUIDs use v7
//! (time-ordered) for efficient database indexing.
//!
//! [`ActivityId`] is the exception: it wraps the storage engine's `i64`
//! primary key, because reversal state is marked against storage rows,
//! not application-side identities.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// The opaque identity that initiated an operation (e.g. a command
    /// invoker). Queues, sessions, and cached results are keyed by owner.
    OwnerId
}

define_id! {
    /// A simulated world. Activities and regions are scoped to one world.
    WorldId
}

define_id! {
    /// A modification queue instance.
    QueueId
}

/// The storage engine's primary key for a persisted activity row.
///
/// Present only on single, non-grouped activities; required for marking
/// reversal state after a completing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActivityId(pub i64);

impl ActivityId {
    /// Return the inner `i64` value.
    pub const fn into_inner(self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for ActivityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ActivityId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<ActivityId> for i64 {
    fn from(id: ActivityId) -> Self {
        id.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types_with_stable_serde() {
        let owner = OwnerId::new();
        let json = serde_json::to_string(&owner).unwrap();
        let back: OwnerId = serde_json::from_str(&json).unwrap();
        assert_eq!(owner, back);
    }

    #[test]
    fn activity_id_round_trips_through_i64() {
        let id = ActivityId::from(42_i64);
        assert_eq!(id.into_inner(), 42);
        assert_eq!(i64::from(id), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn uuid_ids_are_time_ordered() {
        let first = QueueId::new();
        let second = QueueId::new();
        // UUID v7 embeds a millisecond timestamp; two sequential ids
        // never compare greater-to-lesser.
        assert!(first <= second);
    }
}
