//! Error types for the storage layer.

/// Errors that can occur in the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A stored payload document failed to deserialize.
    #[error("payload decode error for activity {id}: {source}")]
    Decode {
        /// The offending row's primary key.
        id: i64,
        /// The underlying serde error.
        source: serde_json::Error,
    },

    /// A stored row carries values the data model rejects.
    #[error("corrupt activity row {id}: {reason}")]
    Corrupt {
        /// The offending row's primary key.
        id: i64,
        /// What was wrong with it.
        reason: String,
    },
}
