//! The `PostgreSQL` activity store.
//!
//! Resolves [`ActivityQuery`] values to activity lists for the queue
//! engine and flips reversal flags after a completing run. Reversal
//! flags drive the confirm/undo cycle: rollback queries exclude rows
//! already reversed, restore queries select only reversed rows.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, error};
use uuid::Uuid;

use reweave_core::ActivityStore;
use reweave_types::{
    ActionFamily, ActionKind, ActionPayload, ActionRecord, ActionResultKind, Activity,
    ActivityId, ActivityQuery, QueryOrdering, WorldId, WorldPoint,
};

use crate::error::StoreError;
use crate::postgres::PostgresPool;

/// A row of the `activities` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivityRow {
    /// Primary key.
    pub id: i64,
    /// World UUID.
    pub world_id: Uuid,
    /// Block x coordinate.
    pub x: i32,
    /// Block y coordinate.
    pub y: i32,
    /// Block z coordinate.
    pub z: i32,
    /// Action registry key.
    pub action_key: String,
    /// Action payload family.
    pub action_family: String,
    /// Whether the action can be replayed.
    pub reversible: bool,
    /// Whether the action created or removed something.
    pub result_kind: String,
    /// Optional descriptor.
    pub descriptor: Option<String>,
    /// Optional host metadata document.
    pub metadata: Option<serde_json::Value>,
    /// The serialized [`ActionPayload`].
    pub payload: serde_json::Value,
    /// Free-text cause.
    pub cause: String,
    /// Acting player, if any.
    pub player_id: Option<Uuid>,
    /// When the mutation happened.
    pub occurred_at: DateTime<Utc>,
    /// Current reversal flag.
    pub reversed: bool,
}

fn family_from_db(value: &str) -> Option<ActionFamily> {
    match value {
        "generic" => Some(ActionFamily::Generic),
        "block" => Some(ActionFamily::Block),
        "entity" => Some(ActionFamily::Entity),
        "item" => Some(ActionFamily::Item),
        _ => None,
    }
}

fn result_kind_from_db(value: &str) -> Option<ActionResultKind> {
    match value {
        "creates" => Some(ActionResultKind::Creates),
        "removes" => Some(ActionResultKind::Removes),
        _ => None,
    }
}

/// Convert a row to an [`Activity`].
///
/// Rows resolved by a grouped query carry no storage key, so a later
/// completing run cannot (and must not) flip their reversal flags.
///
/// # Errors
///
/// Returns [`StoreError::Corrupt`] on unknown enum strings or a
/// payload/kind mismatch, [`StoreError::Decode`] on a bad payload
/// document.
pub fn row_to_activity(row: ActivityRow, grouped: bool) -> Result<Activity, StoreError> {
    let family = family_from_db(&row.action_family).ok_or_else(|| StoreError::Corrupt {
        id: row.id,
        reason: format!("unknown action family {:?}", row.action_family),
    })?;
    let result = result_kind_from_db(&row.result_kind).ok_or_else(|| StoreError::Corrupt {
        id: row.id,
        reason: format!("unknown result kind {:?}", row.result_kind),
    })?;
    let payload: ActionPayload =
        serde_json::from_value(row.payload).map_err(|source| StoreError::Decode {
            id: row.id,
            source,
        })?;

    let kind = ActionKind::new(row.action_key, family, row.reversible, result);
    let mut record = ActionRecord::new(kind, payload).map_err(|e| StoreError::Corrupt {
        id: row.id,
        reason: e.to_string(),
    })?;
    record.descriptor = row.descriptor;
    record.metadata = row.metadata;

    let location = WorldPoint::new(WorldId::from(row.world_id), row.x, row.y, row.z);
    let mut activity = Activity::new(record, location, row.cause).at_time(row.occurred_at);
    activity.player = row.player_id.map(Into::into);
    if !grouped {
        activity = activity.with_store_id(ActivityId::from(row.id));
    }
    Ok(activity)
}

/// Activity storage backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PostgresActivityStore {
    pool: PgPool,
}

impl PostgresActivityStore {
    /// Create a store over a connection pool.
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool().clone(),
        }
    }

    /// Resolve a query to its matching activities, in query order.
    ///
    /// Rollback queries (newest-first) exclude rows already reversed;
    /// restore queries (oldest-first) select only reversed rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Postgres`] on query failure, or a
    /// conversion error for a corrupt row.
    pub async fn fetch_matching(
        &self,
        query: &ActivityQuery,
    ) -> Result<Vec<Activity>, StoreError> {
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "SELECT id, world_id, x, y, z, action_key, action_family, reversible, \
             result_kind, descriptor, metadata, payload, cause, player_id, occurred_at, \
             reversed FROM activities WHERE world_id = ",
        );
        builder.push_bind(query.world.into_inner());

        if let Some(region) = query.region {
            builder.push(" AND x BETWEEN ");
            builder.push_bind(region.min.0);
            builder.push(" AND ");
            builder.push_bind(region.max.0);
            builder.push(" AND y BETWEEN ");
            builder.push_bind(region.min.1);
            builder.push(" AND ");
            builder.push_bind(region.max.1);
            builder.push(" AND z BETWEEN ");
            builder.push_bind(region.min.2);
            builder.push(" AND ");
            builder.push_bind(region.max.2);
        }
        if let Some(since) = query.since {
            builder.push(" AND occurred_at >= ");
            builder.push_bind(since);
        }
        if let Some(until) = query.until {
            builder.push(" AND occurred_at <= ");
            builder.push_bind(until);
        }
        if !query.actors.is_empty() {
            let actors: Vec<Uuid> = query.actors.iter().map(|a| a.into_inner()).collect();
            builder.push(" AND player_id = ANY(");
            builder.push_bind(actors);
            builder.push(")");
        }
        if !query.materials.is_empty() {
            let materials: Vec<String> =
                query.materials.iter().map(|m| m.as_str().to_owned()).collect();
            builder.push(" AND material = ANY(");
            builder.push_bind(materials);
            builder.push(")");
        }

        match query.ordering {
            QueryOrdering::NewestFirst => {
                builder.push(" AND reversed = FALSE ORDER BY occurred_at DESC, id DESC");
            }
            QueryOrdering::OldestFirst => {
                builder.push(" AND reversed = TRUE ORDER BY occurred_at ASC, id ASC");
            }
        }

        let rows: Vec<ActivityRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        debug!(count = rows.len(), "resolved activity query");
        rows.into_iter()
            .map(|row| row_to_activity(row, query.grouped))
            .collect()
    }

    /// Flip reversal flags for the given rows, waiting for the write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Postgres`] if the update fails.
    pub async fn mark_reversed_now(
        &self,
        keys: &[ActivityId],
        reversed: bool,
    ) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let ids: Vec<i64> = keys.iter().map(|key| key.into_inner()).collect();
        let result = sqlx::query("UPDATE activities SET reversed = $1 WHERE id = ANY($2)")
            .bind(reversed)
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

impl ActivityStore for PostgresActivityStore {
    /// Fire-and-forget reversal-flag persistence.
    ///
    /// Spawns the write on the tokio runtime so the scheduler thread is
    /// never blocked; failures are logged and do not affect the already
    /// completed operation. Must be called within a tokio runtime.
    fn mark_reversed(&self, keys: &[ActivityId], reversed: bool) {
        let store = self.clone();
        let keys = keys.to_vec();
        tokio::spawn(async move {
            match store.mark_reversed_now(&keys, reversed).await {
                Ok(rows) => debug!(rows, reversed, "reversal flags persisted"),
                Err(err) => {
                    error!(%err, count = keys.len(), "failed to persist reversal flags");
                }
            }
        });
    }
}
