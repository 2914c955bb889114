//! The modification queue service: process-wide session management.
//!
//! At most one modification queue may be active at any time. That single
//! slot is the only cross-session shared state in the engine, and every
//! transition (install, clear, cancel) happens under one mutex so no two
//! callers can both pass the availability check and install a queue.
//!
//! The service also keeps a small owner-keyed cache of recent results so
//! a later "confirm this preview" or "show me what happened" command can
//! find the most recent outcome without re-running the query, and it
//! reverts client-visible preview state when a planning result is
//! discarded.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use reweave_types::{
    Activity, ActivityQuery, ModificationKind, ModificationQueueMode, ModificationQueueResult,
    OwnerId,
};
use reweave_world::WorldMutator;

use crate::error::QueueError;
use crate::queue::{CompletionCallback, ModificationQueue, QueueSpec};
use crate::ruleset::ModificationRuleset;
use crate::scheduler::Scheduler;
use crate::store::ActivityStore;

/// Default bound on cached results.
const DEFAULT_CACHE_CAPACITY: usize = 8;

/// Default lifetime of a cached result.
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// Completion sink
// ---------------------------------------------------------------------------

/// Receiver for queue completion notifications.
///
/// The command layer implements this to message the owner; [`LogSink`]
/// is the default for embedders that only want logs.
pub trait CompletionSink: Send + Sync {
    /// A completing run finished: report counts and side-effect totals.
    fn queue_completed(&self, owner: OwnerId, result: &ModificationQueueResult);

    /// A planning run finished: report the planned count only.
    fn queue_planned(&self, owner: OwnerId, result: &ModificationQueueResult);
}

/// A completion sink that reports through the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl LogSink {
    /// Create a log sink.
    pub const fn new() -> Self {
        Self
    }
}

impl CompletionSink for LogSink {
    fn queue_completed(&self, owner: OwnerId, result: &ModificationQueueResult) {
        info!(
            %owner,
            kind = ?result.kind,
            applied = result.counts.applied,
            partial = result.counts.partial,
            skipped = result.counts.skipped,
            removed_blocks = result.side_effects.removed_blocks,
            removed_drops = result.side_effects.removed_drops,
            drained_lava = result.side_effects.drained_lava,
            moved_entities = result.side_effects.moved_entities,
            with_errors = result.has_errors(),
            "modification complete"
        );
    }

    fn queue_planned(&self, owner: OwnerId, result: &ModificationQueueResult) {
        info!(
            %owner,
            kind = ?result.kind,
            planned = result.counts.planned,
            "modification preview ready"
        );
    }
}

// ---------------------------------------------------------------------------
// Result cache
// ---------------------------------------------------------------------------

struct CachedResult {
    result: ModificationQueueResult,
    inserted_at: Instant,
}

/// Owner-keyed result cache, bounded by capacity and age.
struct ResultCache {
    capacity: usize,
    ttl: Duration,
    entries: HashMap<OwnerId, CachedResult>,
    order: VecDeque<OwnerId>,
}

impl ResultCache {
    fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn insert(&mut self, owner: OwnerId, result: ModificationQueueResult) {
        self.entries.insert(
            owner,
            CachedResult {
                result,
                inserted_at: Instant::now(),
            },
        );
        self.order.retain(|o| *o != owner);
        self.order.push_back(owner);
        self.evict();
    }

    fn get(&mut self, owner: OwnerId) -> Option<&ModificationQueueResult> {
        self.prune_expired();
        self.entries.get(&owner).map(|cached| &cached.result)
    }

    fn remove(&mut self, owner: OwnerId) -> Option<ModificationQueueResult> {
        self.order.retain(|o| *o != owner);
        self.entries.remove(&owner).map(|cached| cached.result)
    }

    fn evict(&mut self) {
        self.prune_expired();
        while self.entries.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
    }

    fn prune_expired(&mut self) {
        let ttl = self.ttl;
        let expired: Vec<OwnerId> = self
            .entries
            .iter()
            .filter(|(_, cached)| cached.inserted_at.elapsed() >= ttl)
            .map(|(owner, _)| *owner)
            .collect();
        for owner in expired {
            self.entries.remove(&owner);
            self.order.retain(|o| *o != owner);
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

struct ActiveQueue {
    owner: OwnerId,
    queue: ModificationQueue,
}

struct ServiceState {
    active: Option<ActiveQueue>,
    cache: ResultCache,
}

/// Process-wide modification session manager.
///
/// Owns the single active-queue slot, routes completion results into the
/// cache and the [`CompletionSink`], and reverts preview state when a
/// planning result is discarded.
pub struct ModificationQueueService {
    scheduler: Arc<dyn Scheduler>,
    world: Arc<dyn WorldMutator>,
    store: Arc<dyn ActivityStore>,
    sink: Arc<dyn CompletionSink>,
    state: Arc<Mutex<ServiceState>>,
}

impl ModificationQueueService {
    /// Create a service with default cache settings.
    pub fn new(
        scheduler: Arc<dyn Scheduler>,
        world: Arc<dyn WorldMutator>,
        store: Arc<dyn ActivityStore>,
        sink: Arc<dyn CompletionSink>,
    ) -> Self {
        Self::with_cache_settings(
            scheduler,
            world,
            store,
            sink,
            DEFAULT_CACHE_CAPACITY,
            DEFAULT_CACHE_TTL,
        )
    }

    /// Create a service with explicit result-cache bounds.
    pub fn with_cache_settings(
        scheduler: Arc<dyn Scheduler>,
        world: Arc<dyn WorldMutator>,
        store: Arc<dyn ActivityStore>,
        sink: Arc<dyn CompletionSink>,
        cache_capacity: usize,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            scheduler,
            world,
            store,
            sink,
            state: Arc::new(Mutex::new(ServiceState {
                active: None,
                cache: ResultCache::new(cache_capacity, cache_ttl),
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ServiceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a new queue may be installed right now.
    pub fn queue_available(&self) -> bool {
        self.lock().active.is_none()
    }

    /// Install a rollback queue for the owner.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::QueueInUse`] if another owner's queue is
    /// active, or a construction error from the queue itself.
    pub fn new_rollback_queue(
        &self,
        ruleset: ModificationRuleset,
        owner: OwnerId,
        query: ActivityQuery,
        activities: Vec<Activity>,
    ) -> Result<ModificationQueue, QueueError> {
        self.new_queue(ModificationKind::Rollback, ruleset, owner, query, activities)
    }

    /// Install a restore queue for the owner.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::QueueInUse`] if another owner's queue is
    /// active, or a construction error from the queue itself.
    pub fn new_restore_queue(
        &self,
        ruleset: ModificationRuleset,
        owner: OwnerId,
        query: ActivityQuery,
        activities: Vec<Activity>,
    ) -> Result<ModificationQueue, QueueError> {
        self.new_queue(ModificationKind::Restore, ruleset, owner, query, activities)
    }

    fn new_queue(
        &self,
        kind: ModificationKind,
        ruleset: ModificationRuleset,
        owner: OwnerId,
        query: ActivityQuery,
        activities: Vec<Activity>,
    ) -> Result<ModificationQueue, QueueError> {
        let mut state = self.lock();

        if let Some(active) = &state.active {
            if active.owner != owner {
                return Err(QueueError::QueueInUse {
                    owner: active.owner,
                });
            }
            // Same owner: the new session replaces the old one entirely.
            active.queue.destroy();
            state.active = None;
            self.discard_cached(&mut state, owner);
        }

        let queue = ModificationQueue::new(
            QueueSpec {
                kind,
                ruleset,
                owner,
                query,
                activities,
            },
            Arc::clone(&self.scheduler),
            Arc::clone(&self.world),
            Arc::clone(&self.store),
            self.completion_callback(owner),
        )?;

        info!(%owner, ?kind, queue = %queue.id(), "modification session opened");
        state.active = Some(ActiveQueue {
            owner,
            queue: queue.clone(),
        });
        Ok(queue)
    }

    /// The completion callback routes each run's result back into the
    /// service: completing runs end the session, planning runs keep it
    /// open for confirm/cancel.
    fn completion_callback(&self, owner: OwnerId) -> CompletionCallback {
        let state = Arc::clone(&self.state);
        let sink = Arc::clone(&self.sink);
        Arc::new(move |result: ModificationQueueResult| {
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            if result.mode == ModificationQueueMode::Completing {
                state.active = None;
                sink.queue_completed(owner, &result);
            } else {
                sink.queue_planned(owner, &result);
            }
            state.cache.insert(owner, result);
        })
    }

    /// The active queue, if it belongs to this owner.
    pub fn current_queue_for_owner(&self, owner: OwnerId) -> Option<ModificationQueue> {
        self.lock()
            .active
            .as_ref()
            .filter(|active| active.owner == owner)
            .map(|active| active.queue.clone())
    }

    /// Cancel and clear the active queue iff it belongs to this owner.
    ///
    /// Returns whether anything was cancelled.
    pub fn cancel_queue_for_owner(&self, owner: OwnerId) -> bool {
        let mut state = self.lock();
        let owned = state
            .active
            .as_ref()
            .is_some_and(|active| active.owner == owner);
        if !owned {
            return false;
        }
        if let Some(active) = state.active.take() {
            active.queue.destroy();
            info!(%owner, "modification session cancelled");
        }
        true
    }

    /// The most recent cached result for this owner, if still fresh.
    pub fn queue_result_for_owner(&self, owner: OwnerId) -> Option<ModificationQueueResult> {
        self.lock().cache.get(owner).cloned()
    }

    /// Cancel any queue and discard any cached result for this owner.
    ///
    /// If the cached result was produced in planning mode, every recorded
    /// state change is reverted so the owner's client sees the true live
    /// world again.
    pub fn clear_everything_for_owner(&self, owner: OwnerId) {
        let mut state = self.lock();
        let owned = state
            .active
            .as_ref()
            .is_some_and(|active| active.owner == owner);
        if owned {
            if let Some(active) = state.active.take() {
                active.queue.destroy();
            }
        }
        self.discard_cached(&mut state, owner);
    }

    fn discard_cached(&self, state: &mut ServiceState, owner: OwnerId) {
        let Some(result) = state.cache.remove(owner) else {
            return;
        };
        if result.mode != ModificationQueueMode::Planning {
            return;
        }
        // Revert the fake renders recorded during the preview.
        let mut reverted: u64 = 0;
        for entry in &result.results {
            let Some(change) = &entry.state_change else {
                continue;
            };
            match self.world.clear_preview(owner, change.location) {
                Ok(()) => reverted = reverted.saturating_add(1),
                Err(error) => {
                    warn!(%owner, location = %change.location, %error, "failed to clear preview");
                }
            }
        }
        info!(%owner, reverted, "discarded preview state");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use reweave_types::{
        ActionKind, ActionPayload, ActionRecord, ActivityId, BlockState, Region, WorldId,
        WorldPoint,
    };
    use reweave_world::MemoryWorld;

    use crate::scheduler::ManualScheduler;
    use crate::store::NoopActivityStore;

    #[derive(Debug, Default)]
    struct CountingSink {
        completed: Mutex<u64>,
        planned: Mutex<u64>,
    }

    impl CompletionSink for CountingSink {
        fn queue_completed(&self, _owner: OwnerId, _result: &ModificationQueueResult) {
            *self.completed.lock().unwrap() += 1;
        }

        fn queue_planned(&self, _owner: OwnerId, _result: &ModificationQueueResult) {
            *self.planned.lock().unwrap() += 1;
        }
    }

    struct Fixture {
        scheduler: Arc<ManualScheduler>,
        world: Arc<MemoryWorld>,
        sink: Arc<CountingSink>,
        service: ModificationQueueService,
        world_id: WorldId,
    }

    impl Fixture {
        fn new() -> Self {
            let scheduler = Arc::new(ManualScheduler::new());
            let world = Arc::new(MemoryWorld::new());
            let sink = Arc::new(CountingSink::default());
            let service = ModificationQueueService::new(
                Arc::clone(&scheduler) as Arc<dyn Scheduler>,
                Arc::clone(&world) as Arc<dyn WorldMutator>,
                Arc::new(NoopActivityStore::new()),
                Arc::clone(&sink) as Arc<dyn CompletionSink>,
            );
            Self {
                scheduler,
                world,
                sink,
                service,
                world_id: WorldId::new(),
            }
        }

        fn query(&self) -> ActivityQuery {
            ActivityQuery::rollback(self.world_id)
                .in_region(Region::spanning(self.world_id, (-64, 0, -64), (64, 128, 64)))
        }

        fn activities(&self, n: i64) -> Vec<Activity> {
            (0..n)
                .rev()
                .map(|i| {
                    let record = ActionRecord::new(
                        ActionKind::block_break(),
                        ActionPayload::Block {
                            before: BlockState::of("stone"),
                            after: BlockState::of("air"),
                        },
                    )
                    .unwrap();
                    let x = i32::try_from(i).unwrap();
                    Activity::new(
                        record,
                        WorldPoint::new(self.world_id, x, 64, 0),
                        "test",
                    )
                    .at_time(Utc.timestamp_opt(i.saturating_mul(10), 0).single().unwrap())
                    .with_store_id(ActivityId::from(i))
                })
                .collect()
        }
    }

    #[test]
    fn second_owner_is_rejected_while_a_queue_is_active() {
        let fx = Fixture::new();
        let alice = OwnerId::new();
        let bob = OwnerId::new();

        let queue = fx
            .service
            .new_rollback_queue(
                ModificationRuleset::default(),
                alice,
                fx.query(),
                fx.activities(3),
            )
            .unwrap();
        assert!(!fx.service.queue_available());

        let rejected = fx.service.new_rollback_queue(
            ModificationRuleset::default(),
            bob,
            fx.query(),
            fx.activities(2),
        );
        assert!(matches!(rejected, Err(QueueError::QueueInUse { owner }) if owner == alice));

        // The original queue is untouched.
        let current = fx.service.current_queue_for_owner(alice).unwrap();
        assert_eq!(current.id(), queue.id());
        assert_eq!(current.queue_size(), 3);
        assert!(fx.service.current_queue_for_owner(bob).is_none());
    }

    #[test]
    fn same_owner_replaces_their_own_session() {
        let fx = Fixture::new();
        let alice = OwnerId::new();

        let first = fx
            .service
            .new_rollback_queue(
                ModificationRuleset::default(),
                alice,
                fx.query(),
                fx.activities(3),
            )
            .unwrap();
        let second = fx
            .service
            .new_rollback_queue(
                ModificationRuleset::default(),
                alice,
                fx.query(),
                fx.activities(5),
            )
            .unwrap();

        assert_ne!(first.id(), second.id());
        let current = fx.service.current_queue_for_owner(alice).unwrap();
        assert_eq!(current.id(), second.id());

        // The first queue was destroyed; starting it is rejected and
        // stepping the scheduler only drives the second.
        second.apply().unwrap();
        fx.scheduler.step_n(2);
        assert_eq!(second.queue_size(), 0);
    }

    #[test]
    fn completing_run_ends_the_session_and_caches_the_result() {
        let fx = Fixture::new();
        let alice = OwnerId::new();

        let queue = fx
            .service
            .new_rollback_queue(
                ModificationRuleset::default(),
                alice,
                fx.query(),
                fx.activities(4),
            )
            .unwrap();
        queue.apply().unwrap();
        fx.scheduler.step_n(2);

        assert!(fx.service.queue_available());
        let result = fx.service.queue_result_for_owner(alice).unwrap();
        assert_eq!(result.counts.applied, 4);
        assert_eq!(*fx.sink.completed.lock().unwrap(), 1);
        assert_eq!(*fx.sink.planned.lock().unwrap(), 0);
    }

    #[test]
    fn planning_run_keeps_the_session_open() {
        let fx = Fixture::new();
        let alice = OwnerId::new();

        let queue = fx
            .service
            .new_rollback_queue(
                ModificationRuleset::default(),
                alice,
                fx.query(),
                fx.activities(4),
            )
            .unwrap();
        queue.preview().unwrap();
        fx.scheduler.step_n(2);

        // Session still occupied so the preview can be confirmed.
        assert!(!fx.service.queue_available());
        assert_eq!(*fx.sink.planned.lock().unwrap(), 1);
        let result = fx.service.queue_result_for_owner(alice).unwrap();
        assert_eq!(result.counts.planned, 4);

        // Confirm the preview on the same queue.
        queue.apply().unwrap();
        fx.scheduler.step_n(2);
        assert!(fx.service.queue_available());
        assert_eq!(*fx.sink.completed.lock().unwrap(), 1);
    }

    #[test]
    fn discarding_a_preview_reverts_fake_renders() {
        let fx = Fixture::new();
        let alice = OwnerId::new();

        let queue = fx
            .service
            .new_rollback_queue(
                ModificationRuleset::default(),
                alice,
                fx.query(),
                fx.activities(4),
            )
            .unwrap();
        queue.preview().unwrap();
        fx.scheduler.step_n(2);
        assert_eq!(fx.world.preview_count(alice), 4);

        fx.service.clear_everything_for_owner(alice);
        assert_eq!(fx.world.preview_count(alice), 0);
        assert!(fx.service.queue_available());
        assert!(fx.service.queue_result_for_owner(alice).is_none());
    }

    #[test]
    fn cancel_is_owner_scoped() {
        let fx = Fixture::new();
        let alice = OwnerId::new();
        let mallory = OwnerId::new();

        let queue = fx
            .service
            .new_rollback_queue(
                ModificationRuleset {
                    max_per_task: 2,
                    ..ModificationRuleset::default()
                },
                alice,
                fx.query(),
                fx.activities(6),
            )
            .unwrap();
        queue.apply().unwrap();
        fx.scheduler.step();
        assert_eq!(queue.queue_size(), 4);

        assert!(!fx.service.cancel_queue_for_owner(mallory));
        assert!(!fx.service.queue_available());

        assert!(fx.service.cancel_queue_for_owner(alice));
        assert!(fx.service.queue_available());

        // Partial progress stays; nothing further runs; no completion
        // notification for a cancelled run.
        fx.scheduler.step_n(4);
        assert_eq!(queue.queue_size(), 4);
        assert_eq!(*fx.sink.completed.lock().unwrap(), 0);
        assert!(fx.service.queue_result_for_owner(alice).is_none());
    }

    #[test]
    fn result_cache_expires_and_evicts() {
        let mut cache = ResultCache::new(2, Duration::from_secs(600));
        let owners: Vec<OwnerId> = (0..3).map(|_| OwnerId::new()).collect();
        let template = ModificationQueueResult {
            queue_id: reweave_types::QueueId::new(),
            kind: ModificationKind::Rollback,
            mode: ModificationQueueMode::Completing,
            owner: *owners.first().unwrap(),
            results: Vec::new(),
            counts: reweave_types::StatusCounts::default(),
            side_effects: reweave_types::SideEffectTotals::default(),
        };

        for owner in &owners {
            cache.insert(*owner, template.clone());
        }
        // Capacity 2: the oldest owner was evicted.
        assert!(cache.get(*owners.first().unwrap()).is_none());
        assert!(cache.get(*owners.get(1).unwrap()).is_some());
        assert!(cache.get(*owners.get(2).unwrap()).is_some());

        // A zero TTL expires everything on the next read.
        let mut cache = ResultCache::new(2, Duration::ZERO);
        cache.insert(*owners.first().unwrap(), template);
        assert!(cache.get(*owners.first().unwrap()).is_none());
    }
}