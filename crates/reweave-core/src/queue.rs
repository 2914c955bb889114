//! The modification queue: state machine and cooperative batch loop.
//!
//! A queue owns a fixed snapshot of activities and replays them against
//! the live world in bounded batches, yielding to the host's simulation
//! loop between batches. Large operations (hundreds of thousands of
//! entries) simply take more ticks; no single callback ever exceeds
//! `max_per_task` entries.
//!
//! # Lifecycle
//!
//! A queue starts `Undecided`. [`preview`] moves it to `Planning`: every
//! entry is read (the cursor advances) but none are removed, durable
//! state is never touched, and the same entries can later be confirmed.
//! [`apply`] moves it to `Completing`: entries are consumed as they are
//! processed so partial progress is never reprocessed. A planning run
//! that has finished may be confirmed by calling [`apply`] on the same
//! queue; no other restart is permitted.
//!
//! # Per-entry isolation
//!
//! Every apply failure is caught at the batch loop and folded into an
//! errored result for that entry alone. A queue run always drains, no
//! matter how many entries fail.
//!
//! [`apply`]: ModificationQueue::apply
//! [`preview`]: ModificationQueue::preview

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use reweave_types::{
    Activity, ActivityId, ActivityQuery, Material, ModificationKind, ModificationQueueMode,
    ModificationQueueResult, ModificationReason, ModificationResult, ModificationStatus,
    OwnerId, QueryOrdering, QueueId, SideEffectTotals, StatusCounts,
};
use reweave_world::WorldMutator;

use crate::actions;
use crate::error::QueueError;
use crate::ruleset::ModificationRuleset;
use crate::scheduler::{RepeatingTask, Scheduler, TaskControl, TaskHandle};
use crate::store::ActivityStore;

/// Callback invoked exactly once per run when a queue drains naturally.
///
/// A queue that is previewed and then confirmed finishes two runs and
/// reports both. Runs on the scheduler's thread. Explicit destruction
/// does not count as finishing and does not invoke it.
pub type CompletionCallback = Arc<dyn Fn(ModificationQueueResult) + Send + Sync>;

/// Everything needed to construct a queue.
pub struct QueueSpec {
    /// Rollback or restore.
    pub kind: ModificationKind,
    /// The policy bounding this operation.
    pub ruleset: ModificationRuleset,
    /// Who the operation belongs to.
    pub owner: OwnerId,
    /// The query that resolved the activity list.
    pub query: ActivityQuery,
    /// The resolved activities, in replay order.
    pub activities: Vec<Activity>,
}

struct QueueCore {
    id: QueueId,
    kind: ModificationKind,
    ruleset: ModificationRuleset,
    owner: OwnerId,
    query: ActivityQuery,
    activities: VecDeque<Activity>,
    cursor: usize,
    read_count: u64,
    mode: ModificationQueueMode,
    results: Vec<ModificationResult>,
    counts: StatusCounts,
    side_effects: SideEffectTotals,
    run_finished: bool,
    destroyed: bool,
    handle: Option<TaskHandle>,
    on_end: CompletionCallback,
}

enum BatchOutcome {
    MoreWork,
    Drained {
        result: ModificationQueueResult,
        reversal_keys: Vec<ActivityId>,
        reversed: bool,
        on_end: CompletionCallback,
    },
}

impl QueueCore {
    fn process_batch(&mut self, world: &dyn WorldMutator) -> BatchOutcome {
        if self.mode == ModificationQueueMode::Completing && self.read_count == 0 {
            self.pre_process(world);
        }

        let mut processed: u32 = 0;
        while processed < self.ruleset.max_per_task {
            let next = if self.mode == ModificationQueueMode::Planning {
                self.activities.get(self.cursor).cloned()
            } else {
                self.activities.front().cloned()
            };
            let Some(activity) = next else { break };

            let result = self.process_one(world, &activity);
            self.counts.record(result.status);
            self.results.push(result);

            if self.mode == ModificationQueueMode::Planning {
                // Simulated consumption: advance the cursor, keep the entry.
                self.cursor = self.cursor.saturating_add(1);
            } else {
                self.activities.pop_front();
            }
            self.read_count = self.read_count.saturating_add(1);
            processed = processed.saturating_add(1);
        }

        let drained = if self.mode == ModificationQueueMode::Planning {
            self.cursor >= self.activities.len()
        } else {
            self.activities.is_empty()
        };
        if !drained {
            debug!(
                queue = %self.id,
                processed,
                remaining = self.remaining(),
                "batch complete, yielding to simulation loop"
            );
            return BatchOutcome::MoreWork;
        }

        if self.mode == ModificationQueueMode::Completing {
            self.post_process(world);
        }
        self.run_finished = true;

        // Only durably applied entries with storage keys get their
        // reversal flag flipped; planning produces none.
        let reversal_keys: Vec<ActivityId> = self
            .results
            .iter()
            .filter(|r| r.status == ModificationStatus::Applied)
            .filter_map(|r| r.activity.store_id)
            .collect();

        let result = ModificationQueueResult {
            queue_id: self.id,
            kind: self.kind,
            mode: self.mode,
            owner: self.owner,
            results: std::mem::take(&mut self.results),
            counts: self.counts,
            side_effects: self.side_effects,
        };
        info!(
            queue = %self.id,
            kind = ?self.kind,
            mode = ?self.mode,
            applied = result.counts.applied,
            planned = result.counts.planned,
            skipped = result.counts.skipped,
            errored = result.counts.errored,
            "queue drained"
        );

        BatchOutcome::Drained {
            result,
            reversal_keys,
            reversed: self.kind == ModificationKind::Rollback,
            on_end: Arc::clone(&self.on_end),
        }
    }

    fn process_one(&self, world: &dyn WorldMutator, activity: &Activity) -> ModificationResult {
        if !activity.action.kind.reversible {
            return ModificationResult::skipped(activity.clone(), ModificationReason::Irreversible);
        }

        let outcome = match self.kind {
            ModificationKind::Rollback => {
                actions::apply_rollback(world, &self.ruleset, self.owner, activity, self.mode)
            }
            ModificationKind::Restore => {
                actions::apply_restore(world, &self.ruleset, self.owner, activity, self.mode)
            }
        };

        match outcome {
            Ok(result) => result,
            Err(error) => {
                warn!(
                    queue = %self.id,
                    action = %activity.action.kind.key,
                    location = %activity.location,
                    %error,
                    "entry failed to apply; continuing batch"
                );
                ModificationResult::errored(
                    activity.clone(),
                    ModificationReason::ApplyFailed(error.to_string()),
                )
            }
        }
    }

    /// Hazard clearing before the first completing batch.
    fn pre_process(&mut self, world: &dyn WorldMutator) {
        let Some(region) = self.query.region else {
            debug!(queue = %self.id, "query has no region; skipping pre-process sweeps");
            return;
        };
        if self.ruleset.remove_drops {
            match world.remove_drops(&region) {
                Ok(count) => self.side_effects.removed_drops = count,
                Err(error) => warn!(queue = %self.id, %error, "drop removal failed"),
            }
        }
        if !self.ruleset.remove_blocks.is_empty() {
            match world.remove_blocks(&region, &self.ruleset.remove_blocks) {
                Ok(count) => self.side_effects.removed_blocks = count,
                Err(error) => warn!(queue = %self.id, %error, "hazard removal failed"),
            }
        }
    }

    /// Cleanup after the last completing batch.
    fn post_process(&mut self, world: &dyn WorldMutator) {
        let Some(region) = self.query.region else {
            return;
        };
        if self.ruleset.drain_lava {
            match world.drain_fluid(&region, &Material::from("lava")) {
                Ok(count) => self.side_effects.drained_lava = count,
                Err(error) => warn!(queue = %self.id, %error, "lava draining failed"),
            }
        }
        if self.ruleset.move_entities {
            match world.move_entities_to_safety(&region) {
                Ok(count) => self.side_effects.moved_entities = count,
                Err(error) => warn!(queue = %self.id, %error, "entity relocation failed"),
            }
        }
    }

    fn remaining(&self) -> usize {
        if self.mode == ModificationQueueMode::Planning {
            self.activities.len().saturating_sub(self.cursor)
        } else {
            self.activities.len()
        }
    }
}

/// A modification queue handle.
///
/// Cheaply cloneable; all clones share the same underlying queue state.
/// Construct one through the session service, start it with [`apply`] or
/// [`preview`], and observe the outcome through the completion callback.
///
/// [`apply`]: ModificationQueue::apply
/// [`preview`]: ModificationQueue::preview
#[derive(Clone)]
pub struct ModificationQueue {
    id: QueueId,
    kind: ModificationKind,
    owner: OwnerId,
    scheduler: Arc<dyn Scheduler>,
    world: Arc<dyn WorldMutator>,
    store: Arc<dyn ActivityStore>,
    core: Arc<Mutex<QueueCore>>,
}

impl core::fmt::Debug for ModificationQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ModificationQueue")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl ModificationQueue {
    /// Construct a queue from a spec and its collaborators.
    ///
    /// The activity list is copied into an internal sequence; the queue
    /// never re-queries storage. The query's ordering must match the
    /// queue kind: rollback replays newest-first, restore oldest-first.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Ruleset`] on an invalid ruleset or
    /// [`QueueError::WrongOrdering`] on an ordering mismatch.
    pub fn new(
        spec: QueueSpec,
        scheduler: Arc<dyn Scheduler>,
        world: Arc<dyn WorldMutator>,
        store: Arc<dyn ActivityStore>,
        on_end: CompletionCallback,
    ) -> Result<Self, QueueError> {
        spec.ruleset.validate()?;
        let expected = match spec.kind {
            ModificationKind::Rollback => QueryOrdering::NewestFirst,
            ModificationKind::Restore => QueryOrdering::OldestFirst,
        };
        if spec.query.ordering != expected {
            return Err(QueueError::WrongOrdering {
                kind: spec.kind,
                expected,
                actual: spec.query.ordering,
            });
        }

        let id = QueueId::new();
        let core = QueueCore {
            id,
            kind: spec.kind,
            ruleset: spec.ruleset,
            owner: spec.owner,
            query: spec.query,
            activities: spec.activities.into_iter().collect(),
            cursor: 0,
            read_count: 0,
            mode: ModificationQueueMode::Undecided,
            results: Vec::new(),
            counts: StatusCounts::default(),
            side_effects: SideEffectTotals::default(),
            run_finished: false,
            destroyed: false,
            handle: None,
            on_end,
        };
        Ok(Self {
            id,
            kind: spec.kind,
            owner: spec.owner,
            scheduler,
            world,
            store,
            core: Arc::new(Mutex::new(core)),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start (or confirm) durable application.
    ///
    /// Valid from `Undecided`, or from a `Planning` run that has
    /// finished -- the preview-then-confirm path, which replays the
    /// retained entries for real.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::AlreadyStarted`] otherwise.
    pub fn apply(&self) -> Result<(), QueueError> {
        self.start(ModificationQueueMode::Completing)
    }

    /// Start a preview run.
    ///
    /// Valid only from `Undecided`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::AlreadyStarted`] if the queue has run.
    pub fn preview(&self) -> Result<(), QueueError> {
        self.start(ModificationQueueMode::Planning)
    }

    fn start(&self, mode: ModificationQueueMode) -> Result<(), QueueError> {
        let delay = {
            let mut core = self.lock();
            let confirmable = core.mode == ModificationQueueMode::Planning
                && core.run_finished
                && mode == ModificationQueueMode::Completing;
            if core.destroyed
                || (core.mode != ModificationQueueMode::Undecided && !confirmable)
            {
                return Err(QueueError::AlreadyStarted { mode: core.mode });
            }
            core.mode = mode;
            core.cursor = 0;
            core.read_count = 0;
            core.results = Vec::new();
            core.counts = StatusCounts::default();
            core.side_effects = SideEffectTotals::default();
            core.run_finished = false;
            info!(queue = %core.id, kind = ?core.kind, ?mode, entries = core.activities.len(), "queue starting");
            core.ruleset.task_delay_ticks
        };

        let task = self.batch_task();
        let handle = self.scheduler.schedule_repeating(delay, task);
        self.lock().handle = Some(handle);
        Ok(())
    }

    fn batch_task(&self) -> RepeatingTask {
        let core = Arc::clone(&self.core);
        let world = Arc::clone(&self.world);
        let store = Arc::clone(&self.store);
        Box::new(move || {
            let outcome = {
                let mut core = core.lock().unwrap_or_else(PoisonError::into_inner);
                if core.destroyed || core.run_finished {
                    return TaskControl::Stop;
                }
                core.process_batch(world.as_ref())
            };
            match outcome {
                BatchOutcome::MoreWork => TaskControl::Continue,
                BatchOutcome::Drained {
                    result,
                    reversal_keys,
                    reversed,
                    on_end,
                } => {
                    if !reversal_keys.is_empty() {
                        store.mark_reversed(&reversal_keys, reversed);
                    }
                    on_end(result);
                    TaskControl::Stop
                }
            }
        })
    }

    /// Cancel the queue immediately.
    ///
    /// Entries already applied in this run stay applied: partial
    /// completion is an accepted, reported outcome, not an error. The
    /// completion callback is not invoked.
    pub fn destroy(&self) {
        let handle = {
            let mut core = self.lock();
            core.destroyed = true;
            core.handle.take()
        };
        if let Some(handle) = handle {
            self.scheduler.cancel(handle);
        }
        debug!(queue = %self.id, "queue destroyed");
    }

    /// Number of entries currently held.
    ///
    /// Planning retains entries, so this stays constant across a preview;
    /// completing consumes them down to zero.
    pub fn queue_size(&self) -> usize {
        self.lock().activities.len()
    }

    /// Entries read so far in the current run.
    pub fn read_count(&self) -> u64 {
        self.lock().read_count
    }

    /// The queue's current mode.
    pub fn mode(&self) -> ModificationQueueMode {
        self.lock().mode
    }

    /// Rollback or restore.
    pub const fn kind(&self) -> ModificationKind {
        self.kind
    }

    /// The owner this queue belongs to.
    pub const fn owner(&self) -> OwnerId {
        self.owner
    }

    /// The queue's identity.
    pub const fn id(&self) -> QueueId {
        self.id
    }
}
