//! Cooperative scheduling: the periodic-callback boundary between the
//! engine and the host's simulation loop.
//!
//! The queue cannot process arbitrarily many entries synchronously; it
//! shares a single-threaded world-simulation loop with everything else on
//! the server. Instead it registers a repeating task and processes a
//! bounded batch per callback. The [`Scheduler`] trait abstracts the
//! host's periodic-callback facility so the batch-loop logic is testable
//! without a real game-server clock.
//!
//! Two implementations ship here:
//!
//! - [`ManualScheduler`] -- manually stepped, for tests and embedders that
//!   drive ticks themselves.
//! - [`TickScheduler`] -- tokio-backed, firing callbacks at a fixed tick
//!   period.
//!
//! Both invoke a given task's callbacks sequentially, never concurrently.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::debug;

/// What a repeating task tells the scheduler after each invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskControl {
    /// Keep invoking the task.
    Continue,
    /// Deregister the task; equivalent to [`Scheduler::cancel`] without
    /// re-entering the scheduler.
    Stop,
}

/// Handle identifying one repeating registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskHandle(u64);

/// A repeating callback registered with a scheduler.
pub type RepeatingTask = Box<dyn FnMut() -> TaskControl + Send>;

/// A periodic-callback scheduler.
///
/// Implementations must invoke each registered task's callbacks
/// sequentially, never concurrently, on the same logical thread that
/// performs world mutation.
pub trait Scheduler: Send + Sync {
    /// Register a task to be invoked every `every_ticks` ticks until it
    /// returns [`TaskControl::Stop`] or is cancelled.
    fn schedule_repeating(&self, every_ticks: u64, task: RepeatingTask) -> TaskHandle;

    /// Cancel a registration. Cancelling an unknown or finished handle is
    /// a no-op.
    fn cancel(&self, handle: TaskHandle);
}

// ---------------------------------------------------------------------------
// Manual scheduler
// ---------------------------------------------------------------------------

struct Registered {
    every: u64,
    due_at: u64,
    task: RepeatingTask,
}

#[derive(Default)]
struct ManualState {
    now: u64,
    next_handle: u64,
    tasks: BTreeMap<u64, Registered>,
    cancelled: Vec<u64>,
}

/// A manually-stepped scheduler.
///
/// Nothing runs until [`step`] advances the tick counter; due tasks then
/// run in registration order on the stepping thread. Used by tests and by
/// embedders whose host loop drives ticks itself.
///
/// [`step`]: ManualScheduler::step
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    /// Create a scheduler at tick zero with no tasks.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The current tick.
    pub fn now(&self) -> u64 {
        self.lock().now
    }

    /// Number of live registrations.
    pub fn task_count(&self) -> usize {
        self.lock().tasks.len()
    }

    /// Advance one tick and run every task that is due.
    ///
    /// Tasks run with the scheduler unlocked, so a running task may
    /// re-enter the scheduler (typically to cancel itself or register a
    /// follow-up).
    pub fn step(&self) {
        let (now, due) = {
            let mut state = self.lock();
            state.now = state.now.saturating_add(1);
            let now = state.now;
            let handles: Vec<u64> = state
                .tasks
                .iter()
                .filter(|(_, registered)| registered.due_at <= now)
                .map(|(handle, _)| *handle)
                .collect();
            let due: Vec<(u64, Registered)> = handles
                .into_iter()
                .filter_map(|handle| state.tasks.remove(&handle).map(|r| (handle, r)))
                .collect();
            (now, due)
        };

        for (handle, mut registered) in due {
            let control = (registered.task)();
            let mut state = self.lock();
            let was_cancelled = state.cancelled.iter().any(|&c| c == handle);
            state.cancelled.retain(|&c| c != handle);
            if was_cancelled || control == TaskControl::Stop {
                debug!(handle, "repeating task deregistered");
                continue;
            }
            registered.due_at = now.saturating_add(registered.every);
            state.tasks.insert(handle, registered);
        }
    }

    /// Advance `n` ticks.
    pub fn step_n(&self, n: u64) {
        for _ in 0..n {
            self.step();
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(&self, every_ticks: u64, task: RepeatingTask) -> TaskHandle {
        let mut state = self.lock();
        let handle = state.next_handle;
        state.next_handle = state.next_handle.saturating_add(1);
        let due_at = state.now.saturating_add(every_ticks);
        state.tasks.insert(
            handle,
            Registered {
                every: every_ticks,
                due_at,
                task,
            },
        );
        TaskHandle(handle)
    }

    fn cancel(&self, handle: TaskHandle) {
        let mut state = self.lock();
        if state.tasks.remove(&handle.0).is_none() {
            // The task may be mid-run (extracted from the map); remember
            // the cancellation so it is not re-inserted afterwards.
            state.cancelled.push(handle.0);
        }
    }
}

// ---------------------------------------------------------------------------
// Tokio tick scheduler
// ---------------------------------------------------------------------------

/// Default tick period for hosts that tick 20 times per second.
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);

#[derive(Default)]
struct TickState {
    next_handle: u64,
    cancels: BTreeMap<u64, Arc<AtomicBool>>,
}

/// A tokio-backed scheduler firing callbacks at a fixed tick period.
///
/// Each registration spawns one runtime task driving a
/// [`tokio::time::interval`] at `period * every_ticks`. Callbacks for one
/// registration run sequentially inside that task. Must be constructed
/// and used inside a tokio runtime.
pub struct TickScheduler {
    tick: Duration,
    state: Mutex<TickState>,
}

impl TickScheduler {
    /// Create a scheduler with the given tick period.
    pub fn new(tick: Duration) -> Self {
        Self {
            tick,
            state: Mutex::new(TickState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TickState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_TICK)
    }
}

impl Scheduler for TickScheduler {
    fn schedule_repeating(&self, every_ticks: u64, mut task: RepeatingTask) -> TaskHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = {
            let mut state = self.lock();
            let handle = state.next_handle;
            state.next_handle = state.next_handle.saturating_add(1);
            state.cancels.insert(handle, Arc::clone(&cancelled));
            handle
        };

        let ticks = u32::try_from(every_ticks).unwrap_or(u32::MAX);
        let period = self.tick.saturating_mul(ticks).max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first interval tick completes immediately; consume it so
            // the first callback lands one full period after registration.
            interval.tick().await;
            loop {
                interval.tick().await;
                if cancelled.load(Ordering::Acquire) {
                    break;
                }
                if task() == TaskControl::Stop {
                    break;
                }
            }
            debug!(handle, "repeating task finished");
        });

        TaskHandle(handle)
    }

    fn cancel(&self, handle: TaskHandle) {
        let mut state = self.lock();
        if let Some(flag) = state.cancels.remove(&handle.0) {
            flag.store(true, Ordering::Release);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    fn counting_task(counter: &Arc<AtomicU64>) -> RepeatingTask {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::AcqRel);
            TaskControl::Continue
        })
    }

    #[test]
    fn manual_tasks_fire_on_their_interval() {
        let scheduler = ManualScheduler::new();
        let counter = Arc::new(AtomicU64::new(0));
        scheduler.schedule_repeating(2, counting_task(&counter));

        scheduler.step(); // tick 1: not due
        assert_eq!(counter.load(Ordering::Acquire), 0);
        scheduler.step(); // tick 2: due
        assert_eq!(counter.load(Ordering::Acquire), 1);
        scheduler.step_n(4); // ticks 3..=6: due at 4 and 6
        assert_eq!(counter.load(Ordering::Acquire), 3);
    }

    #[test]
    fn manual_cancel_stops_future_invocations() {
        let scheduler = ManualScheduler::new();
        let counter = Arc::new(AtomicU64::new(0));
        let handle = scheduler.schedule_repeating(1, counting_task(&counter));

        scheduler.step();
        assert_eq!(counter.load(Ordering::Acquire), 1);
        scheduler.cancel(handle);
        scheduler.step_n(3);
        assert_eq!(counter.load(Ordering::Acquire), 1);
        assert_eq!(scheduler.task_count(), 0);
    }

    #[test]
    fn stop_return_deregisters_without_cancel() {
        let scheduler = ManualScheduler::new();
        let counter = Arc::new(AtomicU64::new(0));
        let stop_after = 2_u64;
        {
            let counter = Arc::clone(&counter);
            scheduler.schedule_repeating(
                1,
                Box::new(move || {
                    let seen = counter.fetch_add(1, Ordering::AcqRel).saturating_add(1);
                    if seen >= stop_after {
                        TaskControl::Stop
                    } else {
                        TaskControl::Continue
                    }
                }),
            );
        }

        scheduler.step_n(5);
        assert_eq!(counter.load(Ordering::Acquire), 2);
        assert_eq!(scheduler.task_count(), 0);
    }

    #[test]
    fn cancel_during_run_is_honored() {
        let scheduler = Arc::new(ManualScheduler::new());
        let counter = Arc::new(AtomicU64::new(0));

        // The task cancels its own handle mid-run; it must not fire again.
        let handle_slot: Arc<Mutex<Option<TaskHandle>>> = Arc::new(Mutex::new(None));
        let task = {
            let scheduler = Arc::clone(&scheduler);
            let counter = Arc::clone(&counter);
            let handle_slot = Arc::clone(&handle_slot);
            Box::new(move || {
                counter.fetch_add(1, Ordering::AcqRel);
                if let Some(handle) = *handle_slot.lock().unwrap() {
                    scheduler.cancel(handle);
                }
                TaskControl::Continue
            })
        };
        let handle = scheduler.schedule_repeating(1, task);
        *handle_slot.lock().unwrap() = Some(handle);

        scheduler.step_n(3);
        assert_eq!(counter.load(Ordering::Acquire), 1);
        assert_eq!(scheduler.task_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_scheduler_fires_and_cancels_on_runtime_time() {
        let scheduler = TickScheduler::new(Duration::from_millis(10));
        let counter = Arc::new(AtomicU64::new(0));
        let handle = scheduler.schedule_repeating(1, counting_task(&counter));

        tokio::time::sleep(Duration::from_millis(35)).await;
        assert_eq!(counter.load(Ordering::Acquire), 3);

        scheduler.cancel(handle);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(counter.load(Ordering::Acquire), 3);
    }
}
