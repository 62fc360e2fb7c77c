//! Delay-based schedulers for breaker timers
//!
//! This module provides different scheduler implementations:
//! - `TokioScheduler`: Runs delayed tasks on a tokio runtime
//! - `ManualScheduler`: Virtual clock driven by the caller, for tests and
//!   embedders that own their own event loop
//!
//! Schedulers only promise to run a task no earlier than its delay. They are
//! never asked to cancel anything; the breaker suppresses stale tasks itself.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::runtime::Handle;

/// A unit of deferred work
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Abstract scheduler that runs a task once after a delay
pub trait Scheduler: Send + Sync + std::fmt::Debug {
    /// Run `task` once, no earlier than `delay` from now
    fn schedule(&self, delay: Duration, task: Task);
}

/// Scheduler backed by a tokio runtime
///
/// Each task gets its own spawned future that sleeps for the delay and then
/// runs the task on a runtime worker.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Create a scheduler on the runtime the caller is running in
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime context.
    pub fn new() -> Self {
        Self {
            handle: Handle::current(),
        }
    }

    /// Create a scheduler on an explicit runtime handle
    pub fn with_handle(handle: Handle) -> Self {
        Self { handle }
    }

    /// Create a scheduler on the current runtime, if there is one
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::with_handle)
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    }
}

#[derive(Default)]
struct ManualQueue {
    now: Duration,
    seq: u64,
    tasks: BTreeMap<(Duration, u64), Task>,
}

/// Deterministic scheduler driven by [`ManualScheduler::advance`]
///
/// Time only moves when the owner advances it. Due tasks run in due-time
/// order, ties in the order they were scheduled. Tasks run without the
/// queue lock held, so a task may schedule further tasks; those run in the
/// same `advance` call if they fall due within it.
///
/// # Example
///
/// ```rust
/// use load_breaker::{CircuitBreaker, ManualScheduler};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let clock = Arc::new(ManualScheduler::new());
/// let breaker = CircuitBreaker::builder("test")
///     .upper_threshold(3)
///     .decrement_duration(Duration::from_millis(100))
///     .scheduler(clock.clone())
///     .build();
///
/// breaker.increment().unwrap();
/// assert_eq!(breaker.counter(), 1);
///
/// clock.advance(Duration::from_millis(100));
/// assert_eq!(breaker.counter(), 0);
/// ```
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<ManualQueue>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time, measured from the scheduler's creation
    pub fn now(&self) -> Duration {
        self.queue.lock().now
    }

    /// Number of tasks that have not run yet
    pub fn pending(&self) -> usize {
        self.queue.lock().tasks.len()
    }

    /// Move virtual time forward by `by`, running every task that falls due
    ///
    /// Returns the number of tasks that ran.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.queue.lock().now + by;
        let mut ran = 0;

        loop {
            let next = {
                let mut queue = self.queue.lock();
                let due = queue.tasks.first_key_value().map(|(&(due, _), _)| due);
                match due {
                    Some(due) if due <= target => {
                        queue.now = due;
                        queue.tasks.pop_first().map(|(_, task)| task)
                    }
                    _ => None,
                }
            };

            match next {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => break,
            }
        }

        self.queue.lock().now = target;
        ran
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        let mut queue = self.queue.lock();
        queue.seq += 1;
        let key = (queue.now + delay, queue.seq);
        queue.tasks.insert(key, task);
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let queue = self.queue.lock();
        f.debug_struct("ManualScheduler")
            .field("now", &queue.now)
            .field("pending", &queue.tasks.len())
            .finish()
    }
}
