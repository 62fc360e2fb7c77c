//! Circuit breaker implementation using state machines
//!
//! The breaker counts load. Every admitted unit decays again after
//! `decrement_duration`; when the count reaches `upper_threshold` the breaker
//! opens and closes itself after `cooloff_duration`. Once it has opened
//! `trip_threshold` times it caps, staying open until `cap_reset`.
//!
//! All breaker state sits behind one mutex. Operations and timer callbacks
//! take that lock for the whole transition, and user callbacks run only
//! after it is released.

use crate::{
    BreakerState,
    callbacks::Callbacks,
    errors::BreakerError,
    scheduler::{Scheduler, TokioScheduler},
    timers::{TimerId, TimerRegistry},
};
use parking_lot::Mutex;
use state_machines::state_machine;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Delay before one unit of load decays
    pub decrement_duration: Duration,

    /// Load level that opens the breaker
    pub upper_threshold: usize,

    /// Delay before an opened breaker closes itself again
    pub cooloff_duration: Duration,

    /// Number of opens after which the breaker caps (0 = never cap)
    pub trip_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            decrement_duration: Duration::from_millis(1000),
            upper_threshold: 5,
            cooloff_duration: Duration::from_millis(5000),
            trip_threshold: 0,
        }
    }
}

/// Breaker context - shared data across all states
#[derive(Debug, Clone, Default)]
pub struct CircuitContext {
    pub name: String,
    pub config: Config,
}

/// Data specific to the Open state
#[derive(Debug, Clone, Default)]
pub struct OpenData {
    /// Set when the breaker was opened by `trip()` rather than by load
    pub manual: bool,
    pub opened_at: Option<Instant>,
}

state_machine! {
    name: Circuit,
    context: CircuitContext,
    dynamic: true,

    initial: Closed,
    states: [
        Closed,
        Open(OpenData),
        Capped,
    ],
    events {
        trip {
            transition: { from: Closed, to: Open }
        }
        cap {
            transition: { from: Closed, to: Capped }
        }
        recover {
            transition: { from: Open, to: Closed }
        }
    }
}

/// Point-in-time view of a breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub counter: usize,
    pub trip_counter: usize,
    pub pending_decrements: usize,
}

/// Result of admitting one unit of load
enum Admission {
    /// Load counted, decay pending under this timer
    Counted(TimerId),
    /// Threshold reached, cooloff pending under this timer
    Opened(TimerId),
    /// Threshold reached for the last allowed time
    Capped,
}

/// Mutable breaker state, only touched under the lock
struct BreakerCore {
    machine: DynamicCircuit,
    counter: usize,
    trip_counter: usize,
    decrements: TimerRegistry,
    cooloffs: TimerRegistry,
}

impl BreakerCore {
    fn new(context: &CircuitContext) -> Self {
        Self {
            machine: DynamicCircuit::new(context.clone()),
            counter: 0,
            trip_counter: 0,
            decrements: TimerRegistry::new(),
            cooloffs: TimerRegistry::new(),
        }
    }

    fn state(&self) -> BreakerState {
        BreakerState::from_name(self.machine.current_state())
    }

    fn rejected(&self, context: &CircuitContext, operation: &'static str) -> BreakerError {
        BreakerError::invalid_state(&context.name, operation, self.machine.current_state())
    }

    fn admit(&mut self, context: &CircuitContext) -> Result<Admission, BreakerError> {
        if self.state() != BreakerState::Closed {
            return Err(self.rejected(context, "increment"));
        }

        let counter = self.counter + 1;
        if counter < context.config.upper_threshold {
            self.counter = counter;
            return Ok(Admission::Counted(self.decrements.register()));
        }

        let trips = self.trip_counter + 1;
        let threshold = context.config.trip_threshold;
        let capping = threshold > 0 && trips >= threshold;
        let event = if capping {
            CircuitEvent::Cap
        } else {
            CircuitEvent::Trip
        };

        if self.machine.handle(event).is_err() {
            return Err(self.rejected(context, "increment"));
        }

        self.counter = counter;
        self.trip_counter = trips;

        if capping {
            return Ok(Admission::Capped);
        }

        self.mark_open(false);
        Ok(Admission::Opened(self.cooloffs.register()))
    }

    fn trip(&mut self, context: &CircuitContext) -> Result<usize, BreakerError> {
        if self.machine.handle(CircuitEvent::Trip).is_err() {
            return Err(self.rejected(context, "trip"));
        }

        self.mark_open(true);
        Ok(self.decrements.invalidate_all())
    }

    fn recover(&mut self, context: &CircuitContext) -> Result<usize, BreakerError> {
        if self.machine.handle(CircuitEvent::Recover).is_err() {
            return Err(self.rejected(context, "reset"));
        }

        Ok(self.clear_load())
    }

    /// Recreate the machine in Closed state and forget all trips
    fn cap_reset(&mut self, context: &CircuitContext) -> (BreakerState, usize) {
        let previous = self.state();
        self.machine = DynamicCircuit::new(context.clone());
        self.trip_counter = 0;
        (previous, self.clear_load())
    }

    fn clear_load(&mut self) -> usize {
        self.counter = 0;
        self.cooloffs.invalidate_all();
        self.decrements.invalidate_all()
    }

    fn mark_open(&mut self, manual: bool) {
        if let Some(data) = self.machine.open_data_mut() {
            data.manual = manual;
            data.opened_at = Some(Instant::now());
        }
    }

    fn snapshot(&self) -> BreakerSnapshot {
        BreakerSnapshot {
            state: self.state(),
            counter: self.counter,
            trip_counter: self.trip_counter,
            pending_decrements: self.decrements.pending(),
        }
    }
}

/// State reachable from timer tasks, which only hold a weak reference
struct Shared {
    context: CircuitContext,
    callbacks: Callbacks,
    scheduler: Arc<dyn Scheduler>,
    core: Mutex<BreakerCore>,
}

impl Shared {
    fn fire_decrement(&self, id: TimerId) {
        let mut core = self.core.lock();
        if core.decrements.settle(id) {
            core.counter = core.counter.saturating_sub(1);
            debug!(
                breaker = %self.context.name,
                counter = core.counter,
                "load decayed"
            );
        } else {
            trace!(breaker = %self.context.name, timer = id.get(), "suppressed stale decrement");
        }
    }

    fn fire_cooloff(&self, id: TimerId) {
        let closed = {
            let mut core = self.core.lock();
            if !core.cooloffs.settle(id) {
                trace!(breaker = %self.context.name, timer = id.get(), "suppressed stale cooloff");
                false
            } else {
                core.recover(&self.context).is_ok()
            }
        };

        if closed {
            info!(breaker = %self.context.name, "breaker closed after cooloff");
            self.callbacks.trigger_close(&self.context.name);
        }
    }
}

/// Load-counting circuit breaker
///
/// Cloning is cheap and every clone drives the same breaker.
#[derive(Clone)]
pub struct CircuitBreaker {
    shared: Arc<Shared>,
}

impl CircuitBreaker {
    /// Create a breaker that schedules its timers on the current tokio runtime
    /// (use builder() for more options)
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime, or if
    /// `config.upper_threshold` is 0.
    pub fn new(name: impl Into<String>, config: Config) -> Self {
        Self::with_parts(
            CircuitContext {
                name: name.into(),
                config,
            },
            Callbacks::new(),
            Arc::new(TokioScheduler::new()),
        )
    }

    /// Create a breaker from its parts (used by builder)
    pub(crate) fn with_parts(
        context: CircuitContext,
        callbacks: Callbacks,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        assert!(
            context.config.upper_threshold > 0,
            "Upper threshold must be greater than 0"
        );

        let core = BreakerCore::new(&context);
        Self {
            shared: Arc::new(Shared {
                context,
                callbacks,
                scheduler,
                core: Mutex::new(core),
            }),
        }
    }

    /// Create a new breaker builder
    pub fn builder(name: impl Into<String>) -> crate::builder::CircuitBuilder {
        crate::builder::CircuitBuilder::new(name)
    }

    /// Count one unit of load
    ///
    /// The unit decays after `decrement_duration`. The call that brings the
    /// counter to `upper_threshold` opens the breaker, or caps it when that
    /// open is the `trip_threshold`-th one. Capping runs `on_maximum_trips`
    /// before returning.
    ///
    /// Fails with `InvalidState` while the breaker is open or capped.
    pub fn increment(&self) -> Result<(), BreakerError> {
        let name = &self.shared.context.name;
        let admission = self.shared.core.lock().admit(&self.shared.context)?;

        match admission {
            Admission::Counted(id) => self.schedule_decrement(id),
            Admission::Opened(id) => {
                info!(breaker = %name, "breaker opened at load threshold");
                self.schedule_cooloff(id);
                self.shared.callbacks.trigger_open(name);
            }
            Admission::Capped => {
                warn!(
                    breaker = %name,
                    trips = self.shared.context.config.trip_threshold,
                    "breaker capped after maximum trips"
                );
                self.shared.callbacks.trigger_open(name);
                self.shared.callbacks.trigger_maximum_trips(name);
            }
        }

        Ok(())
    }

    /// Open the breaker by hand
    ///
    /// A manual trip does not count toward `trip_threshold` and schedules no
    /// cooloff: the breaker stays open until `reset()` or `cap_reset()`.
    /// Pending decrements are suppressed, freezing the counter.
    ///
    /// Fails with `InvalidState` if the breaker is already open or capped.
    pub fn trip(&self) -> Result<(), BreakerError> {
        let name = &self.shared.context.name;
        let suppressed = self.shared.core.lock().trip(&self.shared.context)?;

        info!(breaker = %name, suppressed, "breaker tripped manually");
        self.shared.callbacks.trigger_open(name);
        Ok(())
    }

    /// Close an open breaker, clearing its load
    ///
    /// Fails with `InvalidState` if the breaker is closed, or capped (only
    /// `cap_reset()` leaves the capped state).
    pub fn reset(&self) -> Result<(), BreakerError> {
        let name = &self.shared.context.name;
        let suppressed = self.shared.core.lock().recover(&self.shared.context)?;

        info!(breaker = %name, suppressed, "breaker reset");
        self.shared.callbacks.trigger_close(name);
        Ok(())
    }

    /// Return to a fresh closed breaker from any state, clearing the trip count
    pub fn cap_reset(&self) {
        let name = &self.shared.context.name;
        let (previous, suppressed) = self.shared.core.lock().cap_reset(&self.shared.context);

        info!(breaker = %name, from = previous.as_str(), suppressed, "breaker cap reset");
        if previous != BreakerState::Closed {
            self.shared.callbacks.trigger_close(name);
        }
    }

    /// Check if breaker is rejecting load (open or capped)
    pub fn is_open(&self) -> bool {
        self.state() != BreakerState::Closed
    }

    /// Check if breaker is closed
    pub fn is_closed(&self) -> bool {
        self.state() == BreakerState::Closed
    }

    /// Check if breaker is capped
    pub fn is_capped(&self) -> bool {
        self.state() == BreakerState::Capped
    }

    /// Check if the current open state came from `trip()`
    pub fn is_manually_tripped(&self) -> bool {
        self.shared
            .core
            .lock()
            .machine
            .open_data()
            .map(|d| d.manual)
            .unwrap_or(false)
    }

    /// Current load level
    pub fn counter(&self) -> usize {
        self.shared.core.lock().counter
    }

    /// Number of load-driven opens since the last `cap_reset()`
    pub fn trip_counter(&self) -> usize {
        self.shared.core.lock().trip_counter
    }

    pub fn state(&self) -> BreakerState {
        self.shared.core.lock().state()
    }

    /// Get current state name
    pub fn state_name(&self) -> &'static str {
        self.state().as_str()
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        self.shared.core.lock().snapshot()
    }

    pub fn name(&self) -> &str {
        &self.shared.context.name
    }

    pub fn config(&self) -> &Config {
        &self.shared.context.config
    }

    fn schedule_decrement(&self, id: TimerId) {
        let shared = Arc::downgrade(&self.shared);
        self.shared.scheduler.schedule(
            self.shared.context.config.decrement_duration,
            Box::new(move || {
                if let Some(shared) = Weak::upgrade(&shared) {
                    shared.fire_decrement(id);
                }
            }),
        );
    }

    fn schedule_cooloff(&self, id: TimerId) {
        let shared = Arc::downgrade(&self.shared);
        self.shared.scheduler.schedule(
            self.shared.context.config.cooloff_duration,
            Box::new(move || {
                if let Some(shared) = Weak::upgrade(&shared) {
                    shared.fire_cooloff(id);
                }
            }),
        );
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.shared.context.name)
            .field("config", &self.shared.context.config)
            .field("snapshot", &self.snapshot())
            .field("callbacks", &self.shared.callbacks)
            .field("scheduler", &self.shared.scheduler)
            .finish()
    }
}
