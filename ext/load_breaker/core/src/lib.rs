//! LoadBreaker - Load-counting circuit breaker with timed decay
//!
//! This crate provides an admission-control breaker with:
//! - A load counter where every admitted unit decays after a fixed delay
//! - State machine for the breaker lifecycle (Closed → Open → Closed, or Capped)
//! - Automatic close after a cooloff period
//! - Permanent capping after a configurable number of trips
//! - Suppression of stale timers, independent of scheduler cancellation
//!
//! # Example
//!
//! ```rust
//! use load_breaker::{CircuitBreaker, ManualScheduler};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let clock = Arc::new(ManualScheduler::new());
//! let breaker = CircuitBreaker::builder("ingest")
//!     .upper_threshold(3)
//!     .decrement_duration(Duration::from_secs(1))
//!     .cooloff_duration(Duration::from_secs(5))
//!     .trip_threshold(2)
//!     .on_maximum_trips(|name| eprintln!("breaker {} capped", name))
//!     .scheduler(clock.clone())
//!     .build();
//!
//! for _ in 0..3 {
//!     breaker.increment().unwrap();
//! }
//! assert!(breaker.is_open());
//! assert!(breaker.increment().is_err());
//!
//! clock.advance(Duration::from_secs(5));
//! assert!(breaker.is_closed());
//! assert_eq!(breaker.counter(), 0);
//! ```

pub mod builder;
pub mod callbacks;
pub mod circuit;
pub mod errors;
pub mod scheduler;
pub mod timers;

pub use builder::CircuitBuilder;
pub use callbacks::Callbacks;
pub use circuit::{BreakerSnapshot, CircuitBreaker, Config};
pub use errors::BreakerError;
pub use scheduler::{ManualScheduler, Scheduler, Task, TokioScheduler};
pub use timers::{TimerId, TimerRegistry};

/// Lifecycle state of a breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakerState {
    /// Admitting load
    Closed,
    /// Rejecting load until cooloff or reset
    Open,
    /// Rejecting load until `cap_reset`
    Capped,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "Closed",
            BreakerState::Open => "Open",
            BreakerState::Capped => "Capped",
        }
    }

    pub(crate) fn from_name(name: &str) -> Self {
        match name {
            "Open" => BreakerState::Open,
            "Capped" => BreakerState::Capped,
            _ => BreakerState::Closed,
        }
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
