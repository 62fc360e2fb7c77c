//! Builder API for ergonomic breaker configuration

use crate::{
    callbacks::Callbacks,
    circuit::{CircuitBreaker, CircuitContext, Config},
    scheduler::{Scheduler, TokioScheduler},
};
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating breakers with fluent API
pub struct CircuitBuilder {
    name: String,
    config: Config,
    scheduler: Option<Arc<dyn Scheduler>>,
    callbacks: Callbacks,
}

impl CircuitBuilder {
    /// Create a new builder for a breaker with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: Config::default(),
            scheduler: None,
            callbacks: Callbacks::new(),
        }
    }

    /// Replace the whole configuration at once
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the delay before one unit of load decays
    pub fn decrement_duration(mut self, duration: Duration) -> Self {
        self.config.decrement_duration = duration;
        self
    }

    /// Set the load level that opens the breaker
    pub fn upper_threshold(mut self, threshold: usize) -> Self {
        self.config.upper_threshold = threshold;
        self
    }

    /// Set the delay before an opened breaker closes itself
    pub fn cooloff_duration(mut self, duration: Duration) -> Self {
        self.config.cooloff_duration = duration;
        self
    }

    /// Set how many load-driven opens cap the breaker (0 = never)
    pub fn trip_threshold(mut self, threshold: usize) -> Self {
        self.config.trip_threshold = threshold;
        self
    }

    /// Set the scheduler that runs decay and cooloff timers
    ///
    /// Defaults to a [`TokioScheduler`] on the runtime `build()` is called in.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use load_breaker::{CircuitBreaker, ManualScheduler};
    /// use std::sync::Arc;
    ///
    /// let breaker = CircuitBreaker::builder("api")
    ///     .scheduler(Arc::new(ManualScheduler::new()))
    ///     .build();
    ///
    /// assert!(breaker.is_closed());
    /// ```
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Set callback for when the breaker caps
    pub fn on_maximum_trips<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_maximum_trips = Some(Arc::new(f));
        self
    }

    /// Set callback for when the breaker opens (including capping)
    pub fn on_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_open = Some(Arc::new(f));
        self
    }

    /// Set callback for when the breaker closes
    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_close = Some(Arc::new(f));
        self
    }

    /// Build the breaker
    ///
    /// # Panics
    ///
    /// Panics if `upper_threshold` is 0, or if no scheduler was set and
    /// `build()` runs outside of a tokio runtime.
    pub fn build(self) -> CircuitBreaker {
        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Arc::new(TokioScheduler::new()));

        let context = CircuitContext {
            name: self.name,
            config: self.config,
        };

        CircuitBreaker::with_parts(context, self.callbacks, scheduler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualScheduler;

    #[test]
    fn test_builder_defaults() {
        let breaker = CircuitBuilder::new("test")
            .scheduler(Arc::new(ManualScheduler::new()))
            .build();

        assert_eq!(breaker.state_name(), "Closed");
        assert_eq!(breaker.name(), "test");
        assert_eq!(*breaker.config(), Config::default());
    }

    #[test]
    fn test_builder_custom_config() {
        let breaker = CircuitBuilder::new("test")
            .decrement_duration(Duration::from_millis(250))
            .upper_threshold(10)
            .cooloff_duration(Duration::from_secs(30))
            .trip_threshold(3)
            .scheduler(Arc::new(ManualScheduler::new()))
            .build();

        let config = breaker.config();
        assert_eq!(config.decrement_duration, Duration::from_millis(250));
        assert_eq!(config.upper_threshold, 10);
        assert_eq!(config.cooloff_duration, Duration::from_secs(30));
        assert_eq!(config.trip_threshold, 3);
    }

    #[test]
    fn test_builder_whole_config() {
        let config = Config {
            upper_threshold: 2,
            trip_threshold: 1,
            ..Default::default()
        };

        let breaker = CircuitBuilder::new("test")
            .config(config.clone())
            .scheduler(Arc::new(ManualScheduler::new()))
            .build();

        assert_eq!(*breaker.config(), config);
    }

    #[test]
    fn test_builder_with_callbacks() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let capped = Arc::new(AtomicBool::new(false));
        let capped_clone = capped.clone();

        let breaker = CircuitBuilder::new("test")
            .upper_threshold(2)
            .trip_threshold(1)
            .on_maximum_trips(move |_name| {
                capped_clone.store(true, Ordering::SeqCst);
            })
            .scheduler(Arc::new(ManualScheduler::new()))
            .build();

        breaker.increment().unwrap();
        assert!(!capped.load(Ordering::SeqCst));

        breaker.increment().unwrap();
        assert!(capped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_builder_defaults_to_tokio_scheduler() {
        let breaker = CircuitBuilder::new("test").build();
        assert!(format!("{:?}", breaker).contains("TokioScheduler"));
    }
}
