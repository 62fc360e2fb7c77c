//! Callback system for breaker state transitions

use std::sync::Arc;

/// Shared callback type, receives the breaker name
pub type Callback = Arc<dyn Fn(&str) + Send + Sync>;

/// Callbacks for breaker events
///
/// Callbacks run after the breaker releases its lock, so they are free to
/// call back into the breaker. A panic inside a callback unwinds into
/// whatever triggered the transition.
#[derive(Clone)]
pub struct Callbacks {
    pub on_open: Option<Callback>,
    pub on_close: Option<Callback>,
    pub on_maximum_trips: Option<Callback>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self {
            on_open: None,
            on_close: None,
            on_maximum_trips: None,
        }
    }

    pub fn trigger_open(&self, breaker: &str) {
        if let Some(ref callback) = self.on_open {
            callback(breaker);
        }
    }

    pub fn trigger_close(&self, breaker: &str) {
        if let Some(ref callback) = self.on_close {
            callback(breaker);
        }
    }

    pub fn trigger_maximum_trips(&self, breaker: &str) {
        if let Some(ref callback) = self.on_maximum_trips {
            callback(breaker);
        }
    }
}

impl Default for Callbacks {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_maximum_trips", &self.on_maximum_trips.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_missing_callbacks_are_no_ops() {
        let callbacks = Callbacks::default();
        callbacks.trigger_open("test");
        callbacks.trigger_close("test");
        callbacks.trigger_maximum_trips("test");
    }

    #[test]
    fn test_callback_receives_breaker_name() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();

        let mut callbacks = Callbacks::new();
        callbacks.on_maximum_trips = Some(Arc::new(move |name| {
            assert_eq!(name, "ingest");
            hits_clone.fetch_add(1, Ordering::SeqCst);
        }));

        callbacks.trigger_maximum_trips("ingest");
        callbacks.trigger_open("ingest");

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(
            format!("{:?}", callbacks),
            "Callbacks { on_open: false, on_close: false, on_maximum_trips: true }"
        );
    }
}
