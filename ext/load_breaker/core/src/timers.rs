//! Bookkeeping for scheduled breaker effects
//!
//! A scheduled effect (a load decrement or a cooloff reset) is identified by
//! a [`TimerId`] handed out when it is scheduled. When a state-clearing
//! transition supersedes outstanding effects, their identities move from the
//! pending set to the invalidated set. The firing callback consults the
//! registry before applying its effect, so suppression never depends on the
//! scheduler being able to cancel anything.

use std::collections::HashSet;

/// Identity of one scheduled effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Pending and invalidated timer identities for one kind of effect
#[derive(Debug, Default)]
pub struct TimerRegistry {
    next_id: u64,
    pending: HashSet<TimerId>,
    invalidated: HashSet<TimerId>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh identity and mark it pending
    pub fn register(&mut self) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.pending.insert(id);
        id
    }

    /// Suppress every pending effect. Returns how many were invalidated.
    pub fn invalidate_all(&mut self) -> usize {
        let count = self.pending.len();
        self.invalidated.extend(self.pending.drain());
        count
    }

    /// Called when the effect with `id` fires.
    ///
    /// Returns `true` if the effect should be applied. Either way the
    /// identity is forgotten afterwards.
    pub fn settle(&mut self, id: TimerId) -> bool {
        if self.invalidated.remove(&id) {
            return false;
        }
        self.pending.remove(&id)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn invalidated(&self) -> usize {
        self.invalidated.len()
    }
}
