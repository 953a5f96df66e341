//! Rate limiting for high-frequency view events
//!
//! Both types are clock-free: callers pass `now`, and the orchestrator
//! polls `take_due` from its event loop or timers.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Trailing-edge debounce, one timer per key
///
/// A value is released once `delay` has passed without a newer value for
/// the same key.
#[derive(Debug)]
pub struct Debouncer<K, V> {
    delay: Duration,
    pending: HashMap<K, (V, Instant)>,
}

impl<K: Eq + Hash + Clone, V> Debouncer<K, V> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: HashMap::new(),
        }
    }

    /// Replace the pending value for `key` and restart its timer
    pub fn push(&mut self, key: K, value: V, now: Instant) {
        self.pending.insert(key, (value, now + self.delay));
    }

    /// Remove and return every value whose timer has expired, oldest first
    pub fn take_due(&mut self, now: Instant) -> Vec<(K, V)> {
        let mut due: Vec<K> = self
            .pending
            .iter()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        due.sort_by_key(|key| self.pending[key].1);

        due.into_iter()
            .filter_map(|key| self.pending.remove(&key).map(|(value, _)| (key, value)))
            .collect()
    }

    /// Release everything regardless of timers, oldest first
    pub fn flush_all(&mut self) -> Vec<(K, V)> {
        let mut all: Vec<(K, (V, Instant))> = self.pending.drain().collect();
        all.sort_by_key(|(_, (_, deadline))| *deadline);
        all.into_iter().map(|(key, (value, _))| (key, value)).collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|(_, deadline)| *deadline).min()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Leading and trailing throttle
///
/// The first value in a quiet period passes through immediately. Values
/// offered inside the window are held; the latest one is released when the
/// window closes.
#[derive(Debug)]
pub struct Throttler<V> {
    window: Duration,
    window_ends: Option<Instant>,
    trailing: Option<V>,
}

impl<V> Throttler<V> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            window_ends: None,
            trailing: None,
        }
    }

    /// Offer a value; returns it when it passes on the leading edge
    pub fn offer(&mut self, value: V, now: Instant) -> Option<V> {
        match self.window_ends {
            Some(ends) if now < ends => {
                self.trailing = Some(value);
                None
            }
            _ => {
                self.window_ends = Some(now + self.window);
                self.trailing = None;
                Some(value)
            }
        }
    }

    /// Release the held value once the window has closed
    ///
    /// A released trailing value opens a new window.
    pub fn take_due(&mut self, now: Instant) -> Option<V> {
        let ends = self.window_ends?;
        if now < ends {
            return None;
        }
        match self.trailing.take() {
            Some(value) => {
                self.window_ends = Some(now + self.window);
                Some(value)
            }
            None => {
                self.window_ends = None;
                None
            }
        }
    }

    pub fn flush(&mut self) -> Option<V> {
        self.window_ends = None;
        self.trailing.take()
    }

    /// Deadline of the held value, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        self.trailing.as_ref().and(self.window_ends)
    }

    pub fn clear(&mut self) {
        self.window_ends = None;
        self.trailing = None;
    }
}
