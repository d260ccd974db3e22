//! Per-sender rate limiting over a rolling window.
//!
//! Process-local and volatile. A sender is admitted while it has fewer than
//! `max_messages` admissions inside the trailing window; every admission is
//! logged.

use himesh_core::config::RateLimitConfig;
use himesh_core::{current_timestamp_ms, NodeId};
use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// Rolling-window admission log keyed by sender
#[derive(Debug)]
pub struct RateLimiter {
    window_ms: u64,
    max_messages: usize,
    log: RwLock<HashMap<NodeId, VecDeque<u64>>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_messages: usize) -> Self {
        Self {
            window_ms: window.as_millis() as u64,
            max_messages,
            log: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(Duration::from_secs(config.window_secs), config.max_messages)
    }

    /// Admit a send from `sender` now
    pub fn admit(&self, sender: &NodeId) -> bool {
        self.admit_at(sender, current_timestamp_ms())
    }

    /// Admit a send from `sender` at `now_ms`
    pub fn admit_at(&self, sender: &NodeId, now_ms: u64) -> bool {
        let mut log = self.log.write().unwrap_or_else(PoisonError::into_inner);
        let entries = log.entry(sender.clone()).or_default();

        // Entries exactly one window old no longer count
        while entries
            .front()
            .is_some_and(|&t| now_ms.saturating_sub(t) >= self.window_ms)
        {
            entries.pop_front();
        }

        if entries.len() >= self.max_messages {
            return false;
        }
        entries.push_back(now_ms);
        true
    }

    /// Admissions for `sender` inside the window ending at `now_ms`
    pub fn recent_count(&self, sender: &NodeId, now_ms: u64) -> usize {
        self.log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(sender)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|&&t| now_ms.saturating_sub(t) < self.window_ms)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Drop senders with no entries inside the window
    pub fn prune(&self, now_ms: u64) {
        let mut log = self.log.write().unwrap_or_else(PoisonError::into_inner);
        for entries in log.values_mut() {
            entries.retain(|&t| now_ms.saturating_sub(t) < self.window_ms);
        }
        log.retain(|_, entries| !entries.is_empty());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}
