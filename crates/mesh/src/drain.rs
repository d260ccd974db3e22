//! Periodic battery drain.
//!
//! Independent of any request: every tick removes a fixed step from each
//! active node and re-broadcasts the complete topology, changed or not.

use crate::registry::NodeRegistry;
use himesh_core::config::DrainConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Fixed-interval drain task over a registry
#[derive(Debug, Clone)]
pub struct BatteryDrain {
    registry: Arc<NodeRegistry>,
    interval: Duration,
    step: f64,
}

impl BatteryDrain {
    pub fn new(registry: Arc<NodeRegistry>, interval: Duration, step: f64) -> Self {
        Self {
            registry,
            interval,
            step,
        }
    }

    pub fn from_config(registry: Arc<NodeRegistry>, config: &DrainConfig) -> Self {
        Self::new(registry, Duration::from_secs(config.interval_secs.max(1)), config.step)
    }

    /// Run one drain step and broadcast. Returns the number of nodes drained.
    pub fn tick(&self) -> usize {
        let drained = self.registry.drain_all(self.step);
        let receivers = self.registry.broadcast_topology();
        debug!(drained, receivers, "Battery drain tick");
        drained
    }

    /// Tick forever; the first tick fires one interval from now
    pub async fn run(self) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.tick();
        }
    }
}
