//! Public node record.
//!
//! A [`Node`] never carries private key material; secrets live in the crypto
//! crate's vault keyed by [`NodeId`].

use crate::types::{NodeId, NodeStatus, Position, UnitAffiliation};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum number of retained location fixes
pub const LOCATION_HISTORY_CAP: usize = 50;

/// A past position with the time it was recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    /// Recorded position
    pub position: Position,
    /// Timestamp (Unix epoch milliseconds)
    pub timestamp: u64,
}

/// A simulated field unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node identifier
    pub id: NodeId,
    /// Operator name
    pub name: String,
    /// Unit affiliation
    pub unit: UnitAffiliation,
    /// Post / station name
    pub post: String,
    /// Current position
    pub position: Position,
    /// SPKI PEM encoded RSA public key
    pub public_key: String,
    /// Battery level in [0, 100]
    pub battery_level: f64,
    /// Operational status
    pub status: NodeStatus,
    /// Trailing position history, oldest first
    pub location_history: VecDeque<LocationFix>,
    /// Last time the node reported in (ms)
    pub last_seen: u64,
    /// Registration time (ms)
    pub created_at: u64,
}

impl Node {
    /// Create a freshly registered node at full battery
    pub fn new(
        id: NodeId,
        name: String,
        unit: UnitAffiliation,
        post: String,
        position: Position,
        public_key: String,
        now_ms: u64,
    ) -> Self {
        Self {
            id,
            name,
            unit,
            post,
            position,
            public_key,
            battery_level: 100.0,
            status: NodeStatus::Active,
            location_history: VecDeque::new(),
            last_seen: now_ms,
            created_at: now_ms,
        }
    }

    /// Set the battery level and re-derive status.
    ///
    /// An operator-set `Offline` status is left untouched.
    pub fn set_battery(&mut self, level: f64, now_ms: u64) {
        self.battery_level = level.clamp(0.0, 100.0);
        self.refresh_status();
        self.last_seen = now_ms;
    }

    /// Drain the battery by `step`, only while the node is `Active`.
    ///
    /// Returns true if the node was drained.
    pub fn drain_battery(&mut self, step: f64) -> bool {
        if self.status != NodeStatus::Active || self.battery_level <= 0.0 {
            return false;
        }
        self.battery_level = (self.battery_level - step).max(0.0);
        self.refresh_status();
        true
    }

    /// Move the node, recording the new position in its history
    pub fn set_position(&mut self, position: Position, now_ms: u64) {
        self.position = position;
        self.location_history.push_back(LocationFix {
            position,
            timestamp: now_ms,
        });
        while self.location_history.len() > LOCATION_HISTORY_CAP {
            self.location_history.pop_front();
        }
        self.last_seen = now_ms;
    }

    /// Apply an operator status change.
    ///
    /// `Offline` pins the node offline; any other value releases the pin and
    /// the status is derived from the battery again.
    pub fn set_status(&mut self, status: NodeStatus, now_ms: u64) {
        self.status = match status {
            NodeStatus::Offline => NodeStatus::Offline,
            _ => NodeStatus::from_battery(self.battery_level),
        };
        self.last_seen = now_ms;
    }

    /// Whether the node may relay or receive traffic
    pub fn is_offline(&self) -> bool {
        self.status == NodeStatus::Offline
    }

    fn refresh_status(&mut self) {
        if self.status != NodeStatus::Offline {
            self.status = NodeStatus::from_battery(self.battery_level);
        }
    }
}
