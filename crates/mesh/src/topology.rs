//! Topology Engine - reachability between nodes from position and power.
//!
//! There is no radio layer. Two nodes are linked when their great-circle
//! distance is within a maximum range that shrinks across large altitude
//! differences and when either endpoint runs low on battery. Every call
//! recomputes from the node set it is given; nothing is cached.

use himesh_core::config::TopologyConfig;
use himesh_core::{Connection, Node, NodeId, Position};
use serde::{Deserialize, Serialize};

/// Earth radius in distance units
pub const EARTH_RADIUS: f64 = 6371.0;

/// Great-circle distance between two positions (latitude/longitude only)
pub fn haversine_distance(a: &Position, b: &Position) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS * c
}

/// Range model parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeModel {
    pub base_range: f64,
    pub altitude_threshold: f64,
    pub altitude_derate: f64,
    pub low_battery_threshold: f64,
    pub low_battery_derate: f64,
}

impl RangeModel {
    /// Maximum range between two nodes after derating
    pub fn max_range(&self, a: &Node, b: &Node) -> f64 {
        let mut range = self.base_range;
        if (a.position.altitude - b.position.altitude).abs() > self.altitude_threshold {
            range *= self.altitude_derate;
        }
        if a.battery_level < self.low_battery_threshold || b.battery_level < self.low_battery_threshold {
            range *= self.low_battery_derate;
        }
        range
    }

    /// Whether `b` is one hop from `a`. Status is not considered here.
    pub fn in_range(&self, a: &Node, b: &Node) -> bool {
        haversine_distance(&a.position, &b.position) <= self.max_range(a, b)
    }

    /// Every ordered pair in range, in enumeration order
    pub fn connections(&self, nodes: &[Node]) -> Vec<Connection> {
        let mut connections = Vec::new();
        for (i, a) in nodes.iter().enumerate() {
            for (j, b) in nodes.iter().enumerate() {
                if i != j && self.in_range(a, b) {
                    connections.push(Connection {
                        from: a.id.clone(),
                        to: b.id.clone(),
                        distance: haversine_distance(&a.position, &b.position),
                    });
                }
            }
        }
        connections
    }

    /// Build a full snapshot of the node set
    pub fn snapshot(&self, nodes: Vec<Node>) -> TopologySnapshot {
        let connections = self.connections(&nodes);
        TopologySnapshot { nodes, connections }
    }
}

impl Default for RangeModel {
    fn default() -> Self {
        Self::from(&TopologyConfig::default())
    }
}

impl From<&TopologyConfig> for RangeModel {
    fn from(config: &TopologyConfig) -> Self {
        Self {
            base_range: config.base_range,
            altitude_threshold: config.altitude_threshold,
            altitude_derate: config.altitude_derate,
            low_battery_threshold: config.low_battery_threshold,
            low_battery_derate: config.low_battery_derate,
        }
    }
}

/// Nodes and their reachability at one instant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub nodes: Vec<Node>,
    pub connections: Vec<Connection>,
}

/// A node together with its one-hop neighbours
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeView {
    #[serde(flatten)]
    pub node: Node,
    pub connected_to: Vec<NodeId>,
}

impl TopologySnapshot {
    /// Neighbours of `id` in this snapshot
    pub fn connected_to(&self, id: &NodeId) -> Vec<NodeId> {
        self.connections
            .iter()
            .filter(|c| &c.from == id)
            .map(|c| c.to.clone())
            .collect()
    }

    /// Node views annotated with their neighbours
    pub fn views(&self) -> Vec<NodeView> {
        self.nodes
            .iter()
            .map(|node| NodeView {
                connected_to: self.connected_to(&node.id),
                node: node.clone(),
            })
            .collect()
    }

    /// Number of directed links
    pub fn active_connections(&self) -> usize {
        self.connections.len()
    }
}
