//! Publish/subscribe bus for mesh events.
//!
//! The core publishes topology and delivery events; transports (websocket
//! fan-out, dashboards, loggers) subscribe. Publishing never blocks and never
//! fails: with no subscribers the event is simply dropped, and slow
//! subscribers observe `RecvError::Lagged`.

use crate::node::Node;
use crate::types::{Connection, NodeId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default channel capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

/// Events emitted by the mesh core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeshEvent {
    /// Full node set and reachability, re-sent on every change or drain tick
    TopologyChanged {
        nodes: Vec<Node>,
        connections: Vec<Connection>,
        timestamp: u64,
    },
    /// A node joined the mesh
    NodeRegistered { node_id: NodeId, timestamp: u64 },
    /// A node was removed from the mesh
    NodeRemoved { node_id: NodeId, timestamp: u64 },
    /// A message was sealed and stored along a computed path
    MessageRouted {
        message_id: String,
        from: NodeId,
        to: NodeId,
        path: Vec<NodeId>,
        timestamp: u64,
    },
    /// A message was opened and its signature verified by the recipient
    MessageDelivered {
        message_id: String,
        to: NodeId,
        timestamp: u64,
    },
}

impl MeshEvent {
    /// Stable event name, useful as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            MeshEvent::TopologyChanged { .. } => "topology_changed",
            MeshEvent::NodeRegistered { .. } => "node_registered",
            MeshEvent::NodeRemoved { .. } => "node_removed",
            MeshEvent::MessageRouted { .. } => "message_routed",
            MeshEvent::MessageDelivered { .. } => "message_delivered",
        }
    }
}

/// Cloneable handle on the event channel
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MeshEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to all events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<MeshEvent> {
        self.tx.subscribe()
    }

    /// Publish an event, returning how many subscribers will see it
    pub fn publish(&self, event: MeshEvent) -> usize {
        let kind = event.kind();
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::trace!(event = kind, "No subscribers for mesh event");
                0
            }
        }
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
