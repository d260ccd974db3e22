//! Hop-by-hop playback of a computed path.
//!
//! The core only produces the ordered, timed sequence; pacing it out (and
//! any animation) belongs to the transport.

use himesh_core::NodeId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default spacing between playback events
pub const DEFAULT_STEP: Duration = Duration::from_secs(1);

/// One step of a playback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlaybackEvent {
    /// The message is at `node_id`, the `hop_number`-th of `total` nodes
    Hop {
        message_id: String,
        node_id: NodeId,
        hop_number: usize,
        total: usize,
    },
    /// The message reached its destination
    Delivered { message_id: String, to: NodeId },
}

/// A playback event with its offset from the start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedEvent {
    pub offset_ms: u64,
    pub event: PlaybackEvent,
}

/// Ordered playback for `path`: one hop event per node at `i * step`, then
/// delivery at `len * step`.
pub fn timeline(message_id: &str, to: &NodeId, path: &[NodeId], step: Duration) -> Vec<TimedEvent> {
    let step_ms = step.as_millis() as u64;
    let total = path.len();

    path.iter()
        .enumerate()
        .map(|(i, node_id)| TimedEvent {
            offset_ms: i as u64 * step_ms,
            event: PlaybackEvent::Hop {
                message_id: message_id.to_string(),
                node_id: node_id.clone(),
                hop_number: i + 1,
                total,
            },
        })
        .chain(std::iter::once(TimedEvent {
            offset_ms: total as u64 * step_ms,
            event: PlaybackEvent::Delivered {
                message_id: message_id.to_string(),
                to: to.clone(),
            },
        }))
        .collect()
}
