//! Core functionality for the Himalayan battlefield mesh.
//!
//! This crate provides the fundamental types shared by every other mesh
//! crate: validated node identity and position, the public [`Node`] record
//! with its battery-derived status, configuration, logging, and the event bus
//! used to publish topology and delivery changes.

pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod node;
pub mod types;

pub use config::Config;
pub use error::{CoreError, CoreResult, ValidationError};
pub use event::{EventBus, MeshEvent};
pub use node::{LocationFix, Node, LOCATION_HISTORY_CAP};
pub use types::{
    current_timestamp_ms, Connection, NodeId, NodeStatus, Position, UnitAffiliation,
};
