//! Himalayan Mesh - topology, routing and the live node set.
//!
//! # Core Components
//!
//! - **Topology Engine**: haversine reachability derated by altitude and battery
//! - **Route Planner**: breadth-first minimum-hop paths that avoid offline nodes
//! - **Node Registry**: registration, identity custody and state updates
//! - **Battery Drain**: fixed-interval drain with full topology re-broadcast
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use himesh_core::{EventBus, Position};
//! use himesh_crypto::KeyVault;
//! use himesh_mesh::{NodeRegistry, RangeModel, Registration};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = NodeRegistry::new(
//!     RangeModel::default(),
//!     Arc::new(KeyVault::new()),
//!     EventBus::default(),
//!     2048,
//! );
//! let receipt = registry.register(Registration {
//!     node_id: "ARMY-ALPHA".to_string(),
//!     name: "Havildar Thapa".to_string(),
//!     unit: "Indian Army".to_string(),
//!     post: "Kargil Post 7".to_string(),
//!     position: Position::new(34.5, 76.1, 3200.0),
//! })?;
//! println!("Registered {}", receipt.node_id);
//! # Ok(())
//! # }
//! ```

pub mod drain;
pub mod error;
pub mod registry;
pub mod routing;
pub mod topology;

pub use drain::BatteryDrain;
pub use error::{MeshError, MeshResult};
pub use registry::{NodeRegistry, Registration, RegistrationReceipt, RoutePlan};
pub use routing::{can_reach, find_path, relay_count};
pub use topology::{haversine_distance, NodeView, RangeModel, TopologySnapshot, EARTH_RADIUS};
