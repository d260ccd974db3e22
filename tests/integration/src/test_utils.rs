//! Test utilities for mesh integration tests

use himesh_core::{EventBus, NodeId, Position};
use himesh_crypto::KeyVault;
use himesh_mesh::{NodeRegistry, RangeModel, Registration, EARTH_RADIUS};
use himesh_messaging::{InMemoryLedger, MeshService, MessageStore, SendRequest};
use rand::RngCore;
use std::path::PathBuf;
use std::sync::Arc;

/// Small keys keep registration fast in tests
pub const TEST_KEY_BITS: usize = 1024;

/// Fixed send time used by scenarios
pub const T0: u64 = 1_700_000_000_000;

/// Base latitude for scenario nodes
pub const BASE_LATITUDE: f64 = 34.0;

/// Base longitude for scenario nodes
pub const BASE_LONGITUDE: f64 = 77.5;

/// A service and its registry over a fresh vault and event bus
pub struct TestMesh {
    pub registry: Arc<NodeRegistry>,
    pub service: MeshService,
}

impl TestMesh {
    /// Mesh backed by the in-memory ledger
    pub fn new() -> Self {
        Self::with_ledger(Arc::new(InMemoryLedger::new()))
    }

    /// Mesh backed by an arbitrary ledger
    pub fn with_ledger(ledger: Arc<dyn MessageStore>) -> Self {
        let registry = Arc::new(NodeRegistry::new(
            RangeModel::default(),
            Arc::new(KeyVault::new()),
            EventBus::new(1024),
            TEST_KEY_BITS,
        ));
        let service = MeshService::with_defaults(registry.clone(), ledger);
        Self { registry, service }
    }

    /// Register `id` at `distance_north` from the base point, at `altitude`
    pub fn place(&self, id: &str, distance_north: f64, altitude: f64) {
        self.service
            .register(Registration {
                node_id: id.to_string(),
                name: format!("Operator {id}"),
                unit: "Indian Army".to_string(),
                post: "Siachen Base".to_string(),
                position: position_north(distance_north, altitude),
            })
            .unwrap();
    }

    /// Register `id` at `distance_north` on the 4000 altitude band
    pub fn place_at(&self, id: &str, distance_north: f64) {
        self.place(id, distance_north, 4000.0);
    }
}

impl Default for TestMesh {
    fn default() -> Self {
        Self::new()
    }
}

/// Position `distance` due north of the base point
pub fn position_north(distance: f64, altitude: f64) -> Position {
    Position::new(
        BASE_LATITUDE + (distance / EARTH_RADIUS).to_degrees(),
        BASE_LONGITUDE,
        altitude,
    )
}

/// Send request with default priority and type
pub fn request(from: &str, to: &str, content: &str) -> SendRequest {
    SendRequest {
        from: from.to_string(),
        to: to.to_string(),
        content: content.to_string(),
        ..SendRequest::default()
    }
}

pub fn node(raw: &str) -> NodeId {
    NodeId::parse(raw).unwrap()
}

/// Unique database path under the system temp dir
pub fn temp_db_path() -> PathBuf {
    let mut suffix = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut suffix);
    std::env::temp_dir().join(format!("himesh_ledger_{}.db", hex::encode(suffix)))
}

/// Initialize tracing only if not already initialized
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
