//! Node registry - the live node set in registration order.
//!
//! Registration generates the node's RSA identity. The public key is stored on
//! the [`Node`]; the private key is returned once in the receipt and otherwise
//! kept in the shared [`KeyVault`]. Every mutation republishes the topology.

use crate::error::{MeshError, MeshResult};
use crate::routing;
use crate::topology::{RangeModel, TopologySnapshot};
use himesh_core::logging::SECURITY_TARGET;
use himesh_core::{
    current_timestamp_ms, Config, EventBus, MeshEvent, Node, NodeId, NodeStatus, Position,
    UnitAffiliation, ValidationError,
};
use himesh_crypto::{decode_public_key, KeyVault, NodeKeyPair, RsaPublicKey};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Registration input as received from the transport
#[derive(Debug, Clone)]
pub struct Registration {
    pub node_id: String,
    pub name: String,
    pub unit: String,
    pub post: String,
    pub position: Position,
}

/// Returned once on successful registration
pub struct RegistrationReceipt {
    pub node_id: NodeId,
    pub name: String,
    pub unit: UnitAffiliation,
    pub post: String,
    /// SPKI PEM
    pub public_key: String,
    /// PKCS#8 PEM; never retrievable again
    pub private_key: Zeroizing<String>,
}

impl fmt::Debug for RegistrationReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationReceipt")
            .field("node_id", &self.node_id)
            .field("name", &self.name)
            .field("unit", &self.unit)
            .field("post", &self.post)
            .finish_non_exhaustive()
    }
}

/// A computed path and the node set it was computed over
#[derive(Debug, Clone)]
pub struct RoutePlan {
    pub path: Vec<NodeId>,
    pub nodes: Vec<Node>,
}

/// Registered nodes plus their key custody
pub struct NodeRegistry {
    nodes: RwLock<Vec<Node>>,
    vault: Arc<KeyVault>,
    events: EventBus,
    model: RangeModel,
    key_bits: usize,
}

impl NodeRegistry {
    pub fn new(model: RangeModel, vault: Arc<KeyVault>, events: EventBus, key_bits: usize) -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
            vault,
            events,
            model,
            key_bits,
        }
    }

    /// Build a registry from configuration
    pub fn from_config(config: &Config, vault: Arc<KeyVault>, events: EventBus) -> Self {
        Self::new(
            RangeModel::from(&config.topology),
            vault,
            events,
            config.crypto.rsa_bits,
        )
    }

    /// Register a new node and generate its identity
    pub fn register(&self, registration: Registration) -> MeshResult<RegistrationReceipt> {
        let node_id = NodeId::parse(registration.node_id.trim())?;
        let name = required(&registration.name, "name")?;
        let post = required(&registration.post, "post")?;
        let unit: UnitAffiliation = registration.unit.parse()?;
        registration.position.validate()?;

        if self.contains(&node_id) {
            return Err(ValidationError::AlreadyRegistered(node_id.to_string()).into());
        }

        // Key generation is slow; keep it outside the lock
        let keypair = NodeKeyPair::generate(self.key_bits)?;
        let public_key = keypair.public_key_pem()?;
        let private_key = keypair.private_key_pem()?;

        let now = current_timestamp_ms();
        {
            let mut nodes = self.write();
            if nodes.iter().any(|n| n.id == node_id) {
                return Err(ValidationError::AlreadyRegistered(node_id.to_string()).into());
            }
            nodes.push(Node::new(
                node_id.clone(),
                name.clone(),
                unit,
                post.clone(),
                registration.position,
                public_key.clone(),
                now,
            ));
            self.vault.insert(node_id.clone(), keypair);
        }

        info!(
            target: SECURITY_TARGET,
            node_id = %node_id,
            post = %post,
            "Node registered"
        );
        self.events.publish(MeshEvent::NodeRegistered {
            node_id: node_id.clone(),
            timestamp: now,
        });
        self.broadcast_topology();

        Ok(RegistrationReceipt {
            node_id,
            name,
            unit,
            post,
            public_key,
            private_key,
        })
    }

    /// Look up a node
    pub fn get(&self, node_id: &NodeId) -> MeshResult<Node> {
        self.read()
            .iter()
            .find(|n| &n.id == node_id)
            .cloned()
            .ok_or_else(|| not_found(node_id))
    }

    /// Whether a node is registered
    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.read().iter().any(|n| &n.id == node_id)
    }

    /// All nodes in registration order
    pub fn list(&self) -> Vec<Node> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decoded public key of a node
    pub fn public_key(&self, node_id: &NodeId) -> MeshResult<RsaPublicKey> {
        let node = self.get(node_id)?;
        Ok(decode_public_key(&node.public_key)?)
    }

    /// Set a node's battery level (clamped to [0, 100])
    pub fn update_battery(&self, node_id: &NodeId, level: f64) -> MeshResult<Node> {
        let node = self.mutate(node_id, |node, now| node.set_battery(level, now))?;

        if node.battery_level < self.model.low_battery_threshold {
            warn!(
                target: SECURITY_TARGET,
                node_id = %node_id,
                battery = node.battery_level,
                "Battery critically low"
            );
        }
        Ok(node)
    }

    /// Move a node and record the fix in its history
    pub fn update_location(&self, node_id: &NodeId, position: Position) -> MeshResult<Node> {
        position.validate()?;
        let node = self.mutate(node_id, |node, now| node.set_position(position, now))?;

        info!(
            target: SECURITY_TARGET,
            node_id = %node_id,
            latitude = position.latitude,
            longitude = position.longitude,
            "Location updated"
        );
        Ok(node)
    }

    /// Operator status change
    pub fn update_status(&self, node_id: &NodeId, status: NodeStatus) -> MeshResult<Node> {
        let node = self.mutate(node_id, |node, now| node.set_status(status, now))?;
        debug!(node_id = %node_id, status = %node.status, "Status updated");
        Ok(node)
    }

    /// Remove a node and destroy its private key. Its messages are kept.
    pub fn remove(&self, node_id: &NodeId) -> MeshResult<()> {
        {
            let mut nodes = self.write();
            let index = nodes
                .iter()
                .position(|n| &n.id == node_id)
                .ok_or_else(|| not_found(node_id))?;
            nodes.remove(index);
            self.vault.remove(node_id);
        }

        info!(target: SECURITY_TARGET, node_id = %node_id, "Node removed from network");
        self.events.publish(MeshEvent::NodeRemoved {
            node_id: node_id.clone(),
            timestamp: current_timestamp_ms(),
        });
        self.broadcast_topology();
        Ok(())
    }

    /// Drain every active node by `step`. Returns the number drained.
    pub fn drain_all(&self, step: f64) -> usize {
        let mut nodes = self.write();
        let mut drained = 0;
        for node in nodes.iter_mut() {
            if node.drain_battery(step) {
                drained += 1;
            }
        }
        drained
    }

    /// Fresh topology over the current node set
    pub fn snapshot(&self) -> TopologySnapshot {
        self.model.snapshot(self.list())
    }

    /// Minimum-hop path over a fresh snapshot, together with that snapshot
    pub fn plan_route(&self, source: &NodeId, destination: &NodeId) -> Option<RoutePlan> {
        let nodes = self.list();
        let path = routing::find_path(&self.model, source, destination, &nodes)?;
        Some(RoutePlan { path, nodes })
    }

    /// Publish the full node set and its connections
    pub fn broadcast_topology(&self) -> usize {
        let snapshot = self.snapshot();
        self.events.publish(MeshEvent::TopologyChanged {
            nodes: snapshot.nodes,
            connections: snapshot.connections,
            timestamp: current_timestamp_ms(),
        })
    }

    pub fn model(&self) -> &RangeModel {
        &self.model
    }

    pub fn vault(&self) -> &Arc<KeyVault> {
        &self.vault
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn mutate(&self, node_id: &NodeId, apply: impl FnOnce(&mut Node, u64)) -> MeshResult<Node> {
        let updated = {
            let mut nodes = self.write();
            let node = nodes
                .iter_mut()
                .find(|n| &n.id == node_id)
                .ok_or_else(|| not_found(node_id))?;
            apply(node, current_timestamp_ms());
            node.clone()
        };
        self.broadcast_topology();
        Ok(updated)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Node>> {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Node>> {
        self.nodes.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("nodes", &self.len())
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

fn required(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(trimmed.to_string())
    }
}

fn not_found(node_id: &NodeId) -> MeshError {
    MeshError::NodeNotFound {
        node_id: node_id.to_string(),
    }
}
