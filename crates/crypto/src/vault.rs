//! Server-side custody of node private keys.
//!
//! Private keys never leave the vault after registration; callers seal and
//! open by node id instead.

use crate::envelope::{self, DecryptedPayload, OpenedEnvelope, SealedEnvelope};
use crate::error::{CryptoError, CryptoResult};
use crate::keys::NodeKeyPair;
use himesh_core::logging::SECURITY_TARGET;
use himesh_core::NodeId;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Private keys indexed by node
#[derive(Default)]
pub struct KeyVault {
    keys: RwLock<HashMap<NodeId, RsaPrivateKey>>,
}

impl KeyVault {
    /// Create an empty vault
    pub fn new() -> Self {
        Self::default()
    }

    /// Take custody of a node's private key, replacing any previous one
    pub fn insert(&self, node_id: NodeId, keypair: NodeKeyPair) {
        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(target: SECURITY_TARGET, node_id = %node_id, "Private key taken into custody");
        keys.insert(node_id, keypair.into_private_key());
    }

    /// Drop a node's key. Returns whether one was held.
    pub fn remove(&self, node_id: &NodeId) -> bool {
        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        let removed = keys.remove(node_id).is_some();
        if removed {
            tracing::debug!(target: SECURITY_TARGET, node_id = %node_id, "Private key destroyed");
        }
        removed
    }

    /// Whether a key is held for the node
    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(node_id)
    }

    /// Number of keys held
    pub fn len(&self) -> usize {
        self.keys.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the vault is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seal a payload signed by `sender` for `receiver_public`
    pub fn seal_from(
        &self,
        sender: &NodeId,
        receiver_public: &RsaPublicKey,
        plaintext: &str,
        attachment: Option<&str>,
    ) -> CryptoResult<SealedEnvelope> {
        self.with_key(sender, |private_key| {
            envelope::seal(plaintext, attachment, private_key, receiver_public)
        })
    }

    /// Open an envelope addressed to `receiver`, verifying against `sender_public`
    pub fn open_for(
        &self,
        receiver: &NodeId,
        sender_public: &RsaPublicKey,
        sealed: &SealedEnvelope,
    ) -> CryptoResult<OpenedEnvelope> {
        self.with_key(receiver, |private_key| {
            envelope::open(sealed, private_key, sender_public)
        })
    }

    /// Decrypt an envelope addressed to `receiver` without verification
    pub fn decrypt_for(&self, receiver: &NodeId, sealed: &SealedEnvelope) -> CryptoResult<DecryptedPayload> {
        self.with_key(receiver, |private_key| envelope::decrypt(sealed, private_key))
    }

    fn with_key<T>(
        &self,
        node_id: &NodeId,
        f: impl FnOnce(&RsaPrivateKey) -> CryptoResult<T>,
    ) -> CryptoResult<T> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        let private_key = keys.get(node_id).ok_or_else(|| CryptoError::KeyNotFound {
            node_id: node_id.to_string(),
        })?;
        f(private_key)
    }
}

impl std::fmt::Debug for KeyVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyVault").field("keys", &self.len()).finish()
    }
}
