//! Send/receive orchestration.
//!
//! A send runs to completion before returning:
//! validate → rate limit → fresh topology → route → seal → persist → publish.
//! Validation and rate limiting happen before any cryptographic work or
//! ledger write, so a rejected send leaves nothing behind. A receive opens
//! each pending message independently; one bad envelope never fails the
//! batch.

use crate::error::{ServiceError, ServiceResult};
use crate::ledger::{LedgerStats, MessageStore, HISTORY_LIMIT};
use crate::message::{
    generate_message_id, sanitize_content, Message, MessageType, PathHop, Priority,
    DEFAULT_TTL_MS,
};
use crate::rate_limit::RateLimiter;
use himesh_core::logging::SECURITY_TARGET;
use himesh_core::{current_timestamp_ms, Config, MeshEvent, Node, NodeId};
use himesh_crypto::decode_public_key;
use himesh_mesh::{relay_count, NodeRegistry, Registration, RegistrationReceipt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Characters kept in sealed-field previews
pub const PREVIEW_CHARS: usize = 100;

/// Send input as received from the transport
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendRequest {
    pub from: String,
    pub to: String,
    pub content: String,
    /// Defaults to `medium`
    pub priority: Option<String>,
    /// Defaults to `general`
    pub message_type: Option<String>,
    pub attachment: Option<String>,
}

/// Result of a successful send
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReceipt {
    pub message_id: String,
    pub from: NodeId,
    pub to: NodeId,
    pub path: Vec<NodeId>,
    pub hop_count: u32,
    pub has_attachment: bool,
    pub sealed_content_preview: String,
    pub sealed_key_preview: String,
    pub signature_preview: String,
    pub expires_at: u64,
}

/// An opened message in a receive batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivedMessage {
    pub message_id: String,
    pub from: NodeId,
    pub content: String,
    pub attachment: Option<String>,
    pub has_attachment: bool,
    pub priority: Priority,
    pub message_type: MessageType,
    pub path: Vec<PathHop>,
    pub hop_count: u32,
    pub created_at: u64,
    pub expires_at: u64,
    /// False leaves the message pending
    pub signature_valid: bool,
}

/// Receive batch for one node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inbox {
    pub node_id: NodeId,
    pub messages: Vec<ReceivedMessage>,
    /// Pending messages that could not be opened or marked delivered and
    /// were omitted
    pub failed: usize,
}

/// One history row as seen by a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub message_id: String,
    pub from: NodeId,
    pub to: NodeId,
    /// Body when addressed to the viewer; `None` while still sealed
    pub content: Option<String>,
    pub attachment: Option<String>,
    pub has_attachment: bool,
    pub priority: Priority,
    pub message_type: MessageType,
    pub hop_count: u32,
    pub delivered: bool,
    pub created_at: u64,
    pub expires_at: u64,
    pub decryption_failed: bool,
}

/// The mesh's message-handling front door
pub struct MeshService {
    registry: Arc<NodeRegistry>,
    ledger: Arc<dyn MessageStore>,
    limiter: RateLimiter,
    ttl_ms: u64,
}

impl MeshService {
    pub fn new(
        registry: Arc<NodeRegistry>,
        ledger: Arc<dyn MessageStore>,
        limiter: RateLimiter,
        ttl: Duration,
    ) -> Self {
        Self {
            registry,
            ledger,
            limiter,
            ttl_ms: ttl.as_millis() as u64,
        }
    }

    pub fn from_config(config: &Config, registry: Arc<NodeRegistry>, ledger: Arc<dyn MessageStore>) -> Self {
        Self::new(
            registry,
            ledger,
            RateLimiter::from_config(&config.rate_limit),
            Duration::from_secs(config.ledger.ttl_secs),
        )
    }

    /// Service with the default 24 hour TTL and rate limit
    pub fn with_defaults(registry: Arc<NodeRegistry>, ledger: Arc<dyn MessageStore>) -> Self {
        Self::new(
            registry,
            ledger,
            RateLimiter::default(),
            Duration::from_millis(DEFAULT_TTL_MS),
        )
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn ledger(&self) -> &Arc<dyn MessageStore> {
        &self.ledger
    }

    /// Register a node; see [`NodeRegistry::register`]
    pub fn register(&self, registration: Registration) -> ServiceResult<RegistrationReceipt> {
        Ok(self.registry.register(registration)?)
    }

    /// Seal and store a message along a freshly computed path
    pub fn send(&self, request: SendRequest) -> ServiceResult<SendReceipt> {
        self.send_at(request, current_timestamp_ms())
    }

    /// [`send`](Self::send) at an explicit time
    pub fn send_at(&self, request: SendRequest, now_ms: u64) -> ServiceResult<SendReceipt> {
        let from = NodeId::parse(request.from.trim())?;
        let to = NodeId::parse(request.to.trim())?;
        let priority: Priority = match request.priority.as_deref() {
            Some(raw) => raw.parse()?,
            None => Priority::default(),
        };
        let message_type: MessageType = match request.message_type.as_deref() {
            Some(raw) => raw.parse()?,
            None => MessageType::default(),
        };
        let content = sanitize_content(&request.content)?;
        let attachment = request.attachment.as_deref().filter(|a| !a.is_empty());

        let receiver = self.registry.get(&to)?;
        if !self.registry.contains(&from) {
            return Err(ServiceError::NotFound(from.to_string()));
        }

        if !self.limiter.admit_at(&from, now_ms) {
            warn!(target: SECURITY_TARGET, node_id = %from, "Rate limit exceeded");
            return Err(ServiceError::RateLimitExceeded(from.to_string()));
        }

        let route = self.registry.plan_route(&from, &to).ok_or_else(|| {
            ServiceError::RouteNotFound {
                from: from.to_string(),
                to: to.to_string(),
            }
        })?;
        let path = route.path;

        let receiver_public = decode_public_key(&receiver.public_key)?;
        let envelope = self
            .registry
            .vault()
            .seal_from(&from, &receiver_public, &content, attachment)?;

        let message_id = self.unique_message_id()?;
        let hop_count = relay_count(&path);
        let message = Message {
            id: message_id.clone(),
            from: from.clone(),
            to: to.clone(),
            envelope,
            priority,
            message_type,
            path: realize_path(&path, &route.nodes, now_ms),
            hop_count,
            delivered: false,
            delivered_at: None,
            failed_attempts: 0,
            created_at: now_ms,
            expires_at: now_ms + self.ttl_ms,
        };
        let receipt = SendReceipt {
            message_id: message_id.clone(),
            from: from.clone(),
            to: to.clone(),
            path: path.clone(),
            hop_count,
            has_attachment: message.envelope.has_attachment,
            sealed_content_preview: preview(&message.envelope.sealed_content),
            sealed_key_preview: preview(&message.envelope.sealed_key),
            signature_preview: preview(&message.envelope.signature),
            expires_at: message.expires_at,
        };

        self.ledger.create(message)?;

        info!(
            target: SECURITY_TARGET,
            message_id = %message_id,
            from = %from,
            to = %to,
            hops = hop_count,
            attachment = receipt.has_attachment,
            "Message sent"
        );
        self.registry.events().publish(MeshEvent::MessageRouted {
            message_id,
            from,
            to,
            path,
            timestamp: now_ms,
        });

        Ok(receipt)
    }

    /// Open every pending message for `node_id`
    pub fn receive(&self, node_id: &str) -> ServiceResult<Inbox> {
        self.receive_at(node_id, current_timestamp_ms())
    }

    /// [`receive`](Self::receive) at an explicit time
    pub fn receive_at(&self, node_id: &str, now_ms: u64) -> ServiceResult<Inbox> {
        let node_id = NodeId::parse(node_id.trim())?;
        self.registry.get(&node_id)?;

        let pending = self.ledger.pending_for(&node_id, now_ms)?;
        let mut messages = Vec::with_capacity(pending.len());
        let mut failed = 0;

        for message in pending {
            let opened = self
                .registry
                .public_key(&message.from)
                .map_err(ServiceError::from)
                .and_then(|sender_public| {
                    Ok(self
                        .registry
                        .vault()
                        .open_for(&node_id, &sender_public, &message.envelope)?)
                });

            let opened = match opened {
                Ok(opened) => opened,
                Err(e) => {
                    warn!(message_id = %message.id, error = %e, "Failed to open message");
                    failed += 1;
                    continue;
                }
            };

            if opened.signature_valid {
                if let Err(e) = self.ledger.mark_delivered(&message.id, now_ms) {
                    warn!(message_id = %message.id, error = %e, "Failed to mark message delivered");
                    failed += 1;
                    continue;
                }
                self.registry.events().publish(MeshEvent::MessageDelivered {
                    message_id: message.id.clone(),
                    to: node_id.clone(),
                    timestamp: now_ms,
                });
                debug!(message_id = %message.id, "Message delivered");
            } else {
                warn!(
                    target: SECURITY_TARGET,
                    message_id = %message.id,
                    from = %message.from,
                    "Signature verification failed; message left pending"
                );
            }

            messages.push(ReceivedMessage {
                message_id: message.id,
                from: message.from,
                content: opened.plaintext,
                attachment: opened.attachment,
                has_attachment: message.envelope.has_attachment,
                priority: message.priority,
                message_type: message.message_type,
                path: message.path,
                hop_count: message.hop_count,
                created_at: message.created_at,
                expires_at: message.expires_at,
                signature_valid: opened.signature_valid,
            });
        }

        Ok(Inbox {
            node_id,
            messages,
            failed,
        })
    }

    /// Up to 50 newest messages sent or received by `node_id`
    pub fn history(&self, node_id: &str) -> ServiceResult<Vec<HistoryEntry>> {
        self.history_at(node_id, current_timestamp_ms())
    }

    /// [`history`](Self::history) at an explicit time
    pub fn history_at(&self, node_id: &str, now_ms: u64) -> ServiceResult<Vec<HistoryEntry>> {
        let node_id = NodeId::parse(node_id.trim())?;
        self.registry.get(&node_id)?;

        let messages = self.ledger.history_for(&node_id, HISTORY_LIMIT, now_ms)?;
        Ok(messages
            .into_iter()
            .map(|message| self.history_entry(&node_id, message))
            .collect())
    }

    /// Ledger counters at the current time
    pub fn stats(&self) -> ServiceResult<LedgerStats> {
        Ok(self.ledger.stats(current_timestamp_ms())?)
    }

    /// Ledger counters at an explicit time
    pub fn stats_at(&self, now_ms: u64) -> ServiceResult<LedgerStats> {
        Ok(self.ledger.stats(now_ms)?)
    }

    /// Remove expired messages from the ledger
    pub fn purge_expired(&self, now_ms: u64) -> ServiceResult<usize> {
        let removed = self.ledger.purge_expired(now_ms)?;
        if removed > 0 {
            info!(removed, "Purged expired messages");
        }
        self.limiter.prune(now_ms);
        Ok(removed)
    }

    fn history_entry(&self, viewer: &NodeId, message: Message) -> HistoryEntry {
        let mut content = None;
        let mut attachment = None;
        let mut decryption_failed = false;

        if &message.to == viewer {
            match self.registry.vault().decrypt_for(viewer, &message.envelope) {
                Ok(payload) => {
                    content = Some(payload.plaintext);
                    attachment = payload.attachment;
                }
                Err(e) => {
                    debug!(message_id = %message.id, error = %e, "History decryption failed");
                    decryption_failed = true;
                }
            }
        }

        HistoryEntry {
            message_id: message.id,
            from: message.from,
            to: message.to,
            content,
            attachment,
            has_attachment: message.envelope.has_attachment,
            priority: message.priority,
            message_type: message.message_type,
            hop_count: message.hop_count,
            delivered: message.delivered,
            created_at: message.created_at,
            expires_at: message.expires_at,
            decryption_failed,
        }
    }

    fn unique_message_id(&self) -> ServiceResult<String> {
        loop {
            let id = generate_message_id();
            if !self.ledger.contains_id(&id)? {
                return Ok(id);
            }
        }
    }
}

impl std::fmt::Debug for MeshService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshService")
            .field("registry", &self.registry)
            .field("limiter", &self.limiter)
            .field("ttl_ms", &self.ttl_ms)
            .finish_non_exhaustive()
    }
}

fn realize_path(path: &[NodeId], nodes: &[Node], now_ms: u64) -> Vec<PathHop> {
    path.iter()
        .map(|node_id| PathHop {
            node_id: node_id.clone(),
            timestamp: now_ms,
            battery_level: nodes
                .iter()
                .find(|n| &n.id == node_id)
                .map_or(0.0, |n| n.battery_level),
        })
        .collect()
}

fn preview(value: &str) -> String {
    value.chars().take(PREVIEW_CHARS).collect()
}
