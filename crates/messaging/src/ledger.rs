//! Message Ledger - storage of sealed messages with delivery and expiry.
//!
//! Reads never return messages past their expiry; physical removal happens in
//! [`MessageStore::purge_expired`], best effort and not transactional with
//! reads. All time-dependent operations take `now_ms` explicitly.

use crate::message::{Message, Priority};
use himesh_core::NodeId;
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

/// Maximum entries returned by a history query
pub const HISTORY_LIMIT: usize = 50;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Backend database failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored field could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Message id already present
    #[error("Duplicate message id: {0}")]
    Duplicate(String),

    /// No message with this id
    #[error("Message not found: {0}")]
    NotFound(String),

    /// Stored row does not decode into a message
    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Aggregate counters over live (non-expired) messages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total: usize,
    pub delivered: usize,
    pub critical: usize,
    pub with_attachments: usize,
    /// Mean hop count, 0 when empty
    pub average_hop_count: f64,
    /// delivered / total in [0, 1], 0 when empty
    pub delivery_rate: f64,
}

impl LedgerStats {
    /// Fold a set of live messages into stats
    pub fn from_messages<'a>(messages: impl IntoIterator<Item = &'a Message>) -> Self {
        let mut stats = Self::default();
        let mut hop_sum = 0u64;

        for message in messages {
            stats.total += 1;
            hop_sum += u64::from(message.hop_count);
            if message.delivered {
                stats.delivered += 1;
            }
            if message.priority == Priority::Critical {
                stats.critical += 1;
            }
            if message.envelope.has_attachment {
                stats.with_attachments += 1;
            }
        }

        stats.finish(hop_sum);
        stats
    }

    pub(crate) fn finish(&mut self, hop_sum: u64) {
        if self.total > 0 {
            self.average_hop_count = hop_sum as f64 / self.total as f64;
            self.delivery_rate = self.delivered as f64 / self.total as f64;
        }
    }
}

/// Storage seam for sealed messages
pub trait MessageStore: Send + Sync {
    /// Persist a new message; ids are unique
    fn create(&self, message: Message) -> LedgerResult<()>;

    /// Whether an id is taken, expired or not
    fn contains_id(&self, id: &str) -> LedgerResult<bool>;

    /// A live message by id
    fn get(&self, id: &str, now_ms: u64) -> LedgerResult<Option<Message>>;

    /// Undelivered live messages addressed to `node_id`, oldest first
    fn pending_for(&self, node_id: &NodeId, now_ms: u64) -> LedgerResult<Vec<Message>>;

    /// Up to `limit` live messages sent or received by `node_id`, newest first
    fn history_for(&self, node_id: &NodeId, limit: usize, now_ms: u64) -> LedgerResult<Vec<Message>>;

    /// Mark delivered. Returns false if it already was.
    fn mark_delivered(&self, id: &str, at_ms: u64) -> LedgerResult<bool>;

    /// Counters over live messages
    fn stats(&self, now_ms: u64) -> LedgerResult<LedgerStats>;

    /// Remove expired messages, returning how many were removed
    fn purge_expired(&self, now_ms: u64) -> LedgerResult<usize>;
}

/// Volatile ledger kept in insertion order
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    messages: RwLock<Vec<Message>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored messages including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Message>> {
        self.messages.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Message>> {
        self.messages.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MessageStore for InMemoryLedger {
    fn create(&self, message: Message) -> LedgerResult<()> {
        let mut messages = self.write();
        if messages.iter().any(|m| m.id == message.id) {
            return Err(LedgerError::Duplicate(message.id));
        }
        messages.push(message);
        Ok(())
    }

    fn contains_id(&self, id: &str) -> LedgerResult<bool> {
        Ok(self.read().iter().any(|m| m.id == id))
    }

    fn get(&self, id: &str, now_ms: u64) -> LedgerResult<Option<Message>> {
        Ok(self
            .read()
            .iter()
            .find(|m| m.id == id && !m.is_expired(now_ms))
            .cloned())
    }

    fn pending_for(&self, node_id: &NodeId, now_ms: u64) -> LedgerResult<Vec<Message>> {
        let mut pending: Vec<Message> = self
            .read()
            .iter()
            .filter(|m| &m.to == node_id && !m.delivered && !m.is_expired(now_ms))
            .cloned()
            .collect();
        pending.sort_by_key(|m| m.created_at);
        Ok(pending)
    }

    fn history_for(&self, node_id: &NodeId, limit: usize, now_ms: u64) -> LedgerResult<Vec<Message>> {
        // Reverse insertion order first so equal timestamps list the later insert first
        let mut history: Vec<Message> = self
            .read()
            .iter()
            .rev()
            .filter(|m| m.involves(node_id) && !m.is_expired(now_ms))
            .cloned()
            .collect();
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        history.truncate(limit);
        Ok(history)
    }

    fn mark_delivered(&self, id: &str, at_ms: u64) -> LedgerResult<bool> {
        let mut messages = self.write();
        let message = messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;

        if message.delivered {
            return Ok(false);
        }
        message.delivered = true;
        message.delivered_at = Some(at_ms);
        Ok(true)
    }

    fn stats(&self, now_ms: u64) -> LedgerResult<LedgerStats> {
        let messages = self.read();
        Ok(LedgerStats::from_messages(
            messages.iter().filter(|m| !m.is_expired(now_ms)),
        ))
    }

    fn purge_expired(&self, now_ms: u64) -> LedgerResult<usize> {
        let mut messages = self.write();
        let before = messages.len();
        messages.retain(|m| !m.is_expired(now_ms));
        Ok(before - messages.len())
    }
}
