//! Messaging for the Himalayan mesh.
//!
//! This crate turns the topology and envelope primitives into the message
//! pipeline. It handles:
//! - The message model, identifiers and content sanitising
//! - The Message Ledger with in-memory and SQLite backends
//! - Per-sender rate limiting over a rolling window
//! - Send/receive/history orchestration in [`MeshService`]
//! - Hop playback timelines for observers
//!
//! # Architecture
//!
//! A send flows through the following pipeline:
//! 1. Request validated (ids, priority, type, content)
//! 2. Sender admitted by the `RateLimiter`
//! 3. Fresh topology snapshot taken from the `NodeRegistry`
//! 4. Minimum-hop path computed
//! 5. Payload sealed for the receiver and signed by the sender
//! 6. Message persisted in the `MessageStore` and `MessageRouted` published
//!
//! # Examples
//!
//! ```no_run
//! use himesh_core::{Config, EventBus};
//! use himesh_crypto::KeyVault;
//! use himesh_messaging::{InMemoryLedger, MeshService, SendRequest};
//! use himesh_mesh::NodeRegistry;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default_config();
//! let registry = Arc::new(NodeRegistry::from_config(
//!     &config,
//!     Arc::new(KeyVault::new()),
//!     EventBus::default(),
//! ));
//! let service = MeshService::from_config(&config, registry, Arc::new(InMemoryLedger::new()));
//!
//! let receipt = service.send(SendRequest {
//!     from: "ARMY-ALPHA".to_string(),
//!     to: "BSF-BRAVO".to_string(),
//!     content: "Hold position".to_string(),
//!     ..SendRequest::default()
//! })?;
//! println!("{} via {} relays", receipt.message_id, receipt.hop_count);
//! # Ok(())
//! # }
//! ```

pub mod dispatcher;
pub mod error;
pub mod ledger;
pub mod message;
pub mod playback;
pub mod rate_limit;
pub mod sqlite;

pub use dispatcher::{HistoryEntry, Inbox, MeshService, ReceivedMessage, SendReceipt, SendRequest};
pub use error::{ServiceError, ServiceResult};
pub use ledger::{InMemoryLedger, LedgerError, LedgerStats, MessageStore, HISTORY_LIMIT};
pub use message::{Message, MessageType, PathHop, Priority};
pub use rate_limit::RateLimiter;
pub use sqlite::SqliteLedger;
