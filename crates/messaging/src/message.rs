//! Message model.
//!
//! A message is created once with its sealed envelope, realized path and hop
//! count. After creation only the delivery fields change.

use himesh_core::{NodeId, ValidationError};
use himesh_crypto::SealedEnvelope;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix of every message identifier
pub const MESSAGE_ID_PREFIX: &str = "MSG-";

/// Maximum body length after sanitising, in characters
pub const MAX_CONTENT_CHARS: usize = 1000;

/// Default time-to-live (24 hours)
pub const DEFAULT_TTL_MS: u64 = 24 * 60 * 60 * 1000;

/// Message priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(ValidationError::InvalidPriority(other.to_string())),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageType {
    PatrolUpdate,
    EnemyAlert,
    MedicalEmergency,
    SupplyRequest,
    WeatherAlert,
    #[default]
    General,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::PatrolUpdate => "patrol-update",
            MessageType::EnemyAlert => "enemy-alert",
            MessageType::MedicalEmergency => "medical-emergency",
            MessageType::SupplyRequest => "supply-request",
            MessageType::WeatherAlert => "weather-alert",
            MessageType::General => "general",
        }
    }
}

impl FromStr for MessageType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patrol-update" => Ok(MessageType::PatrolUpdate),
            "enemy-alert" => Ok(MessageType::EnemyAlert),
            "medical-emergency" => Ok(MessageType::MedicalEmergency),
            "supply-request" => Ok(MessageType::SupplyRequest),
            "weather-alert" => Ok(MessageType::WeatherAlert),
            "general" => Ok(MessageType::General),
            other => Err(ValidationError::InvalidMessageType(other.to_string())),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node on a realized path, as it was at send time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathHop {
    pub node_id: NodeId,
    pub timestamp: u64,
    pub battery_level: f64,
}

/// A sealed message in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub from: NodeId,
    pub to: NodeId,
    #[serde(flatten)]
    pub envelope: SealedEnvelope,
    pub priority: Priority,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub path: Vec<PathHop>,
    /// Relay nodes between sender and receiver
    pub hop_count: u32,
    pub delivered: bool,
    pub delivered_at: Option<u64>,
    /// Reserved; no retry policy consults it
    pub failed_attempts: u32,
    pub created_at: u64,
    pub expires_at: u64,
}

impl Message {
    /// Whether the message is past its expiry at `now_ms`
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at <= now_ms
    }

    /// Whether `node_id` sent or receives this message
    pub fn involves(&self, node_id: &NodeId) -> bool {
        &self.from == node_id || &self.to == node_id
    }

    /// Node ids along the path
    pub fn path_ids(&self) -> Vec<NodeId> {
        self.path.iter().map(|hop| hop.node_id.clone()).collect()
    }
}

/// Generate a fresh `MSG-` identifier with 16 uppercase hex characters
pub fn generate_message_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{MESSAGE_ID_PREFIX}{}", hex::encode_upper(bytes))
}

/// Strip angle brackets, trim, and cap the body length.
///
/// Empty content after sanitising is rejected.
pub fn sanitize_content(raw: &str) -> Result<String, ValidationError> {
    let stripped: String = raw.chars().filter(|c| *c != '<' && *c != '>').collect();
    let content: String = stripped.trim().chars().take(MAX_CONTENT_CHARS).collect();

    if content.is_empty() {
        Err(ValidationError::MissingField("content"))
    } else {
        Ok(content)
    }
}
