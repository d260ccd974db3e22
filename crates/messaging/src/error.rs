//! Service-level error taxonomy.
//!
//! Every failure a transport can observe from send, receive, history or
//! registration maps to one of these variants.

use crate::ledger::LedgerError;
use himesh_core::ValidationError;
use himesh_crypto::CryptoError;
use himesh_mesh::MeshError;
use thiserror::Error;

/// Errors surfaced by [`MeshService`](crate::MeshService)
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed identifier, coordinates, priority, type or content
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Unknown sender, receiver or node
    #[error("Node not found: {0}")]
    NotFound(String),

    /// Sender exceeded its rolling-window allowance
    #[error("Rate limit exceeded for {0}")]
    RateLimitExceeded(String),

    /// No path between sender and receiver; nothing was stored
    #[error("No route from {from} to {to}")]
    RouteNotFound { from: String, to: String },

    /// Seal or open failed
    #[error("Envelope failure: {0}")]
    Envelope(#[from] CryptoError),

    /// Ledger failure, passed through unchanged
    #[error("Persistence error: {0}")]
    Persistence(#[from] LedgerError),
}

impl From<MeshError> for ServiceError {
    fn from(err: MeshError) -> Self {
        match err {
            MeshError::Validation(e) => ServiceError::Validation(e),
            MeshError::NodeNotFound { node_id } => ServiceError::NotFound(node_id),
            MeshError::NoRoute {
                source_node,
                destination,
            } => ServiceError::RouteNotFound {
                from: source_node,
                to: destination,
            },
            MeshError::Identity(e) => ServiceError::Envelope(e),
        }
    }
}

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
