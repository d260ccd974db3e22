//! Error types for the node registry, topology and routing.

use himesh_core::ValidationError;
use himesh_crypto::CryptoError;
use thiserror::Error;

/// Errors that can occur in mesh operations.
#[derive(Debug, Error)]
pub enum MeshError {
    /// Malformed identifier, coordinates or field values
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Node not registered
    #[error("Node not found: {node_id}")]
    NodeNotFound { node_id: String },

    /// Destination unreachable from source
    #[error("No route from {source_node} to {destination}")]
    NoRoute {
        source_node: String,
        destination: String,
    },

    /// Key generation or encoding failed during registration
    #[error("Identity error: {0}")]
    Identity(#[from] CryptoError),
}

/// Result type for mesh operations.
pub type MeshResult<T> = Result<T, MeshError>;
