//! Core error types

use thiserror::Error;

/// Input rejected at the boundary of the core.
///
/// Validation always happens before any cryptographic work or ledger write,
/// so a request failing with one of these has no side effects.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Identifier does not match `<PREFIX>-<3..10 uppercase alphanumerics>`
    #[error("Invalid node ID format: {0}")]
    InvalidNodeId(String),

    /// A coordinate component is outside the operating area
    #[error("Coordinate {field} = {value} outside [{min}, {max}]")]
    CoordinateOutOfRange {
        /// Component name (latitude, longitude, altitude)
        field: &'static str,
        /// Rejected value
        value: f64,
        /// Inclusive lower bound
        min: f64,
        /// Inclusive upper bound
        max: f64,
    },

    /// Unknown message priority
    #[error("Invalid priority level: {0}")]
    InvalidPriority(String),

    /// Unknown message type
    #[error("Invalid message type: {0}")]
    InvalidMessageType(String),

    /// Unknown node status
    #[error("Invalid node status: {0}")]
    InvalidStatus(String),

    /// Unknown unit affiliation
    #[error("Invalid unit: {0}")]
    InvalidUnit(String),

    /// Required field missing or empty
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Node identifier already registered
    #[error("Node already registered: {0}")]
    AlreadyRegistered(String),
}

/// Core error type for the mesh
#[derive(Debug, Error)]
pub enum CoreError {
    /// Validation failure
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;
