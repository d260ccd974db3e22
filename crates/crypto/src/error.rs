//! Error types for key management and the secure envelope.

use thiserror::Error;

/// Errors that can occur in cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// RSA key generation failed
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// A key could not be encoded to or decoded from PEM
    #[error("Key encoding error: {0}")]
    KeyEncoding(String),

    /// No secret held for the node
    #[error("No private key held for node {node_id}")]
    KeyNotFound {
        /// Node identifier
        node_id: String,
    },

    /// Sealing failed
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Key unwrap or body decryption failed (wrong key, tamper)
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Envelope field is not in the expected encoding
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Signing failed
    #[error("Signing failed: {0}")]
    Signing(String),
}

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
