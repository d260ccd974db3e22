//! Key management and the secure envelope for the Himalayan mesh.
//!
//! Every node owns an RSA keypair. Message bodies are sealed with a per-message
//! AES-256-CBC key wrapped for the recipient with RSA-OAEP, and signed by the
//! sender over the plaintext. See [`envelope`] for the exact construction.
//!
//! Private keys live in a [`KeyVault`] after registration; the rest of the
//! system seals and opens by node id.

pub mod envelope;
pub mod error;
pub mod keys;
pub mod signing;
pub mod vault;

pub use envelope::{decrypt, open, seal, DecryptedPayload, OpenedEnvelope, SealedEnvelope};
pub use error::{CryptoError, CryptoResult};
pub use keys::{decode_public_key, encode_public_key, NodeKeyPair, DEFAULT_KEY_BITS};
pub use vault::KeyVault;

pub use rsa::RsaPublicKey;
