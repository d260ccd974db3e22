//! RSA node identities.
//!
//! Public keys travel as SPKI PEM and are broadcastable. Private keys are
//! PKCS#8 PEM, handed out once at registration and otherwise held by the
//! [`KeyVault`](crate::vault::KeyVault).

use crate::error::{CryptoError, CryptoResult};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt;
use zeroize::Zeroizing;

/// Default RSA modulus size
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Asymmetric identity of one node
pub struct NodeKeyPair {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl NodeKeyPair {
    /// Generate a fresh keypair with a modulus of `bits` bits
    pub fn generate(bits: usize) -> CryptoResult<Self> {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let public_key = RsaPublicKey::from(&private_key);

        Ok(Self {
            private_key,
            public_key,
        })
    }

    /// Rebuild a keypair from its PKCS#8 PEM private key
    pub fn from_private_pem(pem: &str) -> CryptoResult<Self> {
        let private_key = decode_private_key(pem)?;
        let public_key = RsaPublicKey::from(&private_key);
        Ok(Self {
            private_key,
            public_key,
        })
    }

    /// Public half
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// SPKI PEM of the public key
    pub fn public_key_pem(&self) -> CryptoResult<String> {
        encode_public_key(&self.public_key)
    }

    /// PKCS#8 PEM of the private key, zeroized on drop
    pub fn private_key_pem(&self) -> CryptoResult<Zeroizing<String>> {
        self.private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CryptoError::KeyEncoding(e.to_string()))
    }

    /// Stable short identifier of the public key
    pub fn key_id(&self) -> CryptoResult<String> {
        key_id(&self.public_key)
    }

    #[cfg(test)]
    pub(crate) fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    pub(crate) fn into_private_key(self) -> RsaPrivateKey {
        self.private_key
    }
}

impl fmt::Debug for NodeKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeKeyPair")
            .field("key_id", &self.key_id().unwrap_or_default())
            .finish_non_exhaustive()
    }
}

/// Encode a public key as SPKI PEM
pub fn encode_public_key(key: &RsaPublicKey) -> CryptoResult<String> {
    key.to_public_key_pem(LineEnding::LF)
        .map_err(|e| CryptoError::KeyEncoding(e.to_string()))
}

/// Decode an SPKI PEM public key
pub fn decode_public_key(pem: &str) -> CryptoResult<RsaPublicKey> {
    RsaPublicKey::from_public_key_pem(pem).map_err(|e| CryptoError::KeyEncoding(e.to_string()))
}

/// Decode a PKCS#8 PEM private key
pub fn decode_private_key(pem: &str) -> CryptoResult<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| CryptoError::KeyEncoding(e.to_string()))
}

/// BLAKE3 fingerprint of the DER public key, first 16 bytes as hex
pub fn key_id(key: &RsaPublicKey) -> CryptoResult<String> {
    let der = key
        .to_public_key_der()
        .map_err(|e| CryptoError::KeyEncoding(e.to_string()))?;
    let hash = blake3::hash(der.as_bytes());
    Ok(hex::encode(&hash.as_bytes()[..16]))
}
