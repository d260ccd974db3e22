//! RSASSA-PKCS1-v1_5 / SHA-256 signatures over message plaintext.
//!
//! Signatures are hex encoded on the wire.

use crate::error::{CryptoError, CryptoResult};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

/// Sign `message` and return the hex encoded signature
pub fn sign(private_key: &RsaPrivateKey, message: &[u8]) -> CryptoResult<String> {
    let signing_key = SigningKey::<Sha256>::new(private_key.clone());
    let signature = signing_key
        .try_sign(message)
        .map_err(|e| CryptoError::Signing(e.to_string()))?;
    Ok(hex::encode(signature.to_bytes()))
}

/// Verify a hex encoded signature over `message`.
///
/// Malformed signatures verify as false rather than erroring.
pub fn verify(public_key: &RsaPublicKey, message: &[u8], signature_hex: &str) -> bool {
    let Ok(bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = Signature::try_from(bytes.as_slice()) else {
        return false;
    };
    VerifyingKey::<Sha256>::new(public_key.clone())
        .verify(message, &signature)
        .is_ok()
}
