//! Secure Envelope - hybrid seal/open of message payloads.
//!
//! Per message:
//! 1. A fresh 256-bit AES key is generated.
//! 2. The body is encrypted with AES-256-CBC under a fresh 128-bit IV and
//!    encoded as `iv_hex:ciphertext_hex`.
//! 3. An attachment, if any, is encrypted under the same key with its own IV.
//! 4. The AES key is wrapped for the recipient with RSA-OAEP(SHA-256) and
//!    base64 encoded.
//! 5. The *plaintext* body is signed with the sender's key
//!    (RSASSA-PKCS1-v1_5 / SHA-256).
//!
//! Opening unwraps the key, decrypts body and attachment, then verifies the
//! signature against the claimed sender. A bad signature is not an error: it
//! is reported through [`OpenedEnvelope::signature_valid`] so callers can keep
//! the message pending while still distinguishing it from undecryptable data.

use crate::error::{CryptoError, CryptoResult};
use crate::signing;
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::{CryptoRng, RngCore};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Symmetric key length in bytes (AES-256)
pub const SYMMETRIC_KEY_LEN: usize = 32;
/// CBC initialization vector length in bytes
pub const IV_LEN: usize = 16;

/// Sealed payload as persisted and exchanged.
///
/// All fields are opaque strings to anything outside this module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedEnvelope {
    /// `iv_hex:ciphertext_hex` of the body
    pub sealed_content: String,
    /// Base64 RSA-OAEP wrapped AES key
    pub sealed_key: String,
    /// Hex signature over the plaintext body
    pub signature: String,
    /// `iv_hex:ciphertext_hex` of the attachment
    pub sealed_attachment: Option<String>,
    /// Whether an attachment was sealed
    pub has_attachment: bool,
}

/// Result of opening an envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedEnvelope {
    /// Decrypted body
    pub plaintext: String,
    /// Decrypted attachment
    pub attachment: Option<String>,
    /// Whether the body verified against the claimed sender's key
    pub signature_valid: bool,
}

/// Seal `plaintext` (and optional `attachment`) for `receiver_public`,
/// signed by `sender_private`.
pub fn seal(
    plaintext: &str,
    attachment: Option<&str>,
    sender_private: &RsaPrivateKey,
    receiver_public: &RsaPublicKey,
) -> CryptoResult<SealedEnvelope> {
    let mut rng = rand::thread_rng();

    let mut key = Zeroizing::new([0u8; SYMMETRIC_KEY_LEN]);
    rng.fill_bytes(key.as_mut());

    let sealed_content = encrypt_blob(plaintext.as_bytes(), key.as_ref(), &mut rng)?;
    let sealed_attachment = attachment
        .map(|data| encrypt_blob(data.as_bytes(), key.as_ref(), &mut rng))
        .transpose()?;

    let wrapped = receiver_public
        .encrypt(&mut rng, Oaep::new::<Sha256>(), key.as_ref())
        .map_err(|e| CryptoError::Encryption(format!("key wrap: {e}")))?;

    let signature = signing::sign(sender_private, plaintext.as_bytes())?;

    Ok(SealedEnvelope {
        sealed_content,
        sealed_key: BASE64.encode(wrapped),
        signature,
        has_attachment: sealed_attachment.is_some(),
        sealed_attachment,
    })
}

/// Body and attachment recovered from an envelope, not yet verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedPayload {
    pub plaintext: String,
    pub attachment: Option<String>,
}

/// Open an envelope addressed to the holder of `receiver_private`, checking
/// the signature against `sender_public`.
pub fn open(
    envelope: &SealedEnvelope,
    receiver_private: &RsaPrivateKey,
    sender_public: &RsaPublicKey,
) -> CryptoResult<OpenedEnvelope> {
    let DecryptedPayload { plaintext, attachment } = decrypt(envelope, receiver_private)?;
    let signature_valid = signing::verify(sender_public, plaintext.as_bytes(), &envelope.signature);

    Ok(OpenedEnvelope {
        plaintext,
        attachment,
        signature_valid,
    })
}

/// Unwrap the key and decrypt body and attachment without verifying the
/// signature. Used for history views where the sender may be gone.
pub fn decrypt(envelope: &SealedEnvelope, receiver_private: &RsaPrivateKey) -> CryptoResult<DecryptedPayload> {
    let key = unwrap_key(&envelope.sealed_key, receiver_private)?;

    let body = decrypt_blob(&envelope.sealed_content, &key)?;
    let plaintext = String::from_utf8(body)
        .map_err(|_| CryptoError::Decryption("body is not valid UTF-8".to_string()))?;

    let attachment = match (envelope.has_attachment, envelope.sealed_attachment.as_deref()) {
        (true, Some(blob)) => {
            let data = decrypt_blob(blob, &key)?;
            Some(String::from_utf8(data).map_err(|_| {
                CryptoError::Decryption("attachment is not valid UTF-8".to_string())
            })?)
        }
        (true, None) => {
            return Err(CryptoError::MalformedEnvelope(
                "attachment flag set without attachment".to_string(),
            ))
        }
        (false, _) => None,
    };

    Ok(DecryptedPayload { plaintext, attachment })
}

fn unwrap_key(sealed_key: &str, receiver_private: &RsaPrivateKey) -> CryptoResult<Zeroizing<Vec<u8>>> {
    let wrapped = BASE64
        .decode(sealed_key)
        .map_err(|e| CryptoError::MalformedEnvelope(format!("sealed key: {e}")))?;

    let key = Zeroizing::new(
        receiver_private
            .decrypt(Oaep::new::<Sha256>(), &wrapped)
            .map_err(|e| CryptoError::Decryption(format!("key unwrap: {e}")))?,
    );

    if key.len() != SYMMETRIC_KEY_LEN {
        return Err(CryptoError::Decryption(format!(
            "unwrapped key has {} bytes, expected {}",
            key.len(),
            SYMMETRIC_KEY_LEN
        )));
    }
    Ok(key)
}

fn encrypt_blob<R: RngCore + CryptoRng>(data: &[u8], key: &[u8], rng: &mut R) -> CryptoResult<String> {
    let mut iv = [0u8; IV_LEN];
    rng.fill_bytes(&mut iv);

    let cipher = Aes256CbcEnc::new_from_slices(key, &iv)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(data);

    Ok(format!("{}:{}", hex::encode(iv), hex::encode(ciphertext)))
}

fn decrypt_blob(blob: &str, key: &[u8]) -> CryptoResult<Vec<u8>> {
    let (iv_hex, ciphertext_hex) = blob
        .split_once(':')
        .ok_or_else(|| CryptoError::MalformedEnvelope("missing iv separator".to_string()))?;

    let iv = hex::decode(iv_hex).map_err(|e| CryptoError::MalformedEnvelope(format!("iv: {e}")))?;
    if iv.len() != IV_LEN {
        return Err(CryptoError::MalformedEnvelope(format!(
            "iv has {} bytes, expected {}",
            iv.len(),
            IV_LEN
        )));
    }
    let ciphertext = hex::decode(ciphertext_hex)
        .map_err(|e| CryptoError::MalformedEnvelope(format!("ciphertext: {e}")))?;

    let cipher = Aes256CbcDec::new_from_slices(key, &iv)
        .map_err(|e| CryptoError::Decryption(e.to_string()))?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| CryptoError::Decryption("invalid padding".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::tests::test_keypair;
    use proptest::prelude::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let sender = test_keypair(0);
        let receiver = test_keypair(1);

        let envelope = seal(
            "Casualty at grid 4471, need evac",
            None,
            sender.private_key(),
            receiver.public_key(),
        )
        .unwrap();
        assert!(!envelope.has_attachment);
        assert!(envelope.sealed_attachment.is_none());

        let opened = open(&envelope, receiver.private_key(), sender.public_key()).unwrap();
        assert_eq!(opened.plaintext, "Casualty at grid 4471, need evac");
        assert!(opened.attachment.is_none());
        assert!(opened.signature_valid);
    }

    #[test]
    fn test_wire_format() {
        let sender = test_keypair(0);
        let receiver = test_keypair(1);
        let envelope = seal("ping", None, sender.private_key(), receiver.public_key()).unwrap();

        let (iv, ciphertext) = envelope.sealed_content.split_once(':').unwrap();
        assert_eq!(iv.len(), IV_LEN * 2);
        // One padded block for a four byte body
        assert_eq!(ciphertext.len(), 32);
        assert!(BASE64.decode(&envelope.sealed_key).is_ok());
        assert!(hex::decode(&envelope.signature).is_ok());
    }

    #[test]
    fn test_attachment_has_independent_iv() {
        let sender = test_keypair(0);
        let receiver = test_keypair(1);
        let image = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk";

        let envelope = seal("photo of the pass", Some(image), sender.private_key(), receiver.public_key()).unwrap();
        assert!(envelope.has_attachment);

        let body_iv = envelope.sealed_content.split_once(':').unwrap().0;
        let attachment_iv = envelope.sealed_attachment.as_deref().unwrap().split_once(':').unwrap().0;
        assert_ne!(body_iv, attachment_iv);

        let opened = open(&envelope, receiver.private_key(), sender.public_key()).unwrap();
        assert_eq!(opened.attachment.as_deref(), Some(image));
        assert!(opened.signature_valid);
    }

    #[test]
    fn test_fresh_key_and_iv_per_seal() {
        let sender = test_keypair(0);
        let receiver = test_keypair(1);
        let a = seal("same", None, sender.private_key(), receiver.public_key()).unwrap();
        let b = seal("same", None, sender.private_key(), receiver.public_key()).unwrap();

        assert_ne!(a.sealed_content, b.sealed_content);
        assert_ne!(a.sealed_key, b.sealed_key);
        // Signature covers plaintext only
        assert_eq!(a.signature, b.signature);
    }

    #[test]
    fn test_wrong_receiver_key_fails() {
        let sender = test_keypair(0);
        let receiver = test_keypair(1);
        let outsider = test_keypair(2);
        let envelope = seal("for receiver only", None, sender.private_key(), receiver.public_key()).unwrap();

        let result = open(&envelope, outsider.private_key(), sender.public_key());
        assert!(matches!(result, Err(CryptoError::Decryption(_))));
    }

    #[test]
    fn test_wrong_sender_key_reports_invalid_signature() {
        let sender = test_keypair(0);
        let receiver = test_keypair(1);
        let impostor = test_keypair(2);
        let envelope = seal("orders", None, sender.private_key(), receiver.public_key()).unwrap();

        let opened = open(&envelope, receiver.private_key(), impostor.public_key()).unwrap();
        assert_eq!(opened.plaintext, "orders");
        assert!(!opened.signature_valid);
    }

    #[test]
    fn test_tampered_content_detected() {
        let sender = test_keypair(0);
        let receiver = test_keypair(1);
        let mut envelope = seal(
            "Advance at dawn along the northern ridge",
            None,
            sender.private_key(),
            receiver.public_key(),
        )
        .unwrap();

        // Flip a nibble in the first ciphertext block; CBC garbles that block
        let (iv, ciphertext) = envelope.sealed_content.split_once(':').unwrap();
        let mut bytes = hex::decode(ciphertext).unwrap();
        bytes[0] ^= 0x0f;
        envelope.sealed_content = format!("{iv}:{}", hex::encode(bytes));

        match open(&envelope, receiver.private_key(), sender.public_key()) {
            Err(CryptoError::Decryption(_)) => {}
            Ok(opened) => assert!(!opened.signature_valid),
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_malformed_envelopes() {
        let sender = test_keypair(0);
        let receiver = test_keypair(1);
        let good = seal("x", None, sender.private_key(), receiver.public_key()).unwrap();

        let mut no_separator = good.clone();
        no_separator.sealed_content = "abcdef".to_string();
        assert!(matches!(
            open(&no_separator, receiver.private_key(), sender.public_key()),
            Err(CryptoError::MalformedEnvelope(_))
        ));

        let mut bad_key = good.clone();
        bad_key.sealed_key = "***".to_string();
        assert!(matches!(
            open(&bad_key, receiver.private_key(), sender.public_key()),
            Err(CryptoError::MalformedEnvelope(_))
        ));

        let mut missing_attachment = good;
        missing_attachment.has_attachment = true;
        assert!(matches!(
            open(&missing_attachment, receiver.private_key(), sender.public_key()),
            Err(CryptoError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_decrypt_skips_verification() {
        let sender = test_keypair(0);
        let receiver = test_keypair(1);
        let mut envelope = seal("status green", Some("map"), sender.private_key(), receiver.public_key()).unwrap();
        envelope.signature = "00".to_string();

        let payload = decrypt(&envelope, receiver.private_key()).unwrap();
        assert_eq!(payload.plaintext, "status green");
        assert_eq!(payload.attachment.as_deref(), Some("map"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn seal_then_open_reproduces_plaintext(message in "\\PC{0,300}") {
            let sender = test_keypair(0);
            let receiver = test_keypair(1);

            let envelope = seal(&message, None, sender.private_key(), receiver.public_key()).unwrap();
            let opened = open(&envelope, receiver.private_key(), sender.public_key()).unwrap();

            prop_assert_eq!(opened.plaintext, message);
            prop_assert!(opened.signature_valid);
        }
    }
}
