// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Hybrid envelope: RSA-OAEP(SHA-256) wraps a one-time AES-256-GCM key.
//!
//! ## Wire format
//!
//! The sealed text is standard padded base64 over:
//!
//! ```text
//! version (1) | wrapped_len (u16 BE) | wrapped_key | nonce (12) | ciphertext+tag
//! ```
//!
//! Everything before the ciphertext is bound as AEAD associated data, so a
//! swapped wrapped key or nonce fails authentication rather than decrypting
//! to garbage.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, Payload},
    Aes256Gcm, Key, Nonce,
};
use base64ct::{Base64, Encoding};
use rand::rngs::OsRng;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use super::{CryptoError, CryptoResult};

/// Largest plaintext accepted by [`encrypt_for`], in bytes.
pub const MAX_PLAINTEXT_BYTES: usize = 1024 * 1024;

const ENVELOPE_VERSION: u8 = 1;
const NONCE_LEN: usize = 12;
const AES_KEY_LEN: usize = 32;
const LEN_PREFIX: usize = 2;

/// Seal `plaintext` so only the holder of the matching private key can read it.
///
/// Two calls with identical input produce different output.
pub fn encrypt_for(plaintext: &str, recipient: &RsaPublicKey) -> CryptoResult<String> {
    let size = plaintext.len();
    if size > MAX_PLAINTEXT_BYTES {
        return Err(CryptoError::PayloadTooLarge {
            size,
            max: MAX_PLAINTEXT_BYTES,
        });
    }

    let content_key = Aes256Gcm::generate_key(&mut OsRng);
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let wrapped_key = recipient
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), content_key.as_slice())
        .map_err(|e| CryptoError::Encryption(format!("key wrap failed: {e}")))?;
    let wrapped_len = u16::try_from(wrapped_key.len())
        .map_err(|_| CryptoError::Encryption("wrapped key exceeds header capacity".into()))?;

    let mut sealed =
        Vec::with_capacity(1 + LEN_PREFIX + wrapped_key.len() + NONCE_LEN + size + 16);
    sealed.push(ENVELOPE_VERSION);
    sealed.extend_from_slice(&wrapped_len.to_be_bytes());
    sealed.extend_from_slice(&wrapped_key);
    sealed.extend_from_slice(nonce.as_slice());

    let cipher = Aes256Gcm::new(&content_key);
    let ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext.as_bytes(),
                aad: &sealed,
            },
        )
        .map_err(|_| CryptoError::Encryption("AES-GCM seal failed".into()))?;
    sealed.extend_from_slice(&ciphertext);

    Ok(Base64::encode_string(&sealed))
}

/// Open a value produced by [`encrypt_for`] with the matching private key.
///
/// Every failure mode (bad base64, unknown version, truncated header, wrong
/// key, tampered bytes, non UTF-8 output) collapses to
/// `CryptoError::DecryptionFailed`.
pub fn decrypt_with(sealed: &str, key: &RsaPrivateKey) -> CryptoResult<String> {
    let bytes = Base64::decode_vec(sealed.trim())
        .map_err(|_| CryptoError::DecryptionFailed("malformed base64".into()))?;

    let (&version, rest) = bytes
        .split_first()
        .ok_or_else(|| CryptoError::DecryptionFailed("empty envelope".into()))?;
    if version != ENVELOPE_VERSION {
        return Err(CryptoError::DecryptionFailed(format!(
            "unsupported envelope version {version}"
        )));
    }
    if rest.len() < LEN_PREFIX {
        return Err(CryptoError::DecryptionFailed("truncated header".into()));
    }
    let wrapped_len = u16::from_be_bytes([rest[0], rest[1]]) as usize;

    let header_len = 1 + LEN_PREFIX + wrapped_len + NONCE_LEN;
    if bytes.len() < header_len {
        return Err(CryptoError::DecryptionFailed("truncated header".into()));
    }
    let (header, ciphertext) = bytes.split_at(header_len);
    let wrapped_key = &header[1 + LEN_PREFIX..1 + LEN_PREFIX + wrapped_len];
    let nonce_bytes = &header[1 + LEN_PREFIX + wrapped_len..];

    let content_key = key
        .decrypt(Oaep::new::<Sha256>(), wrapped_key)
        .map_err(|_| CryptoError::DecryptionFailed("key unwrap failed".into()))?;
    if content_key.len() != AES_KEY_LEN {
        return Err(CryptoError::DecryptionFailed(
            "unwrapped key has wrong length".into(),
        ));
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&content_key));
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad: header,
            },
        )
        .map_err(|_| CryptoError::DecryptionFailed("authentication failed".into()))?;

    String::from_utf8(plaintext)
        .map_err(|_| CryptoError::DecryptionFailed("plaintext is not UTF-8".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{fixtures, parse_private_key, parse_public_key};

    fn keys(index: usize) -> (RsaPublicKey, RsaPrivateKey) {
        let pair = fixtures::keypair(index);
        (
            parse_public_key(&pair.public_key_pem).unwrap(),
            parse_private_key(&pair.private_key_pem).unwrap(),
        )
    }

    #[test]
    fn seal_and_open() {
        let (public, private) = keys(0);
        let sealed = encrypt_for("groceries: eggs, milk", &public).unwrap();
        assert_eq!(decrypt_with(&sealed, &private).unwrap(), "groceries: eggs, milk");
    }

    #[test]
    fn empty_and_multibyte_text_survive() {
        let (public, private) = keys(0);
        for text in ["", "naïve café ✓ 日本語"] {
            let sealed = encrypt_for(text, &public).unwrap();
            assert_eq!(decrypt_with(&sealed, &private).unwrap(), text);
        }
    }

    #[test]
    fn text_beyond_single_rsa_block_is_supported() {
        let (public, private) = keys(0);
        let long = "x".repeat(64 * 1024);
        let sealed = encrypt_for(&long, &public).unwrap();
        assert_eq!(decrypt_with(&sealed, &private).unwrap(), long);
    }

    #[test]
    fn sealing_is_randomized() {
        let (public, _) = keys(0);
        let a = encrypt_for("same", &public).unwrap();
        let b = encrypt_for("same", &public).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails() {
        let (public, _) = keys(0);
        let (_, other_private) = keys(1);
        let sealed = encrypt_for("secret", &public).unwrap();
        assert!(matches!(
            decrypt_with(&sealed, &other_private),
            Err(CryptoError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn oversized_plaintext_is_rejected() {
        let (public, _) = keys(0);
        let big = "a".repeat(MAX_PLAINTEXT_BYTES + 1);
        assert!(matches!(
            encrypt_for(&big, &public),
            Err(CryptoError::PayloadTooLarge { size, max })
                if size == MAX_PLAINTEXT_BYTES + 1 && max == MAX_PLAINTEXT_BYTES
        ));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let (public, private) = keys(0);
        let sealed = encrypt_for("do not touch", &public).unwrap();
        let mut bytes = Base64::decode_vec(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = Base64::encode_string(&bytes);

        assert!(matches!(
            decrypt_with(&tampered, &private),
            Err(CryptoError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn malformed_input_fails() {
        let (_, private) = keys(0);
        for input in ["", "!!!not base64!!!", "AQ==", "AgAA"] {
            assert!(
                matches!(
                    decrypt_with(input, &private),
                    Err(CryptoError::DecryptionFailed(_))
                ),
                "input {input:?} should fail"
            );
        }
    }
}
