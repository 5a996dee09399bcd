// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Errors raised by key handling and the envelope cipher.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while generating keys, sealing, or opening text.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Keypair generation failed (RNG failure or unsupported modulus size).
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// A PEM-encoded key could not be parsed.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Sealing failed after the input was accepted.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// The ciphertext was malformed or was not produced for this keypair.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// Plaintext exceeds the documented envelope capacity.
    #[error("payload too large: {size} bytes exceeds maximum {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_too_large_reports_sizes() {
        let err = CryptoError::PayloadTooLarge { size: 10, max: 4 };
        assert_eq!(
            err.to_string(),
            "payload too large: 10 bytes exceeds maximum 4 bytes"
        );
    }
}
