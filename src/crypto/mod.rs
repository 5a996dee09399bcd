// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key custody primitives and the per-recipient envelope cipher.
//!
//! - [`keys`]: RSA keypair generation, PEM parsing, fingerprints
//! - [`envelope`]: hybrid RSA-OAEP / AES-256-GCM sealing of note text

pub mod envelope;
pub mod error;
pub mod keys;

pub use envelope::{decrypt_with, encrypt_for, MAX_PLAINTEXT_BYTES};
pub use error::{CryptoError, CryptoResult};
pub use keys::{
    generate_keypair, parse_private_key, parse_public_key, public_key_fingerprint,
    GeneratedKeypair, MIN_KEY_BITS,
};

/// Keypairs shared by tests; RSA generation is too slow to repeat per test.
#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::OnceLock;

    use super::{generate_keypair, GeneratedKeypair, MIN_KEY_BITS};

    const POOL_SIZE: usize = 2;

    static POOL: OnceLock<Vec<GeneratedKeypair>> = OnceLock::new();

    pub fn keypair(index: usize) -> &'static GeneratedKeypair {
        let pool = POOL.get_or_init(|| {
            (0..POOL_SIZE)
                .map(|_| generate_keypair(MIN_KEY_BITS).expect("test keypair"))
                .collect()
        });
        &pool[index % POOL_SIZE]
    }
}
