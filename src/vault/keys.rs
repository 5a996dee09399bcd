// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key custody.
//!
//! Public keys are available for any account. A private key is only ever
//! loaded for the [`Caller`] of the running operation: there is no function
//! that takes an arbitrary account ID and returns its private key.

use rsa::{RsaPrivateKey, RsaPublicKey};

use super::gate::Caller;
use super::Vault;
use crate::crypto::{
    self, decrypt_with, encrypt_for, generate_keypair, CryptoError, CryptoResult,
    GeneratedKeypair,
};
use crate::error::{VaultError, VaultResult};
use crate::models::AccountRecord;
use crate::storage::{AccountRepository, TableReader};

/// The caller's private key, or why it cannot be used.
///
/// An unusable key degrades reads to `Undecryptable` rather than failing
/// them outright.
pub(crate) enum CallerKey {
    Usable(RsaPrivateKey),
    Unusable(String),
}

impl CallerKey {
    pub(crate) fn open(&self, sealed: &str) -> CryptoResult<String> {
        match self {
            CallerKey::Usable(key) => decrypt_with(sealed, key),
            CallerKey::Unusable(reason) => Err(CryptoError::DecryptionFailed(reason.clone())),
        }
    }
}

/// Load the caller's private key.
///
/// A missing key is an integrity violation; every account gets one at
/// creation.
pub(crate) fn load_caller_key<T: TableReader>(txn: &T, caller: &Caller) -> VaultResult<CallerKey> {
    let pem = AccountRepository::new(txn)
        .private_key_pem(caller.id())?
        .ok_or_else(|| {
            VaultError::InconsistentState(format!("account {} has no private key", caller.id()))
        })?;

    Ok(match crypto::parse_private_key(&pem) {
        Ok(key) => CallerKey::Usable(key),
        Err(err) => {
            tracing::warn!(account_id = %caller.id(), error = %err, "Stored private key is unusable");
            CallerKey::Unusable(err.to_string())
        }
    })
}

/// Lazily loaded caller key, so reads of plain notes never touch it.
pub(crate) struct KeySlot<'a, T> {
    txn: &'a T,
    caller: &'a Caller,
    key: Option<CallerKey>,
}

impl<'a, T: TableReader> KeySlot<'a, T> {
    pub(crate) fn new(txn: &'a T, caller: &'a Caller) -> Self {
        Self {
            txn,
            caller,
            key: None,
        }
    }

    pub(crate) fn get(&mut self) -> VaultResult<&CallerKey> {
        let key = match self.key.take() {
            Some(key) => key,
            None => load_caller_key(self.txn, self.caller)?,
        };
        Ok(self.key.insert(key))
    }
}

/// Parse the stored public key of an account.
pub(crate) fn public_key_of_record(record: &AccountRecord) -> VaultResult<RsaPublicKey> {
    Ok(crypto::parse_public_key(&record.public_key_pem)?)
}

/// Seal a title or content for one recipient key.
pub(crate) fn seal_for(key: &RsaPublicKey, text: &str) -> VaultResult<String> {
    Ok(encrypt_for(text, key)?)
}

impl Vault {
    /// PEM public key of an account, for anyone who needs to encrypt to it.
    pub fn public_key_of(&self, account_id: &str) -> VaultResult<String> {
        self.read("public_key_of", None, |txn| {
            AccountRepository::new(txn)
                .get(account_id)?
                .map(|record| record.public_key_pem)
                .ok_or_else(|| VaultError::AccountNotFound(account_id.to_string()))
        })
    }

    /// Generate a keypair for a new account. Failure aborts account creation.
    pub(crate) fn generate_account_keypair(&self) -> VaultResult<GeneratedKeypair> {
        generate_keypair(self.config.rsa_key_bits).map_err(|err| {
            tracing::error!(error = %err, "Keypair generation failed");
            VaultError::from(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::fixtures;

    #[test]
    fn unusable_key_fails_every_open() {
        let key = CallerKey::Unusable("corrupt".into());
        assert!(matches!(
            key.open("AAAA"),
            Err(CryptoError::DecryptionFailed(reason)) if reason == "corrupt"
        ));
    }

    #[test]
    fn usable_key_opens_its_envelopes() {
        let pair = fixtures::keypair(0);
        let public = crypto::parse_public_key(&pair.public_key_pem).unwrap();
        let private = crypto::parse_private_key(&pair.private_key_pem).unwrap();

        let sealed = seal_for(&public, "hello").unwrap();
        assert_eq!(CallerKey::Usable(private).open(&sealed).unwrap(), "hello");
    }
}
