// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account repository.
//!
//! ## Storage Layout
//!
//! ```text
//! accounts[account_id]                 AccountRecord (JSON)
//! account_keys[account_id]             private key (PKCS#8 PEM)
//! username_index[lowercase username]   account_id
//! email_index[normalised email]        account_id
//! external_identity_index[provider|subject] account_id
//! ```
//!
//! ## Security
//!
//! - Private keys are stored apart from the account record
//! - [`AccountRepository::private_key_pem`] is crate-private; the vault only
//!   calls it with the account ID of the authenticated caller

use unicode_normalization::UnicodeNormalization;

use crate::models::{AccountRecord, ExternalIdentity};

use super::super::database::{
    index_key, ACCOUNTS, ACCOUNT_KEYS, EMAIL_INDEX, EXTERNAL_IDENTITY_INDEX, USERNAME_INDEX,
};
use super::super::{StorageResult, TableReader, TableWriter};

/// Canonical form of an email address: NFKC, trimmed, lowercase.
pub fn normalize_email(email: &str) -> String {
    email.nfkc().collect::<String>().trim().to_lowercase()
}

/// Index key for a username. Usernames are unique case-insensitively.
pub fn username_key(username: &str) -> String {
    username.trim().to_lowercase()
}

fn identity_key(identity: &ExternalIdentity) -> String {
    index_key(&identity.provider.to_lowercase(), &identity.subject)
}

/// Repository for account records and their keys.
pub struct AccountRepository<'a, T> {
    txn: &'a T,
}

impl<'a, T: TableReader> AccountRepository<'a, T> {
    pub fn new(txn: &'a T) -> Self {
        Self { txn }
    }

    /// Get an account by ID.
    pub fn get(&self, account_id: &str) -> StorageResult<Option<AccountRecord>> {
        self.txn.get_json(ACCOUNTS, account_id)
    }

    pub fn find_by_username(&self, username: &str) -> StorageResult<Option<AccountRecord>> {
        match self.txn.get_text(USERNAME_INDEX, &username_key(username))? {
            Some(account_id) => self.get(&account_id),
            None => Ok(None),
        }
    }

    pub fn find_by_email(&self, email: &str) -> StorageResult<Option<AccountRecord>> {
        match self.txn.get_text(EMAIL_INDEX, &normalize_email(email))? {
            Some(account_id) => self.get(&account_id),
            None => Ok(None),
        }
    }

    /// Resolve a username or an email address.
    pub fn find_by_identifier(&self, identifier: &str) -> StorageResult<Option<AccountRecord>> {
        if let Some(account) = self.find_by_username(identifier)? {
            return Ok(Some(account));
        }
        self.find_by_email(identifier)
    }

    pub fn find_by_external_identity(
        &self,
        identity: &ExternalIdentity,
    ) -> StorageResult<Option<AccountRecord>> {
        match self
            .txn
            .get_text(EXTERNAL_IDENTITY_INDEX, &identity_key(identity))?
        {
            Some(account_id) => self.get(&account_id),
            None => Ok(None),
        }
    }

    pub fn username_taken(&self, username: &str) -> StorageResult<bool> {
        Ok(self
            .txn
            .get_text(USERNAME_INDEX, &username_key(username))?
            .is_some())
    }

    pub fn email_taken(&self, email: &str) -> StorageResult<bool> {
        Ok(self
            .txn
            .get_text(EMAIL_INDEX, &normalize_email(email))?
            .is_some())
    }

    /// List all accounts, ordered by ID.
    pub fn list(&self) -> StorageResult<Vec<AccountRecord>> {
        self.txn.scan_json(ACCOUNTS)
    }

    /// Load the private key PEM of an account.
    pub(crate) fn private_key_pem(&self, account_id: &str) -> StorageResult<Option<String>> {
        self.txn.get_text(ACCOUNT_KEYS, account_id)
    }

    /// Account IDs that have a stored private key.
    pub(crate) fn key_holders(&self) -> StorageResult<Vec<String>> {
        Ok(self
            .txn
            .scan_text(ACCOUNT_KEYS)?
            .into_iter()
            .map(|(account_id, _)| account_id)
            .collect())
    }
}

impl<'a, T: TableReader + TableWriter> AccountRepository<'a, T> {
    /// Store a new account with its private key and lookup indexes.
    ///
    /// Uniqueness is checked by the caller inside the same transaction.
    pub fn create(&self, record: &AccountRecord, private_key_pem: &str) -> StorageResult<()> {
        self.txn.put_json(ACCOUNTS, &record.account_id, record)?;
        self.txn
            .put_text(ACCOUNT_KEYS, &record.account_id, private_key_pem)?;
        self.txn.put_text(
            USERNAME_INDEX,
            &username_key(&record.username),
            &record.account_id,
        )?;
        self.txn.put_text(
            EMAIL_INDEX,
            &normalize_email(&record.email),
            &record.account_id,
        )?;
        if let Some(identity) = &record.external_identity {
            self.txn.put_text(
                EXTERNAL_IDENTITY_INDEX,
                &identity_key(identity),
                &record.account_id,
            )?;
        }
        Ok(())
    }

    /// Overwrite an existing account record. Indexes are left untouched.
    pub fn update(&self, record: &AccountRecord) -> StorageResult<()> {
        self.txn.put_json(ACCOUNTS, &record.account_id, record)
    }

    /// Remove an account, its private key and its lookup indexes.
    pub fn delete(&self, record: &AccountRecord) -> StorageResult<()> {
        self.txn.remove(ACCOUNTS, &record.account_id)?;
        self.txn.remove(ACCOUNT_KEYS, &record.account_id)?;
        self.txn
            .remove(USERNAME_INDEX, &username_key(&record.username))?;
        self.txn
            .remove(EMAIL_INDEX, &normalize_email(&record.email))?;
        if let Some(identity) = &record.external_identity {
            self.txn
                .remove(EXTERNAL_IDENTITY_INDEX, &identity_key(identity))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::storage::VaultDatabase;
    use chrono::Utc;

    fn setup() -> (VaultDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = VaultDatabase::open_in(dir.path()).unwrap();
        (db, dir)
    }

    fn record(id: &str, username: &str, email: &str) -> AccountRecord {
        AccountRecord {
            account_id: id.to_string(),
            username: username.to_string(),
            email: normalize_email(email),
            public_key_pem: "pub".to_string(),
            verified: false,
            role: Role::User,
            friends: Default::default(),
            external_identity: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn email_normalisation_folds_case_and_compat_forms() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
        // Fullwidth letters fold under NFKC
        assert_eq!(normalize_email("ＢＯＢ@example.com"), "bob@example.com");
    }

    #[test]
    fn create_and_lookup_by_every_identifier() {
        let (db, _dir) = setup();
        let mut alice = record("a1", "Alice", "alice@example.com");
        alice.external_identity = Some(ExternalIdentity {
            provider: "Google".into(),
            subject: "sub-1".into(),
        });

        let txn = db.begin_write().unwrap();
        AccountRepository::new(&txn).create(&alice, "secret-pem").unwrap();
        txn.commit().unwrap();

        let txn = db.begin_read().unwrap();
        let repo = AccountRepository::new(&txn);
        assert_eq!(repo.get("a1").unwrap().unwrap().username, "Alice");
        assert!(repo.find_by_username("alice").unwrap().is_some());
        assert!(repo.find_by_identifier("ALICE@example.com").unwrap().is_some());
        assert!(repo
            .find_by_external_identity(&ExternalIdentity {
                provider: "google".into(),
                subject: "sub-1".into(),
            })
            .unwrap()
            .is_some());
        assert!(repo.find_by_identifier("nobody").unwrap().is_none());
        assert_eq!(repo.private_key_pem("a1").unwrap().as_deref(), Some("secret-pem"));
        assert!(repo.username_taken(" ALICE ").unwrap());
    }

    #[test]
    fn stored_record_has_no_private_key() {
        let (db, _dir) = setup();
        let txn = db.begin_write().unwrap();
        AccountRepository::new(&txn)
            .create(&record("a1", "alice", "a@example.com"), "PRIVATE-MATERIAL")
            .unwrap();
        txn.commit().unwrap();

        let txn = db.begin_read().unwrap();
        let stored = AccountRepository::new(&txn).get("a1").unwrap().unwrap();
        let json = serde_json::to_string(&stored).unwrap();
        assert!(!json.contains("PRIVATE-MATERIAL"));
    }

    #[test]
    fn delete_removes_indexes_and_key() {
        let (db, _dir) = setup();
        let alice = record("a1", "alice", "a@example.com");

        let txn = db.begin_write().unwrap();
        AccountRepository::new(&txn).create(&alice, "pem").unwrap();
        txn.commit().unwrap();

        let txn = db.begin_write().unwrap();
        AccountRepository::new(&txn).delete(&alice).unwrap();
        txn.commit().unwrap();

        let txn = db.begin_read().unwrap();
        let repo = AccountRepository::new(&txn);
        assert!(repo.get("a1").unwrap().is_none());
        assert!(!repo.username_taken("alice").unwrap());
        assert!(!repo.email_taken("a@example.com").unwrap());
        assert!(repo.private_key_pem("a1").unwrap().is_none());
        assert!(repo.key_holders().unwrap().is_empty());
    }
}
