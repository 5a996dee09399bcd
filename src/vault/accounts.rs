// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account lifecycle: registration, federated provisioning, profiles,
//! verification and deletion.

use chrono::Utc;

use super::gate::resolve_caller;
use super::{audit, Vault};
use crate::auth::Session;
use crate::crypto::public_key_fingerprint;
use crate::error::{VaultError, VaultResult};
use crate::models::{AccountProfile, AccountRecord, ExternalIdentity, NewAccount};
use crate::storage::repository::normalize_email;
use crate::storage::{
    AccountRepository, AuditEvent, AuditEventType, AuditRepository, FriendRequestRepository,
    NoteRepository,
};

const MAX_USERNAME_CHARS: usize = 32;

fn validate_username(username: &str) -> VaultResult<String> {
    let username = username.trim();
    if username.is_empty() {
        return Err(VaultError::InvalidInput("username must not be empty".into()));
    }
    if username.chars().count() > MAX_USERNAME_CHARS {
        return Err(VaultError::InvalidInput(format!(
            "username exceeds {MAX_USERNAME_CHARS} characters"
        )));
    }
    if username.contains('@') || username.chars().any(char::is_whitespace) {
        return Err(VaultError::InvalidInput(
            "username may not contain '@' or whitespace".into(),
        ));
    }
    Ok(username.to_string())
}

fn validate_email(email: &str) -> VaultResult<String> {
    let email = normalize_email(email);
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(VaultError::InvalidInput(format!("'{email}' is not an email address"))),
    }
}

fn profile_of(record: &AccountRecord) -> VaultResult<AccountProfile> {
    let fingerprint = public_key_fingerprint(&record.public_key_pem)?;
    Ok(AccountProfile::from_record(record, fingerprint))
}

impl Vault {
    /// Register a new account and generate its keypair.
    ///
    /// # Errors
    /// - `InvalidInput` for a malformed username or email
    /// - `IdentifierTaken` if the username or email is already registered
    /// - `KeyGeneration` if the keypair cannot be generated; nothing is stored
    pub fn register_account(&self, new: NewAccount) -> VaultResult<AccountProfile> {
        let username = validate_username(&new.username)?;
        let email = validate_email(&new.email)?;
        let keypair = self.generate_account_keypair()?;

        self.write("register_account", None, |txn| {
            let accounts = AccountRepository::new(txn);
            if accounts.username_taken(&username)? {
                return Err(VaultError::IdentifierTaken(username.clone()));
            }
            if accounts.email_taken(&email)? {
                return Err(VaultError::IdentifierTaken(email.clone()));
            }

            let now = Utc::now();
            let record = AccountRecord {
                account_id: uuid::Uuid::new_v4().to_string(),
                username: username.clone(),
                email: email.clone(),
                public_key_pem: keypair.public_key_pem.clone(),
                verified: new.verified,
                role: new.role,
                friends: Default::default(),
                external_identity: None,
                created_at: now,
                updated_at: now,
            };
            accounts.create(&record, &keypair.private_key_pem)?;
            audit(
                txn,
                AuditEvent::new(AuditEventType::AccountCreated)
                    .with_account(&record.account_id)
                    .with_resource("account", &record.account_id)
                    .with_details(serde_json::json!({ "role": record.role.to_string() })),
            )?;

            tracing::info!(account_id = %record.account_id, username = %record.username, "Account registered");
            profile_of(&record)
        })
    }

    /// Find or create the account linked to an external identity.
    ///
    /// Idempotent: a known identity returns its account unchanged. New
    /// accounts always get a keypair and start unverified.
    pub fn provision_federated_account(
        &self,
        identity: ExternalIdentity,
        username: &str,
        email: &str,
    ) -> VaultResult<AccountProfile> {
        if identity.provider.trim().is_empty()
            || identity.subject.is_empty()
            || identity.provider.contains('|')
        {
            return Err(VaultError::InvalidInput("malformed external identity".into()));
        }

        let existing = self.read("provision_federated_account", None, |txn| {
            AccountRepository::new(txn)
                .find_by_external_identity(&identity)?
                .as_ref()
                .map(profile_of)
                .transpose()
        })?;
        if let Some(profile) = existing {
            return Ok(profile);
        }

        let username = validate_username(username)?;
        let email = validate_email(email)?;
        let keypair = self.generate_account_keypair()?;

        self.write("provision_federated_account", None, |txn| {
            let accounts = AccountRepository::new(txn);
            // Another call may have linked the identity meanwhile
            if let Some(record) = accounts.find_by_external_identity(&identity)? {
                return profile_of(&record);
            }
            if accounts.username_taken(&username)? {
                return Err(VaultError::IdentifierTaken(username.clone()));
            }
            if accounts.email_taken(&email)? {
                return Err(VaultError::IdentifierTaken(email.clone()));
            }

            let now = Utc::now();
            let record = AccountRecord {
                account_id: uuid::Uuid::new_v4().to_string(),
                username: username.clone(),
                email: email.clone(),
                public_key_pem: keypair.public_key_pem.clone(),
                verified: false,
                role: Default::default(),
                friends: Default::default(),
                external_identity: Some(identity.clone()),
                created_at: now,
                updated_at: now,
            };
            accounts.create(&record, &keypair.private_key_pem)?;
            audit(
                txn,
                AuditEvent::new(AuditEventType::AccountCreated)
                    .with_account(&record.account_id)
                    .with_resource("account", &record.account_id)
                    .with_details(serde_json::json!({ "provider": identity.provider })),
            )?;

            tracing::info!(
                account_id = %record.account_id,
                provider = %identity.provider,
                "Federated account provisioned"
            );
            profile_of(&record)
        })
    }

    /// Public profile of an account. Never includes key material beyond the
    /// public key.
    pub fn profile(&self, account_id: &str) -> VaultResult<AccountProfile> {
        self.read("profile", None, |txn| {
            let record = AccountRepository::new(txn)
                .get(account_id)?
                .ok_or_else(|| VaultError::AccountNotFound(account_id.to_string()))?;
            profile_of(&record)
        })
    }

    /// All accounts. Admin only.
    pub fn list_accounts(&self, session: &Session) -> VaultResult<Vec<AccountProfile>> {
        self.read("list_accounts", Some(&session.account_id), |txn| {
            resolve_caller(txn, session)?.require_admin()?;
            AccountRepository::new(txn)
                .list()?
                .iter()
                .map(profile_of)
                .collect()
        })
    }

    /// Set or clear the verified flag of an account. Admin only.
    pub fn set_verified(
        &self,
        session: &Session,
        account_id: &str,
        verified: bool,
    ) -> VaultResult<AccountProfile> {
        self.write("set_verified", Some(&session.account_id), |txn| {
            let caller = resolve_caller(txn, session)?;
            caller.require_admin()?;

            let accounts = AccountRepository::new(txn);
            let mut record = accounts
                .get(account_id)?
                .ok_or_else(|| VaultError::AccountNotFound(account_id.to_string()))?;
            record.verified = verified;
            record.updated_at = Utc::now();
            accounts.update(&record)?;

            audit(
                txn,
                AuditEvent::new(AuditEventType::AccountVerified)
                    .with_account(caller.id())
                    .with_resource("account", account_id)
                    .with_details(serde_json::json!({ "verified": verified })),
            )?;
            tracing::info!(admin_id = %caller.id(), account_id = %account_id, verified, "Verification changed");
            profile_of(&record)
        })
    }

    /// Delete the caller's account and everything that references it.
    ///
    /// Removes the account and its key, every note it owns (with their share
    /// entries), every share entry addressed to it, every friend edge that
    /// points to it and every friend request it took part in.
    pub fn delete_account(&self, session: &Session) -> VaultResult<()> {
        self.write("delete_account", Some(&session.account_id), |txn| {
            let caller = resolve_caller(txn, session)?;
            let account_id = caller.id().to_string();
            let accounts = AccountRepository::new(txn);
            let notes = NoteRepository::new(txn);
            let requests = FriendRequestRepository::new(txn);

            let owned = notes.list_owned(&account_id)?;
            for note in &owned {
                notes.delete(note)?;
            }

            let received = notes.list_shared_with(&account_id)?;
            for mut note in received {
                note.shared_with.retain(|entry| entry.user_id != account_id);
                note.touch();
                notes.save(&note)?;
            }

            for friend_id in &caller.record.friends {
                match accounts.get(friend_id)? {
                    Some(mut friend) => {
                        friend.friends.remove(&account_id);
                        friend.updated_at = Utc::now();
                        accounts.update(&friend)?;
                    }
                    None => tracing::warn!(
                        target: "notevault::integrity",
                        account_id = %account_id,
                        friend_id = %friend_id,
                        "Friend edge points to a missing account"
                    ),
                }
            }

            let friend_requests = requests.list_for(&account_id)?;
            for request in &friend_requests {
                requests.delete(request)?;
            }

            accounts.delete(&caller.record)?;
            audit(
                txn,
                AuditEvent::new(AuditEventType::AccountDeleted)
                    .with_account(&account_id)
                    .with_resource("account", &account_id)
                    .with_details(serde_json::json!({
                        "notes_deleted": owned.len(),
                        "friend_requests_deleted": friend_requests.len(),
                    })),
            )?;

            tracing::info!(account_id = %account_id, notes = owned.len(), "Account deleted");
            Ok(())
        })
    }

    /// Most recent audit events across all accounts. Admin only.
    pub fn audit_events(&self, session: &Session, limit: usize) -> VaultResult<Vec<AuditEvent>> {
        self.read("audit_events", Some(&session.account_id), |txn| {
            resolve_caller(txn, session)?.require_admin()?;
            Ok(AuditRepository::new(txn).recent(limit)?)
        })
    }

    /// Audit events triggered by the caller, newest first.
    pub fn audit_events_for(&self, session: &Session) -> VaultResult<Vec<AuditEvent>> {
        self.read("audit_events_for", Some(&session.account_id), |txn| {
            let caller = resolve_caller(txn, session)?;
            Ok(AuditRepository::new(txn).for_account(caller.id(), usize::MAX)?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_are_trimmed_and_checked() {
        assert_eq!(validate_username("  alice ").unwrap(), "alice");
        assert!(validate_username("").is_err());
        assert!(validate_username("a@b").is_err());
        assert!(validate_username("two words").is_err());
        assert!(validate_username(&"x".repeat(MAX_USERNAME_CHARS + 1)).is_err());
    }

    #[test]
    fn emails_are_normalised_and_checked() {
        assert_eq!(validate_email(" Bob@Example.org ").unwrap(), "bob@example.org");
        assert!(validate_email("bob").is_err());
        assert!(validate_email("@example.org").is_err());
        assert!(validate_email("bob@localhost").is_err());
    }
}
