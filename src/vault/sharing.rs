// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-recipient sharing.
//!
//! Sharing decrypts the owner's canonical copy and seals title and content
//! separately for the recipient's public key. Each entry gets fresh envelope
//! keys, so no two entries (and no entry and the canonical copy) share a
//! ciphertext.
//!
//! The check-then-append runs inside one write transaction, so concurrent
//! shares of the same note with the same target produce exactly one entry.

use chrono::Utc;

use super::friends::are_friends;
use super::gate::{resolve_caller, Caller};
use super::keys::{public_key_of_record, seal_for, KeySlot};
use super::notes::canonical_plaintext;
use super::{audit, Vault};
use crate::auth::Session;
use crate::error::{VaultError, VaultResult};
use crate::models::{Note, Permission, ShareEntry, ShareSummary};
use crate::storage::{
    AccountRepository, AuditEvent, AuditEventType, NoteRepository, OwnershipEnforcer,
    TableReader,
};

/// Load a note for an owner-only sharing operation.
///
/// Checks run in order: note exists, caller owns it, caller is verified.
fn load_owned_note<T: TableReader>(txn: &T, caller: &Caller, note_id: &str) -> VaultResult<Note> {
    let note = NoteRepository::new(txn)
        .get(note_id)?
        .ok_or_else(|| VaultError::NoteNotFound(note_id.to_string()))?;
    note.verify_ownership(caller.id())?;
    caller.require_verified()?;
    Ok(note)
}

impl Vault {
    /// Share a note with a friend, identified by username or email.
    ///
    /// # Errors
    /// - `TargetNotFound` if no account matches `target_identifier`
    /// - `NotOwner` / `VerificationRequired` for the caller
    /// - `NotFriends` unless caller and target are friends
    /// - `AlreadyShared` if the target already has an entry
    /// - `DecryptionFailed` if the owner's canonical copy cannot be opened
    pub fn share(
        &self,
        session: &Session,
        note_id: &str,
        target_identifier: &str,
        permission: Permission,
    ) -> VaultResult<ShareSummary> {
        self.write("share", Some(&session.account_id), |txn| {
            let caller = resolve_caller(txn, session)?;
            let target = AccountRepository::new(txn)
                .find_by_identifier(target_identifier)?
                .ok_or_else(|| VaultError::TargetNotFound(target_identifier.to_string()))?;

            let notes = NoteRepository::new(txn);
            let mut note = load_owned_note(txn, &caller, note_id)?;
            if note.is_trashed() {
                return Err(VaultError::InvalidInput(format!(
                    "note {note_id} is in the trash"
                )));
            }
            if target.account_id == caller.id() {
                return Err(VaultError::InvalidInput(
                    "a note cannot be shared with its owner".into(),
                ));
            }
            if !are_friends(txn, caller.id(), &target.account_id)? {
                return Err(VaultError::NotFriends(target.username.clone()));
            }
            if note.share_for(&target.account_id).is_some() {
                return Err(VaultError::AlreadyShared {
                    note_id: note_id.to_string(),
                    user_id: target.account_id.clone(),
                });
            }

            let mut key = KeySlot::new(txn, &caller);
            let (title, content) = canonical_plaintext(&note, &mut key)?;
            let target_key = public_key_of_record(&target)?;
            let entry = ShareEntry {
                user_id: target.account_id.clone(),
                permission,
                encrypted_title: seal_for(&target_key, &title)?,
                encrypted_content: seal_for(&target_key, &content)?,
                shared_at: Utc::now(),
            };
            let summary = ShareSummary {
                user_id: target.account_id.clone(),
                username: target.username.clone(),
                permission,
                shared_at: entry.shared_at,
            };

            note.shared_with.push(entry);
            note.touch();
            notes.save(&note)?;

            audit(
                txn,
                AuditEvent::new(AuditEventType::NoteShared)
                    .with_account(caller.id())
                    .with_resource("note", note_id)
                    .with_details(serde_json::json!({
                        "recipient_id": target.account_id,
                        "permission": permission,
                    })),
            )?;
            tracing::info!(
                note_id = %note_id,
                owner_id = %caller.id(),
                recipient_id = %target.account_id,
                permission = %permission,
                "Note shared"
            );
            Ok(summary)
        })
    }

    /// Remove a recipient's entry entirely.
    pub fn unshare(&self, session: &Session, note_id: &str, target_id: &str) -> VaultResult<()> {
        self.write("unshare", Some(&session.account_id), |txn| {
            let caller = resolve_caller(txn, session)?;
            let mut note = load_owned_note(txn, &caller, note_id)?;

            let before = note.shared_with.len();
            note.shared_with.retain(|entry| entry.user_id != target_id);
            if note.shared_with.len() == before {
                return Err(VaultError::EntryNotFound {
                    note_id: note_id.to_string(),
                    user_id: target_id.to_string(),
                });
            }
            note.touch();
            NoteRepository::new(txn).save(&note)?;

            audit(
                txn,
                AuditEvent::new(AuditEventType::NoteUnshared)
                    .with_account(caller.id())
                    .with_resource("note", note_id)
                    .with_details(serde_json::json!({ "recipient_id": target_id })),
            )?;
            tracing::info!(note_id = %note_id, owner_id = %caller.id(), recipient_id = %target_id, "Note unshared");
            Ok(())
        })
    }

    /// Change the permission of an existing entry.
    pub fn update_permission(
        &self,
        session: &Session,
        note_id: &str,
        target_id: &str,
        permission: Permission,
    ) -> VaultResult<ShareSummary> {
        self.write("update_permission", Some(&session.account_id), |txn| {
            let caller = resolve_caller(txn, session)?;
            let mut note = load_owned_note(txn, &caller, note_id)?;

            let entry = note
                .shared_with
                .iter_mut()
                .find(|entry| entry.user_id == target_id)
                .ok_or_else(|| VaultError::EntryNotFound {
                    note_id: note_id.to_string(),
                    user_id: target_id.to_string(),
                })?;
            let previous = entry.permission;
            entry.permission = permission;
            let shared_at = entry.shared_at;

            let username = AccountRepository::new(txn)
                .get(target_id)?
                .map(|record| record.username)
                .ok_or_else(|| {
                    VaultError::InconsistentState(format!(
                        "note {note_id} is shared with missing account {target_id}"
                    ))
                })?;

            note.touch();
            NoteRepository::new(txn).save(&note)?;

            audit(
                txn,
                AuditEvent::new(AuditEventType::SharePermissionChanged)
                    .with_account(caller.id())
                    .with_resource("note", note_id)
                    .with_details(serde_json::json!({
                        "recipient_id": target_id,
                        "from": previous,
                        "to": permission,
                    })),
            )?;
            tracing::info!(
                note_id = %note_id,
                recipient_id = %target_id,
                from = %previous,
                to = %permission,
                "Share permission changed"
            );
            Ok(ShareSummary {
                user_id: target_id.to_string(),
                username,
                permission,
                shared_at,
            })
        })
    }

    /// Recipients of a note, in sharing order. Owner only.
    pub fn shares_of(&self, session: &Session, note_id: &str) -> VaultResult<Vec<ShareSummary>> {
        self.read("shares_of", Some(&session.account_id), |txn| {
            let caller = resolve_caller(txn, session)?;
            let note = NoteRepository::new(txn)
                .get(note_id)?
                .ok_or_else(|| VaultError::NoteNotFound(note_id.to_string()))?;
            note.verify_ownership(caller.id())?;

            let accounts = AccountRepository::new(txn);
            let mut shares = Vec::with_capacity(note.shared_with.len());
            for entry in &note.shared_with {
                let recipient = accounts.get(&entry.user_id)?.ok_or_else(|| {
                    VaultError::InconsistentState(format!(
                        "note {note_id} is shared with missing account {}",
                        entry.user_id
                    ))
                })?;
                shares.push(ShareSummary {
                    user_id: entry.user_id.clone(),
                    username: recipient.username,
                    permission: entry.permission,
                    shared_at: entry.shared_at,
                });
            }
            Ok(shares)
        })
    }
}
