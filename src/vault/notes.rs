// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Note lifecycle and reads.
//!
//! The owner reads the canonical copy, decrypting it with their own key when
//! the note is encrypted. A recipient reads only their own share entry. A
//! copy that cannot be opened degrades to [`NoteBody::Undecryptable`] so one
//! bad note never breaks a listing.

use std::collections::BTreeSet;

use chrono::Utc;

use super::gate::{check_creation, resolve_caller, Caller};
use super::keys::{public_key_of_record, seal_for, KeySlot};
use super::{audit, Vault};
use crate::auth::Session;
use crate::error::{VaultError, VaultResult};
use crate::models::{NewNote, Note, NoteAccess, NoteBody, NoteUpdate, NoteView, ShareEntry};
use crate::storage::{
    AccountRepository, AuditEvent, AuditEventType, NoteRepository, OwnershipEnforcer,
    TableReader,
};

// =============================================================================
// Validation
// =============================================================================

fn validate_title(title: &str, max_chars: usize) -> VaultResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(VaultError::InvalidInput("title must not be empty".into()));
    }
    if title.chars().count() > max_chars {
        return Err(VaultError::InvalidInput(format!(
            "title exceeds {max_chars} characters"
        )));
    }
    Ok(title.to_string())
}

fn validate_content(content: &str, max_bytes: usize) -> VaultResult<()> {
    if content.len() > max_bytes {
        return Err(VaultError::PayloadTooLarge {
            size: content.len(),
            max: max_bytes,
        });
    }
    Ok(())
}

/// Trim, drop empties, dedupe; first occurrence wins.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    tags.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty() && seen.insert(tag.clone()))
        .collect()
}

// =============================================================================
// Opening copies
// =============================================================================

/// Decrypt a sealed title/content pair with the caller's key.
fn open_copy<T: TableReader>(
    key: &mut KeySlot<'_, T>,
    title: &str,
    content: &str,
) -> VaultResult<(String, String)> {
    let key = key.get()?;
    Ok((key.open(title)?, key.open(content)?))
}

fn sealed_body<T: TableReader>(
    key: &mut KeySlot<'_, T>,
    note_id: &str,
    title: &str,
    content: &str,
) -> VaultResult<NoteBody> {
    match open_copy(key, title, content) {
        Ok((title, content)) => Ok(NoteBody::Readable { title, content }),
        Err(VaultError::DecryptionFailed(reason)) => {
            tracing::warn!(note_id = %note_id, reason = %reason, "Note copy is undecryptable");
            Ok(NoteBody::Undecryptable)
        }
        Err(err) => Err(err),
    }
}

/// Body of the canonical copy, as the owner sees it.
pub(crate) fn owner_body<T: TableReader>(
    note: &Note,
    key: &mut KeySlot<'_, T>,
) -> VaultResult<NoteBody> {
    if !note.encrypted {
        return Ok(NoteBody::Readable {
            title: note.title.clone(),
            content: note.content.clone(),
        });
    }
    sealed_body(key, &note.note_id, &note.title, &note.content)
}

/// Body of a recipient's share entry.
pub(crate) fn recipient_body<T: TableReader>(
    note: &Note,
    entry: &ShareEntry,
    key: &mut KeySlot<'_, T>,
) -> VaultResult<NoteBody> {
    sealed_body(key, &note.note_id, &entry.encrypted_title, &entry.encrypted_content)
}

/// The owner's plaintext title and content. Decryption failures propagate.
pub(crate) fn canonical_plaintext<T: TableReader>(
    note: &Note,
    key: &mut KeySlot<'_, T>,
) -> VaultResult<(String, String)> {
    if note.encrypted {
        open_copy(key, &note.title, &note.content)
    } else {
        Ok((note.title.clone(), note.content.clone()))
    }
}

/// Seal new text into the canonical copy and every share entry.
///
/// Only public keys are needed: the owner's when the note is encrypted, and
/// each recipient's for their entry.
fn reseal<T: TableReader>(txn: &T, note: &mut Note, title: &str, content: &str) -> VaultResult<()> {
    let accounts = AccountRepository::new(txn);
    let note_id = note.note_id.clone();

    if note.encrypted {
        let owner = accounts.get(&note.owner_id)?.ok_or_else(|| {
            VaultError::InconsistentState(format!(
                "note {note_id} has a missing owner {}",
                note.owner_id
            ))
        })?;
        let key = public_key_of_record(&owner)?;
        note.title = seal_for(&key, title)?;
        note.content = seal_for(&key, content)?;
    } else {
        note.title = title.to_string();
        note.content = content.to_string();
    }

    for entry in note.shared_with.iter_mut() {
        let recipient = accounts.get(&entry.user_id)?.ok_or_else(|| {
            VaultError::InconsistentState(format!(
                "note {note_id} is shared with missing account {}",
                entry.user_id
            ))
        })?;
        let key = public_key_of_record(&recipient)?;
        entry.encrypted_title = seal_for(&key, title)?;
        entry.encrypted_content = seal_for(&key, content)?;
    }
    Ok(())
}

// =============================================================================
// Reads
// =============================================================================

fn view_as_owner<T: TableReader>(txn: &T, caller: &Caller, note: &Note) -> VaultResult<NoteView> {
    note.verify_ownership(caller.id())?;
    let mut key = KeySlot::new(txn, caller);
    let body = owner_body(note, &mut key)?;
    Ok(NoteView::from_note(note, NoteAccess::Owner, body))
}

fn view_as_recipient<T: TableReader>(
    txn: &T,
    caller: &Caller,
    note: &Note,
) -> VaultResult<NoteView> {
    let entry = match note.share_for(caller.id()) {
        Some(entry) if !note.is_trashed() => entry,
        _ => return Err(VaultError::NoAccess(note.note_id.clone())),
    };
    let mut key = KeySlot::new(txn, caller);
    let body = recipient_body(note, entry, &mut key)?;
    Ok(NoteView::from_note(
        note,
        NoteAccess::Shared {
            permission: entry.permission,
        },
        body,
    ))
}

/// Listing order: pinned first, then most recently updated.
fn sort_views(views: &mut [NoteView]) {
    views.sort_by(|a, b| {
        b.pinned
            .cmp(&a.pinned)
            .then_with(|| b.updated_at.cmp(&a.updated_at))
            .then_with(|| a.note_id.cmp(&b.note_id))
    });
}

impl Vault {
    /// Create a note owned by the caller.
    ///
    /// Subject to the verification gate: an unverified caller may only
    /// create plain notes, up to the configured limit.
    pub fn create_note(&self, session: &Session, new: NewNote) -> VaultResult<NoteView> {
        let title = validate_title(&new.title, self.config.max_title_chars)?;
        validate_content(&new.content, self.config.max_content_bytes)?;
        let tags = normalize_tags(new.tags);
        let content = new.content;

        self.write("create_note", Some(&session.account_id), |txn| {
            let caller = resolve_caller(txn, session)?;
            check_creation(txn, &caller, new.format, self.config.unverified_note_limit)?;

            let (stored_title, stored_content) = if new.encrypted {
                let key = public_key_of_record(&caller.record)?;
                (seal_for(&key, &title)?, seal_for(&key, &content)?)
            } else {
                (title.clone(), content.clone())
            };

            let now = Utc::now();
            let note = Note {
                note_id: uuid::Uuid::new_v4().to_string(),
                owner_id: caller.id().to_string(),
                title: stored_title,
                content: stored_content,
                format: new.format,
                encrypted: new.encrypted,
                shared_with: Vec::new(),
                tags,
                pinned: new.pinned,
                version: 1,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            };
            NoteRepository::new(txn).create(&note)?;
            audit(
                txn,
                AuditEvent::new(AuditEventType::NoteCreated)
                    .with_account(caller.id())
                    .with_resource("note", &note.note_id)
                    .with_details(serde_json::json!({
                        "format": note.format,
                        "encrypted": note.encrypted,
                    })),
            )?;

            tracing::info!(
                note_id = %note.note_id,
                owner_id = %note.owner_id,
                format = %note.format,
                encrypted = note.encrypted,
                "Note created"
            );
            Ok(NoteView::from_note(
                &note,
                NoteAccess::Owner,
                NoteBody::Readable { title, content },
            ))
        })
    }

    /// Update a note as its owner or as an editing recipient.
    ///
    /// Recipients with `editor` or `admin` permission may change the title
    /// and content; every other field is owner-only. A text change re-seals
    /// the canonical copy and every share entry.
    pub fn update_note(
        &self,
        session: &Session,
        note_id: &str,
        update: NoteUpdate,
    ) -> VaultResult<NoteView> {
        let new_title = update
            .title
            .as_deref()
            .map(|title| validate_title(title, self.config.max_title_chars))
            .transpose()?;
        if let Some(content) = &update.content {
            validate_content(content, self.config.max_content_bytes)?;
        }

        self.write("update_note", Some(&session.account_id), |txn| {
            let caller = resolve_caller(txn, session)?;
            let notes = NoteRepository::new(txn);
            let mut note = notes
                .get(note_id)?
                .ok_or_else(|| VaultError::NoteNotFound(note_id.to_string()))?;

            let access = if note.owner_id == caller.id() {
                NoteAccess::Owner
            } else {
                let entry = match note.share_for(caller.id()) {
                    Some(entry) if !note.is_trashed() => entry,
                    _ => return Err(VaultError::NoAccess(note_id.to_string())),
                };
                if update.touches_owner_fields() {
                    return Err(VaultError::NotOwner(note_id.to_string()));
                }
                if !entry.permission.can_edit() {
                    return Err(VaultError::InsufficientPermission(entry.permission));
                }
                NoteAccess::Shared {
                    permission: entry.permission,
                }
            };

            if note.is_trashed() {
                return Err(VaultError::InvalidInput(format!(
                    "note {note_id} is in the trash"
                )));
            }
            if let Some(expected) = update.expected_version {
                if expected != note.version {
                    return Err(VaultError::VersionConflict {
                        expected,
                        actual: note.version,
                    });
                }
            }
            caller.check_format(update.format.unwrap_or(note.format))?;

            let mut key = KeySlot::new(txn, &caller);
            let text = if new_title.is_some() || update.content.is_some() {
                let (current_title, current_content) = match access {
                    NoteAccess::Owner => canonical_plaintext(&note, &mut key)?,
                    NoteAccess::Shared { .. } => {
                        let entry = note.share_for(caller.id()).ok_or_else(|| {
                            VaultError::NoAccess(note_id.to_string())
                        })?;
                        open_copy(&mut key, &entry.encrypted_title, &entry.encrypted_content)?
                    }
                };
                let title = new_title.clone().unwrap_or(current_title);
                let content = update.content.clone().unwrap_or(current_content);
                reseal(txn, &mut note, &title, &content)?;
                Some((title, content))
            } else {
                None
            };

            if let Some(format) = update.format {
                note.format = format;
            }
            if let Some(tags) = update.tags.clone() {
                note.tags = normalize_tags(tags);
            }
            if let Some(pinned) = update.pinned {
                note.pinned = pinned;
            }
            note.touch();
            notes.save(&note)?;

            let editor = match access {
                NoteAccess::Owner => "owner",
                NoteAccess::Shared { .. } => "recipient",
            };
            audit(
                txn,
                AuditEvent::new(AuditEventType::NoteUpdated)
                    .with_account(caller.id())
                    .with_resource("note", note_id)
                    .with_details(serde_json::json!({
                        "version": note.version,
                        "text_changed": text.is_some(),
                        "editor": editor,
                    })),
            )?;
            tracing::info!(
                note_id = %note_id,
                account_id = %caller.id(),
                version = note.version,
                recipients = note.shared_with.len(),
                "Note updated"
            );

            let body = match text {
                Some((title, content)) => NoteBody::Readable { title, content },
                None => match access {
                    NoteAccess::Owner => owner_body(&note, &mut key)?,
                    NoteAccess::Shared { .. } => {
                        let entry = note.share_for(caller.id()).ok_or_else(|| {
                            VaultError::NoAccess(note_id.to_string())
                        })?;
                        recipient_body(&note, entry, &mut key)?
                    }
                },
            };
            Ok(NoteView::from_note(&note, access, body))
        })
    }

    /// Move a note to the trash. Owner only; trashing twice is a no-op.
    pub fn trash_note(&self, session: &Session, note_id: &str) -> VaultResult<()> {
        self.set_trashed(session, note_id, true)
    }

    /// Take a note out of the trash. Owner only; restoring a live note is a
    /// no-op.
    pub fn restore_note(&self, session: &Session, note_id: &str) -> VaultResult<()> {
        self.set_trashed(session, note_id, false)
    }

    fn set_trashed(&self, session: &Session, note_id: &str, trashed: bool) -> VaultResult<()> {
        let operation = if trashed { "trash_note" } else { "restore_note" };
        self.write(operation, Some(&session.account_id), |txn| {
            let caller = resolve_caller(txn, session)?;
            let notes = NoteRepository::new(txn);
            let mut note = notes
                .get(note_id)?
                .ok_or_else(|| VaultError::NoteNotFound(note_id.to_string()))?;
            note.verify_ownership(caller.id())?;

            if note.is_trashed() == trashed {
                return Ok(());
            }
            note.deleted_at = trashed.then(Utc::now);
            note.touch();
            notes.save(&note)?;

            let event_type = if trashed {
                AuditEventType::NoteTrashed
            } else {
                AuditEventType::NoteRestored
            };
            audit(
                txn,
                AuditEvent::new(event_type)
                    .with_account(caller.id())
                    .with_resource("note", note_id),
            )?;
            tracing::info!(note_id = %note_id, owner_id = %caller.id(), trashed, "Note trash state changed");
            Ok(())
        })
    }

    /// The caller's trashed notes, most recently trashed first.
    pub fn list_trash(&self, session: &Session) -> VaultResult<Vec<NoteView>> {
        self.read("list_trash", Some(&session.account_id), |txn| {
            let caller = resolve_caller(txn, session)?;
            let mut key = KeySlot::new(txn, &caller);

            let mut trashed: Vec<Note> = NoteRepository::new(txn)
                .list_owned(caller.id())?
                .into_iter()
                .filter(Note::is_trashed)
                .collect();
            trashed.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));

            let mut views = Vec::with_capacity(trashed.len());
            for note in &trashed {
                let body = owner_body(note, &mut key)?;
                views.push(NoteView::from_note(note, NoteAccess::Owner, body));
            }
            Ok(views)
        })
    }

    /// Permanently delete a trashed note and all its share entries.
    pub fn purge_note(&self, session: &Session, note_id: &str) -> VaultResult<()> {
        self.write("purge_note", Some(&session.account_id), |txn| {
            let caller = resolve_caller(txn, session)?;
            let notes = NoteRepository::new(txn);
            let note = notes
                .get(note_id)?
                .ok_or_else(|| VaultError::NoteNotFound(note_id.to_string()))?;
            note.verify_ownership(caller.id())?;
            if !note.is_trashed() {
                return Err(VaultError::InvalidInput(format!(
                    "note {note_id} must be in the trash before it is purged"
                )));
            }

            notes.delete(&note)?;
            audit(
                txn,
                AuditEvent::new(AuditEventType::NotePurged)
                    .with_account(caller.id())
                    .with_resource("note", note_id)
                    .with_details(serde_json::json!({ "recipients": note.shared_with.len() })),
            )?;
            tracing::info!(note_id = %note_id, owner_id = %caller.id(), "Note purged");
            Ok(())
        })
    }

    /// The caller's live notes plus live notes shared with them.
    ///
    /// Each item degrades to `Undecryptable` on its own.
    pub fn list_notes(&self, session: &Session) -> VaultResult<Vec<NoteView>> {
        self.read("list_notes", Some(&session.account_id), |txn| {
            let caller = resolve_caller(txn, session)?;
            let notes = NoteRepository::new(txn);
            let mut key = KeySlot::new(txn, &caller);
            let mut views = Vec::new();

            for note in notes.list_owned(caller.id())? {
                if note.is_trashed() {
                    continue;
                }
                let body = owner_body(&note, &mut key)?;
                views.push(NoteView::from_note(&note, NoteAccess::Owner, body));
            }

            for note in notes.list_shared_with(caller.id())? {
                if note.is_trashed() {
                    continue;
                }
                let Some(entry) = note.share_for(caller.id()) else {
                    tracing::warn!(
                        target: "notevault::integrity",
                        note_id = %note.note_id,
                        account_id = %caller.id(),
                        "Recipient index entry without a share entry"
                    );
                    continue;
                };
                let body = recipient_body(&note, entry, &mut key)?;
                let access = NoteAccess::Shared {
                    permission: entry.permission,
                };
                views.push(NoteView::from_note(&note, access, body));
            }

            sort_views(&mut views);
            Ok(views)
        })
    }

    /// Read a note as its owner or as a recipient, whichever the caller is.
    pub fn read_note(&self, session: &Session, note_id: &str) -> VaultResult<NoteView> {
        self.read("read_note", Some(&session.account_id), |txn| {
            let caller = resolve_caller(txn, session)?;
            let note = NoteRepository::new(txn)
                .get(note_id)?
                .ok_or_else(|| VaultError::NoteNotFound(note_id.to_string()))?;
            if note.owner_id == caller.id() {
                view_as_owner(txn, &caller, &note)
            } else {
                view_as_recipient(txn, &caller, &note)
            }
        })
    }

    /// Read the canonical copy of a note the caller owns.
    pub fn read_as_owner(&self, session: &Session, note_id: &str) -> VaultResult<NoteView> {
        self.read("read_as_owner", Some(&session.account_id), |txn| {
            let caller = resolve_caller(txn, session)?;
            let note = NoteRepository::new(txn)
                .get(note_id)?
                .ok_or_else(|| VaultError::NoteNotFound(note_id.to_string()))?;
            view_as_owner(txn, &caller, &note)
        })
    }

    /// Read the caller's share entry of a note.
    ///
    /// Fails `NoAccess` when there is no entry, including when the note does
    /// not exist or is in the trash.
    pub fn read_as_recipient(&self, session: &Session, note_id: &str) -> VaultResult<NoteView> {
        self.read("read_as_recipient", Some(&session.account_id), |txn| {
            let caller = resolve_caller(txn, session)?;
            let note = NoteRepository::new(txn)
                .get(note_id)?
                .ok_or_else(|| VaultError::NoAccess(note_id.to_string()))?;
            view_as_recipient(txn, &caller, &note)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_are_trimmed_and_bounded() {
        assert_eq!(validate_title("  Groceries ", 20).unwrap(), "Groceries");
        assert!(matches!(
            validate_title("   ", 20),
            Err(VaultError::InvalidInput(_))
        ));
        assert!(validate_title("ééééé", 5).is_ok());
        assert!(validate_title("éééééé", 5).is_err());
    }

    #[test]
    fn content_limit_is_in_bytes() {
        assert!(validate_content("abcd", 4).is_ok());
        assert!(matches!(
            validate_content("éé€", 4),
            Err(VaultError::PayloadTooLarge { size: 7, max: 4 })
        ));
    }

    #[test]
    fn tags_are_trimmed_and_deduplicated() {
        let tags = normalize_tags(vec![
            " work ".into(),
            "".into(),
            "home".into(),
            "work".into(),
            "  ".into(),
        ]);
        assert_eq!(tags, vec!["work".to_string(), "home".to_string()]);
    }
}
