// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Note repository.
//!
//! ## Storage Layout
//!
//! ```text
//! notes[note_id]                           Note (JSON, share entries embedded)
//! owner_note_index[owner_id|note_id]       ()
//! recipient_note_index[recipient|note_id]  ()
//! ```
//!
//! The recipient index mirrors the embedded share entries and is rewritten
//! by [`NoteRepository::save`] whenever the set of recipients changes.

use std::collections::BTreeSet;

use crate::models::Note;

use super::super::database::{index_key, IndexTable, NOTES, OWNER_NOTE_INDEX, RECIPIENT_NOTE_INDEX};
use super::super::{StorageResult, TableReader, TableWriter};

fn recipients(note: &Note) -> BTreeSet<&str> {
    note.shared_with
        .iter()
        .map(|entry| entry.user_id.as_str())
        .collect()
}

/// Repository for notes and their owner/recipient indexes.
pub struct NoteRepository<'a, T> {
    txn: &'a T,
}

impl<'a, T: TableReader> NoteRepository<'a, T> {
    pub fn new(txn: &'a T) -> Self {
        Self { txn }
    }

    pub fn get(&self, note_id: &str) -> StorageResult<Option<Note>> {
        self.txn.get_json(NOTES, note_id)
    }

    /// All notes owned by an account, trashed ones included.
    pub fn list_owned(&self, owner_id: &str) -> StorageResult<Vec<Note>> {
        self.load_indexed(OWNER_NOTE_INDEX, owner_id)
    }

    /// Number of notes owned by an account, trashed ones included.
    pub fn count_owned(&self, owner_id: &str) -> StorageResult<usize> {
        Ok(self.txn.index_suffixes(OWNER_NOTE_INDEX, owner_id)?.len())
    }

    /// Notes that carry a share entry for `user_id`.
    pub fn list_shared_with(&self, user_id: &str) -> StorageResult<Vec<Note>> {
        self.load_indexed(RECIPIENT_NOTE_INDEX, user_id)
    }

    pub fn list_all(&self) -> StorageResult<Vec<Note>> {
        self.txn.scan_json(NOTES)
    }

    pub(crate) fn owner_index_keys(&self) -> StorageResult<Vec<String>> {
        self.txn.index_keys(OWNER_NOTE_INDEX)
    }

    pub(crate) fn recipient_index_keys(&self) -> StorageResult<Vec<String>> {
        self.txn.index_keys(RECIPIENT_NOTE_INDEX)
    }

    fn load_indexed(&self, index: IndexTable, account_id: &str) -> StorageResult<Vec<Note>> {
        let mut notes = Vec::new();
        for note_id in self.txn.index_suffixes(index, account_id)? {
            match self.get(&note_id)? {
                Some(note) => notes.push(note),
                None => tracing::warn!(
                    target: "notevault::integrity",
                    account_id = %account_id,
                    note_id = %note_id,
                    "Index entry points to a missing note"
                ),
            }
        }
        Ok(notes)
    }
}

impl<'a, T: TableReader + TableWriter> NoteRepository<'a, T> {
    /// Store a new note and its index entries.
    pub fn create(&self, note: &Note) -> StorageResult<()> {
        self.txn.put_json(NOTES, &note.note_id, note)?;
        self.txn
            .put_index(OWNER_NOTE_INDEX, &index_key(&note.owner_id, &note.note_id))?;
        for user_id in recipients(note) {
            self.txn
                .put_index(RECIPIENT_NOTE_INDEX, &index_key(user_id, &note.note_id))?;
        }
        Ok(())
    }

    /// Overwrite a note, bringing the recipient index in line with its
    /// share entries.
    pub fn save(&self, note: &Note) -> StorageResult<()> {
        let previous = self.get(&note.note_id)?;
        let before = previous.as_ref().map(recipients).unwrap_or_default();
        let after = recipients(note);

        for removed in before.difference(&after) {
            self.txn
                .remove(RECIPIENT_NOTE_INDEX, &index_key(removed, &note.note_id))?;
        }
        for added in after.difference(&before) {
            self.txn
                .put_index(RECIPIENT_NOTE_INDEX, &index_key(added, &note.note_id))?;
        }
        if previous.is_none() {
            self.txn
                .put_index(OWNER_NOTE_INDEX, &index_key(&note.owner_id, &note.note_id))?;
        }

        self.txn.put_json(NOTES, &note.note_id, note)
    }

    /// Permanently remove a note, its share entries and its index entries.
    pub fn delete(&self, note: &Note) -> StorageResult<()> {
        for user_id in recipients(note) {
            self.txn
                .remove(RECIPIENT_NOTE_INDEX, &index_key(user_id, &note.note_id))?;
        }
        self.txn
            .remove(OWNER_NOTE_INDEX, &index_key(&note.owner_id, &note.note_id))?;
        self.txn.remove(NOTES, &note.note_id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NoteFormat, Permission, ShareEntry};
    use crate::storage::VaultDatabase;
    use chrono::Utc;

    fn setup() -> (VaultDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = VaultDatabase::open_in(dir.path()).unwrap();
        (db, dir)
    }

    fn note(id: &str, owner: &str) -> Note {
        let now = Utc::now();
        Note {
            note_id: id.into(),
            owner_id: owner.into(),
            title: "title".into(),
            content: "content".into(),
            format: NoteFormat::Plain,
            encrypted: false,
            shared_with: vec![],
            tags: vec![],
            pinned: false,
            version: 1,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn entry(user: &str) -> ShareEntry {
        ShareEntry {
            user_id: user.into(),
            permission: Permission::Viewer,
            encrypted_title: "et".into(),
            encrypted_content: "ec".into(),
            shared_at: Utc::now(),
        }
    }

    #[test]
    fn create_indexes_owner() {
        let (db, _dir) = setup();
        let txn = db.begin_write().unwrap();
        let repo = NoteRepository::new(&txn);
        repo.create(&note("n1", "alice")).unwrap();
        repo.create(&note("n2", "alice")).unwrap();
        repo.create(&note("n3", "bob")).unwrap();
        txn.commit().unwrap();

        let txn = db.begin_read().unwrap();
        let repo = NoteRepository::new(&txn);
        assert_eq!(repo.count_owned("alice").unwrap(), 2);
        assert_eq!(repo.list_owned("bob").unwrap().len(), 1);
        assert_eq!(repo.list_all().unwrap().len(), 3);
    }

    #[test]
    fn save_tracks_recipient_changes() {
        let (db, _dir) = setup();
        let mut stored = note("n1", "alice");

        let txn = db.begin_write().unwrap();
        NoteRepository::new(&txn).create(&stored).unwrap();
        txn.commit().unwrap();

        stored.shared_with = vec![entry("bob"), entry("carol")];
        let txn = db.begin_write().unwrap();
        NoteRepository::new(&txn).save(&stored).unwrap();
        txn.commit().unwrap();

        {
            let txn = db.begin_read().unwrap();
            let repo = NoteRepository::new(&txn);
            assert_eq!(repo.list_shared_with("bob").unwrap().len(), 1);
            assert_eq!(repo.list_shared_with("carol").unwrap().len(), 1);
        }

        stored.shared_with.retain(|e| e.user_id != "bob");
        let txn = db.begin_write().unwrap();
        NoteRepository::new(&txn).save(&stored).unwrap();
        txn.commit().unwrap();

        let txn = db.begin_read().unwrap();
        let repo = NoteRepository::new(&txn);
        assert!(repo.list_shared_with("bob").unwrap().is_empty());
        assert_eq!(repo.list_shared_with("carol").unwrap().len(), 1);
        assert_eq!(
            repo.recipient_index_keys().unwrap(),
            vec!["carol|n1".to_string()]
        );
    }

    #[test]
    fn delete_removes_note_and_indexes() {
        let (db, _dir) = setup();
        let mut stored = note("n1", "alice");
        stored.shared_with = vec![entry("bob")];

        let txn = db.begin_write().unwrap();
        NoteRepository::new(&txn).create(&stored).unwrap();
        txn.commit().unwrap();

        let txn = db.begin_write().unwrap();
        NoteRepository::new(&txn).delete(&stored).unwrap();
        txn.commit().unwrap();

        let txn = db.begin_read().unwrap();
        let repo = NoteRepository::new(&txn);
        assert!(repo.get("n1").unwrap().is_none());
        assert!(repo.owner_index_keys().unwrap().is_empty());
        assert!(repo.recipient_index_keys().unwrap().is_empty());
    }
}
