// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Consistency scan over the stored records.
//!
//! The vault keeps every invariant inside single write transactions, so a
//! finding here means the database was modified out of band or a bug slipped
//! through. Findings are logged at `error` level under the
//! `notevault::integrity` target.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::repository::{AccountRepository, FriendRequestRepository, NoteRepository};
use super::{StorageResult, TableReader};

/// One broken invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityFinding {
    /// `account_id` lists `friend_id` but not the other way round
    OneSidedFriendEdge { account_id: String, friend_id: String },
    AccountWithoutKey { account_id: String },
    /// Index entry whose request record is gone
    DanglingRequestIndex { account_id: String, request_id: String },
    /// Request record a participant cannot see
    MissingRequestIndex { request_id: String, account_id: String },
    DuplicateShareEntry { note_id: String, user_id: String },
    MissingRecipientIndex { note_id: String, user_id: String },
    /// Recipient index entry without a matching share entry
    DanglingRecipientIndex { user_id: String, note_id: String },
    MissingOwnerIndex { note_id: String, owner_id: String },
}

impl std::fmt::Display for IntegrityFinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityFinding::OneSidedFriendEdge {
                account_id,
                friend_id,
            } => write!(f, "{account_id} lists {friend_id} as friend without reciprocation"),
            IntegrityFinding::AccountWithoutKey { account_id } => {
                write!(f, "account {account_id} has no private key")
            }
            IntegrityFinding::DanglingRequestIndex {
                account_id,
                request_id,
            } => write!(f, "{account_id} indexes missing friend request {request_id}"),
            IntegrityFinding::MissingRequestIndex {
                request_id,
                account_id,
            } => write!(f, "friend request {request_id} is not indexed for {account_id}"),
            IntegrityFinding::DuplicateShareEntry { note_id, user_id } => {
                write!(f, "note {note_id} has several share entries for {user_id}")
            }
            IntegrityFinding::MissingRecipientIndex { note_id, user_id } => {
                write!(f, "share of note {note_id} is not indexed for {user_id}")
            }
            IntegrityFinding::DanglingRecipientIndex { user_id, note_id } => {
                write!(f, "{user_id} indexes note {note_id} without a share entry")
            }
            IntegrityFinding::MissingOwnerIndex { note_id, owner_id } => {
                write!(f, "note {note_id} is not indexed for owner {owner_id}")
            }
        }
    }
}

/// Result of a full consistency scan.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub scanned_at: DateTime<Utc>,
    pub accounts: usize,
    pub notes: usize,
    pub friend_requests: usize,
    pub findings: Vec<IntegrityFinding>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

fn split_index_key(key: &str) -> Option<(&str, &str)> {
    key.split_once('|')
}

/// Scan every table for broken invariants.
pub fn scan<T: TableReader>(txn: &T) -> StorageResult<IntegrityReport> {
    let accounts_repo = AccountRepository::new(txn);
    let notes_repo = NoteRepository::new(txn);
    let requests_repo = FriendRequestRepository::new(txn);

    let accounts = accounts_repo.list()?;
    let notes = notes_repo.list_all()?;
    let requests = requests_repo.list_all()?;
    let mut findings = Vec::new();

    // Friend edges and keys
    let friends_by_account: BTreeMap<&str, &BTreeSet<String>> = accounts
        .iter()
        .map(|account| (account.account_id.as_str(), &account.friends))
        .collect();
    let key_holders: BTreeSet<String> = accounts_repo.key_holders()?.into_iter().collect();

    for account in &accounts {
        if !key_holders.contains(&account.account_id) {
            findings.push(IntegrityFinding::AccountWithoutKey {
                account_id: account.account_id.clone(),
            });
        }
        for friend_id in &account.friends {
            let reciprocated = friends_by_account
                .get(friend_id.as_str())
                .is_some_and(|friends| friends.contains(&account.account_id));
            if !reciprocated {
                findings.push(IntegrityFinding::OneSidedFriendEdge {
                    account_id: account.account_id.clone(),
                    friend_id: friend_id.clone(),
                });
            }
        }
    }

    // Friend requests vs. their index
    let request_ids: BTreeSet<&str> = requests.iter().map(|r| r.request_id.as_str()).collect();
    let request_index = requests_repo.index_keys()?;
    let indexed: BTreeSet<&str> = request_index.iter().map(String::as_str).collect();

    for key in &request_index {
        if let Some((account_id, request_id)) = split_index_key(key) {
            if !request_ids.contains(request_id) {
                findings.push(IntegrityFinding::DanglingRequestIndex {
                    account_id: account_id.to_string(),
                    request_id: request_id.to_string(),
                });
            }
        }
    }
    for request in &requests {
        for participant in [&request.sender_id, &request.receiver_id] {
            let key = format!("{participant}|{}", request.request_id);
            if !indexed.contains(key.as_str()) {
                findings.push(IntegrityFinding::MissingRequestIndex {
                    request_id: request.request_id.clone(),
                    account_id: participant.clone(),
                });
            }
        }
    }

    // Notes vs. owner and recipient indexes
    let owner_index: BTreeSet<String> = notes_repo.owner_index_keys()?.into_iter().collect();
    let recipient_index = notes_repo.recipient_index_keys()?;
    let recipient_set: BTreeSet<&str> = recipient_index.iter().map(String::as_str).collect();
    let mut expected_recipient_keys = BTreeSet::new();

    for note in &notes {
        if !owner_index.contains(&format!("{}|{}", note.owner_id, note.note_id)) {
            findings.push(IntegrityFinding::MissingOwnerIndex {
                note_id: note.note_id.clone(),
                owner_id: note.owner_id.clone(),
            });
        }

        let mut seen = BTreeSet::new();
        for entry in &note.shared_with {
            if !seen.insert(entry.user_id.as_str()) {
                findings.push(IntegrityFinding::DuplicateShareEntry {
                    note_id: note.note_id.clone(),
                    user_id: entry.user_id.clone(),
                });
                continue;
            }
            let key = format!("{}|{}", entry.user_id, note.note_id);
            if !recipient_set.contains(key.as_str()) {
                findings.push(IntegrityFinding::MissingRecipientIndex {
                    note_id: note.note_id.clone(),
                    user_id: entry.user_id.clone(),
                });
            }
            expected_recipient_keys.insert(key);
        }
    }

    for key in &recipient_index {
        if !expected_recipient_keys.contains(key) {
            if let Some((user_id, note_id)) = split_index_key(key) {
                findings.push(IntegrityFinding::DanglingRecipientIndex {
                    user_id: user_id.to_string(),
                    note_id: note_id.to_string(),
                });
            }
        }
    }

    for finding in &findings {
        tracing::error!(target: "notevault::integrity", finding = %finding, "Integrity violation");
    }

    Ok(IntegrityReport {
        scanned_at: Utc::now(),
        accounts: accounts.len(),
        notes: notes.len(),
        friend_requests: requests.len(),
        findings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::models::{
        AccountRecord, FriendRequest, FriendRequestStatus, Note, NoteFormat, Permission,
        ShareEntry,
    };
    use crate::storage::database::{index_key, ACCOUNT_REQUEST_INDEX, RECIPIENT_NOTE_INDEX};
    use crate::storage::{TableWriter, VaultDatabase};

    fn setup() -> (VaultDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = VaultDatabase::open_in(dir.path()).unwrap();
        (db, dir)
    }

    fn account(id: &str, friends: &[&str]) -> AccountRecord {
        AccountRecord {
            account_id: id.into(),
            username: id.into(),
            email: format!("{id}@example.com"),
            public_key_pem: "pub".into(),
            verified: true,
            role: Role::User,
            friends: friends.iter().map(|f| f.to_string()).collect(),
            external_identity: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn shared_note(id: &str, owner: &str, recipients: &[&str]) -> Note {
        let now = Utc::now();
        Note {
            note_id: id.into(),
            owner_id: owner.into(),
            title: "t".into(),
            content: "c".into(),
            format: NoteFormat::Plain,
            encrypted: false,
            shared_with: recipients
                .iter()
                .map(|user| ShareEntry {
                    user_id: user.to_string(),
                    permission: Permission::Viewer,
                    encrypted_title: "et".into(),
                    encrypted_content: "ec".into(),
                    shared_at: now,
                })
                .collect(),
            tags: vec![],
            pinned: false,
            version: 1,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn consistent_store_is_clean() {
        let (db, _dir) = setup();
        let txn = db.begin_write().unwrap();
        let accounts = AccountRepository::new(&txn);
        accounts.create(&account("a", &["b"]), "k").unwrap();
        accounts.create(&account("b", &["a"]), "k").unwrap();
        NoteRepository::new(&txn)
            .create(&shared_note("n1", "a", &["b"]))
            .unwrap();
        txn.commit().unwrap();

        let report = scan(&db.begin_read().unwrap()).unwrap();
        assert!(report.is_clean(), "{:?}", report.findings);
        assert_eq!(report.accounts, 2);
        assert_eq!(report.notes, 1);
    }

    #[test]
    fn detects_one_sided_edge() {
        let (db, _dir) = setup();
        let txn = db.begin_write().unwrap();
        let accounts = AccountRepository::new(&txn);
        accounts.create(&account("a", &["b"]), "k").unwrap();
        accounts.create(&account("b", &[]), "k").unwrap();
        txn.commit().unwrap();

        let report = scan(&db.begin_read().unwrap()).unwrap();
        assert_eq!(
            report.findings,
            vec![IntegrityFinding::OneSidedFriendEdge {
                account_id: "a".into(),
                friend_id: "b".into(),
            }]
        );
    }

    #[test]
    fn detects_request_index_drift() {
        let (db, _dir) = setup();
        let now = Utc::now();
        let request = FriendRequest {
            request_id: "r1".into(),
            sender_id: "a".into(),
            receiver_id: "b".into(),
            status: FriendRequestStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        let txn = db.begin_write().unwrap();
        let requests = FriendRequestRepository::new(&txn);
        requests.create(&request).unwrap();
        requests.remove_index("a", "r1").unwrap();
        txn.put_index(ACCOUNT_REQUEST_INDEX, &index_key("c", "ghost"))
            .unwrap();
        txn.commit().unwrap();

        let report = scan(&db.begin_read().unwrap()).unwrap();
        assert!(report.findings.contains(&IntegrityFinding::MissingRequestIndex {
            request_id: "r1".into(),
            account_id: "a".into(),
        }));
        assert!(report.findings.contains(&IntegrityFinding::DanglingRequestIndex {
            account_id: "c".into(),
            request_id: "ghost".into(),
        }));
    }

    #[test]
    fn detects_share_drift() {
        let (db, _dir) = setup();
        let txn = db.begin_write().unwrap();
        let mut note = shared_note("n1", "a", &["b"]);
        NoteRepository::new(&txn).create(&note).unwrap();
        // Bypass the repository to simulate out-of-band edits
        note.shared_with.extend(shared_note("x", "a", &["b"]).shared_with);
        txn.put_json(crate::storage::database::NOTES, "n1", &note)
            .unwrap();
        txn.put_index(RECIPIENT_NOTE_INDEX, &index_key("z", "n1"))
            .unwrap();
        txn.commit().unwrap();

        let report = scan(&db.begin_read().unwrap()).unwrap();
        assert!(report.findings.contains(&IntegrityFinding::DuplicateShareEntry {
            note_id: "n1".into(),
            user_id: "b".into(),
        }));
        assert!(report.findings.contains(&IntegrityFinding::DanglingRecipientIndex {
            user_id: "z".into(),
            note_id: "n1".into(),
        }));
    }
}
