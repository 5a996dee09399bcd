// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Friend request repository.
//!
//! ## Storage Layout
//!
//! ```text
//! friend_requests[request_id]                 FriendRequest (JSON)
//! account_request_index[account_id|request_id] ()
//! ```
//!
//! Each request is stored once and indexed under both participants, so
//! the two sides can never disagree about its status.

use crate::models::{FriendRequest, FriendRequestStatus};

use super::super::database::{index_key, ACCOUNT_REQUEST_INDEX, FRIEND_REQUESTS};
use super::super::{StorageResult, TableReader, TableWriter};

/// Repository for friend requests.
pub struct FriendRequestRepository<'a, T> {
    txn: &'a T,
}

impl<'a, T: TableReader> FriendRequestRepository<'a, T> {
    pub fn new(txn: &'a T) -> Self {
        Self { txn }
    }

    pub fn get(&self, request_id: &str) -> StorageResult<Option<FriendRequest>> {
        self.txn.get_json(FRIEND_REQUESTS, request_id)
    }

    /// Whether `account_id` has an index entry for `request_id`.
    pub fn is_indexed_for(&self, account_id: &str, request_id: &str) -> StorageResult<bool> {
        self.txn
            .index_contains(ACCOUNT_REQUEST_INDEX, &index_key(account_id, request_id))
    }

    /// Requests an account takes part in, oldest first.
    ///
    /// Index entries without a stored request are skipped; the integrity
    /// scan reports them.
    pub fn list_for(&self, account_id: &str) -> StorageResult<Vec<FriendRequest>> {
        let mut requests = Vec::new();
        for request_id in self.txn.index_suffixes(ACCOUNT_REQUEST_INDEX, account_id)? {
            if let Some(request) = self.get(&request_id)? {
                requests.push(request);
            }
        }
        requests.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.request_id.cmp(&b.request_id))
        });
        Ok(requests)
    }

    /// The pending request between two accounts, in either direction.
    pub fn find_pending_between(&self, a: &str, b: &str) -> StorageResult<Option<FriendRequest>> {
        Ok(self.list_for(a)?.into_iter().find(|request| {
            request.status == FriendRequestStatus::Pending && request.connects(a, b)
        }))
    }

    pub fn list_all(&self) -> StorageResult<Vec<FriendRequest>> {
        self.txn.scan_json(FRIEND_REQUESTS)
    }

    pub(crate) fn index_keys(&self) -> StorageResult<Vec<String>> {
        self.txn.index_keys(ACCOUNT_REQUEST_INDEX)
    }
}

impl<'a, T: TableReader + TableWriter> FriendRequestRepository<'a, T> {
    /// Store a new request and index it under both participants.
    pub fn create(&self, request: &FriendRequest) -> StorageResult<()> {
        self.txn
            .put_json(FRIEND_REQUESTS, &request.request_id, request)?;
        self.txn.put_index(
            ACCOUNT_REQUEST_INDEX,
            &index_key(&request.sender_id, &request.request_id),
        )?;
        self.txn.put_index(
            ACCOUNT_REQUEST_INDEX,
            &index_key(&request.receiver_id, &request.request_id),
        )
    }

    pub fn save(&self, request: &FriendRequest) -> StorageResult<()> {
        self.txn
            .put_json(FRIEND_REQUESTS, &request.request_id, request)
    }

    /// Remove a request and both index entries.
    pub fn delete(&self, request: &FriendRequest) -> StorageResult<()> {
        self.txn.remove(
            ACCOUNT_REQUEST_INDEX,
            &index_key(&request.sender_id, &request.request_id),
        )?;
        self.txn.remove(
            ACCOUNT_REQUEST_INDEX,
            &index_key(&request.receiver_id, &request.request_id),
        )?;
        self.txn.remove(FRIEND_REQUESTS, &request.request_id)?;
        Ok(())
    }

    /// Drop a single index entry.
    pub(crate) fn remove_index(&self, account_id: &str, request_id: &str) -> StorageResult<bool> {
        self.txn
            .remove(ACCOUNT_REQUEST_INDEX, &index_key(account_id, request_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::VaultDatabase;
    use chrono::{Duration, Utc};

    fn setup() -> (VaultDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = VaultDatabase::open_in(dir.path()).unwrap();
        (db, dir)
    }

    fn request(id: &str, sender: &str, receiver: &str, age_secs: i64) -> FriendRequest {
        let at = Utc::now() - Duration::seconds(age_secs);
        FriendRequest {
            request_id: id.into(),
            sender_id: sender.into(),
            receiver_id: receiver.into(),
            status: FriendRequestStatus::Pending,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn request_is_visible_to_both_participants() {
        let (db, _dir) = setup();
        let txn = db.begin_write().unwrap();
        FriendRequestRepository::new(&txn)
            .create(&request("r1", "alice", "bob", 0))
            .unwrap();
        txn.commit().unwrap();

        let txn = db.begin_read().unwrap();
        let repo = FriendRequestRepository::new(&txn);
        assert_eq!(repo.list_for("alice").unwrap().len(), 1);
        assert_eq!(repo.list_for("bob").unwrap().len(), 1);
        assert!(repo.list_for("carol").unwrap().is_empty());
        assert!(repo.is_indexed_for("alice", "r1").unwrap());
        assert!(repo.find_pending_between("bob", "alice").unwrap().is_some());
    }

    #[test]
    fn list_is_oldest_first() {
        let (db, _dir) = setup();
        let txn = db.begin_write().unwrap();
        let repo = FriendRequestRepository::new(&txn);
        repo.create(&request("zz-new", "alice", "bob", 1)).unwrap();
        repo.create(&request("aa-old", "carol", "alice", 60)).unwrap();
        txn.commit().unwrap();

        let txn = db.begin_read().unwrap();
        let ids: Vec<String> = FriendRequestRepository::new(&txn)
            .list_for("alice")
            .unwrap()
            .into_iter()
            .map(|r| r.request_id)
            .collect();
        assert_eq!(ids, vec!["aa-old".to_string(), "zz-new".to_string()]);
    }

    #[test]
    fn answered_request_is_not_pending() {
        let (db, _dir) = setup();
        let mut stored = request("r1", "alice", "bob", 0);

        let txn = db.begin_write().unwrap();
        FriendRequestRepository::new(&txn).create(&stored).unwrap();
        stored.status = FriendRequestStatus::Rejected;
        FriendRequestRepository::new(&txn).save(&stored).unwrap();
        txn.commit().unwrap();

        let txn = db.begin_read().unwrap();
        let repo = FriendRequestRepository::new(&txn);
        assert!(repo.find_pending_between("alice", "bob").unwrap().is_none());
        assert_eq!(
            repo.get("r1").unwrap().unwrap().status,
            FriendRequestStatus::Rejected
        );
    }

    #[test]
    fn delete_removes_both_index_entries() {
        let (db, _dir) = setup();
        let stored = request("r1", "alice", "bob", 0);

        let txn = db.begin_write().unwrap();
        FriendRequestRepository::new(&txn).create(&stored).unwrap();
        FriendRequestRepository::new(&txn).delete(&stored).unwrap();
        txn.commit().unwrap();

        let txn = db.begin_read().unwrap();
        let repo = FriendRequestRepository::new(&txn);
        assert!(repo.get("r1").unwrap().is_none());
        assert!(repo.index_keys().unwrap().is_empty());
    }
}
