// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Friend requests and the symmetric friend graph.
//!
//! A request is stored once and indexed under both participants. The
//! friend edge lives in both accounts' `friends` sets and is only ever added
//! or removed on both sides in the same transaction.

use chrono::Utc;

use super::gate::resolve_caller;
use super::{audit, Vault};
use crate::auth::Session;
use crate::error::{VaultError, VaultResult};
use crate::models::{AccountSummary, FriendRequest, FriendRequestStatus, FriendResponse};
use crate::storage::{
    AccountRepository, AuditEvent, AuditEventType, FriendRequestRepository, TableReader,
};

/// Whether `a` and `b` are friends, checked against both accounts.
///
/// A one-sided edge counts as not-friends and is logged.
pub(crate) fn are_friends<T: TableReader>(txn: &T, a: &str, b: &str) -> VaultResult<bool> {
    let accounts = AccountRepository::new(txn);
    let a_lists_b = accounts
        .get(a)?
        .is_some_and(|record| record.friends.contains(b));
    let b_lists_a = accounts
        .get(b)?
        .is_some_and(|record| record.friends.contains(a));

    if a_lists_b != b_lists_a {
        tracing::warn!(
            target: "notevault::integrity",
            account_a = %a,
            account_b = %b,
            "One-sided friend edge"
        );
    }
    Ok(a_lists_b && b_lists_a)
}

impl Vault {
    /// Send a friend request to the account matching `target_identifier`
    /// (username or email). Both sides must be verified.
    pub fn send_friend_request(
        &self,
        session: &Session,
        target_identifier: &str,
    ) -> VaultResult<FriendRequest> {
        self.write("send_friend_request", Some(&session.account_id), |txn| {
            let caller = resolve_caller(txn, session)?;
            caller.require_verified()?;
            let target = AccountRepository::new(txn)
                .find_by_identifier(target_identifier)?
                .ok_or_else(|| VaultError::TargetNotFound(target_identifier.to_string()))?;

            if target.account_id == caller.id() {
                return Err(VaultError::SelfRequest);
            }
            if !target.verified {
                return Err(VaultError::TargetNotVerified(target.username.clone()));
            }
            if caller.record.friends.contains(&target.account_id)
                || target.friends.contains(caller.id())
            {
                return Err(VaultError::AlreadyFriends);
            }

            let requests = FriendRequestRepository::new(txn);
            if requests
                .find_pending_between(caller.id(), &target.account_id)?
                .is_some()
            {
                return Err(VaultError::RequestPending);
            }

            let now = Utc::now();
            let request = FriendRequest {
                request_id: uuid::Uuid::new_v4().to_string(),
                sender_id: caller.id().to_string(),
                receiver_id: target.account_id.clone(),
                status: FriendRequestStatus::Pending,
                created_at: now,
                updated_at: now,
            };
            requests.create(&request)?;
            audit(
                txn,
                AuditEvent::new(AuditEventType::FriendRequestSent)
                    .with_account(caller.id())
                    .with_resource("friend_request", &request.request_id)
                    .with_details(serde_json::json!({ "receiver_id": request.receiver_id })),
            )?;

            tracing::info!(
                request_id = %request.request_id,
                sender_id = %request.sender_id,
                receiver_id = %request.receiver_id,
                "Friend request sent"
            );
            Ok(request)
        })
    }

    /// Accept or reject a pending request addressed to the caller.
    ///
    /// # Errors
    /// - `VerificationRequired` for an unverified caller
    /// - `RequestNotFound` if the request is unknown, not addressed to the
    ///   caller, or already answered
    /// - `InconsistentState` if either participant's index entry or the
    ///   sender's account is missing
    pub fn respond_to_friend_request(
        &self,
        session: &Session,
        request_id: &str,
        response: FriendResponse,
    ) -> VaultResult<FriendRequest> {
        self.write("respond_to_friend_request", Some(&session.account_id), |txn| {
            let caller = resolve_caller(txn, session)?;
            caller.require_verified()?;
            let requests = FriendRequestRepository::new(txn);

            let Some(mut request) = requests.get(request_id)? else {
                if requests.is_indexed_for(caller.id(), request_id)? {
                    return Err(VaultError::InconsistentState(format!(
                        "friend request {request_id} is indexed for {} but not stored",
                        caller.id()
                    )));
                }
                return Err(VaultError::RequestNotFound(request_id.to_string()));
            };

            if request.receiver_id != caller.id() || request.status != FriendRequestStatus::Pending
            {
                return Err(VaultError::RequestNotFound(request_id.to_string()));
            }
            for participant in [&request.sender_id, &request.receiver_id] {
                if !requests.is_indexed_for(participant, request_id)? {
                    return Err(VaultError::InconsistentState(format!(
                        "friend request {request_id} is missing from {participant}'s requests"
                    )));
                }
            }

            let accounts = AccountRepository::new(txn);
            let mut sender = accounts.get(&request.sender_id)?.ok_or_else(|| {
                VaultError::InconsistentState(format!(
                    "friend request {request_id} references missing sender {}",
                    request.sender_id
                ))
            })?;

            let now = Utc::now();
            let event_type = match response {
                FriendResponse::Accept => {
                    request.status = FriendRequestStatus::Accepted;
                    let mut receiver = caller.record.clone();
                    if sender.friends.insert(receiver.account_id.clone()) {
                        sender.updated_at = now;
                        accounts.update(&sender)?;
                    }
                    if receiver.friends.insert(sender.account_id.clone()) {
                        receiver.updated_at = now;
                        accounts.update(&receiver)?;
                    }
                    AuditEventType::FriendRequestAccepted
                }
                FriendResponse::Reject => {
                    request.status = FriendRequestStatus::Rejected;
                    AuditEventType::FriendRequestRejected
                }
            };
            request.updated_at = now;
            requests.save(&request)?;

            audit(
                txn,
                AuditEvent::new(event_type)
                    .with_account(caller.id())
                    .with_resource("friend_request", request_id)
                    .with_details(serde_json::json!({ "sender_id": request.sender_id })),
            )?;
            tracing::info!(
                request_id = %request_id,
                sender_id = %request.sender_id,
                receiver_id = %request.receiver_id,
                status = ?request.status,
                "Friend request answered"
            );
            Ok(request)
        })
    }

    /// Symmetric friendship check.
    pub fn is_friend(&self, a: &str, b: &str) -> VaultResult<bool> {
        self.read("is_friend", None, |txn| are_friends(txn, a, b))
    }

    /// The caller's friends, ordered by username.
    pub fn friends_of(&self, session: &Session) -> VaultResult<Vec<AccountSummary>> {
        self.read("friends_of", Some(&session.account_id), |txn| {
            let caller = resolve_caller(txn, session)?;
            let accounts = AccountRepository::new(txn);

            let mut friends = Vec::with_capacity(caller.record.friends.len());
            for friend_id in &caller.record.friends {
                match accounts.get(friend_id)? {
                    Some(friend) => friends.push(AccountSummary::from(&friend)),
                    None => tracing::warn!(
                        target: "notevault::integrity",
                        account_id = %caller.id(),
                        friend_id = %friend_id,
                        "Friend edge points to a missing account"
                    ),
                }
            }
            friends.sort_by(|a, b| a.username.cmp(&b.username));
            Ok(friends)
        })
    }

    /// The caller's friend requests, sent and received, oldest first.
    ///
    /// Unverified callers see an empty list.
    pub fn friend_requests(&self, session: &Session) -> VaultResult<Vec<FriendRequest>> {
        self.read("friend_requests", Some(&session.account_id), |txn| {
            let caller = resolve_caller(txn, session)?;
            if !caller.is_verified() {
                return Ok(Vec::new());
            }
            Ok(FriendRequestRepository::new(txn).list_for(caller.id())?)
        })
    }
}
