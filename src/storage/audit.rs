// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for security-sensitive operations.
//!
//! Account lifecycle, friend graph changes, note mutations and every
//! sharing decision are recorded in the `audit_events` table, inside the
//! same write transaction as the change they describe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::database::AUDIT_EVENTS;
use super::{StorageResult, TableReader, TableWriter};

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Account events
    AccountCreated,
    AccountVerified,
    AccountDeleted,

    // Friend graph events
    FriendRequestSent,
    FriendRequestAccepted,
    FriendRequestRejected,

    // Note events
    NoteCreated,
    NoteUpdated,
    NoteTrashed,
    NoteRestored,
    NotePurged,

    // Sharing events
    NoteShared,
    NoteUnshared,
    SharePermissionChanged,

    // Integrity
    IntegrityViolation,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// Account that triggered the event (if known).
    pub account_id: Option<String>,
    /// Resource type (account, note, friend_request).
    pub resource_type: Option<String>,
    /// Resource affected.
    pub resource_id: Option<String>,
    /// Additional details as JSON.
    pub details: Option<serde_json::Value>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error message if operation failed.
    pub error: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            account_id: None,
            resource_type: None,
            resource_id: None,
            details: None,
            success: true,
            error: None,
        }
    }

    /// Set the acting account.
    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    /// Set the resource.
    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Add details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }

    /// Table key: zero-padded microseconds, then the event ID, so a forward
    /// scan is chronological.
    fn storage_key(&self) -> String {
        let micros = self.timestamp.timestamp_micros().max(0);
        format!("{micros:020}|{}", self.event_id)
    }
}

/// Repository for audit events.
pub struct AuditRepository<'a, T> {
    txn: &'a T,
}

impl<'a, T: TableReader> AuditRepository<'a, T> {
    pub fn new(txn: &'a T) -> Self {
        Self { txn }
    }

    /// Most recent events, newest first.
    pub fn recent(&self, limit: usize) -> StorageResult<Vec<AuditEvent>> {
        let events: Vec<AuditEvent> = self.txn.scan_json(AUDIT_EVENTS)?;
        Ok(events.into_iter().rev().take(limit).collect())
    }

    /// Events triggered by one account, newest first.
    pub fn for_account(&self, account_id: &str, limit: usize) -> StorageResult<Vec<AuditEvent>> {
        let events: Vec<AuditEvent> = self.txn.scan_json(AUDIT_EVENTS)?;
        Ok(events
            .into_iter()
            .rev()
            .filter(|event| event.account_id.as_deref() == Some(account_id))
            .take(limit)
            .collect())
    }
}

impl<'a, T: TableReader + TableWriter> AuditRepository<'a, T> {
    /// Append an event.
    pub fn log(&self, event: &AuditEvent) -> StorageResult<()> {
        self.txn.put_json(AUDIT_EVENTS, &event.storage_key(), event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::VaultDatabase;
    use chrono::Duration;

    fn setup() -> (VaultDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = VaultDatabase::open_in(dir.path()).unwrap();
        (db, dir)
    }

    #[test]
    fn builder_sets_fields() {
        let event = AuditEvent::new(AuditEventType::NoteShared)
            .with_account("acct-1")
            .with_resource("note", "n1")
            .with_details(serde_json::json!({"recipient": "acct-2"}))
            .failed("not friends");

        assert_eq!(event.account_id.as_deref(), Some("acct-1"));
        assert_eq!(event.resource_type.as_deref(), Some("note"));
        assert_eq!(event.resource_id.as_deref(), Some("n1"));
        assert!(!event.success);
        assert_eq!(event.error.as_deref(), Some("not friends"));
    }

    #[test]
    fn event_type_serializes_snake_case() {
        let json = serde_json::to_string(&AuditEventType::SharePermissionChanged).unwrap();
        assert_eq!(json, "\"share_permission_changed\"");
    }

    #[test]
    fn recent_is_newest_first() {
        let (db, _dir) = setup();
        let txn = db.begin_write().unwrap();
        let repo = AuditRepository::new(&txn);
        for (offset, event_type) in [
            (30, AuditEventType::AccountCreated),
            (20, AuditEventType::NoteCreated),
            (10, AuditEventType::NoteShared),
        ] {
            let mut event = AuditEvent::new(event_type).with_account("a");
            event.timestamp = Utc::now() - Duration::seconds(offset);
            repo.log(&event).unwrap();
        }
        txn.commit().unwrap();

        let txn = db.begin_read().unwrap();
        let recent = AuditRepository::new(&txn).recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].event_type, AuditEventType::NoteShared);
        assert_eq!(recent[1].event_type, AuditEventType::NoteCreated);
    }

    #[test]
    fn for_account_filters_by_actor() {
        let (db, _dir) = setup();
        let txn = db.begin_write().unwrap();
        let repo = AuditRepository::new(&txn);
        repo.log(&AuditEvent::new(AuditEventType::NoteCreated).with_account("a"))
            .unwrap();
        repo.log(&AuditEvent::new(AuditEventType::NoteCreated).with_account("b"))
            .unwrap();
        txn.commit().unwrap();

        let txn = db.begin_read().unwrap();
        let events = AuditRepository::new(&txn).for_account("a", 10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].account_id.as_deref(), Some("a"));
    }
}
