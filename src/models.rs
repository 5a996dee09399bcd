// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Vault Data Models
//!
//! Records persisted by the storage layer and the values returned to
//! callers. All types derive `Serialize` and `Deserialize` so the transport
//! layer can hand them out as JSON unchanged.
//!
//! ## Model Categories
//!
//! - **Accounts**: stored record, public profile, input types
//! - **Notes**: canonical note, per-recipient share entries, read views
//! - **Friend Requests**: single record shared by both participants
//!
//! No type in this module carries a private key.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Role;

// =============================================================================
// Account Models
// =============================================================================

/// Link between an account and an external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    /// Provider name, e.g. `google`
    pub provider: String,
    /// Stable subject identifier issued by the provider
    pub subject: String,
}

/// Stored account record.
///
/// The private key is kept in a separate table and never appears here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub account_id: String,
    pub username: String,
    /// Normalised (NFKC, lowercase) email address
    pub email: String,
    /// SPKI PEM public key
    pub public_key_pem: String,
    pub verified: bool,
    #[serde(default)]
    pub role: Role,
    /// Symmetric friend edges (account IDs)
    #[serde(default)]
    pub friends: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_identity: Option<ExternalIdentity>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Account as shown to callers (profile, listings, admin views).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub account_id: String,
    pub username: String,
    pub email: String,
    pub public_key_pem: String,
    /// SHA-256 fingerprint of the public key (lowercase hex)
    pub public_key_fingerprint: String,
    pub verified: bool,
    pub role: Role,
    pub friend_count: usize,
    pub created_at: DateTime<Utc>,
}

impl AccountProfile {
    pub fn from_record(record: &AccountRecord, fingerprint: String) -> Self {
        Self {
            account_id: record.account_id.clone(),
            username: record.username.clone(),
            email: record.email.clone(),
            public_key_pem: record.public_key_pem.clone(),
            public_key_fingerprint: fingerprint,
            verified: record.verified,
            role: record.role,
            friend_count: record.friends.len(),
            created_at: record.created_at,
        }
    }
}

/// Minimal account reference used in friend lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub account_id: String,
    pub username: String,
}

impl From<&AccountRecord> for AccountSummary {
    fn from(record: &AccountRecord) -> Self {
        Self {
            account_id: record.account_id.clone(),
            username: record.username.clone(),
        }
    }
}

/// Input for registering an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub role: Role,
}

impl NewAccount {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            verified: false,
            role: Role::User,
        }
    }

    pub fn verified(mut self) -> Self {
        self.verified = true;
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

// =============================================================================
// Note Models
// =============================================================================

/// Content format of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NoteFormat {
    #[default]
    Plain,
    Markdown,
    Pdf,
}

impl std::fmt::Display for NoteFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoteFormat::Plain => write!(f, "plain"),
            NoteFormat::Markdown => write!(f, "markdown"),
            NoteFormat::Pdf => write!(f, "pdf"),
        }
    }
}

/// Access level granted to a share recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Read only
    Viewer,
    /// May change title and content
    Editor,
    /// Same edit rights as editor
    Admin,
}

impl Permission {
    /// Whether a recipient with this permission may change title and content.
    pub fn can_edit(&self) -> bool {
        matches!(self, Permission::Editor | Permission::Admin)
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Permission::Viewer => write!(f, "viewer"),
            Permission::Editor => write!(f, "editor"),
            Permission::Admin => write!(f, "admin"),
        }
    }
}

/// A recipient-specific copy of a note, sealed for the recipient's key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareEntry {
    /// Recipient account ID
    pub user_id: String,
    pub permission: Permission,
    pub encrypted_title: String,
    pub encrypted_content: String,
    pub shared_at: DateTime<Utc>,
}

/// Stored note.
///
/// `title` and `content` hold the canonical copy: plaintext, or when
/// `encrypted` is set, envelopes sealed for the owner's public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub note_id: String,
    pub owner_id: String,
    pub title: String,
    pub content: String,
    pub format: NoteFormat,
    pub encrypted: bool,
    /// At most one entry per recipient
    #[serde(default)]
    pub shared_with: Vec<ShareEntry>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub pinned: bool,
    /// Incremented on every mutation
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set while the note is in the trash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Note {
    pub fn share_for(&self, user_id: &str) -> Option<&ShareEntry> {
        self.shared_with.iter().find(|entry| entry.user_id == user_id)
    }

    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Record a mutation: bump the version and the update timestamp.
    pub fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }
}

/// Input for creating a note.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub format: NoteFormat,
    /// Seal the canonical copy for the owner's own key
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub pinned: bool,
}

impl NewNote {
    pub fn plain(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: NoteFormat) -> Self {
        self.format = format;
        self
    }

    pub fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }
}

/// Partial update of a note. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub format: Option<NoteFormat>,
    pub tags: Option<Vec<String>>,
    pub pinned: Option<bool>,
    /// Reject the update unless the stored version matches
    pub expected_version: Option<u64>,
}

impl NoteUpdate {
    /// Whether the update touches any owner-only field.
    pub fn touches_owner_fields(&self) -> bool {
        self.format.is_some() || self.tags.is_some() || self.pinned.is_some()
    }
}

/// How the caller reached a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoteAccess {
    Owner,
    Shared { permission: Permission },
}

/// Decrypted note body, or a marker when the caller's copy cannot be opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NoteBody {
    Readable { title: String, content: String },
    Undecryptable,
}

/// A note as returned to a reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteView {
    pub note_id: String,
    pub owner_id: String,
    pub access: NoteAccess,
    pub body: NoteBody,
    pub format: NoteFormat,
    pub encrypted: bool,
    pub tags: Vec<String>,
    pub pinned: bool,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl NoteView {
    pub fn from_note(note: &Note, access: NoteAccess, body: NoteBody) -> Self {
        Self {
            note_id: note.note_id.clone(),
            owner_id: note.owner_id.clone(),
            access,
            body,
            format: note.format,
            encrypted: note.encrypted,
            tags: note.tags.clone(),
            pinned: note.pinned,
            version: note.version,
            created_at: note.created_at,
            updated_at: note.updated_at,
            deleted_at: note.deleted_at,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match &self.body {
            NoteBody::Readable { title, .. } => Some(title),
            NoteBody::Undecryptable => None,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match &self.body {
            NoteBody::Readable { content, .. } => Some(content),
            NoteBody::Undecryptable => None,
        }
    }

    pub fn is_undecryptable(&self) -> bool {
        matches!(self.body, NoteBody::Undecryptable)
    }
}

/// One recipient of a note, as listed to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareSummary {
    pub user_id: String,
    pub username: String,
    pub permission: Permission,
    pub shared_at: DateTime<Utc>,
}

// =============================================================================
// Friend Request Models
// =============================================================================

/// Friend request lifecycle state. Terminal after the first response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
    Rejected,
}

/// A friend request, stored once and indexed under both participants.
///
/// `request_id` is the link ID both participants refer to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRequest {
    pub request_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub status: FriendRequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FriendRequest {
    pub fn involves(&self, account_id: &str) -> bool {
        self.sender_id == account_id || self.receiver_id == account_id
    }

    /// Whether this request connects `a` and `b` in either direction.
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }
}

/// Receiver's answer to a pending friend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendResponse {
    Accept,
    Reject,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_note() -> Note {
        let now = Utc::now();
        Note {
            note_id: "n1".into(),
            owner_id: "owner".into(),
            title: "t".into(),
            content: "c".into(),
            format: NoteFormat::Plain,
            encrypted: false,
            shared_with: vec![ShareEntry {
                user_id: "friend".into(),
                permission: Permission::Viewer,
                encrypted_title: "x".into(),
                encrypted_content: "y".into(),
                shared_at: now,
            }],
            tags: vec![],
            pinned: false,
            version: 1,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn enums_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&NoteFormat::Markdown).unwrap(), "\"markdown\"");
        assert_eq!(serde_json::to_string(&Permission::Editor).unwrap(), "\"editor\"");
        assert_eq!(
            serde_json::to_string(&FriendRequestStatus::Pending).unwrap(),
            "\"pending\""
        );
    }

    #[test]
    fn only_editor_and_admin_can_edit() {
        assert!(!Permission::Viewer.can_edit());
        assert!(Permission::Editor.can_edit());
        assert!(Permission::Admin.can_edit());
    }

    #[test]
    fn touch_bumps_version() {
        let mut note = sample_note();
        let before = note.updated_at;
        note.touch();
        assert_eq!(note.version, 2);
        assert!(note.updated_at >= before);
    }

    #[test]
    fn share_lookup_by_recipient() {
        let note = sample_note();
        assert!(note.share_for("friend").is_some());
        assert!(note.share_for("stranger").is_none());
    }

    #[test]
    fn undecryptable_view_has_no_text() {
        let note = sample_note();
        let view = NoteView::from_note(&note, NoteAccess::Owner, NoteBody::Undecryptable);
        assert!(view.is_undecryptable());
        assert_eq!(view.title(), None);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["body"]["state"], "undecryptable");
        assert_eq!(json["access"]["kind"], "owner");
    }

    #[test]
    fn request_connects_either_direction() {
        let now = Utc::now();
        let request = FriendRequest {
            request_id: "r".into(),
            sender_id: "a".into(),
            receiver_id: "b".into(),
            status: FriendRequestStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        assert!(request.connects("a", "b"));
        assert!(request.connects("b", "a"));
        assert!(!request.connects("a", "c"));
        assert!(request.involves("b"));
    }

    #[test]
    fn note_update_detects_owner_fields() {
        let content_only = NoteUpdate {
            content: Some("x".into()),
            ..NoteUpdate::default()
        };
        assert!(!content_only.touches_owner_fields());

        let pin = NoteUpdate {
            pinned: Some(true),
            ..NoteUpdate::default()
        };
        assert!(pin.touches_owner_fields());
    }
}
