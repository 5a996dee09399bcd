// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Caller-facing error type of the vault.
//!
//! Every variant is an expected, recoverable condition. The transport layer
//! maps [`VaultError::error_code`] to its own responses; nothing here knows
//! about HTTP.

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::models::{NoteFormat, Permission};
use crate::storage::StorageError;

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    // -------------------------------------------------------------------------
    // Sharing and access
    // -------------------------------------------------------------------------
    /// Caller does not own the resource
    #[error("only the owner may do this with {0}")]
    NotOwner(String),

    /// Share target could not be resolved
    #[error("no account matches '{0}'")]
    TargetNotFound(String),

    #[error("{0} is not a friend")]
    NotFriends(String),

    #[error("note {note_id} is already shared with {user_id}")]
    AlreadyShared { note_id: String, user_id: String },

    #[error("note {note_id} is not shared with {user_id}")]
    EntryNotFound { note_id: String, user_id: String },

    /// Caller has no share entry on the note
    #[error("no access to note {0}")]
    NoAccess(String),

    #[error("recipient permission {0} does not allow editing")]
    InsufficientPermission(Permission),

    // -------------------------------------------------------------------------
    // Verification gate
    // -------------------------------------------------------------------------
    #[error("account verification required")]
    VerificationRequired,

    /// Friend request target has not been verified
    #[error("{0} has not verified their account")]
    TargetNotVerified(String),

    #[error("format {0} requires a verified account")]
    FormatNotAllowed(NoteFormat),

    #[error("unverified accounts may own at most {limit} note(s)")]
    LimitExceeded { limit: usize },

    // -------------------------------------------------------------------------
    // Crypto
    // -------------------------------------------------------------------------
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("payload too large: {size} bytes exceeds maximum {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("crypto error: {0}")]
    Crypto(CryptoError),

    // -------------------------------------------------------------------------
    // Friend graph
    // -------------------------------------------------------------------------
    #[error("cannot send a friend request to yourself")]
    SelfRequest,

    #[error("already friends")]
    AlreadyFriends,

    #[error("a friend request between these accounts is already pending")]
    RequestPending,

    #[error("no pending friend request {0}")]
    RequestNotFound(String),

    /// A stored invariant is broken
    #[error("inconsistent state: {0}")]
    InconsistentState(String),

    // -------------------------------------------------------------------------
    // Records and input
    // -------------------------------------------------------------------------
    #[error("note {0} not found")]
    NoteNotFound(String),

    #[error("account {0} not found")]
    AccountNotFound(String),

    #[error("{0} is already registered")]
    IdentifierTaken(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("version conflict: expected {expected}, stored {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    #[error("admin role required")]
    AdminRequired,

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl VaultError {
    /// Stable machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            VaultError::NotOwner(_) => "not_owner",
            VaultError::TargetNotFound(_) => "target_not_found",
            VaultError::NotFriends(_) => "not_friends",
            VaultError::AlreadyShared { .. } => "already_shared",
            VaultError::EntryNotFound { .. } => "entry_not_found",
            VaultError::NoAccess(_) => "no_access",
            VaultError::InsufficientPermission(_) => "insufficient_permission",
            VaultError::VerificationRequired => "verification_required",
            VaultError::TargetNotVerified(_) => "target_not_verified",
            VaultError::FormatNotAllowed(_) => "format_not_allowed",
            VaultError::LimitExceeded { .. } => "limit_exceeded",
            VaultError::DecryptionFailed(_) => "decryption_failed",
            VaultError::PayloadTooLarge { .. } => "payload_too_large",
            VaultError::KeyGeneration(_) => "key_generation_failed",
            VaultError::Crypto(_) => "crypto_error",
            VaultError::SelfRequest => "self_request",
            VaultError::AlreadyFriends => "already_friends",
            VaultError::RequestPending => "request_pending",
            VaultError::RequestNotFound(_) => "request_not_found",
            VaultError::InconsistentState(_) => "inconsistent_state",
            VaultError::NoteNotFound(_) => "note_not_found",
            VaultError::AccountNotFound(_) => "account_not_found",
            VaultError::IdentifierTaken(_) => "identifier_taken",
            VaultError::InvalidInput(_) => "invalid_input",
            VaultError::VersionConflict { .. } => "version_conflict",
            VaultError::AdminRequired => "admin_required",
            VaultError::Storage(_) => "storage_error",
        }
    }

    /// Whether this error signals a violated stored invariant rather than a
    /// business rule.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, VaultError::InconsistentState(_))
    }
}

impl From<CryptoError> for VaultError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::DecryptionFailed(reason) => VaultError::DecryptionFailed(reason),
            CryptoError::PayloadTooLarge { size, max } => VaultError::PayloadTooLarge { size, max },
            CryptoError::KeyGeneration(reason) => VaultError::KeyGeneration(reason),
            other => VaultError::Crypto(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crypto_errors_map_to_taxonomy() {
        let err: VaultError = CryptoError::DecryptionFailed("bad tag".into()).into();
        assert_eq!(err.error_code(), "decryption_failed");

        let err: VaultError = CryptoError::PayloadTooLarge { size: 9, max: 8 }.into();
        assert!(matches!(err, VaultError::PayloadTooLarge { size: 9, max: 8 }));

        let err: VaultError = CryptoError::InvalidKey("pem".into()).into();
        assert_eq!(err.error_code(), "crypto_error");
    }

    #[test]
    fn only_inconsistent_state_is_an_integrity_violation() {
        assert!(VaultError::InconsistentState("x".into()).is_integrity_violation());
        assert!(!VaultError::NoAccess("n".into()).is_integrity_violation());
        assert!(!VaultError::VerificationRequired.is_integrity_violation());
    }

    #[test]
    fn messages_name_the_subject() {
        let err = VaultError::FormatNotAllowed(NoteFormat::Markdown);
        assert_eq!(err.to_string(), "format markdown requires a verified account");

        let err = VaultError::LimitExceeded { limit: 1 };
        assert_eq!(err.error_code(), "limit_exceeded");
        assert!(err.to_string().contains("at most 1"));
    }
}
