// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Vault Storage
//!
//! Persistent storage on an embedded [redb](https://docs.rs/redb) database
//! (pure Rust, ACID). Records are stored as JSON values keyed by ID, with
//! composite-key index tables for the lookups the vault needs.
//!
//! ## Atomicity
//!
//! redb runs one write transaction at a time. Every vault mutation reads,
//! checks and writes inside a single write transaction, so a conditional
//! update like "append a share entry if the recipient has none" cannot race
//! with another writer.
//!
//! ## Key Custody
//!
//! Private keys live in their own table. They are only read through
//! [`AccountRepository::private_key_pem`] and are never part of a record
//! that is serialised for callers.

pub mod audit;
pub mod database;
pub mod integrity;
pub mod ownership;
pub mod repository;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use database::{TableReader, TableWriter, VaultDatabase};
pub use integrity::{IntegrityFinding, IntegrityReport};
pub use ownership::{OwnedResource, OwnershipEnforcer};
pub use repository::{AccountRepository, FriendRequestRepository, NoteRepository};

/// Errors raised by the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;
