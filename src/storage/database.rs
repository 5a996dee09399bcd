// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded vault database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `accounts`: account_id → serialized AccountRecord
//! - `account_keys`: account_id → PKCS#8 PEM private key
//! - `username_index`: lowercase username → account_id
//! - `email_index`: normalised email → account_id
//! - `external_identity_index`: `provider|subject` → account_id
//! - `notes`: note_id → serialized Note
//! - `owner_note_index`: `owner_id|note_id` → ()
//! - `recipient_note_index`: `recipient_id|note_id` → ()
//! - `friend_requests`: request_id → serialized FriendRequest
//! - `account_request_index`: `account_id|request_id` → ()
//! - `audit_events`: `micros_since_epoch|event_id` → serialized AuditEvent
//! - `meta`: key → value (health probe)

use std::path::{Path, PathBuf};

use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition, Value,
    WriteTransaction,
};
use serde::{de::DeserializeOwned, Serialize};

use super::StorageResult;

/// File name of the database inside the data directory.
pub const DATABASE_FILE: &str = "notevault.redb";

// =============================================================================
// Table Definitions
// =============================================================================

pub(crate) type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;
pub(crate) type TextTable = TableDefinition<'static, &'static str, &'static str>;
pub(crate) type IndexTable = TableDefinition<'static, &'static str, ()>;

pub(crate) const ACCOUNTS: JsonTable = TableDefinition::new("accounts");
pub(crate) const ACCOUNT_KEYS: TextTable = TableDefinition::new("account_keys");
pub(crate) const USERNAME_INDEX: TextTable = TableDefinition::new("username_index");
pub(crate) const EMAIL_INDEX: TextTable = TableDefinition::new("email_index");
pub(crate) const EXTERNAL_IDENTITY_INDEX: TextTable =
    TableDefinition::new("external_identity_index");

pub(crate) const NOTES: JsonTable = TableDefinition::new("notes");
pub(crate) const OWNER_NOTE_INDEX: IndexTable = TableDefinition::new("owner_note_index");
pub(crate) const RECIPIENT_NOTE_INDEX: IndexTable = TableDefinition::new("recipient_note_index");

pub(crate) const FRIEND_REQUESTS: JsonTable = TableDefinition::new("friend_requests");
pub(crate) const ACCOUNT_REQUEST_INDEX: IndexTable =
    TableDefinition::new("account_request_index");

pub(crate) const AUDIT_EVENTS: JsonTable = TableDefinition::new("audit_events");
const META: TextTable = TableDefinition::new("meta");

/// Build a composite `left|right` key for the index tables.
pub(crate) fn index_key(left: &str, right: &str) -> String {
    format!("{left}|{right}")
}

// =============================================================================
// Table Access
// =============================================================================

/// Read access shared by read and write transactions.
pub trait TableReader {
    /// Deserialize the JSON record stored under `key`.
    fn get_json<T: DeserializeOwned>(&self, table: JsonTable, key: &str)
        -> StorageResult<Option<T>>;

    /// Deserialize every record in a table, in key order.
    fn scan_json<T: DeserializeOwned>(&self, table: JsonTable) -> StorageResult<Vec<T>>;

    /// Keys and records of a table whose key starts with `prefix`, in key order.
    fn scan_json_from<T: DeserializeOwned>(
        &self,
        table: JsonTable,
        prefix: &str,
    ) -> StorageResult<Vec<(String, T)>>;

    fn get_text(&self, table: TextTable, key: &str) -> StorageResult<Option<String>>;

    /// Every `(key, value)` pair of a text table.
    fn scan_text(&self, table: TextTable) -> StorageResult<Vec<(String, String)>>;

    fn index_contains(&self, table: IndexTable, key: &str) -> StorageResult<bool>;

    /// Right-hand parts of every `prefix|...` key in an index table.
    fn index_suffixes(&self, table: IndexTable, prefix: &str) -> StorageResult<Vec<String>>;

    /// Every key of an index table.
    fn index_keys(&self, table: IndexTable) -> StorageResult<Vec<String>>;
}

/// Write access, only available inside a write transaction.
pub trait TableWriter {
    fn put_json<T: Serialize>(&self, table: JsonTable, key: &str, value: &T)
        -> StorageResult<()>;

    fn put_text(&self, table: TextTable, key: &str, value: &str) -> StorageResult<()>;

    fn put_index(&self, table: IndexTable, key: &str) -> StorageResult<()>;

    /// Remove `key`, returning whether it was present.
    fn remove<V: Value + 'static>(
        &self,
        table: TableDefinition<'static, &'static str, V>,
        key: &str,
    ) -> StorageResult<bool>;
}

fn read_json<T, R>(table: &R, key: &str) -> StorageResult<Option<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(key)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

fn read_all_json<T, R>(table: &R) -> StorageResult<Vec<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<&'static str, &'static [u8]>,
{
    let mut records = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        records.push(serde_json::from_slice(value.value())?);
    }
    Ok(records)
}

fn read_json_from<T, R>(table: &R, prefix: &str) -> StorageResult<Vec<(String, T)>>
where
    T: DeserializeOwned,
    R: ReadableTable<&'static str, &'static [u8]>,
{
    let mut records = Vec::new();
    for entry in table.range(prefix..)? {
        let (key, value) = entry?;
        let key = key.value();
        if !key.starts_with(prefix) {
            break;
        }
        records.push((key.to_string(), serde_json::from_slice(value.value())?));
    }
    Ok(records)
}

fn read_text<R>(table: &R, key: &str) -> StorageResult<Option<String>>
where
    R: ReadableTable<&'static str, &'static str>,
{
    Ok(table.get(key)?.map(|value| value.value().to_string()))
}

fn read_all_text<R>(table: &R) -> StorageResult<Vec<(String, String)>>
where
    R: ReadableTable<&'static str, &'static str>,
{
    let mut pairs = Vec::new();
    for entry in table.iter()? {
        let (key, value) = entry?;
        pairs.push((key.value().to_string(), value.value().to_string()));
    }
    Ok(pairs)
}

fn read_suffixes<R>(table: &R, prefix: &str) -> StorageResult<Vec<String>>
where
    R: ReadableTable<&'static str, ()>,
{
    let start = index_key(prefix, "");
    let mut suffixes = Vec::new();
    for entry in table.range(start.as_str()..)? {
        let (key, _) = entry?;
        match key.value().strip_prefix(start.as_str()) {
            Some(rest) => suffixes.push(rest.to_string()),
            None => break,
        }
    }
    Ok(suffixes)
}

fn read_index_keys<R>(table: &R) -> StorageResult<Vec<String>>
where
    R: ReadableTable<&'static str, ()>,
{
    let mut keys = Vec::new();
    for entry in table.iter()? {
        let (key, _) = entry?;
        keys.push(key.value().to_string());
    }
    Ok(keys)
}

macro_rules! impl_table_reader {
    ($txn:ty) => {
        impl TableReader for $txn {
            fn get_json<T: DeserializeOwned>(
                &self,
                table: JsonTable,
                key: &str,
            ) -> StorageResult<Option<T>> {
                read_json(&self.open_table(table)?, key)
            }

            fn scan_json<T: DeserializeOwned>(&self, table: JsonTable) -> StorageResult<Vec<T>> {
                read_all_json(&self.open_table(table)?)
            }

            fn scan_json_from<T: DeserializeOwned>(
                &self,
                table: JsonTable,
                prefix: &str,
            ) -> StorageResult<Vec<(String, T)>> {
                read_json_from(&self.open_table(table)?, prefix)
            }

            fn get_text(&self, table: TextTable, key: &str) -> StorageResult<Option<String>> {
                read_text(&self.open_table(table)?, key)
            }

            fn scan_text(&self, table: TextTable) -> StorageResult<Vec<(String, String)>> {
                read_all_text(&self.open_table(table)?)
            }

            fn index_contains(&self, table: IndexTable, key: &str) -> StorageResult<bool> {
                Ok(self.open_table(table)?.get(key)?.is_some())
            }

            fn index_suffixes(
                &self,
                table: IndexTable,
                prefix: &str,
            ) -> StorageResult<Vec<String>> {
                read_suffixes(&self.open_table(table)?, prefix)
            }

            fn index_keys(&self, table: IndexTable) -> StorageResult<Vec<String>> {
                read_index_keys(&self.open_table(table)?)
            }
        }
    };
}

impl_table_reader!(ReadTransaction);
impl_table_reader!(WriteTransaction);

impl TableWriter for WriteTransaction {
    fn put_json<T: Serialize>(
        &self,
        table: JsonTable,
        key: &str,
        value: &T,
    ) -> StorageResult<()> {
        let json = serde_json::to_vec(value)?;
        let mut table = self.open_table(table)?;
        table.insert(key, json.as_slice())?;
        Ok(())
    }

    fn put_text(&self, table: TextTable, key: &str, value: &str) -> StorageResult<()> {
        let mut table = self.open_table(table)?;
        table.insert(key, value)?;
        Ok(())
    }

    fn put_index(&self, table: IndexTable, key: &str) -> StorageResult<()> {
        let mut table = self.open_table(table)?;
        table.insert(key, ())?;
        Ok(())
    }

    fn remove<V: Value + 'static>(
        &self,
        table: TableDefinition<'static, &'static str, V>,
        key: &str,
    ) -> StorageResult<bool> {
        let mut table = self.open_table(table)?;
        let existed = table.remove(key)?.is_some();
        Ok(existed)
    }
}

// =============================================================================
// VaultDatabase
// =============================================================================

/// Embedded ACID database holding every vault record.
pub struct VaultDatabase {
    db: Database,
    path: PathBuf,
}

impl VaultDatabase {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ACCOUNTS)?;
            let _ = write_txn.open_table(ACCOUNT_KEYS)?;
            let _ = write_txn.open_table(USERNAME_INDEX)?;
            let _ = write_txn.open_table(EMAIL_INDEX)?;
            let _ = write_txn.open_table(EXTERNAL_IDENTITY_INDEX)?;
            let _ = write_txn.open_table(NOTES)?;
            let _ = write_txn.open_table(OWNER_NOTE_INDEX)?;
            let _ = write_txn.open_table(RECIPIENT_NOTE_INDEX)?;
            let _ = write_txn.open_table(FRIEND_REQUESTS)?;
            let _ = write_txn.open_table(ACCOUNT_REQUEST_INDEX)?;
            let _ = write_txn.open_table(AUDIT_EVENTS)?;
            let _ = write_txn.open_table(META)?;
        }
        write_txn.commit()?;

        tracing::debug!(path = %path.display(), "Vault database opened");
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    /// Open `DATABASE_FILE` inside `data_dir`.
    pub fn open_in(data_dir: &Path) -> StorageResult<Self> {
        Self::open(&data_dir.join(DATABASE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn begin_read(&self) -> StorageResult<ReadTransaction> {
        Ok(self.db.begin_read()?)
    }

    /// Start a write transaction. Blocks while another writer is active.
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    /// Write, read back and delete a probe value.
    ///
    /// Returns whether the value read back matched what was written.
    pub fn probe(&self) -> StorageResult<bool> {
        let marker = uuid::Uuid::new_v4().to_string();

        let write_txn = self.begin_write()?;
        write_txn.put_text(META, "health_probe", &marker)?;
        write_txn.commit()?;

        let read_back = self.begin_read()?.get_text(META, "health_probe")?;

        let write_txn = self.begin_write()?;
        write_txn.remove(META, "health_probe")?;
        write_txn.commit()?;

        Ok(read_back.as_deref() == Some(marker.as_str()))
    }
}

// =============================================================================
// Tests
// =============================================================================
