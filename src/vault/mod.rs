// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Vault Operations
//!
//! [`Vault`] is the entry point the session and transport layers call into.
//! Operations are grouped by concern:
//!
//! - [`accounts`]: registration, federated provisioning, profiles, deletion
//! - [`keys`]: key custody (public key lookup, the caller's private key)
//! - [`gate`]: caller resolution and the verification gate
//! - [`friends`]: friend requests and the friend graph
//! - [`notes`]: note lifecycle and reads
//! - [`sharing`]: per-recipient sharing
//!
//! ## Transactions
//!
//! Each mutating operation runs in exactly one redb write transaction and
//! commits only on success. Read-only operations use a read snapshot.

pub mod accounts;
pub mod friends;
pub mod gate;
pub mod keys;
pub mod notes;
pub mod sharing;


use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{ReadTransaction, WriteTransaction};
use serde::Serialize;

use crate::config::VaultConfig;
use crate::error::{VaultError, VaultResult};
use crate::storage::{
    integrity, AuditEvent, AuditEventType, AuditRepository, IntegrityReport, StorageError,
    TableReader, TableWriter, VaultDatabase,
};

/// Result of [`Vault::health_check`].
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub database_path: String,
    pub checked_at: DateTime<Utc>,
}

/// Per-recipient note encryption and sharing core.
///
/// Cheap to clone; clones share the same database handle.
#[derive(Clone)]
pub struct Vault {
    db: Arc<VaultDatabase>,
    config: VaultConfig,
}

impl Vault {
    /// Open the vault database in `config.data_dir`.
    pub fn open(config: VaultConfig) -> VaultResult<Self> {
        config
            .validate()
            .map_err(|e| VaultError::InvalidInput(e.to_string()))?;
        let db = VaultDatabase::open(&config.database_path())?;
        tracing::info!(path = %db.path().display(), "Vault opened");
        Ok(Self {
            db: Arc::new(db),
            config,
        })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Write-read-delete probe against the database.
    pub fn health_check(&self) -> VaultResult<HealthStatus> {
        let healthy = self.db.probe()?;
        if !healthy {
            tracing::warn!("Database probe read back a different value");
        }
        Ok(HealthStatus {
            healthy,
            database_path: self.db.path().display().to_string(),
            checked_at: Utc::now(),
        })
    }

    /// Scan the whole store for broken invariants.
    pub fn integrity_report(&self) -> VaultResult<IntegrityReport> {
        let txn = self.db.begin_read()?;
        let report = integrity::scan(&txn)?;
        tracing::info!(
            accounts = report.accounts,
            notes = report.notes,
            friend_requests = report.friend_requests,
            findings = report.findings.len(),
            "Integrity scan finished"
        );
        Ok(report)
    }

    // =========================================================================
    // Transaction plumbing
    // =========================================================================

    /// Run `op` in a write transaction, committing only if it succeeds.
    pub(crate) fn write<R>(
        &self,
        operation: &'static str,
        actor: Option<&str>,
        op: impl FnOnce(&WriteTransaction) -> VaultResult<R>,
    ) -> VaultResult<R> {
        let txn = self.db.begin_write()?;
        match op(&txn) {
            Ok(value) => {
                txn.commit().map_err(StorageError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(abort_err) = txn.abort() {
                    tracing::warn!(operation, error = %abort_err, "Transaction abort failed");
                }
                self.report_violation(operation, actor, &err);
                Err(err)
            }
        }
    }

    /// Run `op` against a read snapshot.
    pub(crate) fn read<R>(
        &self,
        operation: &'static str,
        actor: Option<&str>,
        op: impl FnOnce(&ReadTransaction) -> VaultResult<R>,
    ) -> VaultResult<R> {
        let txn = self.db.begin_read()?;
        let result = op(&txn);
        if let Err(err) = &result {
            self.report_violation(operation, actor, err);
        }
        result
    }

    /// Log an integrity violation and record it in the audit trail.
    ///
    /// Runs after the failed transaction was aborted, in a transaction of
    /// its own.
    fn report_violation(&self, operation: &'static str, actor: Option<&str>, err: &VaultError) {
        if !err.is_integrity_violation() {
            return;
        }
        tracing::error!(
            target: "notevault::integrity",
            operation,
            account_id = actor.unwrap_or("-"),
            error = %err,
            "Integrity violation"
        );

        let mut event = AuditEvent::new(AuditEventType::IntegrityViolation)
            .with_details(serde_json::json!({ "operation": operation }))
            .failed(err.to_string());
        if let Some(actor) = actor {
            event = event.with_account(actor);
        }
        let logged = self.db.begin_write().and_then(|txn| {
            AuditRepository::new(&txn).log(&event)?;
            txn.commit().map_err(StorageError::from)
        });
        if let Err(log_err) = logged {
            tracing::warn!(error = %log_err, "Failed to record integrity violation");
        }
    }
}

/// Append an audit event inside the current write transaction.
pub(crate) fn audit<T: TableReader + TableWriter>(txn: &T, event: AuditEvent) -> VaultResult<()> {
    AuditRepository::new(txn).log(&event)?;
    Ok(())
}
