// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Caller resolution and the verification gate.
//!
//! The caller's account is reloaded inside every operation's transaction.
//! The effective verified flag is `session.verified && record.verified`;
//! admin rights need both the session role and the stored role.

use crate::auth::Session;
use crate::error::{VaultError, VaultResult};
use crate::models::{AccountRecord, NoteFormat};
use crate::storage::{AccountRepository, NoteRepository, TableReader};

/// The authenticated caller, as seen inside one operation.
#[derive(Debug, Clone)]
pub(crate) struct Caller {
    pub(crate) record: AccountRecord,
    verified: bool,
    admin: bool,
}

impl Caller {
    pub(crate) fn id(&self) -> &str {
        &self.record.account_id
    }

    pub(crate) fn is_verified(&self) -> bool {
        self.verified
    }

    /// Reject unverified callers.
    pub(crate) fn require_verified(&self) -> VaultResult<()> {
        if self.verified {
            Ok(())
        } else {
            Err(VaultError::VerificationRequired)
        }
    }

    pub(crate) fn require_admin(&self) -> VaultResult<()> {
        if self.admin {
            Ok(())
        } else {
            Err(VaultError::AdminRequired)
        }
    }

    /// Unverified callers may only create or edit plain notes.
    pub(crate) fn check_format(&self, format: NoteFormat) -> VaultResult<()> {
        if self.verified || format == NoteFormat::Plain {
            Ok(())
        } else {
            Err(VaultError::FormatNotAllowed(format))
        }
    }
}

/// Load the caller's account and combine it with the session.
pub(crate) fn resolve_caller<T: TableReader>(txn: &T, session: &Session) -> VaultResult<Caller> {
    let record = AccountRepository::new(txn)
        .get(&session.account_id)?
        .ok_or_else(|| VaultError::AccountNotFound(session.account_id.clone()))?;

    let verified = session.verified && record.verified;
    let admin = session.role.is_admin() && record.role.is_admin();
    Ok(Caller {
        record,
        verified,
        admin,
    })
}

/// Gate for note creation: format first, then the note count.
pub(crate) fn check_creation<T: TableReader>(
    txn: &T,
    caller: &Caller,
    format: NoteFormat,
    unverified_limit: usize,
) -> VaultResult<()> {
    caller.check_format(format)?;
    if caller.is_verified() {
        return Ok(());
    }
    let owned = NoteRepository::new(txn).count_owned(caller.id())?;
    if owned >= unverified_limit {
        return Err(VaultError::LimitExceeded {
            limit: unverified_limit,
        });
    }
    Ok(())
}
