// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The authenticated caller as handed over by the session layer.

use serde::{Deserialize, Serialize};

use super::roles::Role;

/// Authenticated caller of a vault operation.
///
/// The vault trusts `account_id` and does not re-authenticate. `verified`
/// and `role` are hints only: every operation reloads the account record and
/// combines them with the stored values, so a stale session can lose
/// privileges but never gain them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Canonical account ID
    pub account_id: String,
    /// Verified flag as known to the session layer
    pub verified: bool,
    /// Role as known to the session layer
    #[serde(default)]
    pub role: Role,
}

impl Session {
    /// Session for a regular account.
    pub fn user(account_id: impl Into<String>, verified: bool) -> Self {
        Self {
            account_id: account_id.into(),
            verified,
            role: Role::User,
        }
    }

    /// Session carrying an elevated role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_session_defaults_to_user_role() {
        let session = Session::user("acct-1", true);
        assert_eq!(session.account_id, "acct-1");
        assert!(session.verified);
        assert_eq!(session.role, Role::User);
    }

    #[test]
    fn role_defaults_when_missing_from_json() {
        let session: Session =
            serde_json::from_str(r#"{"account_id":"a","verified":false}"#).unwrap();
        assert_eq!(session.role, Role::User);
        assert_eq!(
            Session::user("a", false).with_role(Role::Admin).role,
            Role::Admin
        );
    }
}
