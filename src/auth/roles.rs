// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account roles for authorization.

use serde::{Deserialize, Serialize};

/// Account roles for authorization.
///
/// ## Role Hierarchy
///
/// - `SuperAdmin` - Everything an admin can do
/// - `Admin` - Account verification, account listing, audit trail
/// - `User` - Own notes, friends and shares only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Normal account (least privilege)
    #[default]
    User,
    /// Administrative access
    Admin,
    /// Administrative access, may also manage admins
    SuperAdmin,
}

impl Role {
    /// Check if this role has at least the privileges of the required role.
    pub fn has_privilege(&self, required: Role) -> bool {
        match (self, required) {
            (Role::SuperAdmin, _) => true,
            (Role::Admin, Role::Admin | Role::User) => true,
            (Role::User, Role::User) => true,
            _ => false,
        }
    }

    /// Whether the role carries admin privileges.
    pub fn is_admin(&self) -> bool {
        self.has_privilege(Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
            Role::SuperAdmin => write!(f, "superadmin"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superadmin_has_all_privileges() {
        assert!(Role::SuperAdmin.has_privilege(Role::SuperAdmin));
        assert!(Role::SuperAdmin.has_privilege(Role::Admin));
        assert!(Role::SuperAdmin.has_privilege(Role::User));
    }

    #[test]
    fn admin_is_below_superadmin() {
        assert!(!Role::Admin.has_privilege(Role::SuperAdmin));
        assert!(Role::Admin.has_privilege(Role::Admin));
        assert!(Role::Admin.has_privilege(Role::User));
    }

    #[test]
    fn user_only_has_user_privilege() {
        assert!(Role::User.has_privilege(Role::User));
        assert!(!Role::User.has_privilege(Role::Admin));
        assert!(!Role::User.is_admin());
        assert!(Role::SuperAdmin.is_admin());
    }

    #[test]
    fn display_matches_serde_names() {
        for role in [Role::User, Role::Admin, Role::SuperAdmin] {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{role}\""));
        }
    }

    #[test]
    fn default_role_is_user() {
        assert_eq!(Role::default(), Role::User);
    }
}
