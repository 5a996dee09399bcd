// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ownership enforcement for owner-only operations.
//!
//! Title, content, format, trash state and sharing of a note may only be
//! changed by its owner. Every such path goes through
//! [`OwnershipEnforcer::verify_ownership`].

use crate::error::{VaultError, VaultResult};
use crate::models::Note;

/// Trait for resources that have an owner.
pub trait OwnedResource {
    /// Get the owner's account ID.
    fn owner_account_id(&self) -> &str;

    /// ID used in error messages.
    fn resource_id(&self) -> &str;
}

/// Trait for enforcing ownership on storage operations.
pub trait OwnershipEnforcer {
    /// Verify that the account owns this resource.
    ///
    /// # Errors
    /// Returns `VaultError::NotOwner` if the account doesn't own the resource.
    fn verify_ownership(&self, account_id: &str) -> VaultResult<()>;
}

impl<T: OwnedResource> OwnershipEnforcer for T {
    fn verify_ownership(&self, account_id: &str) -> VaultResult<()> {
        if self.owner_account_id() == account_id {
            Ok(())
        } else {
            Err(VaultError::NotOwner(self.resource_id().to_string()))
        }
    }
}

impl OwnedResource for Note {
    fn owner_account_id(&self) -> &str {
        &self.owner_id
    }

    fn resource_id(&self) -> &str {
        &self.note_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestResource {
        owner: String,
    }

    impl OwnedResource for TestResource {
        fn owner_account_id(&self) -> &str {
            &self.owner
        }

        fn resource_id(&self) -> &str {
            "res-1"
        }
    }

    #[test]
    fn owner_passes_verification() {
        let resource = TestResource {
            owner: "acct-123".to_string(),
        };
        assert!(resource.verify_ownership("acct-123").is_ok());
    }

    #[test]
    fn non_owner_fails_verification() {
        let resource = TestResource {
            owner: "acct-123".to_string(),
        };
        let err = resource.verify_ownership("acct-456").unwrap_err();
        assert!(matches!(err, VaultError::NotOwner(ref id) if id == "res-1"));
    }
}
