// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Caller Identity
//!
//! Authentication happens outside the vault. The session layer hands every
//! call a [`Session`] naming the account, its verified flag and its role.
//!
//! ## Trust Rules
//!
//! - The account ID is trusted as-is
//! - The verified flag and role are re-checked against the stored account
//!   inside each operation
//! - Admin-only operations require [`Role::Admin`] or higher

pub mod roles;
pub mod session;

pub use roles::Role;
pub use session::Session;
