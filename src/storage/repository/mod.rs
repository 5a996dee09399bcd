// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the vault database.
//!
//! Each repository borrows a read or write transaction. Reads work on
//! either kind; writes need a write transaction, so a repository built on a
//! read snapshot cannot mutate by construction.

pub mod accounts;
pub mod friend_requests;
pub mod notes;

pub use accounts::{normalize_email, username_key, AccountRepository};
pub use friend_requests::FriendRequestRepository;
pub use notes::NoteRepository;
