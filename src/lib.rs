// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! NoteVault - Per-Recipient Note Encryption and Sharing
//!
//! Every account owns an RSA keypair. A note is disclosed to a friend by
//! sealing a copy of its title and content for that friend's public key;
//! removing the copy revokes access.
//!
//! ## Modules
//!
//! - `auth` - Session handed in by the external auth layer, roles
//! - `config` - Runtime configuration
//! - `crypto` - Keypairs and the hybrid RSA-OAEP / AES-256-GCM envelope
//! - `storage` - redb persistence, audit trail, integrity scan
//! - `vault` - The operations: accounts, friends, notes, sharing

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod models;
pub mod storage;
pub mod telemetry;
pub mod vault;

pub use auth::{Role, Session};
pub use config::VaultConfig;
pub use error::{VaultError, VaultResult};
pub use vault::{HealthStatus, Vault};
