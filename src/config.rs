// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! [`VaultConfig`] is loaded once by the embedding process and passed into
//! [`crate::vault::Vault::open`]. Nothing in the crate reads the environment
//! on its own.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Directory holding `notevault.redb` | `./data` |
//! | `RSA_KEY_BITS` | Modulus size for new keypairs (min 2048) | `2048` |
//! | `UNVERIFIED_NOTE_LIMIT` | Notes an unverified account may own | `1` |
//! | `MAX_TITLE_CHARS` | Title length limit in characters | `100` |
//! | `MAX_CONTENT_BYTES` | Content size limit in bytes | `262144` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::path::PathBuf;

use crate::crypto::{MAX_PLAINTEXT_BYTES, MIN_KEY_BITS};
use crate::storage::database::DATABASE_FILE;
use crate::telemetry::LogFormat;

/// Environment variable name for the data directory.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const RSA_KEY_BITS_ENV: &str = "RSA_KEY_BITS";
pub const UNVERIFIED_NOTE_LIMIT_ENV: &str = "UNVERIFIED_NOTE_LIMIT";
pub const MAX_TITLE_CHARS_ENV: &str = "MAX_TITLE_CHARS";
pub const MAX_CONTENT_BYTES_ENV: &str = "MAX_CONTENT_BYTES";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_RSA_KEY_BITS: usize = 2048;
const DEFAULT_UNVERIFIED_NOTE_LIMIT: usize = 1;
const DEFAULT_MAX_TITLE_CHARS: usize = 100;
const DEFAULT_MAX_CONTENT_BYTES: usize = 256 * 1024;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}='{value}' is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Vault configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    pub data_dir: PathBuf,
    pub rsa_key_bits: usize,
    pub unverified_note_limit: usize,
    pub max_title_chars: usize,
    pub max_content_bytes: usize,
    pub log_format: LogFormat,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            rsa_key_bits: DEFAULT_RSA_KEY_BITS,
            unverified_note_limit: DEFAULT_UNVERIFIED_NOTE_LIMIT,
            max_title_chars: DEFAULT_MAX_TITLE_CHARS,
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
            log_format: LogFormat::Pretty,
        }
    }
}

impl VaultConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup(RSA_KEY_BITS_ENV) {
            config.rsa_key_bits = parse_usize(RSA_KEY_BITS_ENV, &value)?;
        }
        if let Some(value) = lookup(UNVERIFIED_NOTE_LIMIT_ENV) {
            config.unverified_note_limit = parse_usize(UNVERIFIED_NOTE_LIMIT_ENV, &value)?;
        }
        if let Some(value) = lookup(MAX_TITLE_CHARS_ENV) {
            config.max_title_chars = parse_usize(MAX_TITLE_CHARS_ENV, &value)?;
        }
        if let Some(value) = lookup(MAX_CONTENT_BYTES_ENV) {
            config.max_content_bytes = parse_usize(MAX_CONTENT_BYTES_ENV, &value)?;
        }
        if let Some(value) = lookup(LOG_FORMAT_ENV) {
            config.log_format = LogFormat::parse(&value).ok_or_else(|| ConfigError::Invalid {
                var: LOG_FORMAT_ENV,
                value: value.clone(),
                reason: "expected 'json' or 'pretty'".into(),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rsa_key_bits < MIN_KEY_BITS {
            return Err(ConfigError::Invalid {
                var: RSA_KEY_BITS_ENV,
                value: self.rsa_key_bits.to_string(),
                reason: format!("must be at least {MIN_KEY_BITS}"),
            });
        }
        if self.max_title_chars == 0 {
            return Err(ConfigError::Invalid {
                var: MAX_TITLE_CHARS_ENV,
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }
        if self.max_content_bytes == 0 || self.max_content_bytes > MAX_PLAINTEXT_BYTES {
            return Err(ConfigError::Invalid {
                var: MAX_CONTENT_BYTES_ENV,
                value: self.max_content_bytes.to_string(),
                reason: format!("must be between 1 and {MAX_PLAINTEXT_BYTES}"),
            });
        }
        Ok(())
    }

    /// Full path of the database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }
}

fn parse_usize(var: &'static str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: "expected a non-negative integer".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = VaultConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, VaultConfig::default());
        assert_eq!(config.database_path(), PathBuf::from("./data/notevault.redb"));
    }

    #[test]
    fn reads_every_variable() {
        let config = VaultConfig::from_lookup(lookup(&[
            ("DATA_DIR", "/srv/vault"),
            ("RSA_KEY_BITS", "3072"),
            ("UNVERIFIED_NOTE_LIMIT", "2"),
            ("MAX_TITLE_CHARS", "50"),
            ("MAX_CONTENT_BYTES", "1024"),
            ("LOG_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/srv/vault"));
        assert_eq!(config.rsa_key_bits, 3072);
        assert_eq!(config.unverified_note_limit, 2);
        assert_eq!(config.max_title_chars, 50);
        assert_eq!(config.max_content_bytes, 1024);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn rejects_weak_keys() {
        let err = VaultConfig::from_lookup(lookup(&[("RSA_KEY_BITS", "1024")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "RSA_KEY_BITS", .. }));
    }

    #[test]
    fn rejects_garbage_numbers_and_formats() {
        assert!(VaultConfig::from_lookup(lookup(&[("MAX_TITLE_CHARS", "many")])).is_err());
        assert!(VaultConfig::from_lookup(lookup(&[("LOG_FORMAT", "xml")])).is_err());
    }

    #[test]
    fn content_limit_is_capped_by_envelope_capacity() {
        let too_big = (MAX_PLAINTEXT_BYTES + 1).to_string();
        let err =
            VaultConfig::from_lookup(lookup(&[("MAX_CONTENT_BYTES", too_big.as_str())])).unwrap_err();
        assert!(err.to_string().contains("MAX_CONTENT_BYTES"));
    }
}
