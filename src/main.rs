// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Maintenance entry point: opens the vault, probes the database and runs
//! the integrity scan. Prints a JSON summary on stdout.
//!
//! Exit codes: 0 clean, 1 findings or unhealthy database, 2 startup failure.

use std::process::ExitCode;

use notevault::telemetry::init_tracing;
use notevault::{Vault, VaultConfig};

fn main() -> ExitCode {
    let config = match VaultConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {err}");
            return ExitCode::from(2);
        }
    };
    init_tracing(config.log_format);

    let vault = match Vault::open(config) {
        Ok(vault) => vault,
        Err(err) => {
            tracing::error!(error = %err, "Failed to open vault");
            return ExitCode::from(2);
        }
    };

    let health = match vault.health_check() {
        Ok(health) => health,
        Err(err) => {
            tracing::error!(error = %err, "Health check failed");
            return ExitCode::from(2);
        }
    };
    let report = match vault.integrity_report() {
        Ok(report) => report,
        Err(err) => {
            tracing::error!(error = %err, "Integrity scan failed");
            return ExitCode::from(2);
        }
    };

    let summary = serde_json::json!({
        "health": health,
        "integrity": report,
    });
    match serde_json::to_string_pretty(&summary) {
        Ok(text) => println!("{text}"),
        Err(err) => {
            tracing::error!(error = %err, "Failed to render summary");
            return ExitCode::from(2);
        }
    }

    if health.healthy && report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
