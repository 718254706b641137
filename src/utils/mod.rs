//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the crate.

pub mod error;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Install the global tracing subscriber described by `config`
///
/// The filter directive comes from `RUST_LOG` when set, otherwise from
/// `config.level`. Calling this twice is an error reported by `try_init`.
pub fn setup_tracing(config: &LoggingConfig) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.level))
        .with_context(|| format!("Invalid log level directive: {}", config.level))?;

    match config.format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("Failed to install tracing subscriber")?,
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .context("Failed to install tracing subscriber")?,
    }

    Ok(())
}

/// Fixed-width (64 hex chars) SHA-256 digest of a string
pub fn sha256_hex(value: &str) -> String {
    let hash = Sha256::digest(value.as_bytes());
    format!("{hash:x}")
}
