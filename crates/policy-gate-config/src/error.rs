//! Configuration errors
//!
//! Config errors are fatal: they abort the run before any report is read
//! or any gate is evaluated, and map to exit code 3.

use std::path::PathBuf;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid config value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Invalid critical-path glob '{pattern}': {reason}")]
    InvalidGlob { pattern: String, reason: String },

    #[error("Invalid environment override {var}='{value}': {reason}")]
    InvalidEnvOverride {
        var: String,
        value: String,
        reason: String,
    },
}
