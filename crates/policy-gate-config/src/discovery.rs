//! Config file discovery and environment overrides
//!
//! Precedence: environment overrides > config file > built-in defaults.
//! The config file is discovered by searching upward from the start
//! directory for `.policy-gate/config.toml`, stopping at the repository
//! root (`.git` marker) or after a bounded number of parents.

use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;
use crate::model::{Config, CriticalPaths, GatesConfig, Limits, ReportsConfig, StateConfig};

/// Relative location of the config file inside a project.
pub const CONFIG_RELATIVE_PATH: &str = ".policy-gate/config.toml";

/// How many parent directories discovery walks before giving up.
const MAX_DISCOVERY_DEPTH: usize = 10;

/// On-disk TOML structure. Every section is optional.
#[derive(Debug, Default, Deserialize)]
struct TomlConfig {
    #[serde(default)]
    reports: ReportsConfig,
    #[serde(default)]
    gates: GatesConfig,
    #[serde(default)]
    critical_paths: CriticalPaths,
    #[serde(default)]
    limits: Limits,
    #[serde(default)]
    state: StateConfig,
}

impl Config {
    /// Load configuration for the current working directory.
    pub fn load(explicit: Option<&Utf8Path>) -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().map_err(|e| ConfigError::Read {
            path: ".".into(),
            source: e,
        })?;
        let cwd = Utf8PathBuf::from_path_buf(cwd).map_err(|p| ConfigError::InvalidValue {
            key: "cwd".to_string(),
            reason: format!("not valid UTF-8: {}", p.display()),
        })?;
        Self::load_from(&cwd, explicit)
    }

    /// Load configuration starting discovery from a specific directory.
    ///
    /// Path-driven variant used by tests to avoid process-global state.
    pub fn load_from(start_dir: &Utf8Path, explicit: Option<&Utf8Path>) -> Result<Self, ConfigError> {
        let (file, root) = match explicit {
            Some(path) => {
                if !path.as_std_path().exists() {
                    return Err(ConfigError::NotFound {
                        path: path.as_std_path().to_path_buf(),
                    });
                }
                // For `<root>/.policy-gate/config.toml` the root is two levels
                // up; an arbitrary explicit path roots at its own directory.
                let parent = path.parent().unwrap_or(start_dir);
                let root = if parent.file_name() == Some(".policy-gate") {
                    parent.parent().unwrap_or(start_dir).to_path_buf()
                } else {
                    parent.to_path_buf()
                };
                (Some(path.to_path_buf()), root)
            }
            None => match discover_config_file(start_dir) {
                Some(path) => {
                    // config lives at <root>/.policy-gate/config.toml
                    let root = path
                        .parent()
                        .and_then(Utf8Path::parent)
                        .unwrap_or(start_dir)
                        .to_path_buf();
                    (Some(path), root)
                }
                None => (None, start_dir.to_path_buf()),
            },
        };

        let toml_config = match &file {
            Some(path) => {
                debug!(config = %path, "Loading config file");
                parse_config_file(path)?
            }
            None => {
                debug!(start = %start_dir, "No config file found, using defaults");
                TomlConfig::default()
            }
        };

        let mut config = Config {
            reports: toml_config.reports,
            gates: toml_config.gates,
            critical_paths: toml_config.critical_paths,
            limits: toml_config.limits,
            state: toml_config.state,
            root,
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }
}

fn parse_config_file(path: &Utf8Path) -> Result<TomlConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.as_std_path().to_path_buf(),
        source: e,
    })?;
    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.as_std_path().to_path_buf(),
        reason: e.to_string(),
    })
}

/// Search upward from `start_dir` for `.policy-gate/config.toml`.
///
/// Stops at the repository root: a directory containing `.git` is the last
/// one considered.
fn discover_config_file(start_dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let mut current = start_dir.to_path_buf();
    for _ in 0..MAX_DISCOVERY_DEPTH {
        let candidate = current.join(CONFIG_RELATIVE_PATH);
        if candidate.as_std_path().exists() {
            return Some(candidate);
        }
        let at_repo_root = current.join(".git").as_std_path().exists();
        if at_repo_root || !pop_parent(&mut current) {
            return None;
        }
    }
    None
}

fn pop_parent(path: &mut Utf8PathBuf) -> bool {
    match path.parent() {
        Some(parent) if parent != path.as_path() => {
            *path = parent.to_path_buf();
            true
        }
        _ => false,
    }
}

/// Apply `POLICY_GATE_*` environment overrides to a loaded config.
fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    if let Some(dir) = env_var("POLICY_GATE_STATE_DIR") {
        config.state.dir = Some(Utf8PathBuf::from(dir));
    }
    if let Some(path) = env_var("POLICY_GATE_BASELINE") {
        config.state.baseline = Some(Utf8PathBuf::from(path));
    }
    if let Some(value) = env_var("POLICY_GATE_MIN_COVERAGE") {
        config.gates.coverage.min_percent = parse_env("POLICY_GATE_MIN_COVERAGE", &value)?;
    }
    if let Some(value) = env_var("POLICY_GATE_MAX_NEW_SUPPRESSIONS") {
        config.gates.suppression_drift.max_new =
            parse_env("POLICY_GATE_MAX_NEW_SUPPRESSIONS", &value)?;
    }
    if let Some(value) = env_var("POLICY_GATE_REPORT_TIMEOUT_SECS") {
        config.limits.report_timeout_secs = parse_env("POLICY_GATE_REPORT_TIMEOUT_SECS", &value)?;
    }
    if let Some(value) = env_var("POLICY_GATE_LOCK_TIMEOUT_SECS") {
        config.limits.lock_timeout_secs = parse_env("POLICY_GATE_LOCK_TIMEOUT_SECS", &value)?;
    }
    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidEnvOverride {
        var: var.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Find the repository root by walking upward looking for `.git`.
///
/// Falls back to `start` when no repository marker is found.
pub fn find_repo_root(start: &Path) -> std::path::PathBuf {
    let mut current = start.to_path_buf();
    for _ in 0..MAX_DISCOVERY_DEPTH {
        if current.join(".git").exists() {
            return current;
        }
        if !current.pop() {
            break;
        }
    }
    start.to_path_buf()
}
