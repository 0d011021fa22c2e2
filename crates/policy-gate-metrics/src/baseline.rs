//! Suppression baseline persistence
//!
//! The baseline records the justified suppression identities that were
//! accepted at some point in the past. Aggregation compares the current
//! run against it to detect drift; `baseline update` rewrites it.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum BaselineError {
    #[error("baseline file {path} is not valid JSON: {reason}")]
    Corrupted { path: String, reason: String },

    #[error("baseline I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Accepted suppression identities (`rule_id:file:line`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressionBaseline {
    #[serde(default)]
    suppressions: BTreeSet<String>,
}

impl SuppressionBaseline {
    #[must_use]
    pub fn from_identities(identities: Vec<String>) -> Self {
        Self {
            suppressions: identities.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn contains(&self, identity: &str) -> bool {
        self.suppressions.contains(identity)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.suppressions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.suppressions.is_empty()
    }

    /// Load the baseline, treating a missing file as an empty baseline.
    pub fn load(path: &Utf8Path) -> Result<Self, BaselineError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(%path, "no baseline file, starting empty");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(BaselineError::Io {
                    path: path.to_string(),
                    source: e,
                });
            }
        };
        serde_json::from_slice(&bytes).map_err(|e| BaselineError::Corrupted {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// Persist the baseline via write-to-temp plus rename.
    pub fn save(&self, path: &Utf8Path) -> Result<(), BaselineError> {
        let io_err = |source| BaselineError::Io {
            path: path.to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_vec_pretty(self).map_err(|e| BaselineError::Corrupted {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp).map_err(io_err)?;
            file.write_all(&json).map_err(io_err)?;
            file.sync_all().map_err(io_err)?;
        }
        fs::rename(&tmp, path).map_err(io_err)?;
        debug!(%path, count = self.suppressions.len(), "baseline written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use camino::Utf8PathBuf;

    fn temp_path(dir: &tempfile::TempDir, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap()
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let baseline = SuppressionBaseline::load(&temp_path(&dir, "baseline.json")).unwrap();
        assert!(baseline.is_empty());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "nested/baseline.json");
        let baseline = SuppressionBaseline::from_identities(vec![
            "RuleA:src/a.java:10".to_string(),
            "RuleB:src/b.java:20".to_string(),
        ]);
        baseline.save(&path).unwrap();

        let loaded = SuppressionBaseline::load(&path).unwrap();
        assert_eq!(loaded, baseline);
        assert!(loaded.contains("RuleA:src/a.java:10"));
        assert!(!loaded.contains("RuleC:src/c.java:30"));
    }

    #[test]
    fn test_corrupted_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "baseline.json");
        std::fs::write(&path, b"not json").unwrap();
        let err = SuppressionBaseline::load(&path).unwrap_err();
        assert!(matches!(err, BaselineError::Corrupted { .. }));
    }
}
