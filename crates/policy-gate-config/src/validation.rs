//! Configuration validation
//!
//! Validation runs once at load time; the rest of the engine can assume a
//! well-formed config. Percent thresholds stay in [0, 100], limits are
//! non-zero, and critical-path globs must compile.

use crate::error::ConfigError;
use crate::model::Config;

impl Config {
    /// Validate configuration values.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        validate_percent("gates.coverage.min_percent", self.gates.coverage.min_percent)?;
        validate_percent(
            "gates.coverage.critical_min_percent",
            self.gates.coverage.critical_min_percent,
        )?;

        if self.gates.structural.max_class_lines == 0 {
            return Err(ConfigError::InvalidValue {
                key: "gates.structural.max_class_lines".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.gates.structural.max_method_lines == 0 {
            return Err(ConfigError::InvalidValue {
                key: "gates.structural.max_method_lines".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.limits.report_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "limits.report_timeout_secs".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.limits.pre_commit_deadline_secs == 0 || self.limits.pre_push_deadline_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "limits.*_deadline_secs".to_string(),
                reason: "deadlines must be greater than 0".to_string(),
            });
        }
        if self.limits.lock_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "limits.lock_timeout_secs".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        // Compile once here so later pipeline stages cannot hit glob errors.
        self.critical_paths.build_globset()?;

        Ok(())
    }
}

fn validate_percent(key: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=100.0).contains(&value) || value.is_nan() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("{value} is outside the valid range 0-100"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CriticalPaths, GatesConfig, Limits, ReportsConfig, StateConfig};
    use camino::Utf8PathBuf;

    fn base_config() -> Config {
        Config {
            reports: ReportsConfig::default(),
            gates: GatesConfig::default(),
            critical_paths: CriticalPaths::default(),
            limits: Limits::default(),
            state: StateConfig::default(),
            root: Utf8PathBuf::from("."),
        }
    }

    #[test]
    fn test_default_config_validates() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_coverage_threshold_must_be_a_percentage() {
        let mut config = base_config();
        config.gates.coverage.min_percent = 120.0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        config.gates.coverage.min_percent = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        let mut config = base_config();
        config.limits.lock_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = base_config();
        config.limits.report_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_critical_glob_is_rejected() {
        let mut config = base_config();
        config.critical_paths.globs = vec!["src/[".to_string()];
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidGlob { .. }));
    }
}
