//! Configuration system for policy-gate
//!
//! Loads the project-level `.policy-gate/config.toml` (discovered by
//! walking upward from the working directory), applies `POLICY_GATE_*`
//! environment overrides, and validates the result before the pipeline
//! runs. The engine consumes configuration; it never writes it.

mod discovery;
mod error;
mod model;
mod validation;

pub use discovery::{CONFIG_RELATIVE_PATH, find_repo_root};
pub use error::ConfigError;
pub use model::{
    Config, CoverageGateConfig, CriticalPaths, DEFAULT_CRITICAL_MIN_COVERAGE_PERCENT,
    DEFAULT_LOCK_TIMEOUT_SECS, DEFAULT_MAX_CLASS_LINES, DEFAULT_MAX_METHOD_LINES,
    DEFAULT_MAX_NEW_SUPPRESSIONS, DEFAULT_MIN_COVERAGE_PERCENT, DEFAULT_PRE_COMMIT_DEADLINE_SECS,
    DEFAULT_PRE_PUSH_DEADLINE_SECS, DEFAULT_REPORT_TIMEOUT_SECS,
    GatesConfig, Limits, ReportSource, ReportsConfig, SecretsGateConfig,
    StaticAnalysisGateConfig, StateConfig, StructuralGateConfig, SuppressionDriftGateConfig,
};
