//! Configuration model
//!
//! The config file declares, per gate, its enabled/blocking flags and
//! threshold overrides; the report file locations per tool; the glob
//! patterns marking critical-path files; and the engine's time budgets.
//! All fields have defaults so an empty file is a valid (if toothless)
//! configuration.

use camino::Utf8PathBuf;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use policy_gate_types::ToolKind;

use crate::error::ConfigError;

/// Default minimum overall unit-test coverage in percent.
pub const DEFAULT_MIN_COVERAGE_PERCENT: f64 = 80.0;

/// Default minimum coverage for critical-path files in percent.
pub const DEFAULT_CRITICAL_MIN_COVERAGE_PERCENT: f64 = 100.0;

/// Default cap on new suppressions per run.
pub const DEFAULT_MAX_NEW_SUPPRESSIONS: u64 = 0;

/// Default class size limit in lines.
pub const DEFAULT_MAX_CLASS_LINES: u64 = 300;

/// Default method size limit in lines.
pub const DEFAULT_MAX_METHOD_LINES: u64 = 20;

/// Default per-report ingestion timeout in seconds.
pub const DEFAULT_REPORT_TIMEOUT_SECS: u64 = 30;

/// Default whole-pipeline deadline for pre-commit runs in seconds.
pub const DEFAULT_PRE_COMMIT_DEADLINE_SECS: u64 = 60;

/// Default whole-pipeline deadline for pre-push runs in seconds.
pub const DEFAULT_PRE_PUSH_DEADLINE_SECS: u64 = 120;

/// Default state-lock acquisition timeout in seconds.
pub const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 5;

/// Location of one external tool's report file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSource {
    /// Report file path, relative paths resolve against the config root
    pub path: Utf8PathBuf,
    /// Whether a missing/unreadable report blocks the run (exit 3)
    #[serde(default = "default_true")]
    pub required: bool,
}

fn default_true() -> bool {
    true
}

/// Report file locations, one optional entry per supported tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportsConfig {
    #[serde(default)]
    pub coverage: Option<ReportSource>,
    #[serde(default)]
    pub pmd: Option<ReportSource>,
    #[serde(default)]
    pub detekt: Option<ReportSource>,
    #[serde(default)]
    pub checkstyle: Option<ReportSource>,
    #[serde(default)]
    pub spotbugs: Option<ReportSource>,
    #[serde(default)]
    pub secret_scan: Option<ReportSource>,
}

impl ReportsConfig {
    /// Configured report sources in a stable order.
    #[must_use]
    pub fn sources(&self) -> Vec<(ToolKind, &ReportSource)> {
        let mut out = Vec::new();
        if let Some(src) = &self.coverage {
            out.push((ToolKind::Coverage, src));
        }
        if let Some(src) = &self.pmd {
            out.push((ToolKind::Pmd, src));
        }
        if let Some(src) = &self.detekt {
            out.push((ToolKind::Detekt, src));
        }
        if let Some(src) = &self.checkstyle {
            out.push((ToolKind::Checkstyle, src));
        }
        if let Some(src) = &self.spotbugs {
            out.push((ToolKind::Spotbugs, src));
        }
        if let Some(src) = &self.secret_scan {
            out.push((ToolKind::SecretScan, src));
        }
        out
    }
}

/// Coverage gate thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageGateConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Minimum overall coverage percent
    #[serde(default = "default_min_coverage")]
    pub min_percent: f64,
    /// Minimum coverage percent for files matching the critical-path globs
    #[serde(default = "default_critical_min")]
    pub critical_min_percent: f64,
}

fn default_min_coverage() -> f64 {
    DEFAULT_MIN_COVERAGE_PERCENT
}

fn default_critical_min() -> f64 {
    DEFAULT_CRITICAL_MIN_COVERAGE_PERCENT
}

impl Default for CoverageGateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_percent: DEFAULT_MIN_COVERAGE_PERCENT,
            critical_min_percent: DEFAULT_CRITICAL_MIN_COVERAGE_PERCENT,
        }
    }
}

/// Static-analysis gate switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticAnalysisGateConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for StaticAnalysisGateConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Secret gate switches. Zero tolerance; there is no threshold to tune.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsGateConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for SecretsGateConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Suppression-drift gate thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressionDriftGateConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum number of new suppressions tolerated per run
    #[serde(default)]
    pub max_new: u64,
}

impl Default for SuppressionDriftGateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_new: DEFAULT_MAX_NEW_SUPPRESSIONS,
        }
    }
}

/// Structural-metric gate thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuralGateConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Advisory by default; set to true to make failures block the commit
    #[serde(default)]
    pub blocking: bool,
    #[serde(default = "default_max_class_lines")]
    pub max_class_lines: u64,
    #[serde(default = "default_max_method_lines")]
    pub max_method_lines: u64,
}

fn default_max_class_lines() -> u64 {
    DEFAULT_MAX_CLASS_LINES
}

fn default_max_method_lines() -> u64 {
    DEFAULT_MAX_METHOD_LINES
}

impl Default for StructuralGateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blocking: false,
            max_class_lines: DEFAULT_MAX_CLASS_LINES,
            max_method_lines: DEFAULT_MAX_METHOD_LINES,
        }
    }
}

/// Per-gate configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatesConfig {
    #[serde(default)]
    pub coverage: CoverageGateConfig,
    #[serde(default)]
    pub static_analysis: StaticAnalysisGateConfig,
    #[serde(default)]
    pub secrets: SecretsGateConfig,
    #[serde(default)]
    pub suppression_drift: SuppressionDriftGateConfig,
    #[serde(default)]
    pub structural: StructuralGateConfig,
}

/// Glob patterns marking critical-path files (payment, auth, ...).
///
/// The source policy names categories, not paths; the mapping is left to
/// each project's configuration rather than guessed from file names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CriticalPaths {
    #[serde(default)]
    pub globs: Vec<String>,
}

impl CriticalPaths {
    /// Compile the patterns into a matcher.
    pub fn build_globset(&self) -> Result<GlobSet, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.globs {
            let glob = Glob::new(pattern).map_err(|e| ConfigError::InvalidGlob {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|e| ConfigError::InvalidGlob {
            pattern: self.globs.join(","),
            reason: e.to_string(),
        })
    }
}

/// Time budgets for the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    /// Per-report ingestion timeout in seconds
    #[serde(default = "default_report_timeout")]
    pub report_timeout_secs: u64,
    /// Whole-pipeline deadline for `--phase pre-commit` in seconds
    #[serde(default = "default_pre_commit_deadline")]
    pub pre_commit_deadline_secs: u64,
    /// Whole-pipeline deadline for `--phase pre-push` in seconds
    #[serde(default = "default_pre_push_deadline")]
    pub pre_push_deadline_secs: u64,
    /// State-lock acquisition timeout in seconds
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_secs: u64,
}

fn default_report_timeout() -> u64 {
    DEFAULT_REPORT_TIMEOUT_SECS
}

fn default_pre_commit_deadline() -> u64 {
    DEFAULT_PRE_COMMIT_DEADLINE_SECS
}

fn default_pre_push_deadline() -> u64 {
    DEFAULT_PRE_PUSH_DEADLINE_SECS
}

fn default_lock_timeout() -> u64 {
    DEFAULT_LOCK_TIMEOUT_SECS
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            report_timeout_secs: DEFAULT_REPORT_TIMEOUT_SECS,
            pre_commit_deadline_secs: DEFAULT_PRE_COMMIT_DEADLINE_SECS,
            pre_push_deadline_secs: DEFAULT_PRE_PUSH_DEADLINE_SECS,
            lock_timeout_secs: DEFAULT_LOCK_TIMEOUT_SECS,
        }
    }
}

/// Locations of engine-owned persisted data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateConfig {
    /// Directory holding per-task workflow state (default `.policy-gate/state`)
    #[serde(default)]
    pub dir: Option<Utf8PathBuf>,
    /// Suppression baseline file (default `.policy-gate/baseline.json`)
    #[serde(default)]
    pub baseline: Option<Utf8PathBuf>,
}

/// Effective engine configuration.
///
/// Built from the config file (if any), then environment overrides, then
/// validated. `root` is the directory relative report and state paths
/// resolve against: the config file's directory, or the discovery start
/// directory when no file was found.
#[derive(Debug, Clone)]
pub struct Config {
    pub reports: ReportsConfig,
    pub gates: GatesConfig,
    pub critical_paths: CriticalPaths,
    pub limits: Limits,
    pub state: StateConfig,
    pub root: Utf8PathBuf,
}

impl Config {
    /// A defaults-only configuration rooted at the given directory.
    #[must_use]
    pub fn defaults_at(root: Utf8PathBuf) -> Self {
        Self {
            reports: ReportsConfig::default(),
            gates: GatesConfig::default(),
            critical_paths: CriticalPaths::default(),
            limits: Limits::default(),
            state: StateConfig::default(),
            root,
        }
    }

    /// Resolve a possibly-relative path against the config root.
    #[must_use]
    pub fn resolve(&self, path: &Utf8PathBuf) -> Utf8PathBuf {
        if path.is_absolute() {
            path.clone()
        } else {
            self.root.join(path)
        }
    }

    /// Effective state directory.
    #[must_use]
    pub fn state_dir(&self) -> Utf8PathBuf {
        match &self.state.dir {
            Some(dir) => self.resolve(dir),
            None => self.root.join(".policy-gate").join("state"),
        }
    }

    /// Effective suppression-baseline path.
    #[must_use]
    pub fn baseline_path(&self) -> Utf8PathBuf {
        match &self.state.baseline {
            Some(path) => self.resolve(path),
            None => self.root.join(".policy-gate").join("baseline.json"),
        }
    }
}
