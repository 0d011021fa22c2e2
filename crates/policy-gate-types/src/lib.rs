//! Shared data model for the policy-gate engine
//!
//! This crate defines the normalized types that flow through the pipeline:
//! findings parsed from external tool reports, per-tool reports, gate
//! verdicts, and the TDD workflow phase. Aggregation and evaluation logic
//! live in the downstream crates; everything here is plain data.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// External tool whose report feeds the engine.
///
/// The engine never runs these tools itself; it only parses the report
/// files they leave behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ToolKind {
    Coverage,
    Pmd,
    Detekt,
    Checkstyle,
    Spotbugs,
    SecretScan,
}

/// Normalized finding severity.
///
/// Ordered most severe first so `BTreeMap<Severity, _>` iterates in the
/// order reports are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

/// One normalized issue from an external tool report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Tool-specific rule identifier (e.g. `ExcessiveMethodLength`)
    pub rule_id: String,
    /// Normalized severity
    pub severity: Severity,
    /// File the finding points at, as reported by the tool
    pub file: String,
    /// 1-based line number, 0 when the tool reports none
    pub line: u64,
    /// Human-readable message from the tool
    pub message: String,
    /// Whether the tool reported this finding as suppressed
    pub suppressed: bool,
    /// Justification attached to the suppression, if any
    pub suppression_justification: Option<String>,
}

impl Finding {
    /// Identity used for suppression-drift tracking across runs.
    ///
    /// Two suppressions are "the same" when rule, file and line match.
    #[must_use]
    pub fn suppression_identity(&self) -> String {
        format!("{}:{}:{}", self.rule_id, self.file, self.line)
    }

    /// True when the suppression carries a non-empty justification.
    ///
    /// Undocumented suppressions are treated as ordinary violations and
    /// never grandfather into a baseline.
    #[must_use]
    pub fn is_justified_suppression(&self) -> bool {
        self.suppressed
            && self
                .suppression_justification
                .as_deref()
                .is_some_and(|j| !j.trim().is_empty())
    }
}

/// Per-file line coverage parsed from a coverage report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCoverage {
    /// Source path as reported by the coverage tool
    pub path: String,
    /// Lines instrumented in this file
    pub lines_valid: u64,
    /// Lines with at least one hit
    pub lines_covered: u64,
}

impl FileCoverage {
    /// Coverage percentage for this file, `None` when nothing was instrumented.
    #[must_use]
    pub fn percent(&self) -> Option<f64> {
        if self.lines_valid == 0 {
            None
        } else {
            Some(self.lines_covered as f64 * 100.0 / self.lines_valid as f64)
        }
    }
}

/// Coverage figures carried by a coverage `ToolReport`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageData {
    /// Overall line coverage in percent (0-100)
    pub line_percent: f64,
    /// Total covered lines across the report
    pub lines_covered: u64,
    /// Total instrumented lines across the report
    pub lines_valid: u64,
    /// Per-file breakdown used for critical-path aggregation
    pub files: Vec<FileCoverage>,
}

/// Raw parsed output from one external tool.
///
/// Created per ingestion run and discarded after aggregation; never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolReport {
    /// Which tool produced the report
    pub tool: ToolKind,
    /// Report file the findings were parsed from
    pub source_path: Utf8PathBuf,
    /// Normalized findings, in document order
    pub findings: Vec<Finding>,
    /// Coverage figures, present only for `ToolKind::Coverage`
    pub coverage: Option<CoverageData>,
}

impl ToolReport {
    /// Create a findings-only report.
    #[must_use]
    pub fn new(tool: ToolKind, source_path: Utf8PathBuf, findings: Vec<Finding>) -> Self {
        Self {
            tool,
            source_path,
            findings,
            coverage: None,
        }
    }

    /// Create a coverage report.
    #[must_use]
    pub fn with_coverage(source_path: Utf8PathBuf, coverage: CoverageData) -> Self {
        Self {
            tool: ToolKind::Coverage,
            source_path,
            findings: Vec::new(),
            coverage: Some(coverage),
        }
    }
}

/// Result of one gate evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateVerdict {
    /// Gate name (stable identifier, e.g. `coverage`)
    pub gate: String,
    /// Whether the gate passed
    pub passed: bool,
    /// Whether a failure of this verdict blocks the commit
    pub blocking: bool,
    /// Human-readable reasons, failures first
    pub reasons: Vec<String>,
}

impl GateVerdict {
    /// A passing verdict with no reasons.
    #[must_use]
    pub fn pass(gate: &str, blocking: bool) -> Self {
        Self {
            gate: gate.to_string(),
            passed: true,
            blocking,
            reasons: Vec::new(),
        }
    }

    /// A failing verdict with the given reasons.
    #[must_use]
    pub fn fail(gate: &str, blocking: bool, reasons: Vec<String>) -> Self {
        Self {
            gate: gate.to_string(),
            passed: false,
            blocking,
            reasons,
        }
    }

    /// True when this verdict alone forbids the commit.
    #[must_use]
    pub fn blocks(&self) -> bool {
        self.blocking && !self.passed
    }
}

/// TDD workflow phase of the current task.
///
/// Legal transitions are enforced by the state machine in
/// `policy-gate-state`; this is only the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    Stopped,
    Red,
    Green,
    Refactoring,
}

impl Phase {
    /// Whether a commit is permitted from this phase.
    ///
    /// Committing from `Red` would commit failing tests; committing from
    /// `Stopped` means no task was ever started.
    #[must_use]
    pub const fn permits_commit(self) -> bool {
        matches!(self, Self::Green | Self::Refactoring)
    }
}

/// Outcome of the workflow-state check, carried in the final decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateCheck {
    /// Whether the current phase permits the commit
    pub passed: bool,
    /// Phase observed at check time
    pub phase: Phase,
    /// Reason the check failed, if it did
    pub reason: Option<String>,
}

impl StateCheck {
    /// A passing check for the given phase.
    #[must_use]
    pub fn pass(phase: Phase) -> Self {
        Self {
            passed: true,
            phase,
            reason: None,
        }
    }

    /// A failing check with the given reason.
    #[must_use]
    pub fn fail(phase: Phase, reason: String) -> Self {
        Self {
            passed: false,
            phase,
            reason: Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(suppressed: bool, justification: Option<&str>) -> Finding {
        Finding {
            rule_id: "UnusedImports".to_string(),
            severity: Severity::Medium,
            file: "src/main/kotlin/App.kt".to_string(),
            line: 12,
            message: "Unused import".to_string(),
            suppressed,
            suppression_justification: justification.map(String::from),
        }
    }

    #[test]
    fn test_severity_orders_most_severe_first() {
        let mut severities = vec![Severity::Low, Severity::Critical, Severity::Medium, Severity::High];
        severities.sort();
        assert_eq!(
            severities,
            vec![Severity::Critical, Severity::High, Severity::Medium, Severity::Low]
        );
    }

    #[test]
    fn test_tool_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&ToolKind::SecretScan).unwrap();
        assert_eq!(json, r#""secret-scan""#);
        let json = serde_json::to_string(&ToolKind::Checkstyle).unwrap();
        assert_eq!(json, r#""checkstyle""#);
    }

    #[test]
    fn test_suppression_identity_format() {
        let f = finding(true, Some("reviewed in PR #42"));
        assert_eq!(f.suppression_identity(), "UnusedImports:src/main/kotlin/App.kt:12");
    }

    #[test]
    fn test_justified_suppression_requires_nonempty_text() {
        assert!(finding(true, Some("reviewed")).is_justified_suppression());
        assert!(!finding(true, Some("   ")).is_justified_suppression());
        assert!(!finding(true, None).is_justified_suppression());
        assert!(!finding(false, Some("irrelevant")).is_justified_suppression());
    }

    #[test]
    fn test_file_coverage_percent() {
        let fc = FileCoverage {
            path: "src/pay/Charge.kt".to_string(),
            lines_valid: 200,
            lines_covered: 170,
        };
        assert_eq!(fc.percent(), Some(85.0));

        let empty = FileCoverage {
            path: "src/gen/Stub.kt".to_string(),
            lines_valid: 0,
            lines_covered: 0,
        };
        assert_eq!(empty.percent(), None);
    }

    #[test]
    fn test_phase_commit_permission() {
        assert!(Phase::Green.permits_commit());
        assert!(Phase::Refactoring.permits_commit());
        assert!(!Phase::Red.permits_commit());
        assert!(!Phase::Stopped.permits_commit());
    }

    #[test]
    fn test_verdict_blocks() {
        assert!(GateVerdict::fail("secrets", true, vec!["leak".into()]).blocks());
        assert!(!GateVerdict::fail("structural", false, vec!["too long".into()]).blocks());
        assert!(!GateVerdict::pass("coverage", true).blocks());
    }

    #[test]
    fn test_phase_round_trips_through_strings() {
        for phase in [Phase::Stopped, Phase::Red, Phase::Green, Phase::Refactoring] {
            let s = phase.to_string();
            let parsed: Phase = s.parse().unwrap();
            assert_eq!(parsed, phase);
        }
    }
}
