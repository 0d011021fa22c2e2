//! Policy decision and rendering
//!
//! Combines the workflow-state check, gate verdicts and ingestion issues
//! into the final [`PolicyDecision`], and renders it either as a human
//! summary or as JCS-canonical JSON for hook and CI consumers.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use serde::{Deserialize, Serialize};

use policy_gate_types::{GateVerdict, StateCheck};

/// Exit code for an allowed commit.
pub const EXIT_ALLOWED: i32 = 0;
/// Exit code for a blocking gate failure.
pub const EXIT_GATE_FAILURE: i32 = 1;
/// Exit code for a workflow-state violation.
pub const EXIT_STATE_VIOLATION: i32 = 2;
/// Exit code for operational errors (ingestion, config, locking).
pub const EXIT_OPERATIONAL: i32 = 3;

/// One report that could not be ingested, in serializable form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestIssue {
    pub tool: String,
    pub path: String,
    /// Whether the report was configured as required
    pub required: bool,
    pub reason: String,
}

/// Final verdict of one `check` run.
///
/// A state violation short-circuits the pipeline, so `verdicts` is empty
/// in that case; the JSON consumer can tell the difference from
/// `state_check.passed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub state_check: StateCheck,
    pub verdicts: Vec<GateVerdict>,
    pub ingest_issues: Vec<IngestIssue>,
}

impl PolicyDecision {
    /// Process exit code for this decision.
    ///
    /// State violations win over everything, then operational failures,
    /// then gate failures.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if !self.state_check.passed {
            EXIT_STATE_VIOLATION
        } else if self.ingest_issues.iter().any(|i| i.required) {
            EXIT_OPERATIONAL
        } else if self.verdicts.iter().any(GateVerdict::blocks) {
            EXIT_GATE_FAILURE
        } else {
            EXIT_ALLOWED
        }
    }
}

/// Build the decision from the pipeline's pieces.
#[must_use]
pub fn decide(
    state_check: StateCheck,
    verdicts: Vec<GateVerdict>,
    ingest_issues: Vec<IngestIssue>,
) -> PolicyDecision {
    let allowed = state_check.passed
        && !ingest_issues.iter().any(|i| i.required)
        && !verdicts.iter().any(GateVerdict::blocks);
    PolicyDecision {
        allowed,
        state_check,
        verdicts,
        ingest_issues,
    }
}

/// Emit a value as JCS-canonical JSON (RFC 8785).
///
/// Deterministic field ordering regardless of struct layout, so CI
/// consumers can diff and hash the output.
pub fn emit_jcs<T: Serialize>(value: &T) -> Result<String> {
    let json_value = serde_json::to_value(value).context("Failed to serialize value to JSON")?;
    let json_bytes = serde_json_canonicalizer::to_vec(&json_value)
        .context("Failed to canonicalize JSON using JCS")?;
    String::from_utf8(json_bytes).context("JCS output contained invalid UTF-8")
}

fn status_word(passed: bool, blocking: bool, color: bool) -> String {
    let word = match (passed, blocking) {
        (true, _) => "PASS",
        (false, true) => "FAIL",
        (false, false) => "WARN",
    };
    if !color {
        return word.to_string();
    }
    match word {
        "PASS" => word.green().to_string(),
        "FAIL" => word.red().bold().to_string(),
        _ => word.yellow().to_string(),
    }
}

/// Render the human summary.
///
/// Failures come first, blocking before advisory, passes last; the
/// overall verdict is the final line so it survives hook output
/// truncation.
#[must_use]
pub fn render_human(decision: &PolicyDecision, color: bool) -> String {
    let mut out = String::new();

    if !decision.state_check.passed {
        let _ = writeln!(
            out,
            "{} workflow state ({})",
            status_word(false, true, color),
            decision.state_check.phase
        );
        if let Some(reason) = &decision.state_check.reason {
            let _ = writeln!(out, "     {reason}");
        }
    }

    for issue in &decision.ingest_issues {
        let tag = if issue.required {
            status_word(false, true, color)
        } else {
            status_word(false, false, color)
        };
        let _ = writeln!(out, "{tag} report {} ({})", issue.tool, issue.path);
        let _ = writeln!(out, "     {}", issue.reason);
    }

    let mut ordered: Vec<&GateVerdict> = decision.verdicts.iter().collect();
    ordered.sort_by_key(|v| match (v.passed, v.blocking) {
        (false, true) => 0u8,
        (false, false) => 1,
        (true, _) => 2,
    });
    for verdict in ordered {
        let _ = writeln!(
            out,
            "{} {}",
            status_word(verdict.passed, verdict.blocking, color),
            verdict.gate
        );
        for reason in &verdict.reasons {
            let _ = writeln!(out, "     {reason}");
        }
    }

    let summary = if decision.allowed {
        "commit allowed"
    } else {
        "commit blocked"
    };
    let summary = if !color {
        summary.to_string()
    } else if decision.allowed {
        summary.green().bold().to_string()
    } else {
        summary.red().bold().to_string()
    };
    let _ = writeln!(out, "{summary}");
    out
}
