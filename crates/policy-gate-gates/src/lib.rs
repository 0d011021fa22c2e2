//! Commit-policy gates
//!
//! Each gate inspects the aggregated [`Metrics`] snapshot and returns a
//! [`GateVerdict`]. Gates are pure over the snapshot so they can run
//! concurrently; thresholds are bound at construction from config and
//! never re-read during evaluation.

use std::sync::Arc;

use tracing::debug;

use policy_gate_config::Config;
use policy_gate_metrics::Metrics;
use policy_gate_types::{GateVerdict, Severity};

/// A single commit-policy check.
pub trait Gate: Send + Sync {
    /// Stable gate identifier used in reports.
    fn name(&self) -> &'static str;

    /// Whether a failure of this gate blocks the commit by default.
    fn blocking(&self) -> bool;

    fn evaluate(&self, metrics: &Metrics) -> GateVerdict;
}

/// Minimum unit-test coverage, overall and on critical-path files.
pub struct CoverageGate {
    min_percent: f64,
    critical_min_percent: f64,
    has_critical_globs: bool,
}

impl Gate for CoverageGate {
    fn name(&self) -> &'static str {
        "coverage"
    }

    fn blocking(&self) -> bool {
        true
    }

    fn evaluate(&self, metrics: &Metrics) -> GateVerdict {
        let mut reasons = Vec::new();
        match metrics.coverage_percent {
            None => reasons.push("no coverage report provided".to_string()),
            Some(p) if p < self.min_percent => reasons.push(format!(
                "overall coverage {p:.1}% is below the {:.1}% minimum",
                self.min_percent
            )),
            Some(_) => {}
        }
        if self.has_critical_globs {
            if let Some(p) = metrics.critical_path_coverage_percent {
                if p < self.critical_min_percent {
                    reasons.push(format!(
                        "critical-path coverage {p:.1}% is below the {:.1}% minimum",
                        self.critical_min_percent
                    ));
                }
            }
        }
        if reasons.is_empty() {
            GateVerdict::pass(self.name(), true)
        } else {
            GateVerdict::fail(self.name(), true, reasons)
        }
    }
}

/// No critical or high static-analysis violations.
///
/// Medium and low findings never block; they surface as a non-blocking
/// warning verdict so the report still mentions them.
pub struct StaticAnalysisGate;

impl Gate for StaticAnalysisGate {
    fn name(&self) -> &'static str {
        "static-analysis"
    }

    fn blocking(&self) -> bool {
        true
    }

    fn evaluate(&self, metrics: &Metrics) -> GateVerdict {
        let count = |sev| metrics.violations_by_severity.get(&sev).copied().unwrap_or(0);
        let critical = count(Severity::Critical);
        let high = count(Severity::High);
        let medium = count(Severity::Medium);
        let low = count(Severity::Low);

        if metrics.violations_at_least(Severity::High) > 0 {
            let mut reasons = Vec::new();
            if critical > 0 {
                reasons.push(format!("{critical} critical violation(s)"));
            }
            if high > 0 {
                reasons.push(format!("{high} high-severity violation(s)"));
            }
            return GateVerdict::fail(self.name(), true, reasons);
        }
        if medium + low > 0 {
            return GateVerdict::fail(
                self.name(),
                false,
                vec![format!(
                    "{medium} medium and {low} low-severity violation(s) outstanding"
                )],
            );
        }
        GateVerdict::pass(self.name(), true)
    }
}

/// Zero tolerance for detected secrets, regardless of severity config.
pub struct SecretGate;

impl Gate for SecretGate {
    fn name(&self) -> &'static str {
        "secrets"
    }

    fn blocking(&self) -> bool {
        true
    }

    fn evaluate(&self, metrics: &Metrics) -> GateVerdict {
        if metrics.secret_findings > 0 {
            GateVerdict::fail(
                self.name(),
                true,
                vec![format!(
                    "{} secret finding(s) detected; rotate and remove before committing",
                    metrics.secret_findings
                )],
            )
        } else {
            GateVerdict::pass(self.name(), true)
        }
    }
}

/// Cap on suppressions introduced since the baseline.
pub struct SuppressionDriftGate {
    max_new: u64,
}

impl Gate for SuppressionDriftGate {
    fn name(&self) -> &'static str {
        "suppression-drift"
    }

    fn blocking(&self) -> bool {
        true
    }

    fn evaluate(&self, metrics: &Metrics) -> GateVerdict {
        if metrics.new_suppressions > self.max_new {
            GateVerdict::fail(
                self.name(),
                true,
                vec![format!(
                    "{} new suppression(s) since the baseline (limit {})",
                    metrics.new_suppressions, self.max_new
                )],
            )
        } else {
            GateVerdict::pass(self.name(), true)
        }
    }
}

/// Class and method size limits, advisory unless promoted in config.
pub struct StructuralMetricGate {
    blocking: bool,
    max_class_lines: u64,
    max_method_lines: u64,
}

impl Gate for StructuralMetricGate {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn blocking(&self) -> bool {
        self.blocking
    }

    fn evaluate(&self, metrics: &Metrics) -> GateVerdict {
        let mut reasons = Vec::new();
        if let Some(lines) = metrics.largest_class_lines {
            if lines > self.max_class_lines {
                reasons.push(format!(
                    "largest class is {lines} lines (limit {})",
                    self.max_class_lines
                ));
            }
        }
        if let Some(lines) = metrics.largest_method_lines {
            if lines > self.max_method_lines {
                reasons.push(format!(
                    "largest method is {lines} lines (limit {})",
                    self.max_method_lines
                ));
            }
        }
        if reasons.is_empty() {
            GateVerdict::pass(self.name(), self.blocking)
        } else {
            GateVerdict::fail(self.name(), self.blocking, reasons)
        }
    }
}

/// Build the enabled gates in their stable report order.
#[must_use]
pub fn build_gates(config: &Config) -> Vec<Arc<dyn Gate>> {
    let mut gates: Vec<Arc<dyn Gate>> = Vec::new();
    let g = &config.gates;
    if g.coverage.enabled {
        gates.push(Arc::new(CoverageGate {
            min_percent: g.coverage.min_percent,
            critical_min_percent: g.coverage.critical_min_percent,
            has_critical_globs: !config.critical_paths.globs.is_empty(),
        }));
    }
    if g.static_analysis.enabled {
        gates.push(Arc::new(StaticAnalysisGate));
    }
    if g.secrets.enabled {
        gates.push(Arc::new(SecretGate));
    }
    if g.suppression_drift.enabled {
        gates.push(Arc::new(SuppressionDriftGate {
            max_new: g.suppression_drift.max_new,
        }));
    }
    if g.structural.enabled {
        gates.push(Arc::new(StructuralMetricGate {
            blocking: g.structural.blocking,
            max_class_lines: g.structural.max_class_lines,
            max_method_lines: g.structural.max_method_lines,
        }));
    }
    gates
}

/// Evaluate every gate concurrently over a shared snapshot.
///
/// Verdicts come back in gate order regardless of which task finishes
/// first.
pub async fn evaluate_all(gates: &[Arc<dyn Gate>], metrics: Arc<Metrics>) -> Vec<GateVerdict> {
    let handles: Vec<_> = gates
        .iter()
        .map(|gate| {
            let gate = Arc::clone(gate);
            let metrics = Arc::clone(&metrics);
            tokio::spawn(async move { gate.evaluate(&metrics) })
        })
        .collect();

    let mut verdicts = Vec::with_capacity(handles.len());
    for (gate, handle) in gates.iter().zip(handles) {
        match handle.await {
            Ok(verdict) => {
                debug!(gate = gate.name(), passed = verdict.passed, "gate evaluated");
                verdicts.push(verdict);
            }
            Err(_) => {
                verdicts.push(GateVerdict::fail(
                    gate.name(),
                    gate.blocking(),
                    vec!["gate evaluation panicked".to_string()],
                ));
            }
        }
    }
    verdicts
}
