//! Metrics aggregation
//!
//! Folds the parsed tool reports into a single immutable [`Metrics`]
//! snapshot. Gates evaluate against this snapshot only; they never see
//! the raw reports. Aggregation is deterministic: the same report set,
//! baseline and glob set always produce the same snapshot.

use std::collections::BTreeMap;

use globset::GlobSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use policy_gate_types::{Severity, ToolReport};

mod baseline;

pub use baseline::{BaselineError, SuppressionBaseline};

/// Rule identifiers whose findings report a class (or file) length.
const CLASS_LENGTH_RULES: &[&str] = &["ExcessiveClassLength", "LargeClass", "FileLength"];

/// Rule identifiers whose findings report a method length.
const METHOD_LENGTH_RULES: &[&str] = &["ExcessiveMethodLength", "LongMethod", "MethodLength"];

/// Aggregated snapshot of one ingestion run.
///
/// Percentages are `None` when no coverage report contributed; a missing
/// report is not the same thing as zero coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Overall line coverage in percent
    pub coverage_percent: Option<f64>,
    /// Line coverage over files matching the critical-path globs
    pub critical_path_coverage_percent: Option<f64>,
    /// Active violation counts keyed by severity, most severe first
    pub violations_by_severity: BTreeMap<Severity, u64>,
    /// Suppressions introduced since the baseline, undocumented ones included
    pub new_suppressions: u64,
    /// Detected secrets; counted separately, never mixed into violations
    pub secret_findings: u64,
    /// Largest class length reported by any size rule
    pub largest_class_lines: Option<u64>,
    /// Largest method length reported by any size rule
    pub largest_method_lines: Option<u64>,
}

impl Metrics {
    /// Total active violations at or above the given severity.
    #[must_use]
    pub fn violations_at_least(&self, floor: Severity) -> u64 {
        self.violations_by_severity
            .iter()
            .filter(|(sev, _)| **sev <= floor)
            .map(|(_, count)| count)
            .sum()
    }
}

/// Largest integer embedded in a finding message.
///
/// Size rules phrase their messages differently per tool ("has 512 lines",
/// "is 512 lines long", "512 lines (max allowed 300)"); the reported length
/// is reliably the largest number in the text.
fn largest_number(message: &str) -> Option<u64> {
    let mut max: Option<u64> = None;
    let mut current: Option<u64> = None;
    for ch in message.chars() {
        if let Some(digit) = ch.to_digit(10) {
            current = Some(
                current
                    .unwrap_or(0)
                    .saturating_mul(10)
                    .saturating_add(u64::from(digit)),
            );
        } else if let Some(n) = current.take() {
            max = Some(max.map_or(n, |m| m.max(n)));
        }
    }
    if let Some(n) = current {
        max = Some(max.map_or(n, |m| m.max(n)));
    }
    max
}

/// Fold parsed reports into a metrics snapshot.
///
/// Suppression handling: a finding suppressed with a non-empty
/// justification stays out of the severity counts, and contributes to
/// `new_suppressions` only when its identity is absent from the baseline.
/// An undocumented suppression counts as an ordinary violation and as a
/// new suppression regardless of the baseline.
#[must_use]
pub fn aggregate(
    reports: &[ToolReport],
    baseline: &SuppressionBaseline,
    critical_paths: &GlobSet,
) -> Metrics {
    let mut violations_by_severity: BTreeMap<Severity, u64> = BTreeMap::new();
    let mut new_suppressions = 0u64;
    let mut secret_findings = 0u64;
    let mut largest_class_lines: Option<u64> = None;
    let mut largest_method_lines: Option<u64> = None;

    let mut coverage_percent = None;
    let mut critical_covered = 0u64;
    let mut critical_valid = 0u64;

    for report in reports {
        if let Some(coverage) = &report.coverage {
            coverage_percent = Some(coverage.line_percent.clamp(0.0, 100.0));
            for file in &coverage.files {
                if critical_paths.is_match(&file.path) {
                    critical_covered += file.lines_covered;
                    critical_valid += file.lines_valid;
                }
            }
            continue;
        }

        for finding in &report.findings {
            if finding.severity == Severity::Critical
                && report.tool == policy_gate_types::ToolKind::SecretScan
            {
                secret_findings += 1;
                continue;
            }

            if finding.is_justified_suppression() {
                if !baseline.contains(&finding.suppression_identity()) {
                    new_suppressions += 1;
                }
                continue;
            }
            if finding.suppressed {
                // Undocumented suppression: treated as if it were never
                // suppressed, and always flagged as drift.
                new_suppressions += 1;
            }

            *violations_by_severity.entry(finding.severity).or_insert(0) += 1;

            if CLASS_LENGTH_RULES.contains(&finding.rule_id.as_str()) {
                if let Some(n) = largest_number(&finding.message) {
                    largest_class_lines = Some(largest_class_lines.map_or(n, |m| m.max(n)));
                }
            } else if METHOD_LENGTH_RULES.contains(&finding.rule_id.as_str()) {
                if let Some(n) = largest_number(&finding.message) {
                    largest_method_lines = Some(largest_method_lines.map_or(n, |m| m.max(n)));
                }
            }
        }
    }

    let critical_path_coverage_percent = if critical_valid > 0 {
        Some((critical_covered as f64 * 100.0 / critical_valid as f64).min(100.0))
    } else {
        None
    };

    debug!(
        coverage = ?coverage_percent,
        critical = ?critical_path_coverage_percent,
        new_suppressions,
        secret_findings,
        "aggregated metrics"
    );

    Metrics {
        coverage_percent,
        critical_path_coverage_percent,
        violations_by_severity,
        new_suppressions,
        secret_findings,
        largest_class_lines,
        largest_method_lines,
    }
}

/// Justified suppression identities currently present in the reports.
///
/// This is what `baseline update` persists as the next baseline.
#[must_use]
pub fn current_justified_suppressions(reports: &[ToolReport]) -> Vec<String> {
    let mut identities: Vec<String> = reports
        .iter()
        .flat_map(|r| &r.findings)
        .filter(|f| f.is_justified_suppression())
        .map(|f| f.suppression_identity())
        .collect();
    identities.sort();
    identities.dedup();
    identities
}

#[cfg(test)]
mod tests {
    use super::*;

    use camino::Utf8PathBuf;
    use globset::{Glob, GlobSetBuilder};
    use policy_gate_types::{CoverageData, FileCoverage, Finding, ToolKind};
    use proptest::prelude::*;

    fn finding(rule: &str, severity: Severity, file: &str, line: u64) -> Finding {
        Finding {
            rule_id: rule.to_string(),
            severity,
            file: file.to_string(),
            line,
            message: format!("{rule} at {file}:{line}"),
            suppressed: false,
            suppression_justification: None,
        }
    }

    fn suppressed(rule: &str, file: &str, line: u64, justification: Option<&str>) -> Finding {
        Finding {
            suppressed: true,
            suppression_justification: justification.map(String::from),
            ..finding(rule, Severity::Medium, file, line)
        }
    }

    fn report(tool: ToolKind, findings: Vec<Finding>) -> ToolReport {
        ToolReport::new(tool, Utf8PathBuf::from("build/report.xml"), findings)
    }

    fn coverage_report(line_percent: f64, files: Vec<FileCoverage>) -> ToolReport {
        let lines_valid: u64 = files.iter().map(|f| f.lines_valid).sum();
        let lines_covered: u64 = files.iter().map(|f| f.lines_covered).sum();
        ToolReport::with_coverage(
            Utf8PathBuf::from("build/coverage.xml"),
            CoverageData {
                line_percent,
                lines_covered,
                lines_valid,
                files,
            },
        )
    }

    fn globs(patterns: &[&str]) -> GlobSet {
        let mut builder = GlobSetBuilder::new();
        for p in patterns {
            builder.add(Glob::new(p).unwrap());
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_missing_coverage_report_yields_none_not_zero() {
        let metrics = aggregate(
            &[report(ToolKind::Pmd, vec![])],
            &SuppressionBaseline::default(),
            &GlobSet::empty(),
        );
        assert_eq!(metrics.coverage_percent, None);
        assert_eq!(metrics.critical_path_coverage_percent, None);
    }

    #[test]
    fn test_critical_path_coverage_aggregates_matching_files_only() {
        let reports = vec![coverage_report(
            85.0,
            vec![
                FileCoverage {
                    path: "src/payment/Charge.kt".to_string(),
                    lines_valid: 100,
                    lines_covered: 90,
                },
                FileCoverage {
                    path: "src/ui/Banner.kt".to_string(),
                    lines_valid: 100,
                    lines_covered: 10,
                },
            ],
        )];
        let metrics = aggregate(
            &reports,
            &SuppressionBaseline::default(),
            &globs(&["src/payment/**"]),
        );
        assert_eq!(metrics.coverage_percent, Some(85.0));
        assert_eq!(metrics.critical_path_coverage_percent, Some(90.0));
    }

    #[test]
    fn test_coverage_percent_is_capped_at_100() {
        let report = ToolReport::with_coverage(
            Utf8PathBuf::from("build/coverage.xml"),
            CoverageData {
                line_percent: 130.0,
                lines_covered: 130,
                lines_valid: 100,
                files: vec![FileCoverage {
                    path: "src/payment/Charge.kt".to_string(),
                    lines_valid: 100,
                    lines_covered: 130,
                }],
            },
        );
        let metrics = aggregate(
            &[report],
            &SuppressionBaseline::default(),
            &globs(&["src/payment/**"]),
        );
        assert_eq!(metrics.coverage_percent, Some(100.0));
        assert_eq!(metrics.critical_path_coverage_percent, Some(100.0));
    }

    #[test]
    fn test_justified_suppressions_excluded_from_counts() {
        let reports = vec![report(
            ToolKind::Pmd,
            vec![
                finding("UnusedLocalVariable", Severity::Medium, "src/A.java", 4),
                suppressed("CyclomaticComplexity", "src/B.java", 9, Some("legacy, tracked")),
            ],
        )];
        let metrics = aggregate(&reports, &SuppressionBaseline::default(), &GlobSet::empty());
        assert_eq!(metrics.violations_by_severity.get(&Severity::Medium), Some(&1));
        assert_eq!(metrics.new_suppressions, 1);
    }

    #[test]
    fn test_baselined_suppressions_are_not_new() {
        let reports = vec![report(
            ToolKind::Pmd,
            vec![suppressed("CyclomaticComplexity", "src/B.java", 9, Some("legacy"))],
        )];
        let baseline =
            SuppressionBaseline::from_identities(vec!["CyclomaticComplexity:src/B.java:9".into()]);
        let metrics = aggregate(&reports, &baseline, &GlobSet::empty());
        assert_eq!(metrics.new_suppressions, 0);
    }

    #[test]
    fn test_undocumented_suppression_counts_as_violation_and_drift() {
        let reports = vec![report(
            ToolKind::Pmd,
            vec![suppressed("GodClass", "src/C.java", 1, None)],
        )];
        // Even a baselined identity does not excuse a missing justification.
        let baseline = SuppressionBaseline::from_identities(vec!["GodClass:src/C.java:1".into()]);
        let metrics = aggregate(&reports, &baseline, &GlobSet::empty());
        assert_eq!(metrics.violations_by_severity.get(&Severity::Medium), Some(&1));
        assert_eq!(metrics.new_suppressions, 1);
    }

    #[test]
    fn test_secret_findings_tracked_separately() {
        let reports = vec![report(
            ToolKind::SecretScan,
            vec![finding("aws-access-key", Severity::Critical, "deploy.sh", 14)],
        )];
        let metrics = aggregate(&reports, &SuppressionBaseline::default(), &GlobSet::empty());
        assert_eq!(metrics.secret_findings, 1);
        assert!(metrics.violations_by_severity.is_empty());
    }

    #[test]
    fn test_structural_figures_mined_from_size_rule_messages() {
        let mut class_finding = finding("ExcessiveClassLength", Severity::Medium, "src/Big.java", 1);
        class_finding.message = "Class has 512 lines (limit is 300)".to_string();
        let mut method_finding = finding("LongMethod", Severity::Low, "src/App.kt", 40);
        method_finding.message = "The function submit is 37 lines long".to_string();

        let reports = vec![report(ToolKind::Pmd, vec![class_finding, method_finding])];
        let metrics = aggregate(&reports, &SuppressionBaseline::default(), &GlobSet::empty());
        assert_eq!(metrics.largest_class_lines, Some(512));
        assert_eq!(metrics.largest_method_lines, Some(37));
    }

    #[test]
    fn test_violations_at_least_includes_more_severe_levels() {
        let reports = vec![report(
            ToolKind::Checkstyle,
            vec![
                finding("A", Severity::Critical, "a.java", 1),
                finding("B", Severity::High, "b.java", 2),
                finding("C", Severity::Low, "c.java", 3),
            ],
        )];
        let metrics = aggregate(&reports, &SuppressionBaseline::default(), &GlobSet::empty());
        assert_eq!(metrics.violations_at_least(Severity::High), 2);
        assert_eq!(metrics.violations_at_least(Severity::Low), 3);
    }

    #[test]
    fn test_largest_number_picks_the_maximum() {
        assert_eq!(largest_number("has 512 lines (max allowed 300)"), Some(512));
        assert_eq!(largest_number("no digits here"), None);
        assert_eq!(largest_number("ends with 42"), Some(42));
    }

    #[test]
    fn test_current_justified_suppressions_sorted_and_deduped() {
        let reports = vec![
            report(
                ToolKind::Pmd,
                vec![
                    suppressed("B", "b.java", 2, Some("ok")),
                    suppressed("A", "a.java", 1, Some("ok")),
                    suppressed("C", "c.java", 3, None),
                ],
            ),
            report(ToolKind::Detekt, vec![suppressed("A", "a.java", 1, Some("ok"))]),
        ];
        assert_eq!(
            current_justified_suppressions(&reports),
            vec!["A:a.java:1".to_string(), "B:b.java:2".to_string()]
        );
    }

    proptest! {
        #[test]
        fn test_aggregate_is_deterministic(
            severities in proptest::collection::vec(0u8..4, 0..30),
        ) {
            let findings: Vec<Finding> = severities
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    let severity = match s {
                        0 => Severity::Critical,
                        1 => Severity::High,
                        2 => Severity::Medium,
                        _ => Severity::Low,
                    };
                    finding("SomeRule", severity, "src/F.java", i as u64)
                })
                .collect();
            let reports = vec![report(ToolKind::Checkstyle, findings)];
            let baseline = SuppressionBaseline::default();
            let a = aggregate(&reports, &baseline, &GlobSet::empty());
            let b = aggregate(&reports, &baseline, &GlobSet::empty());
            prop_assert_eq!(&a, &b);
            let total: u64 = a.violations_by_severity.values().sum();
            prop_assert_eq!(total, severities.len() as u64);
        }

        #[test]
        fn test_undocumented_suppressions_always_drift(count in 0usize..20) {
            let findings: Vec<Finding> = (0..count)
                .map(|i| suppressed("Rule", "f.java", i as u64, None))
                .collect();
            let baseline = SuppressionBaseline::from_identities(
                (0..count).map(|i| format!("Rule:f.java:{i}")).collect(),
            );
            let metrics = aggregate(
                &[report(ToolKind::Pmd, findings)],
                &baseline,
                &GlobSet::empty(),
            );
            prop_assert_eq!(metrics.new_suppressions, count as u64);
        }
    }
}
