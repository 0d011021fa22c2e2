//! detekt parser
//!
//! detekt ships two report formats we accept: the checkstyle-compatible
//! XML reporter and SARIF JSON. The payload is sniffed from its first
//! non-whitespace byte; `{` means SARIF, anything else is tried as XML.
//! SARIF suppressions carry an optional justification, which maps onto
//! the engine's documented-suppression rule.

use serde::Deserialize;

use policy_gate_types::{Finding, Severity, ToolKind};

use crate::checkstyle::parse_checkstyle_format;
use crate::{ParsedPayload, ReportParser};

pub struct DetektParser;

#[derive(Debug, Deserialize)]
struct SarifLog {
    runs: Vec<SarifRun>,
}

#[derive(Debug, Deserialize)]
struct SarifRun {
    #[serde(default)]
    results: Vec<SarifResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SarifResult {
    #[serde(default)]
    rule_id: String,
    #[serde(default)]
    level: Option<String>,
    message: SarifMessage,
    #[serde(default)]
    locations: Vec<SarifLocation>,
    #[serde(default)]
    suppressions: Vec<SarifSuppression>,
}

#[derive(Debug, Deserialize)]
struct SarifMessage {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SarifLocation {
    physical_location: Option<SarifPhysicalLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SarifPhysicalLocation {
    artifact_location: Option<SarifArtifactLocation>,
    region: Option<SarifRegion>,
}

#[derive(Debug, Deserialize)]
struct SarifArtifactLocation {
    #[serde(default)]
    uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SarifRegion {
    #[serde(default)]
    start_line: u64,
}

#[derive(Debug, Deserialize)]
struct SarifSuppression {
    #[serde(default)]
    justification: Option<String>,
}

fn severity_from_level(level: Option<&str>) -> Severity {
    match level {
        Some("error") => Severity::High,
        Some("warning") => Severity::Medium,
        _ => Severity::Low,
    }
}

/// Strip the `detekt.ruleset.` prefix SARIF rule ids carry.
fn short_rule_id(rule_id: &str) -> String {
    rule_id.rsplit('.').next().unwrap_or(rule_id).to_string()
}

fn parse_sarif(bytes: &[u8]) -> Result<Vec<Finding>, String> {
    let log: SarifLog =
        serde_json::from_slice(bytes).map_err(|e| format!("invalid SARIF JSON: {e}"))?;

    let mut findings = Vec::new();
    for run in log.runs {
        for result in run.results {
            let (file, line) = result
                .locations
                .first()
                .and_then(|loc| loc.physical_location.as_ref())
                .map(|phys| {
                    let file = phys
                        .artifact_location
                        .as_ref()
                        .map(|a| a.uri.clone())
                        .unwrap_or_default();
                    let line = phys.region.as_ref().map_or(0, |r| r.start_line);
                    (file, line)
                })
                .unwrap_or_default();

            let suppressed = !result.suppressions.is_empty();
            let justification = result
                .suppressions
                .first()
                .and_then(|s| s.justification.clone())
                .filter(|j| !j.trim().is_empty());

            findings.push(Finding {
                rule_id: short_rule_id(&result.rule_id),
                severity: severity_from_level(result.level.as_deref()),
                file,
                line,
                message: result.message.text,
                suppressed,
                suppression_justification: justification,
            });
        }
    }
    Ok(findings)
}

impl ReportParser for DetektParser {
    fn tool(&self) -> ToolKind {
        ToolKind::Detekt
    }

    fn parse(&self, bytes: &[u8]) -> Result<ParsedPayload, String> {
        let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
        let findings = match first {
            Some(b'{') => parse_sarif(bytes)?,
            _ => parse_checkstyle_format(bytes)
                .map_err(|e| format!("not SARIF and not checkstyle XML: {e}"))?,
        };
        Ok(ParsedPayload {
            findings,
            coverage: None,
        })
    }
}
