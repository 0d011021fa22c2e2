//! Secret scanner JSON parser
//!
//! Accepts gitleaks-style output: either a bare JSON array of findings or
//! an object wrapping them under `findings`. Every reported secret is a
//! critical finding; secrets cannot be suppressed.

use serde::Deserialize;

use policy_gate_types::{Finding, Severity, ToolKind};

use crate::{ParsedPayload, ReportParser};

pub struct SecretScanJsonParser;

#[derive(Deserialize)]
struct SecretEntry {
    #[serde(alias = "RuleID", alias = "rule")]
    rule_id: String,
    #[serde(alias = "File", alias = "path")]
    file: String,
    #[serde(default, alias = "StartLine", alias = "start_line")]
    line: u64,
    #[serde(default, alias = "Description")]
    description: Option<String>,
}

#[derive(Deserialize)]
struct WrappedReport {
    findings: Vec<SecretEntry>,
}

impl SecretEntry {
    fn into_finding(self) -> Finding {
        Finding {
            message: self
                .description
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| format!("secret detected: {}", self.rule_id)),
            rule_id: self.rule_id,
            severity: Severity::Critical,
            file: self.file,
            line: self.line,
            suppressed: false,
            suppression_justification: None,
        }
    }
}

impl ReportParser for SecretScanJsonParser {
    fn tool(&self) -> ToolKind {
        ToolKind::SecretScan
    }

    fn parse(&self, bytes: &[u8]) -> Result<ParsedPayload, String> {
        let entries: Vec<SecretEntry> = match serde_json::from_slice::<Vec<SecretEntry>>(bytes) {
            Ok(entries) => entries,
            Err(_) => {
                serde_json::from_slice::<WrappedReport>(bytes)
                    .map(|report| report.findings)
                    .map_err(|e| format!("not a secret scan report: {e}"))?
            }
        };
        Ok(ParsedPayload {
            findings: entries.into_iter().map(SecretEntry::into_finding).collect(),
            coverage: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_gitleaks_array() {
        let json = br#"[
          {"RuleID": "aws-access-key", "File": "src/deploy.sh", "StartLine": 14,
           "Description": "AWS access key", "Secret": "AKIA...", "Match": "AKIA..."},
          {"RuleID": "generic-api-key", "File": "config/app.yml", "StartLine": 3}
        ]"#;
        let payload = SecretScanJsonParser.parse(json).expect("parse secrets");
        assert_eq!(payload.findings.len(), 2);
        assert!(payload.findings.iter().all(|f| f.severity == Severity::Critical));
        assert!(payload.findings.iter().all(|f| !f.suppressed));
        assert_eq!(payload.findings[0].file, "src/deploy.sh");
        assert_eq!(payload.findings[0].line, 14);
        assert_eq!(payload.findings[1].message, "secret detected: generic-api-key");
    }

    #[test]
    fn test_parses_wrapped_object() {
        let json = br#"{"findings": [{"rule": "slack-token", "path": "notes.md", "line": 9}]}"#;
        let payload = SecretScanJsonParser.parse(json).expect("parse wrapped");
        assert_eq!(payload.findings.len(), 1);
        assert_eq!(payload.findings[0].rule_id, "slack-token");
    }

    #[test]
    fn test_empty_array_is_clean() {
        let payload = SecretScanJsonParser.parse(b"[]").expect("parse empty");
        assert!(payload.findings.is_empty());
    }

    #[test]
    fn test_rejects_non_report_json() {
        assert!(SecretScanJsonParser.parse(b"{\"version\": 1}").is_err());
    }
}
