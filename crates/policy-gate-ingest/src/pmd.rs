//! PMD XML parser
//!
//! Handles both `<violation>` elements (active findings, priority 1-5)
//! and `<suppressedviolation>` elements, whose `usermsg` attribute is the
//! suppression justification the policy requires. A suppression without a
//! usermsg surfaces as an undocumented suppression and is counted as an
//! ordinary violation downstream.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use policy_gate_types::{Finding, Severity, ToolKind};

use crate::{ParsedPayload, ReportParser};

pub struct PmdXmlParser;

fn severity_from_priority(priority: u8) -> Severity {
    match priority {
        1 => Severity::Critical,
        2 => Severity::High,
        3 => Severity::Medium,
        _ => Severity::Low,
    }
}

#[derive(Default)]
struct PendingViolation {
    rule: String,
    line: u64,
    priority: u8,
}

impl PendingViolation {
    /// A violation with no usable text body falls back to its rule name.
    fn into_finding(self, file: &str, message: Option<String>) -> Finding {
        let message = message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.rule.clone());
        Finding {
            rule_id: self.rule,
            severity: severity_from_priority(self.priority),
            file: file.to_string(),
            line: self.line,
            message,
            suppressed: false,
            suppression_justification: None,
        }
    }
}

fn parse_violation(e: &BytesStart) -> Result<PendingViolation, String> {
    let mut violation = PendingViolation {
        priority: 5,
        ..PendingViolation::default()
    };
    for attr in e.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let value = attr.unescape_value().map_err(|e| e.to_string())?;
        match attr.key.as_ref() {
            b"rule" => violation.rule = value.into_owned(),
            b"beginline" => violation.line = value.parse().unwrap_or(0),
            b"priority" => violation.priority = value.parse().unwrap_or(5),
            _ => {}
        }
    }
    Ok(violation)
}

impl ReportParser for PmdXmlParser {
    fn tool(&self) -> ToolKind {
        ToolKind::Pmd
    }

    fn parse(&self, bytes: &[u8]) -> Result<ParsedPayload, String> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(true);

        let mut findings = Vec::new();
        let mut current_file = String::new();
        let mut pending: Option<PendingViolation> = None;
        let mut saw_root = false;

        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                // Self-closing violations never produce an End event, so
                // they must be pushed here rather than deferred.
                Ok(Event::Empty(e)) if e.name().as_ref() == b"violation" => {
                    findings.push(parse_violation(&e)?.into_finding(&current_file, None));
                }
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                    b"pmd" => saw_root = true,
                    b"file" => {
                        for attr in e.attributes() {
                            let attr = attr.map_err(|e| e.to_string())?;
                            if attr.key.as_ref() == b"name" {
                                current_file = attr
                                    .unescape_value()
                                    .map_err(|e| e.to_string())?
                                    .into_owned();
                            }
                        }
                    }
                    b"violation" => pending = Some(parse_violation(&e)?),
                    b"suppressedviolation" => {
                        let mut file = String::new();
                        let mut rule = String::new();
                        let mut usermsg = String::new();
                        let mut line = 0u64;
                        for attr in e.attributes() {
                            let attr = attr.map_err(|e| e.to_string())?;
                            let value = attr.unescape_value().map_err(|e| e.to_string())?;
                            match attr.key.as_ref() {
                                b"filename" => file = value.into_owned(),
                                b"rule" => rule = value.into_owned(),
                                b"usermsg" => usermsg = value.into_owned(),
                                b"beginline" => line = value.parse().unwrap_or(0),
                                _ => {}
                            }
                        }
                        let justification = if usermsg.trim().is_empty() {
                            None
                        } else {
                            Some(usermsg)
                        };
                        findings.push(Finding {
                            rule_id: rule,
                            severity: Severity::Medium,
                            file,
                            line,
                            message: "suppressed violation".to_string(),
                            suppressed: true,
                            suppression_justification: justification,
                        });
                    }
                    _ => {}
                },
                Ok(Event::Text(t)) => {
                    if let Some(violation) = pending.take() {
                        let message = t.unescape().map_err(|e| e.to_string())?.trim().to_string();
                        findings.push(violation.into_finding(&current_file, Some(message)));
                    }
                }
                Ok(Event::End(e)) => {
                    // Violation with no text body still counts.
                    if e.name().as_ref() == b"violation" {
                        if let Some(violation) = pending.take() {
                            findings.push(violation.into_finding(&current_file, None));
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(format!("XML error at byte {}: {e}", reader.buffer_position())),
            }
            buf.clear();
        }

        if !saw_root {
            return Err("no <pmd> root element".to_string());
        }
        Ok(ParsedPayload {
            findings,
            coverage: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<pmd version="7.0.0" timestamp="2024-04-25T09:30:00.000">
  <file name="src/main/java/shop/Checkout.java">
    <violation beginline="42" endline="88" rule="ExcessiveMethodLength" ruleset="Design" priority="2">
      Avoid really long methods: method has 46 lines
    </violation>
    <violation beginline="7" endline="7" rule="UnusedImports" ruleset="Best Practices" priority="4">
      Avoid unused imports such as 'java.util.Map'
    </violation>
  </file>
  <suppressedviolation filename="src/main/java/shop/Legacy.java" rule="CyclomaticComplexity" suppressiontype="annotation" msg="complexity of 15" usermsg="legacy path, tracked in JIRA-812"/>
  <suppressedviolation filename="src/main/java/shop/Quick.java" rule="EmptyCatchBlock" suppressiontype="nopmd" msg="empty catch" usermsg=""/>
</pmd>"#;

    #[test]
    fn test_parses_violations_with_priority_mapping() {
        let payload = PmdXmlParser.parse(SAMPLE).expect("parse pmd");
        assert_eq!(payload.findings.len(), 4);

        let long_method = &payload.findings[0];
        assert_eq!(long_method.rule_id, "ExcessiveMethodLength");
        assert_eq!(long_method.severity, Severity::High);
        assert_eq!(long_method.file, "src/main/java/shop/Checkout.java");
        assert_eq!(long_method.line, 42);
        assert!(long_method.message.contains("46 lines"));
        assert!(!long_method.suppressed);

        let unused = &payload.findings[1];
        assert_eq!(unused.severity, Severity::Low);
    }

    #[test]
    fn test_suppressed_violation_with_usermsg_is_justified() {
        let payload = PmdXmlParser.parse(SAMPLE).expect("parse pmd");
        let justified = &payload.findings[2];
        assert!(justified.suppressed);
        assert_eq!(
            justified.suppression_justification.as_deref(),
            Some("legacy path, tracked in JIRA-812")
        );
        assert!(justified.is_justified_suppression());
    }

    #[test]
    fn test_suppressed_violation_without_usermsg_is_undocumented() {
        let payload = PmdXmlParser.parse(SAMPLE).expect("parse pmd");
        let undocumented = &payload.findings[3];
        assert!(undocumented.suppressed);
        assert!(undocumented.suppression_justification.is_none());
        assert!(!undocumented.is_justified_suppression());
    }

    #[test]
    fn test_self_closing_violation_is_not_dropped() {
        let xml = br#"<?xml version="1.0"?>
<pmd version="7.0.0">
  <file name="src/A.java">
    <violation beginline="3" rule="EmptyCatchBlock" priority="3"/>
    <violation beginline="9" rule="UnusedImports" priority="4">Avoid unused imports</violation>
  </file>
</pmd>"#;
        let payload = PmdXmlParser.parse(xml).expect("parse pmd");
        assert_eq!(payload.findings.len(), 2);
        assert_eq!(payload.findings[0].rule_id, "EmptyCatchBlock");
        assert_eq!(payload.findings[0].message, "EmptyCatchBlock");
        assert_eq!(payload.findings[0].line, 3);
        assert_eq!(payload.findings[1].message, "Avoid unused imports");
    }

    #[test]
    fn test_rejects_wrong_root() {
        assert!(PmdXmlParser.parse(b"<checkstyle/>").is_err());
    }
}
