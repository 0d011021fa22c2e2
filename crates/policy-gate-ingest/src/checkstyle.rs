//! Checkstyle XML parser
//!
//! Parses the `<checkstyle><file><error/></file></checkstyle>` format.
//! detekt emits the same structure from its XML reporter, so the detekt
//! ingestor delegates here for XML payloads.

use quick_xml::Reader;
use quick_xml::events::Event;

use policy_gate_types::{Finding, Severity, ToolKind};

use crate::{ParsedPayload, ReportParser};

pub struct CheckstyleXmlParser;

fn severity_from_attr(value: &str) -> Severity {
    match value {
        "error" => Severity::High,
        "warning" => Severity::Medium,
        _ => Severity::Low,
    }
}

/// Last dotted segment of a checkstyle `source` attribute, e.g.
/// `com.puppycrawl...WhitespaceAfterCheck` -> `WhitespaceAfterCheck`.
fn rule_id_from_source(source: &str) -> String {
    source.rsplit('.').next().unwrap_or(source).to_string()
}

/// Shared parse used by both the Checkstyle and detekt-XML ingestors.
pub(crate) fn parse_checkstyle_format(bytes: &[u8]) -> Result<Vec<Finding>, String> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut findings = Vec::new();
    let mut current_file = String::new();
    let mut saw_root = false;

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"checkstyle" => saw_root = true,
                b"file" => {
                    for attr in e.attributes() {
                        let attr = attr.map_err(|e| e.to_string())?;
                        if attr.key.as_ref() == b"name" {
                            current_file =
                                attr.unescape_value().map_err(|e| e.to_string())?.into_owned();
                        }
                    }
                }
                b"error" => {
                    let mut line = 0u64;
                    let mut severity = Severity::Low;
                    let mut message = String::new();
                    let mut source = String::new();
                    for attr in e.attributes() {
                        let attr = attr.map_err(|e| e.to_string())?;
                        let value = attr.unescape_value().map_err(|e| e.to_string())?;
                        match attr.key.as_ref() {
                            b"line" => line = value.parse().unwrap_or(0),
                            b"severity" => severity = severity_from_attr(&value),
                            b"message" => message = value.into_owned(),
                            b"source" => source = value.into_owned(),
                            _ => {}
                        }
                    }
                    findings.push(Finding {
                        rule_id: rule_id_from_source(&source),
                        severity,
                        file: current_file.clone(),
                        line,
                        message,
                        suppressed: false,
                        suppression_justification: None,
                    });
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(format!("XML error at byte {}: {e}", reader.buffer_position())),
        }
        buf.clear();
    }

    if !saw_root {
        return Err("no <checkstyle> root element".to_string());
    }
    Ok(findings)
}

impl ReportParser for CheckstyleXmlParser {
    fn tool(&self) -> ToolKind {
        ToolKind::Checkstyle
    }

    fn parse(&self, bytes: &[u8]) -> Result<ParsedPayload, String> {
        Ok(ParsedPayload {
            findings: parse_checkstyle_format(bytes)?,
            coverage: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<checkstyle version="10.12.4">
  <file name="src/main/java/shop/Auth.java">
    <error line="15" column="9" severity="error" message="Missing a Javadoc comment." source="com.puppycrawl.tools.checkstyle.checks.javadoc.MissingJavadocMethodCheck"/>
    <error line="30" severity="warning" message="Line is longer than 120 characters." source="com.puppycrawl.tools.checkstyle.checks.sizes.LineLengthCheck"/>
  </file>
  <file name="src/main/java/shop/Util.java">
    <error line="2" severity="info" message="File does not end with a newline." source="com.puppycrawl.tools.checkstyle.checks.NewlineAtEndOfFileCheck"/>
  </file>
</checkstyle>"#;

    #[test]
    fn test_parses_errors_with_severity_mapping() {
        let payload = CheckstyleXmlParser.parse(SAMPLE).expect("parse checkstyle");
        assert_eq!(payload.findings.len(), 3);

        let javadoc = &payload.findings[0];
        assert_eq!(javadoc.rule_id, "MissingJavadocMethodCheck");
        assert_eq!(javadoc.severity, Severity::High);
        assert_eq!(javadoc.file, "src/main/java/shop/Auth.java");
        assert_eq!(javadoc.line, 15);

        assert_eq!(payload.findings[1].severity, Severity::Medium);
        assert_eq!(payload.findings[2].severity, Severity::Low);
        assert_eq!(payload.findings[2].file, "src/main/java/shop/Util.java");
    }

    #[test]
    fn test_empty_report_is_clean_not_an_error() {
        let payload = CheckstyleXmlParser
            .parse(br#"<checkstyle version="10.12.4"/>"#)
            .expect("parse empty checkstyle");
        assert!(payload.findings.is_empty());
    }

    #[test]
    fn test_rejects_wrong_root() {
        assert!(CheckstyleXmlParser.parse(b"<pmd/>").is_err());
    }
}
