//! SpotBugs XML parser
//!
//! Parses `<BugCollection><BugInstance>` reports. Severity comes from the
//! bug rank (1-20, lower is worse) when present, falling back to the
//! priority attribute. The first `<SourceLine>` of an instance is its
//! primary location.

use quick_xml::Reader;
use quick_xml::events::Event;

use policy_gate_types::{Finding, Severity, ToolKind};

use crate::{ParsedPayload, ReportParser};

pub struct SpotbugsXmlParser;

fn severity_from_rank(rank: u64) -> Severity {
    // SpotBugs rank bands: 1-4 scariest, 5-9 scary, 10-14 troubling,
    // 15-20 of concern.
    match rank {
        1..=4 => Severity::Critical,
        5..=9 => Severity::High,
        10..=14 => Severity::Medium,
        _ => Severity::Low,
    }
}

fn severity_from_priority(priority: u64) -> Severity {
    match priority {
        1 => Severity::High,
        2 => Severity::Medium,
        _ => Severity::Low,
    }
}

#[derive(Default)]
struct PendingBug {
    bug_type: String,
    severity: Option<Severity>,
    file: Option<String>,
    line: u64,
    message: Option<String>,
    in_long_message: bool,
}

impl ReportParser for SpotbugsXmlParser {
    fn tool(&self) -> ToolKind {
        ToolKind::Spotbugs
    }

    fn parse(&self, bytes: &[u8]) -> Result<ParsedPayload, String> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(true);

        let mut findings = Vec::new();
        let mut current: Option<PendingBug> = None;
        let mut saw_root = false;

        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                    b"BugCollection" => saw_root = true,
                    b"BugInstance" => {
                        let mut bug = PendingBug::default();
                        let mut rank: Option<u64> = None;
                        let mut priority: Option<u64> = None;
                        for attr in e.attributes() {
                            let attr = attr.map_err(|e| e.to_string())?;
                            let value = attr.unescape_value().map_err(|e| e.to_string())?;
                            match attr.key.as_ref() {
                                b"type" => bug.bug_type = value.into_owned(),
                                b"rank" => rank = value.parse().ok(),
                                b"priority" => priority = value.parse().ok(),
                                _ => {}
                            }
                        }
                        bug.severity = rank
                            .map(severity_from_rank)
                            .or_else(|| priority.map(severity_from_priority));
                        current = Some(bug);
                    }
                    b"SourceLine" => {
                        if let Some(bug) = current.as_mut() {
                            if bug.file.is_none() {
                                let mut sourcepath = None;
                                let mut start = 0u64;
                                for attr in e.attributes() {
                                    let attr = attr.map_err(|e| e.to_string())?;
                                    let value = attr.unescape_value().map_err(|e| e.to_string())?;
                                    match attr.key.as_ref() {
                                        b"sourcepath" => sourcepath = Some(value.into_owned()),
                                        b"start" => start = value.parse().unwrap_or(0),
                                        _ => {}
                                    }
                                }
                                if let Some(path) = sourcepath {
                                    bug.file = Some(path);
                                    bug.line = start;
                                }
                            }
                        }
                    }
                    b"LongMessage" | b"ShortMessage" => {
                        if let Some(bug) = current.as_mut() {
                            bug.in_long_message = true;
                        }
                    }
                    _ => {}
                },
                Ok(Event::Text(t)) => {
                    if let Some(bug) = current.as_mut() {
                        if bug.in_long_message && bug.message.is_none() {
                            bug.message =
                                Some(t.unescape().map_err(|e| e.to_string())?.trim().to_string());
                        }
                    }
                }
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"LongMessage" | b"ShortMessage" => {
                        if let Some(bug) = current.as_mut() {
                            bug.in_long_message = false;
                        }
                    }
                    b"BugInstance" => {
                        if let Some(bug) = current.take() {
                            findings.push(Finding {
                                message: bug.message.unwrap_or_else(|| bug.bug_type.clone()),
                                rule_id: bug.bug_type,
                                severity: bug.severity.unwrap_or(Severity::Medium),
                                file: bug.file.unwrap_or_default(),
                                line: bug.line,
                                suppressed: false,
                                suppression_justification: None,
                            });
                        }
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
            return Err("no <BugCollection> root element".to_string());
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
<BugCollection version="4.8.3" sequence="0">
  <BugInstance type="NP_NULL_ON_SOME_PATH" priority="1" rank="3" abbrev="NP" category="CORRECTNESS">
    <LongMessage>Possible null pointer dereference of order in shop.Checkout.submit(Order)</LongMessage>
    <Class classname="shop.Checkout"/>
    <SourceLine classname="shop.Checkout" start="57" end="57" sourcepath="shop/Checkout.java"/>
  </BugInstance>
  <BugInstance type="EI_EXPOSE_REP" priority="2" rank="16" abbrev="EI" category="MALICIOUS_CODE">
    <ShortMessage>May expose internal representation</ShortMessage>
    <SourceLine classname="shop.Cart" start="12" sourcepath="shop/Cart.java"/>
  </BugInstance>
</BugCollection>"#;

    #[test]
    fn test_parses_bug_instances_with_rank_bands() {
        let payload = SpotbugsXmlParser.parse(SAMPLE).expect("parse spotbugs");
        assert_eq!(payload.findings.len(), 2);

        let npe = &payload.findings[0];
        assert_eq!(npe.rule_id, "NP_NULL_ON_SOME_PATH");
        assert_eq!(npe.severity, Severity::Critical);
        assert_eq!(npe.file, "shop/Checkout.java");
        assert_eq!(npe.line, 57);
        assert!(npe.message.contains("null pointer"));

        let expose = &payload.findings[1];
        assert_eq!(expose.severity, Severity::Low);
        assert_eq!(expose.line, 12);
    }

    #[test]
    fn test_priority_fallback_without_rank() {
        let xml = br#"<BugCollection>
  <BugInstance type="DM_EXIT" priority="1">
    <SourceLine classname="a.B" start="4" sourcepath="a/B.java"/>
  </BugInstance>
</BugCollection>"#;
        let payload = SpotbugsXmlParser.parse(xml).expect("parse");
        assert_eq!(payload.findings[0].severity, Severity::High);
        // No message elements: the bug type stands in.
        assert_eq!(payload.findings[0].message, "DM_EXIT");
    }

    #[test]
    fn test_rejects_wrong_root() {
        assert!(SpotbugsXmlParser.parse(b"<coverage/>").is_err());
    }
}
