//! Cobertura coverage XML parser
//!
//! Reads overall line coverage from the root `<coverage>` element and a
//! per-file breakdown from each `<class>` so the aggregator can compute
//! critical-path coverage against configured globs. Lines nested under
//! `<methods>` are skipped; only the class-level `<lines>` block counts,
//! otherwise every line would be counted twice.

use quick_xml::Reader;
use quick_xml::events::Event;

use policy_gate_types::{CoverageData, FileCoverage, ToolKind};

use crate::{ParsedPayload, ReportParser};

pub struct CoberturaXmlParser;

impl ReportParser for CoberturaXmlParser {
    fn tool(&self) -> ToolKind {
        ToolKind::Coverage
    }

    fn parse(&self, bytes: &[u8]) -> Result<ParsedPayload, String> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(true);

        let mut root_line_rate: Option<f64> = None;
        let mut root_covered: Option<u64> = None;
        let mut root_valid: Option<u64> = None;

        let mut files: Vec<FileCoverage> = Vec::new();
        let mut current: Option<FileCoverage> = None;
        let mut in_methods = false;
        let mut saw_root = false;

        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                    b"coverage" => {
                        saw_root = true;
                        for attr in e.attributes() {
                            let attr = attr.map_err(|e| e.to_string())?;
                            let value = attr.unescape_value().map_err(|e| e.to_string())?;
                            match attr.key.as_ref() {
                                b"line-rate" => root_line_rate = value.parse().ok(),
                                b"lines-covered" => root_covered = value.parse().ok(),
                                b"lines-valid" => root_valid = value.parse().ok(),
                                _ => {}
                            }
                        }
                    }
                    b"class" => {
                        // A nested <class> inside another is not valid
                        // cobertura; the last one wins.
                        let mut filename = String::new();
                        for attr in e.attributes() {
                            let attr = attr.map_err(|e| e.to_string())?;
                            if attr.key.as_ref() == b"filename" {
                                filename = attr
                                    .unescape_value()
                                    .map_err(|e| e.to_string())?
                                    .into_owned();
                            }
                        }
                        current = Some(FileCoverage {
                            path: filename,
                            lines_valid: 0,
                            lines_covered: 0,
                        });
                        in_methods = false;
                    }
                    b"methods" => in_methods = true,
                    b"line" => {
                        if let Some(file) = current.as_mut() {
                            if !in_methods {
                                let mut hits: u64 = 0;
                                for attr in e.attributes() {
                                    let attr = attr.map_err(|e| e.to_string())?;
                                    if attr.key.as_ref() == b"hits" {
                                        hits = attr
                                            .unescape_value()
                                            .map_err(|e| e.to_string())?
                                            .parse()
                                            .unwrap_or(0);
                                    }
                                }
                                file.lines_valid += 1;
                                if hits > 0 {
                                    file.lines_covered += 1;
                                }
                            }
                        }
                    }
                    _ => {}
                },
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"class" => {
                        if let Some(file) = current.take() {
                            if !file.path.is_empty() {
                                files.push(file);
                            }
                        }
                    }
                    b"methods" => in_methods = false,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(format!("XML error at byte {}: {e}", reader.buffer_position())),
            }
            buf.clear();
        }

        if !saw_root {
            return Err("no <coverage> root element".to_string());
        }

        // Prefer exact line counts; fall back to the line-rate attribute.
        let (lines_covered, lines_valid) = match (root_covered, root_valid) {
            (Some(covered), Some(valid)) => (covered, valid),
            _ => {
                let covered = files.iter().map(|f| f.lines_covered).sum();
                let valid = files.iter().map(|f| f.lines_valid).sum();
                (covered, valid)
            }
        };
        let line_percent = if lines_valid > 0 {
            lines_covered as f64 * 100.0 / lines_valid as f64
        } else {
            root_line_rate.map_or(0.0, |rate| rate * 100.0)
        };
        // Broken reports sometimes claim more covered than valid lines.
        let line_percent = line_percent.clamp(0.0, 100.0);

        Ok(ParsedPayload {
            findings: Vec::new(),
            coverage: Some(CoverageData {
                line_percent,
                lines_covered,
                lines_valid,
                files,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = br#"<?xml version="1.0"?>
<coverage line-rate="0.85" lines-covered="17" lines-valid="20" version="2.1.1" timestamp="1714000000">
  <packages>
    <package name="com.shop.payment">
      <classes>
        <class name="com.shop.payment.Charge" filename="src/payment/Charge.kt" line-rate="1.0">
          <methods>
            <method name="run" signature="()V">
              <lines><line number="10" hits="4"/></lines>
            </method>
          </methods>
          <lines>
            <line number="10" hits="4"/>
            <line number="11" hits="4"/>
            <line number="12" hits="1"/>
          </lines>
        </class>
        <class name="com.shop.cart.Cart" filename="src/cart/Cart.kt" line-rate="0.5">
          <lines>
            <line number="5" hits="1"/>
            <line number="6" hits="0"/>
          </lines>
        </class>
      </classes>
    </package>
  </packages>
</coverage>"#;

    #[test]
    fn test_parses_overall_and_per_file_coverage() {
        let payload = CoberturaXmlParser.parse(SAMPLE).expect("parse cobertura");
        let coverage = payload.coverage.expect("coverage data");

        assert_eq!(coverage.line_percent, 85.0);
        assert_eq!(coverage.lines_covered, 17);
        assert_eq!(coverage.lines_valid, 20);
        assert_eq!(coverage.files.len(), 2);

        let charge = &coverage.files[0];
        assert_eq!(charge.path, "src/payment/Charge.kt");
        // Method-level lines must not double count: 3 class lines, all hit.
        assert_eq!(charge.lines_valid, 3);
        assert_eq!(charge.lines_covered, 3);

        let cart = &coverage.files[1];
        assert_eq!(cart.lines_valid, 2);
        assert_eq!(cart.lines_covered, 1);
    }

    #[test]
    fn test_falls_back_to_line_rate_without_counts() {
        let xml = br#"<coverage line-rate="0.42"><packages/></coverage>"#;
        let payload = CoberturaXmlParser.parse(xml).expect("parse");
        let coverage = payload.coverage.expect("coverage data");
        assert!((coverage.line_percent - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_overclaimed_counts_clamp_to_100() {
        let xml = br#"<coverage lines-covered="120" lines-valid="100"><packages/></coverage>"#;
        let payload = CoberturaXmlParser.parse(xml).expect("parse");
        assert_eq!(payload.coverage.expect("coverage data").line_percent, 100.0);

        let xml = br#"<coverage line-rate="1.3"><packages/></coverage>"#;
        let payload = CoberturaXmlParser.parse(xml).expect("parse");
        assert_eq!(payload.coverage.expect("coverage data").line_percent, 100.0);
    }

    #[test]
    fn test_rejects_non_cobertura_xml() {
        let err = CoberturaXmlParser.parse(b"<pmd></pmd>").unwrap_err();
        assert!(err.contains("coverage"));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(CoberturaXmlParser.parse(b"{\"not\": \"xml\"}").is_err());
    }
}
