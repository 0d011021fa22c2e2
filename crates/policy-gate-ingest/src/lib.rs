//! Report ingestors for policy-gate
//!
//! Each supported tool format implements the [`ReportParser`] capability;
//! new tools are added by implementing the trait, not by modifying the
//! existing parsers. Parsing is pure: bytes in, normalized findings out.
//! File access and timeouts live in [`ingest_all`], which reads all
//! configured reports concurrently and collects per-report failures
//! instead of aborting sibling ingestions.

mod checkstyle;
mod coverage;
mod detekt;
mod pmd;
mod secrets;
mod spotbugs;

use std::time::Duration;

use camino::Utf8PathBuf;
use tracing::{debug, warn};

use policy_gate_types::{CoverageData, Finding, ToolKind, ToolReport};

pub use checkstyle::CheckstyleXmlParser;
pub use coverage::CoberturaXmlParser;
pub use detekt::DetektParser;
pub use pmd::PmdXmlParser;
pub use secrets::SecretScanJsonParser;
pub use spotbugs::SpotbugsXmlParser;

/// Ingestion failure for a single report.
///
/// Recoverable per-report: sibling ingestions continue, and the aggregator
/// decides (per the report's `required` flag) whether the run blocks. A
/// missing report is always distinguishable from an empty-clean one.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("No {tool} report at {path}")]
    Missing { tool: ToolKind, path: Utf8PathBuf },

    #[error("Malformed {tool} report {path}: {reason}")]
    Malformed {
        tool: ToolKind,
        path: Utf8PathBuf,
        reason: String,
    },

    #[error("Timed out reading {tool} report {path} after {timeout_secs}s")]
    Timeout {
        tool: ToolKind,
        path: Utf8PathBuf,
        timeout_secs: u64,
    },

    #[error("Failed to read {tool} report {path}: {reason}")]
    Io {
        tool: ToolKind,
        path: Utf8PathBuf,
        reason: String,
    },
}

impl IngestError {
    /// Tool whose report failed to ingest.
    #[must_use]
    pub fn tool(&self) -> ToolKind {
        match self {
            Self::Missing { tool, .. }
            | Self::Malformed { tool, .. }
            | Self::Timeout { tool, .. }
            | Self::Io { tool, .. } => *tool,
        }
    }

    /// Report path involved in the failure.
    #[must_use]
    pub fn path(&self) -> &Utf8PathBuf {
        match self {
            Self::Missing { path, .. }
            | Self::Malformed { path, .. }
            | Self::Timeout { path, .. }
            | Self::Io { path, .. } => path,
        }
    }
}

/// Payload produced by a parser, before it is tagged with tool and path.
#[derive(Debug, Default)]
pub struct ParsedPayload {
    pub findings: Vec<Finding>,
    pub coverage: Option<CoverageData>,
}

/// Capability implemented once per supported report format.
pub trait ReportParser: Send + Sync {
    /// Tool whose output this parser understands.
    fn tool(&self) -> ToolKind;

    /// Parse raw report bytes into normalized findings.
    ///
    /// Returns a human-readable reason on malformed input; the caller
    /// wraps it into [`IngestError::Malformed`] with tool and path.
    fn parse(&self, bytes: &[u8]) -> Result<ParsedPayload, String>;
}

/// Parser for the given tool's report format.
#[must_use]
pub fn parser_for(tool: ToolKind) -> Box<dyn ReportParser> {
    match tool {
        ToolKind::Coverage => Box::new(CoberturaXmlParser),
        ToolKind::Pmd => Box::new(PmdXmlParser),
        ToolKind::Detekt => Box::new(DetektParser),
        ToolKind::Checkstyle => Box::new(CheckstyleXmlParser),
        ToolKind::Spotbugs => Box::new(SpotbugsXmlParser),
        ToolKind::SecretScan => Box::new(SecretScanJsonParser),
    }
}

/// One report that failed to ingest, with the config's `required` flag.
#[derive(Debug)]
pub struct FailedIngest {
    pub error: IngestError,
    pub required: bool,
}

/// Result of ingesting every configured report.
#[derive(Debug, Default)]
pub struct IngestOutcome {
    /// Successfully parsed reports, in configuration order
    pub reports: Vec<ToolReport>,
    /// Per-report failures, never silently dropped
    pub failures: Vec<FailedIngest>,
}

impl IngestOutcome {
    /// True when a report marked `required` failed to ingest.
    #[must_use]
    pub fn required_failure(&self) -> bool {
        self.failures.iter().any(|f| f.required)
    }
}

/// One report to ingest: tool, report file, and whether a failure blocks.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub tool: ToolKind,
    pub path: Utf8PathBuf,
    pub required: bool,
}

/// Ingest a single report file synchronously.
pub fn ingest(tool: ToolKind, path: &Utf8PathBuf) -> Result<ToolReport, IngestError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(IngestError::Missing {
                tool,
                path: path.clone(),
            });
        }
        Err(e) => {
            return Err(IngestError::Io {
                tool,
                path: path.clone(),
                reason: e.to_string(),
            });
        }
    };
    parse_bytes(tool, path, &bytes)
}

fn parse_bytes(tool: ToolKind, path: &Utf8PathBuf, bytes: &[u8]) -> Result<ToolReport, IngestError> {
    let parser = parser_for(tool);
    let payload = parser.parse(bytes).map_err(|reason| IngestError::Malformed {
        tool,
        path: path.clone(),
        reason,
    })?;
    debug!(
        tool = %tool,
        path = %path,
        findings = payload.findings.len(),
        "Ingested report"
    );
    Ok(ToolReport {
        tool,
        source_path: path.clone(),
        findings: payload.findings,
        coverage: payload.coverage,
    })
}

/// Ingest all requested reports concurrently.
///
/// Each report is read with its own timeout; a slow or broken report never
/// stalls the others. Results keep the request order so downstream output
/// is deterministic.
pub async fn ingest_all(requests: Vec<IngestRequest>, timeout: Duration) -> IngestOutcome {
    let mut handles = Vec::with_capacity(requests.len());
    for request in requests {
        let tool = request.tool;
        let path = request.path.clone();
        handles.push((
            tool,
            path,
            request.required,
            tokio::spawn(ingest_one(request.tool, request.path, timeout)),
        ));
    }

    let mut outcome = IngestOutcome::default();
    for (tool, path, required, handle) in handles {
        match handle.await {
            Ok(Ok(report)) => outcome.reports.push(report),
            Ok(Err(error)) => {
                warn!(tool = %error.tool(), path = %error.path(), %error, "Report ingestion failed");
                outcome.failures.push(FailedIngest { error, required });
            }
            Err(join_error) => {
                // A panicking parser is a parser bug; surface it like any
                // other ingestion failure rather than taking the run down.
                outcome.failures.push(FailedIngest {
                    error: IngestError::Io {
                        tool,
                        path,
                        reason: format!("ingestion task failed: {join_error}"),
                    },
                    required,
                });
            }
        }
    }
    outcome
}

async fn ingest_one(
    tool: ToolKind,
    path: Utf8PathBuf,
    timeout: Duration,
) -> Result<ToolReport, IngestError> {
    match tokio::time::timeout(timeout, read_and_parse(tool, path.clone())).await {
        Ok(result) => result,
        Err(_) => Err(IngestError::Timeout {
            tool,
            path,
            timeout_secs: timeout.as_secs(),
        }),
    }
}

async fn read_and_parse(tool: ToolKind, path: Utf8PathBuf) -> Result<ToolReport, IngestError> {
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(IngestError::Missing { tool, path });
        }
        Err(e) => {
            return Err(IngestError::Io {
                tool,
                path,
                reason: e.to_string(),
            });
        }
    };
    parse_bytes(tool, &path, &bytes)
}
