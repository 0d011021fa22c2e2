//! Check pipeline
//!
//! Wires the crates together for one `check` run: workflow-state check,
//! concurrent report ingestion under the hook deadline, aggregation, gate
//! evaluation, and the final decision. Also hosts task-identity
//! resolution and the baseline update flow, which reuses the ingestion
//! half of the pipeline.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8Path;
use clap::ValueEnum;
use thiserror::Error;
use tracing::{debug, info, warn};

use policy_gate_config::{Config, ConfigError};
use policy_gate_gates::{build_gates, evaluate_all};
use policy_gate_ingest::{IngestOutcome, IngestRequest, ingest_all};
use policy_gate_metrics::{BaselineError, SuppressionBaseline, aggregate, current_justified_suppressions};
use policy_gate_report::{IngestIssue, PolicyDecision, decide};
use policy_gate_state::{StateError, StateStore};
use policy_gate_types::Phase;

use crate::exit_codes::ExitCode;

/// Environment variable naming the current task explicitly.
pub const TASK_ENV_VAR: &str = "POLICY_GATE_TASK";

/// Which git hook invoked the check; selects the overall deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HookPhase {
    PreCommit,
    PrePush,
}

impl HookPhase {
    #[must_use]
    pub fn deadline(self, config: &Config) -> Duration {
        let secs = match self {
            Self::PreCommit => config.limits.pre_commit_deadline_secs,
            Self::PrePush => config.limits.pre_push_deadline_secs,
        };
        Duration::from_secs(secs)
    }
}

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Baseline(#[from] BaselineError),

    #[error("report ingestion exceeded the {phase:?} deadline of {secs}s")]
    Deadline { phase: HookPhase, secs: u64 },

    #[error("cannot update baseline: {failed} required report(s) failed to ingest")]
    BaselineIngest { failed: usize },
}

impl PipelineError {
    /// Process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Config(e) => ExitCode::from(e),
            Self::State(e) => ExitCode::from(e),
            Self::Baseline(_) | Self::Deadline { .. } | Self::BaselineIngest { .. } => {
                ExitCode::OPERATIONAL
            }
        }
    }
}

/// Resolve the task identity for state tracking.
///
/// Precedence: explicit flag, then `POLICY_GATE_TASK`, then the checked
/// out git branch, then `"default"`. The branch is read straight from
/// `.git/HEAD`; no git subprocess is involved.
#[must_use]
pub fn resolve_task_id(explicit: Option<&str>, root: &Utf8Path) -> String {
    if let Some(task) = explicit {
        return task.to_string();
    }
    if let Ok(task) = std::env::var(TASK_ENV_VAR) {
        if !task.trim().is_empty() {
            return task;
        }
    }
    if let Some(branch) = git_branch(root) {
        return branch;
    }
    "default".to_string()
}

/// Current branch from `.git/HEAD`, `None` when detached or not a repo.
fn git_branch(root: &Utf8Path) -> Option<String> {
    let repo_root = policy_gate_config::find_repo_root(root.as_std_path());
    let head = fs::read_to_string(repo_root.join(".git").join("HEAD")).ok()?;
    let branch = head.trim().strip_prefix("ref: refs/heads/")?;
    if branch.is_empty() {
        None
    } else {
        Some(branch.to_string())
    }
}

fn ingest_issues(outcome: &IngestOutcome) -> Vec<IngestIssue> {
    outcome
        .failures
        .iter()
        .map(|f| IngestIssue {
            tool: f.error.tool().to_string(),
            path: f.error.path().to_string(),
            required: f.required,
            reason: f.error.to_string(),
        })
        .collect()
}

async fn ingest_reports(
    config: &Config,
    deadline: Duration,
    phase: HookPhase,
) -> Result<IngestOutcome, PipelineError> {
    let requests: Vec<IngestRequest> = config
        .reports
        .sources()
        .into_iter()
        .map(|(tool, source)| IngestRequest {
            tool,
            path: config.resolve(&source.path),
            required: source.required,
        })
        .collect();
    debug!(reports = requests.len(), "ingesting configured reports");

    let per_report = Duration::from_secs(config.limits.report_timeout_secs);
    tokio::time::timeout(deadline, ingest_all(requests, per_report))
        .await
        .map_err(|_| PipelineError::Deadline {
            phase,
            secs: deadline.as_secs(),
        })
}

/// Run the full commit check for one task.
///
/// A task in the Red phase fails fast: no report is read and the decision
/// carries no gate verdicts. A task in Stopped also cannot commit, but
/// the pipeline still runs so a passing coverage gate can be recorded as
/// the precondition for the next Red phase.
pub async fn run_check(
    config: &Config,
    task_id: &str,
    phase: HookPhase,
) -> Result<PolicyDecision, PipelineError> {
    let store = StateStore::new(
        config.state_dir(),
        Duration::from_secs(config.limits.lock_timeout_secs),
    );
    let state = store.load(task_id)?;
    let state_check = state.commit_check();

    if state.phase == Phase::Red {
        info!(task = task_id, "commit attempted during red phase");
        return Ok(decide(state_check, Vec::new(), Vec::new()));
    }

    let outcome = ingest_reports(config, phase.deadline(config), phase).await?;
    let issues = ingest_issues(&outcome);

    let baseline = SuppressionBaseline::load(&config.baseline_path())?;
    let critical_paths = config.critical_paths.build_globset()?;
    let metrics = aggregate(&outcome.reports, &baseline, &critical_paths);

    let gates = build_gates(config);
    let verdicts = evaluate_all(&gates, Arc::new(metrics)).await;

    if state.phase == Phase::Stopped {
        // The commit is refused either way, but a clean coverage gate now
        // unlocks the transition into the next red phase. A disabled
        // coverage gate cannot fail, so it never withholds the unlock.
        let coverage_ok = !config.gates.coverage.enabled
            || verdicts.iter().any(|v| v.gate == "coverage" && v.passed);
        if coverage_ok {
            store.update(task_id, |s| {
                s.record_coverage_check(chrono::Utc::now());
                Ok(())
            })?;
            info!(task = task_id, "coverage check recorded while stopped");
        }
        return Ok(decide(state_check, Vec::new(), issues));
    }

    Ok(decide(state_check, verdicts, issues))
}

/// Re-ingest the configured reports and persist the current justified
/// suppression set as the new baseline. Returns the baseline size.
pub async fn update_baseline(config: &Config) -> Result<usize, PipelineError> {
    let per_report = Duration::from_secs(config.limits.report_timeout_secs);
    let requests: Vec<IngestRequest> = config
        .reports
        .sources()
        .into_iter()
        .map(|(tool, source)| IngestRequest {
            tool,
            path: config.resolve(&source.path),
            required: source.required,
        })
        .collect();

    let outcome = ingest_all(requests, per_report).await;
    if outcome.required_failure() {
        let failed = outcome.failures.iter().filter(|f| f.required).count();
        return Err(PipelineError::BaselineIngest { failed });
    }
    for failure in &outcome.failures {
        warn!(error = %failure.error, "skipping optional report during baseline update");
    }

    let identities = current_justified_suppressions(&outcome.reports);
    let baseline = SuppressionBaseline::from_identities(identities);
    baseline.save(&config.baseline_path())?;
    info!(
        count = baseline.len(),
        path = %config.baseline_path(),
        "suppression baseline updated"
    );
    Ok(baseline.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    use camino::Utf8PathBuf;

    fn utf8(dir: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_task_id_prefers_explicit_flag() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_task_id(Some("PAY-7"), &utf8(&dir)), "PAY-7");
    }

    #[test]
    fn test_task_id_from_git_head() {
        let dir = tempfile::tempdir().unwrap();
        let root = utf8(&dir);
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join(".git/HEAD"), "ref: refs/heads/feature/pay-retry\n").unwrap();
        assert_eq!(resolve_task_id(None, &root), "feature/pay-retry");
    }

    #[test]
    fn test_task_id_falls_back_on_detached_head() {
        let dir = tempfile::tempdir().unwrap();
        let root = utf8(&dir);
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join(".git/HEAD"), "a3f9c0d2b8e7415a9c1d2e3f405162738495a6b7\n").unwrap();
        assert_eq!(resolve_task_id(None, &root), "default");
    }

    #[tokio::test]
    async fn test_red_phase_short_circuits_without_reading_reports() {
        let dir = tempfile::tempdir().unwrap();
        let root = utf8(&dir);
        let config = Config::defaults_at(root);

        let store = StateStore::new(config.state_dir(), Duration::from_secs(1));
        store
            .update("PAY-1", |s| {
                s.record_coverage_check(chrono::Utc::now());
                s.advance(Phase::Red, chrono::Utc::now())
            })
            .unwrap();

        let decision = run_check(&config, "PAY-1", HookPhase::PreCommit).await.unwrap();
        assert!(!decision.allowed);
        assert!(!decision.state_check.passed);
        assert!(decision.verdicts.is_empty());
        assert!(decision.ingest_issues.is_empty());
    }

    #[tokio::test]
    async fn test_stopped_check_records_coverage_when_gate_passes() {
        let dir = tempfile::tempdir().unwrap();
        let root = utf8(&dir);
        fs::create_dir_all(root.join("build")).unwrap();
        fs::write(
            root.join("build/coverage.xml"),
            br#"<?xml version="1.0"?>
<coverage line-rate="0.9" lines-covered="90" lines-valid="100"><packages/></coverage>"#,
        )
        .unwrap();
        let mut config = Config::defaults_at(root.clone());
        config.reports.coverage = Some(policy_gate_config::ReportSource {
            path: Utf8PathBuf::from("build/coverage.xml"),
            required: true,
        });

        let decision = run_check(&config, "PAY-2", HookPhase::PreCommit).await.unwrap();
        // Still blocked: no task is running. But the coverage check is in.
        assert!(!decision.allowed);
        assert!(decision.verdicts.is_empty());

        let store = StateStore::new(config.state_dir(), Duration::from_secs(1));
        let state = store.load("PAY-2").unwrap();
        assert!(state.coverage_checked_at.is_some());
        store
            .update("PAY-2", |s| s.advance(Phase::Red, chrono::Utc::now()))
            .unwrap();
    }

    #[tokio::test]
    async fn test_disabled_coverage_gate_still_unlocks_red() {
        let dir = tempfile::tempdir().unwrap();
        let root = utf8(&dir);
        let mut config = Config::defaults_at(root);
        config.gates.coverage.enabled = false;

        let decision = run_check(&config, "PAY-3", HookPhase::PreCommit).await.unwrap();
        assert!(!decision.allowed);

        // No gate can vouch for coverage, so the check itself must.
        let store = StateStore::new(config.state_dir(), Duration::from_secs(1));
        assert!(store.load("PAY-3").unwrap().coverage_checked_at.is_some());
        store
            .update("PAY-3", |s| s.advance(Phase::Red, chrono::Utc::now()))
            .unwrap();
    }

    #[tokio::test]
    async fn test_expired_overall_deadline_aborts_ingestion() {
        let dir = tempfile::tempdir().unwrap();
        let root = utf8(&dir);
        fs::create_dir_all(root.join("build")).unwrap();
        // Large enough that the read cannot finish before the already
        // expired deadline timer is checked.
        fs::write(root.join("build/pmd.xml"), vec![b'x'; 4 << 20]).unwrap();
        let mut config = Config::defaults_at(root);
        config.reports.pmd = Some(policy_gate_config::ReportSource {
            path: Utf8PathBuf::from("build/pmd.xml"),
            required: true,
        });

        let err = ingest_reports(&config, Duration::ZERO, HookPhase::PreCommit)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Deadline { secs: 0, .. }));
        assert_eq!(err.exit_code(), ExitCode::OPERATIONAL);
    }
}
