//! policy-gate: commit policy gate engine
//!
//! Evaluates whether a commit may proceed by combining three sources of
//! truth: reports left behind by external analyzers (coverage, PMD,
//! detekt, Checkstyle, SpotBugs, secret scanners), a suppression baseline,
//! and the TDD workflow state of the current task. Designed to run from
//! git pre-commit/pre-push hooks and in CI.
//!
//! The pipeline is: ingest reports concurrently, aggregate them into one
//! metrics snapshot, evaluate the configured gates over that snapshot,
//! and render the decision as a human summary or canonical JSON. A
//! workflow-state violation short-circuits before any report is read.
//!
//! The library surface re-exports the pieces hook and CI integrations
//! need; the `policy-gate` binary is a thin wrapper over [`cli::run`].

pub mod cli;
pub mod exit_codes;
pub mod logging;
pub mod pipeline;

pub use exit_codes::ExitCode;
pub use pipeline::{HookPhase, resolve_task_id, run_check, update_baseline};

pub use policy_gate_config::{Config, ConfigError};
pub use policy_gate_metrics::{Metrics, SuppressionBaseline, aggregate};
pub use policy_gate_report::{PolicyDecision, decide, emit_jcs, render_human};
pub use policy_gate_state::{StateError, StateStore, WorkflowState};
pub use policy_gate_types::{Finding, GateVerdict, Phase, Severity, StateCheck, ToolKind};
