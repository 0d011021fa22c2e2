//! CLI argument definitions and parsing structures

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand, ValueEnum};

use crate::pipeline::HookPhase;

/// policy-gate - commit policy gate engine for git hooks and CI
#[derive(Parser)]
#[command(name = "policy-gate")]
#[command(about = "Evaluates commit policy gates over analyzer reports and TDD workflow state")]
#[command(long_about = r#"
policy-gate decides whether a commit may proceed. It never runs analyzers
itself: it parses the report files they leave behind (coverage, PMD,
detekt, Checkstyle, SpotBugs, secret scanners), aggregates them into one
metrics snapshot, and evaluates the configured gates. A TDD workflow
state machine additionally refuses commits while a task is in its red
phase.

EXAMPLES:
  # From a pre-commit hook
  policy-gate check --phase pre-commit

  # From a pre-push hook, machine-readable for CI
  policy-gate check --phase pre-push --json

  # Drive the TDD cycle
  policy-gate advance red
  policy-gate advance green
  policy-gate advance refactor
  policy-gate advance done

  # Inspect the current task
  policy-gate status --json

  # Accept the current justified suppressions
  policy-gate baseline update

EXIT CODES:
  0  commit allowed
  1  blocking gate failure
  2  workflow state violation
  3  operational error (config, report ingestion, state lock)

CONFIGURATION:
  Discovered by searching upward from CWD for .policy-gate/config.toml;
  POLICY_GATE_* environment variables override individual values.
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Task identity (overrides POLICY_GATE_TASK and the git branch)
    #[arg(long, global = true)]
    pub task: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the commit policy check (the hook entry point)
    Check {
        /// Which hook invoked the check; selects the overall deadline
        #[arg(long, value_enum)]
        phase: HookPhase,

        /// Directory holding per-task workflow state
        #[arg(long)]
        state_dir: Option<Utf8PathBuf>,

        /// Emit the decision as canonical JSON instead of the human summary
        #[arg(long)]
        json: bool,
    },

    /// Move the current task to the next workflow phase
    Advance {
        /// Target phase
        #[arg(value_enum)]
        to: TargetPhase,
    },

    /// Abandon the current task, returning it to the stopped phase
    Abandon,

    /// Show the persisted workflow state of the current task
    Status {
        /// Emit canonical JSON instead of the human summary
        #[arg(long)]
        json: bool,
    },

    /// Manage the suppression baseline
    Baseline {
        #[command(subcommand)]
        command: BaselineCommands,
    },
}

#[derive(Subcommand)]
pub enum BaselineCommands {
    /// Re-ingest reports and accept the current justified suppressions
    Update,
}

/// Phase names accepted by `advance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TargetPhase {
    Red,
    Green,
    Refactor,
    Done,
}

impl TargetPhase {
    #[must_use]
    pub fn as_phase(self) -> policy_gate_types::Phase {
        use policy_gate_types::Phase;
        match self {
            Self::Red => Phase::Red,
            Self::Green => Phase::Green,
            Self::Refactor => Phase::Refactoring,
            Self::Done => Phase::Stopped,
        }
    }
}
