//! Exit code constants and error mapping
//!
//! Hook scripts treat the exit code as the contract: 0 lets the commit
//! through, anything else aborts it, and the value tells the caller why.

use policy_gate_config::ConfigError;
use policy_gate_state::StateError;

/// Exit code constants for policy-gate.
pub mod codes {
    /// Commit allowed, every blocking gate passed
    pub const SUCCESS: i32 = 0;

    /// One or more blocking gates failed
    pub const GATE_FAILURE: i32 = 1;

    /// Workflow state violation (commit from Red/Stopped, illegal transition)
    pub const STATE_VIOLATION: i32 = 2;

    /// Operational error: config, report ingestion, state lock
    pub const OPERATIONAL: i32 = 3;
}

/// Process exit code wrapper returned by `cli::run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    pub const SUCCESS: Self = Self(codes::SUCCESS);
    pub const GATE_FAILURE: Self = Self(codes::GATE_FAILURE);
    pub const STATE_VIOLATION: Self = Self(codes::STATE_VIOLATION);
    pub const OPERATIONAL: Self = Self(codes::OPERATIONAL);

    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        Self(code)
    }

    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }
}

impl From<&ConfigError> for ExitCode {
    fn from(_: &ConfigError) -> Self {
        Self::OPERATIONAL
    }
}

impl From<&StateError> for ExitCode {
    fn from(error: &StateError) -> Self {
        match error {
            StateError::IllegalCommitState { .. }
            | StateError::IllegalTransition { .. }
            | StateError::CoverageCheckRequired => Self::STATE_VIOLATION,
            // Lock contention and broken state files are environment
            // problems, not policy verdicts.
            StateError::LockTimeout { .. }
            | StateError::Corrupted { .. }
            | StateError::Io { .. } => Self::OPERATIONAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use policy_gate_types::Phase;

    #[test]
    fn test_state_errors_split_policy_from_operational() {
        let illegal = StateError::IllegalCommitState { phase: Phase::Red };
        assert_eq!(ExitCode::from(&illegal), ExitCode::STATE_VIOLATION);

        let timeout = StateError::LockTimeout {
            path: "/tmp/state/PAY-1.lock".to_string(),
            waited_ms: 5000,
        };
        assert_eq!(ExitCode::from(&timeout), ExitCode::OPERATIONAL);
    }

    #[test]
    fn test_config_errors_are_operational() {
        let err = ConfigError::InvalidValue {
            key: "gates.coverage.min_percent".to_string(),
            reason: "must be between 0 and 100".to_string(),
        };
        assert_eq!(ExitCode::from(&err), ExitCode::OPERATIONAL);
    }
}
