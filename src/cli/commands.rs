//! Command implementations
//!
//! Each handler prints its own output (stdout for results, stderr for
//! errors) and returns `Err(ExitCode)` when the process should exit
//! non-zero.

use std::time::Duration;

use chrono::Utc;

use policy_gate_config::Config;
use policy_gate_report::emit_jcs;
use policy_gate_state::StateStore;

use super::args::{BaselineCommands, TargetPhase};
use crate::ExitCode;
use crate::logging::use_color;
use crate::pipeline::{self, HookPhase};

fn store_for(config: &Config) -> StateStore {
    StateStore::new(
        config.state_dir(),
        Duration::from_secs(config.limits.lock_timeout_secs),
    )
}

/// `policy-gate check --phase <hook>`
pub async fn check(
    config: &Config,
    task_id: &str,
    phase: HookPhase,
    json: bool,
) -> Result<(), ExitCode> {
    let decision = match pipeline::run_check(config, task_id, phase).await {
        Ok(decision) => decision,
        Err(err) => {
            eprintln!("policy-gate: {err}");
            return Err(err.exit_code());
        }
    };

    if json {
        match emit_jcs(&decision) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("policy-gate: failed to emit JSON: {e}");
                return Err(ExitCode::OPERATIONAL);
            }
        }
    } else {
        print!("{}", policy_gate_report::render_human(&decision, use_color()));
    }

    let code = decision.exit_code();
    if code == 0 {
        Ok(())
    } else {
        Err(ExitCode::from_code(code))
    }
}

/// `policy-gate advance <phase>`
pub fn advance(config: &Config, task_id: &str, to: TargetPhase) -> Result<(), ExitCode> {
    let store = store_for(config);
    let target = to.as_phase();
    match store.update(task_id, |state| state.advance(target, Utc::now())) {
        Ok(state) => {
            println!("task {} is now {}", task_id, state.phase);
            Ok(())
        }
        Err(err) => {
            eprintln!("policy-gate: {err}");
            Err(ExitCode::from(&err))
        }
    }
}

/// `policy-gate abandon`
pub fn abandon(config: &Config, task_id: &str) -> Result<(), ExitCode> {
    let store = store_for(config);
    match store.update(task_id, |state| {
        state.abandon(Utc::now());
        Ok(())
    }) {
        Ok(_) => {
            println!("task {task_id} abandoned");
            Ok(())
        }
        Err(err) => {
            eprintln!("policy-gate: {err}");
            Err(ExitCode::from(&err))
        }
    }
}

/// `policy-gate status`
pub fn status(config: &Config, task_id: &str, json: bool) -> Result<(), ExitCode> {
    let store = store_for(config);
    let state = match store.load(task_id) {
        Ok(state) => state,
        Err(err) => {
            eprintln!("policy-gate: {err}");
            return Err(ExitCode::from(&err));
        }
    };

    if json {
        match emit_jcs(&state) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("policy-gate: failed to emit JSON: {e}");
                return Err(ExitCode::OPERATIONAL);
            }
        }
    } else {
        println!("task {}", state.task_id);
        println!("phase {} (entered {})", state.phase, state.entered_at.to_rfc3339());
        match state.coverage_checked_at {
            Some(at) => println!("coverage check recorded {}", at.to_rfc3339()),
            None => println!("coverage check not recorded"),
        }
        println!(
            "commit {}",
            if state.phase.permits_commit() { "permitted" } else { "not permitted" }
        );
    }
    Ok(())
}

/// `policy-gate baseline update`
pub async fn baseline(config: &Config, command: BaselineCommands) -> Result<(), ExitCode> {
    match command {
        BaselineCommands::Update => match pipeline::update_baseline(config).await {
            Ok(count) => {
                println!(
                    "baseline updated: {count} justified suppression(s) at {}",
                    config.baseline_path()
                );
                Ok(())
            }
            Err(err) => {
                eprintln!("policy-gate: {err}");
                Err(err.exit_code())
            }
        },
    }
}
