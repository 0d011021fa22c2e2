//! CLI entry point and dispatch
//!
//! `run()` parses arguments, sets up logging, loads configuration,
//! creates the tokio runtime and dispatches to command handlers. It owns
//! all error output; main.rs only maps the returned code to the process
//! exit.

use clap::Parser;

use policy_gate_config::Config;

use super::args::{Cli, Commands};
use super::commands;
use crate::ExitCode;
use crate::logging::init_tracing;
use crate::pipeline::resolve_task_id;

pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        // Logging is not worth failing the hook over.
        eprintln!("warning: could not initialize logging: {e}");
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("policy-gate: {err}");
            return Err(ExitCode::from(&err));
        }
    };

    let task_id = resolve_task_id(cli.task.as_deref(), &config.root);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("policy-gate: failed to create async runtime: {e}");
            return Err(ExitCode::OPERATIONAL);
        }
    };

    match cli.command {
        Commands::Check {
            phase,
            state_dir,
            json,
        } => {
            let mut config = config;
            if let Some(dir) = state_dir {
                config.state.dir = Some(dir);
            }
            rt.block_on(commands::check(&config, &task_id, phase, json))
        }
        Commands::Advance { to } => commands::advance(&config, &task_id, to),
        Commands::Abandon => commands::abandon(&config, &task_id),
        Commands::Status { json } => commands::status(&config, &task_id, json),
        Commands::Baseline { command } => rt.block_on(commands::baseline(&config, command)),
    }
}
