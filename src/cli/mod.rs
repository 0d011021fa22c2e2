//! Command-line interface for policy-gate
//!
//! - `args`: argument definitions and parsing structures (clap)
//! - `run`: entry point and command dispatch
//! - `commands`: command implementations

pub mod args;
mod commands;
mod run;

pub use args::{BaselineCommands, Cli, Commands, TargetPhase};
pub use run::run;
