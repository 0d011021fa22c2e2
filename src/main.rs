//! policy-gate CLI binary
//!
//! The minimal entrypoint. All logic is in the library; main.rs only
//! invokes cli::run() and maps the error to a process exit code.

fn main() {
    // cli::run() handles ALL output including errors.
    if let Err(code) = policy_gate::cli::run() {
        std::process::exit(code.as_i32());
    }
}
