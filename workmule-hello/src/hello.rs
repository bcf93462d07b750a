//! Greeting program used to exercise the worker adapter end to end.

use std::io::Write;

use anyhow::anyhow;
use workmule_core::{CommandLineProgram, Outcome, Stdio};

/// Writes one greeting per argument. A literal `--fail` argument
/// aborts with an error, giving the per-request failure path a manual
/// trigger.
pub struct HelloProgram;

impl CommandLineProgram for HelloProgram {
    fn run(&mut self, args: &[String], mut io: Stdio<'_>) -> Outcome {
        for arg in args {
            if arg == "--fail" {
                return Outcome::failed(anyhow!("refusing to greet: --fail given"));
            }
            if let Err(err) = writeln!(io.stdout, "Hello, {arg}!") {
                return Outcome::failed(err);
            }
        }
        Outcome::success()
    }
}
