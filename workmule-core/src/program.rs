//! Command line program boundary
//!
//! The worker wraps anything that looks like a `main` function: take
//! arguments, write text to two output channels, return an exit code.

use std::io::{Read, Write};

/// Explicit I/O channels for one invocation.
///
/// In single-shot mode these are the real process streams. In worker
/// mode they are per-request capture sinks and an already-exhausted
/// input, so concurrent logical invocations never see each other's
/// output and never drain the frame channel by accident.
pub struct Stdio<'a> {
    pub stdin: &'a mut dyn Read,
    pub stdout: &'a mut dyn Write,
    pub stderr: &'a mut dyn Write,
}

/// Result of one program invocation.
#[derive(Debug)]
pub enum Outcome {
    /// Ran to completion with the given exit code.
    Completed(i32),
    /// Observed a cooperative shutdown request. The worker treats this
    /// as a clean exit, never as a request failure.
    Cancelled,
    /// Raised an unrecoverable error. In worker mode this is reported
    /// to the caller as a response with exit code 1 and the loop keeps
    /// serving; in single-shot mode it is fatal.
    Failed(anyhow::Error),
}

impl Outcome {
    pub fn success() -> Self {
        Outcome::Completed(0)
    }

    pub fn failed(err: impl Into<anyhow::Error>) -> Self {
        Outcome::Failed(err.into())
    }
}

/// Interface for command line programs.
///
/// This is the same thing as a main function, except not static.
/// `run` may be called many times over the life of the value; all
/// human-readable output must go through the channels in `io`.
pub trait CommandLineProgram {
    fn run(&mut self, args: &[String], io: Stdio<'_>) -> Outcome;
}
