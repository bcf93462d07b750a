//! Worker error types

use std::io;

use thiserror::Error;

use crate::argfile::ArgfileError;
use crate::protocol::FrameError;

/// Conditions that are fatal to the process.
///
/// Per-request failures never surface here; the worker loop reports
/// them inside a response with exit code 1 and keeps serving.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// An accepted flag file could not be read in single-shot mode.
    #[error(transparent)]
    Argfile(#[from] ArgfileError),

    /// The frame channel itself is broken.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// I/O failure on a real channel outside the scope of a request.
    #[error("i/o error on worker channel")]
    Io(#[from] io::Error),

    /// The program failed during a single-shot run.
    #[error("program failed")]
    Program(#[source] anyhow::Error),
}
