//! WorkMule Core Library
//!
//! Adapts a traditional one-shot command line program so the same
//! binary can also be spawned as a long-lived worker process that
//! serves many invocations over a framed stdin/stdout protocol:
//! - Request/response frame codec
//! - Flag-file argument expansion
//! - Per-request output capture
//! - The worker loop and mode dispatch

pub mod argfile;
pub mod cancel;
pub mod capture;
pub mod error;
pub mod program;
pub mod protocol;
pub mod worker;

pub use cancel::CancelToken;
pub use capture::CaptureBuffer;
pub use error::WorkerError;
pub use program::{CommandLineProgram, Outcome, Stdio};
pub use protocol::{WorkRequest, WorkResponse};
pub use worker::{Worker, WorkerConfig, PERSISTENT_WORKER_FLAG};
