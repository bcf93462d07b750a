//! Persistent worker adapter
//!
//! Wraps a [`CommandLineProgram`] so the same binary can be spawned
//! the traditional way (run once, exit) or as a long-lived worker
//! process that answers framed requests over its standard streams,
//! one at a time, without paying startup cost per invocation. The
//! worker stays backwards compatible with single-shot invocation:
//! mode is decided once from the initial argument list.

use std::io::{self, BufRead, Write};

use tracing::{debug, error, info};

use crate::argfile::{self, LoadedArgs};
use crate::cancel::CancelToken;
use crate::capture::CaptureBuffer;
use crate::error::WorkerError;
use crate::program::{CommandLineProgram, Outcome, Stdio};
use crate::protocol::{self, WorkRequest, WorkResponse};

/// Exact token that selects persistent mode. It is consumed by the
/// dispatcher and never forwarded to the wrapped program.
pub const PERSISTENT_WORKER_FLAG: &str = "--persistent_worker";

/// Startup configuration for a worker.
pub struct WorkerConfig {
    /// Human-readable label for the wrapped program, used in the
    /// one-time hint suggesting worker mode. Empty disables the hint.
    pub mnemonic: String,
}

/// Outcome of servicing one request, seen from the loop.
enum Serviced {
    /// Response written; await the next frame.
    Next,
    /// The program observed a shutdown request mid-service.
    Interrupted,
}

pub struct Worker<P> {
    program: P,
    config: WorkerConfig,
    cancel: CancelToken,
    buffer: CaptureBuffer,
    diagnostics: Box<dyn Write>,
}

impl<P: CommandLineProgram> Worker<P> {
    pub fn new(program: P, config: WorkerConfig) -> Self {
        Self {
            program,
            config,
            cancel: CancelToken::new(),
            buffer: CaptureBuffer::new(),
            diagnostics: Box::new(io::stderr()),
        }
    }

    /// Redirects hint and shutdown notices away from the real stderr.
    pub fn with_diagnostics(mut self, sink: Box<dyn Write>) -> Self {
        self.diagnostics = sink;
        self
    }

    /// Handle for asking the worker to shut down cleanly. Checked at
    /// the frame boundary and before each program invocation.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Entry point. Decides once, from the argument list, whether to
    /// run the program a single time against the real streams or to
    /// serve framed requests until the host closes the stream.
    pub fn run(&mut self, args: &[String]) -> Result<i32, WorkerError> {
        if args.iter().any(|arg| arg == PERSISTENT_WORKER_FLAG) {
            let stdin = io::stdin();
            let stdout = io::stdout();
            self.serve(stdin.lock(), stdout.lock())
        } else {
            self.run_once(args)
        }
    }

    /// Single-shot mode: one invocation on the real process streams.
    fn run_once(&mut self, args: &[String]) -> Result<i32, WorkerError> {
        let loaded = argfile::load_arguments(args.to_vec(), false)?;
        if loaded.expanded && !self.config.mnemonic.is_empty() {
            let mnemonic = &self.config.mnemonic;
            writeln!(
                self.diagnostics,
                "HINT: {mnemonic} will compile faster if you run: \
                 echo \"build --strategy={mnemonic}=worker\" >>~/.bazelrc"
            )?;
        }
        let stdin = io::stdin();
        let stdout = io::stdout();
        let stderr = io::stderr();
        let mut stdin = stdin.lock();
        let mut stdout = stdout.lock();
        let mut stderr = stderr.lock();
        let outcome = self.program.run(
            &loaded.args,
            Stdio {
                stdin: &mut stdin,
                stdout: &mut stdout,
                stderr: &mut stderr,
            },
        );
        match outcome {
            Outcome::Completed(code) => Ok(code),
            Outcome::Cancelled => {
                info!("interrupted, exiting cleanly");
                Ok(0)
            }
            Outcome::Failed(err) => Err(WorkerError::Program(err)),
        }
    }

    /// Persistent mode: serves framed requests until end of stream.
    ///
    /// Returns the process exit code: 0 for a clean shutdown (end of
    /// stream or interruption). A broken frame channel is fatal and
    /// propagates as an error instead.
    pub fn serve<R, W>(&mut self, mut requests: R, mut responses: W) -> Result<i32, WorkerError>
    where
        R: BufRead,
        W: Write,
    {
        info!("serving persistent work requests");
        loop {
            if self.cancel.is_cancelled() {
                return Ok(self.shutdown_on_interrupt());
            }
            let request = match protocol::read_request(&mut requests) {
                Ok(Some(request)) => request,
                Ok(None) => {
                    debug!("request stream closed, shutting down");
                    return Ok(0);
                }
                Err(_) if self.cancel.is_cancelled() => {
                    return Ok(self.shutdown_on_interrupt());
                }
                Err(err) => return Err(err.into()),
            };
            match self.service(&request, &mut responses)? {
                Serviced::Next => {}
                Serviced::Interrupted => return Ok(self.shutdown_on_interrupt()),
            }
        }
    }

    /// Services one request: argument expansion, captured program run,
    /// one response. Program failures are reported in the response and
    /// never kill the loop; only a broken response channel is fatal.
    fn service<W: Write>(
        &mut self,
        request: &WorkRequest,
        responses: &mut W,
    ) -> Result<Serviced, WorkerError> {
        let outcome = match argfile::load_arguments(request.arguments.clone(), true) {
            Ok(LoadedArgs { args, .. }) => {
                let program = &mut self.program;
                let cancel = self.cancel.clone();
                self.buffer.capture(|io| {
                    if cancel.is_cancelled() {
                        return Outcome::Cancelled;
                    }
                    program.run(&args, io)
                })
            }
            Err(err) => Outcome::failed(err),
        };
        let exit_code = match outcome {
            Outcome::Completed(code) => code,
            Outcome::Cancelled => return Ok(Serviced::Interrupted),
            Outcome::Failed(err) => {
                error!(arguments = ?request.arguments, "request failed: {err:#}");
                // Surface the trace in the response so the caller sees
                // it next to the rest of the captured output.
                let mut sink = self.buffer.writer();
                writeln!(
                    sink,
                    "ERROR: worker request failed with args: {}",
                    request.arguments.join(" ")
                )?;
                for cause in err.chain() {
                    writeln!(sink, "  {cause}")?;
                }
                1
            }
        };
        let response = WorkResponse {
            output: self.buffer.text(),
            exit_code,
            request_id: request.request_id,
        };
        protocol::write_response(responses, &response)?;
        self.buffer.clear();
        trim_idle_memory();
        Ok(Serviced::Next)
    }

    fn shutdown_on_interrupt(&mut self) -> i32 {
        info!("terminating worker on interrupt signal");
        let _ = writeln!(self.diagnostics, "Terminating worker due to interrupt signal");
        0
    }
}

/// Voluntary compaction hint; the process is expected to sit idle
/// between bursts of requests.
fn trim_idle_memory() {
    #[cfg(target_os = "linux")]
    unsafe {
        libc::malloc_trim(0);
    }
}
