//! WorkMule demo worker
//!
//! Minimal binary showing how a one-shot program picks up worker
//! support unchanged in interface: run it directly for a single
//! invocation, or with `--persistent_worker` to serve framed requests
//! over stdin/stdout.

use std::io;

use anyhow::Result;
use tracing::info;
use workmule_core::{Worker, WorkerConfig};

mod hello;

fn main() -> Result<()> {
    // Logging goes to stderr; stdout carries response frames in
    // worker mode.
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    info!("workmule-hello starting");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut worker = Worker::new(
        hello::HelloProgram,
        WorkerConfig {
            mnemonic: "Hello".to_string(),
        },
    );
    std::process::exit(worker.run(&args)?);
}
