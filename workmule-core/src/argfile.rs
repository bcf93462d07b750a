//! Flag-file argument expansion
//!
//! A trailing `@file` argument stands for the lines of that file. In
//! single-shot mode only files that actually exist are expanded, so a
//! literal argument that happens to start with `@` still passes
//! through. A worker additionally honors the doubled `@@` form without
//! checking existence, letting a request force flag-file semantics; a
//! missing file then fails the request instead of being ignored.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Marker for indirect argument files.
const FLAG_FILE_MARKER: char = '@';

#[derive(Error, Debug)]
pub enum ArgfileError {
    #[error("failed to read flag file {path}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result of resolving one argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedArgs {
    pub args: Vec<String>,
    /// True when a trailing flag file was substituted for its lines.
    /// The dispatcher uses this to emit the one-time worker-mode hint.
    pub expanded: bool,
}

impl LoadedArgs {
    fn literal(args: Vec<String>) -> Self {
        Self {
            args,
            expanded: false,
        }
    }
}

/// Resolves `args`, expanding a trailing flag-file reference.
///
/// Resolution is fresh on every call; nothing is cached and the file
/// is not held open past the read.
pub fn load_arguments(args: Vec<String>, worker_mode: bool) -> Result<LoadedArgs, ArgfileError> {
    let Some(last) = args.last() else {
        return Ok(LoadedArgs::literal(args));
    };
    if !last.starts_with(FLAG_FILE_MARKER) {
        return Ok(LoadedArgs::literal(args));
    }
    let path = Path::new(last.trim_start_matches(FLAG_FILE_MARKER));
    let forced = worker_mode && last.starts_with("@@");
    if !forced && !path.exists() {
        // Not an accepted reference; keep the token as a literal.
        return Ok(LoadedArgs::literal(args));
    }
    let contents = fs::read_to_string(path).map_err(|source| ArgfileError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(LoadedArgs {
        args: contents.lines().map(str::to_owned).collect(),
        expanded: true,
    })
}
