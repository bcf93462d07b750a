//! Per-request output capture
//!
//! Instead of swapping process-global streams in and out, the worker
//! hands the program explicit sinks that append to one shared buffer.
//! Both output channels feed the same buffer so relative write order
//! is preserved, and there is no restore step that could be skipped
//! when the program fails.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crate::program::{Outcome, Stdio};

/// Byte-accumulating sink for one request's output.
///
/// Owned by the worker loop and reused across requests: `clear` keeps
/// the allocation, the loop's compaction hint handles idle memory.
#[derive(Default)]
pub struct CaptureBuffer {
    bytes: Rc<RefCell<Vec<u8>>>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` with both output channels wired into this buffer and
    /// an already-exhausted input channel. The accumulated text stays
    /// readable via [`text`](Self::text) after the scope returns,
    /// whatever the outcome.
    pub fn capture<F>(&self, f: F) -> Outcome
    where
        F: FnOnce(Stdio<'_>) -> Outcome,
    {
        let mut stdin = io::empty();
        let mut stdout = self.writer();
        let mut stderr = self.writer();
        f(Stdio {
            stdin: &mut stdin,
            stdout: &mut stdout,
            stderr: &mut stderr,
        })
    }

    /// Another handle appending to the same buffer. The worker loop
    /// uses one to surface failure traces in the response text.
    pub fn writer(&self) -> CaptureWriter {
        CaptureWriter {
            bytes: Rc::clone(&self.bytes),
        }
    }

    /// Captured output so far, lossily decoded as UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes.borrow()).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.borrow().is_empty()
    }

    /// Empties the buffer without giving back its allocation.
    pub fn clear(&self) {
        self.bytes.borrow_mut().clear();
    }
}

/// Infallible writer into a [`CaptureBuffer`].
pub struct CaptureWriter {
    bytes: Rc<RefCell<Vec<u8>>>,
}

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::io::Read;

    #[test]
    fn write_order_is_preserved_across_channels() {
        let buffer = CaptureBuffer::new();
        let outcome = buffer.capture(|io| {
            write!(io.stdout, "a").unwrap();
            write!(io.stderr, "b").unwrap();
            write!(io.stdout, "c").unwrap();
            Outcome::success()
        });
        assert!(matches!(outcome, Outcome::Completed(0)));
        assert_eq!(buffer.text(), "abc");
    }

    #[test]
    fn input_is_already_exhausted() {
        let buffer = CaptureBuffer::new();
        buffer.capture(|io| {
            let mut read = String::new();
            assert_eq!(io.stdin.read_to_string(&mut read).unwrap(), 0);
            Outcome::success()
        });
    }

    #[test]
    fn text_survives_a_failed_scope() {
        let buffer = CaptureBuffer::new();
        let outcome = buffer.capture(|io| {
            write!(io.stderr, "partial").unwrap();
            Outcome::failed(anyhow!("boom"))
        });
        assert!(matches!(outcome, Outcome::Failed(_)));
        assert_eq!(buffer.text(), "partial");
    }

    #[test]
    fn clear_empties_the_buffer() {
        let buffer = CaptureBuffer::new();
        buffer.capture(|io| {
            write!(io.stdout, "x").unwrap();
            Outcome::success()
        });
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.text(), "");
    }
}
