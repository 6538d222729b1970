//! `Write` implementations for driving the result sink in tests.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// An in-memory writer whose contents stay readable after the writer has
/// been handed off (and possibly dropped) by the code under test.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded as UTF-8.
    pub fn contents(&self) -> String {
        let bytes = self.inner.lock().expect("buffer lock poisoned");
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Written contents split into lines.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .expect("buffer lock poisoned")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A writer that fails every write, like a full disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingWriter;

impl Write for FailingWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "disk full"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Fails its first `failures` writes, then passes everything through to
/// `inner`, like a disk that fills up and is later cleared.
#[derive(Debug, Clone)]
pub struct FlakyWriter<W> {
    inner: W,
    failures: usize,
}

impl<W> FlakyWriter<W> {
    pub fn new(inner: W, failures: usize) -> Self {
        Self { inner, failures }
    }
}

impl<W: Write> Write for FlakyWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
