//! Append-only result log.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::error::{LoadError, LoadResult};
use crate::record::FIELD_SEPARATOR;

type BoxedWriter = Box<dyn Write + Send>;

/// Line-oriented, append-only writer shared by every virtual user.
///
/// All writes go through one mutex, so lines from concurrent callers never
/// interleave. The stream is unbuffered and each line goes out as a single
/// `write_all` of the line plus its newline, so a failed write leaves no
/// fragment behind to be glued onto the next record. The stream is released by
/// [`close`](Self::close) or, failing that, on drop.
pub struct ResultSink {
    writer: Mutex<Option<BoxedWriter>>,
    path: Option<PathBuf>,
}

impl ResultSink {
    /// Create (or truncate) a log file, creating parent directories.
    pub fn create(path: impl AsRef<Path>) -> LoadResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        debug!(path = %path.display(), "Opened result log");
        Ok(Self {
            writer: Mutex::new(Some(Box::new(file))),
            path: Some(path.to_path_buf()),
        })
    }

    /// Wrap an arbitrary writer.
    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Mutex::new(Some(Box::new(writer))),
            path: None,
        }
    }

    /// Path of the backing file, when there is one.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the header line.
    pub fn write_header(&self, fields: &[&str]) -> LoadResult<()> {
        self.write_line(&fields.join(FIELD_SEPARATOR))
    }

    /// Append one line and flush it.
    pub fn write_line(&self, line: &str) -> LoadResult<()> {
        let mut guard = self.lock();
        let writer = guard.as_mut().ok_or(LoadError::SinkClosed)?;
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        writer.write_all(buf.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Flush and release the stream. Closing twice is a no-op.
    pub fn close(&self) -> LoadResult<()> {
        match self.lock().take() {
            Some(mut writer) => {
                writer.flush()?;
                debug!("Closed result log");
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    fn lock(&self) -> MutexGuard<'_, Option<BoxedWriter>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ResultSink {
    fn drop(&mut self) {
        let writer = self
            .writer
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut writer) = writer {
            if let Err(e) = writer.flush() {
                warn!(error = %e, "Failed to flush result log on drop");
            }
        }
    }
}
