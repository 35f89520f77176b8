// src/iodevice.rs
//
//! Local-copy-backed file handle.
//!
//! Remote objects are whole-value and immutable, so a seekable, randomly
//! writable file is emulated with a transient local copy: the object is
//! materialized (or created empty) on open, all reads, writes and seeks run
//! against the copy, and a dirty copy is re-uploaded in full on close. The
//! local artifact never outlives the handle.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error};
use tempfile::{NamedTempFile, TempPath};

use crate::client::{ClientErrorKind, ObjectClient};
use crate::constants::{HEAD_TIMEOUT, TRANSFER_TIMEOUT};
use crate::error::{Result, StorageError};

/// Access mode requested at open time. Capability checks on read/write are
/// made against this, not against the underlying local file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    WriteOnly,
}

/// A seekable handle over a locally buffered copy of one remote object.
///
/// Handles are independent of the engine lock and of each other. Two handles
/// opened concurrently on the same key are not coordinated: whichever closes
/// last overwrites the object (last-close-wins).
pub struct LocalCopyFile {
    client: Arc<dyn ObjectClient>,
    key: String,
    mode: OpenMode,
    local: TempPath,
    position: u64,
    local_size: u64,
    dirty: bool,
    transfer_timeout: Duration,
}

impl std::fmt::Debug for LocalCopyFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCopyFile")
            .field("key", &self.key)
            .field("mode", &self.mode)
            .field("local", &self.local)
            .field("position", &self.position)
            .field("local_size", &self.local_size)
            .field("dirty", &self.dirty)
            .field("transfer_timeout", &self.transfer_timeout)
            .finish_non_exhaustive()
    }
}

impl LocalCopyFile {
    /// Materialize `key` into a local copy and return a handle over it.
    ///
    /// Write mode with an absent object creates an empty local copy only;
    /// nothing is uploaded until the handle is written to and closed, so an
    /// untouched write handle never materializes a remote object. Read mode
    /// with an absent object fails with [`StorageError::NotFound`]. Any
    /// download failure fails the open with [`StorageError::Transfer`] and
    /// removes the partial copy.
    pub fn open(client: Arc<dyn ObjectClient>, key: &str, mode: OpenMode) -> Result<Self> {
        let exists = match client.head(key, HEAD_TIMEOUT) {
            Ok(_) => true,
            Err(e) if e.kind() == ClientErrorKind::NotFound => false,
            Err(e) => return Err(StorageError::Transfer(format!("head {key} failed: {e}"))),
        };

        debug!("open {key} mode {mode:?}, remote exists: {exists}");

        if mode == OpenMode::ReadOnly && !exists {
            return Err(StorageError::NotFound(key.to_string()));
        }

        let mut tmp = NamedTempFile::with_prefix("s3vfs_")?;
        let mut local_size = 0u64;

        if exists {
            let data = client
                .get(key, TRANSFER_TIMEOUT)
                .map_err(|e| StorageError::Transfer(format!("download {key} failed: {e}")))?;
            tmp.write_all(&data)?;
            tmp.flush()?;
            local_size = data.len() as u64;
        }

        Ok(Self {
            client,
            key: key.to_string(),
            mode,
            local: tmp.into_temp_path(),
            position: 0,
            local_size,
            dirty: false,
            transfer_timeout: TRANSFER_TIMEOUT,
        })
    }

    /// Read up to `buf.len()` bytes from the current position. Returns the
    /// number of bytes actually read; 0 means end-of-file, never an error.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.mode != OpenMode::ReadOnly {
            return Err(StorageError::ReadNotSupported);
        }

        let remaining = self.local_size.saturating_sub(self.position);
        let want = (buf.len() as u64).min(remaining) as usize;
        if want == 0 {
            return Ok(0);
        }

        let mut f = OpenOptions::new().read(true).open(&self.local)?;
        f.seek(SeekFrom::Start(self.position))?;
        f.read_exact(&mut buf[..want])?;
        self.position += want as u64;
        Ok(want)
    }

    /// Write `buf` at the current position, zero-filling any gap past the
    /// end of the copy, and advance the position. The copy's size is
    /// re-measured from the file itself afterwards, so overlapping writes
    /// report the true resulting length.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.mode != OpenMode::WriteOnly {
            return Err(StorageError::WriteNotSupported);
        }

        let mut f = OpenOptions::new().read(true).write(true).open(&self.local)?;
        f.seek(SeekFrom::Start(self.position))?;
        f.write_all(buf)?;
        f.flush()?;

        self.position += buf.len() as u64;
        self.local_size = f.metadata()?.len();
        self.dirty = true;
        Ok(buf.len())
    }

    /// Set the absolute position. No bounds check: seeking past the end is
    /// legal, and a subsequent write zero-fills the gap.
    pub fn seek(&mut self, position: u64) {
        self.position = position;
    }

    /// Current length of the local copy.
    pub fn size(&self) -> u64 {
        self.local_size
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Location of the transient local copy. Diagnostic only; the file is
    /// gone once the handle is closed or dropped.
    pub fn local_path(&self) -> &std::path::Path {
        &self.local
    }

    /// Upload the whole local copy if the handle is dirty. Unlike [`close`],
    /// failures are surfaced, so callers needing durability can check this
    /// before dropping the handle.
    ///
    /// [`close`]: LocalCopyFile::close
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let data = std::fs::read(&self.local)?;
        self.client
            .put(&self.key, &data, self.transfer_timeout)
            .map_err(|e| StorageError::Transfer(format!("upload {} failed: {e}", self.key)))?;
        self.dirty = false;
        Ok(())
    }

    /// Flush (if dirty) and destroy the handle. An upload failure is logged
    /// and swallowed because the consuming interface has no close-error
    /// channel; the local artifact is removed regardless of the outcome.
    pub fn close(mut self) {
        if let Err(e) = self.flush() {
            error!("flush on close failed for {}: {e}", self.key);
        }
        // Close is final: no retry from the drop path after a failed upload.
        self.dirty = false;
        // TempPath removal happens on drop; a copy already gone is fine.
    }
}

impl Drop for LocalCopyFile {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(e) = self.flush() {
                error!("flush on drop failed for {}: {e}", self.key);
            }
        }
    }
}
