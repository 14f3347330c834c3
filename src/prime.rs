// SPDX-License-Identifier: MPL-2.0

//! PRIME files: a handle-backed file object representing one exported
//! [`BufferObject`] as a seekable shared-memory file, served on the fresh
//! lane `PRIME_HANDLE_TO_FD` hands back to the caller.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::buffer::BufferObject;
use crate::error::{Error, Result};

/// Seek origin, mirroring the three POSIX `lseek` whences a client may
/// issue against the fd this is served on. The offset itself is a
/// client-side convenience only: this crate never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekFrom {
    Start(i64),
    Current(i64),
    End(i64),
}

/// One exported buffer object, reachable as a file. `accessMemory()` is
/// the only thing the host transport actually needs from this to satisfy
/// an mmap of the served fd; the seek cursor is bookkeeping for `lseek`
/// semantics clients expect from any fd, not something the core acts on.
#[derive(Debug)]
pub struct PrimeFile {
    bo: Arc<BufferObject>,
    cursor: AtomicI64,
}

impl PrimeFile {
    pub fn new(bo: Arc<BufferObject>) -> Self {
        Self {
            bo,
            cursor: AtomicI64::new(0),
        }
    }

    /// The buffer object this file exposes. The host transport uses this
    /// to satisfy an `mmap` of the fd this `PrimeFile` is served on.
    pub fn access_memory(&self) -> &Arc<BufferObject> {
        &self.bo
    }

    pub fn tell(&self) -> i64 {
        self.cursor.load(Ordering::SeqCst)
    }

    /// Repositions the cursor. Negative results are rejected; there is no
    /// upper bound check here since this crate does not define what
    /// "past the end" of a PRIME fd should do (the host's memory-handle
    /// accessor governs actual reads/writes).
    pub fn seek(&self, from: SeekFrom) -> Result<i64> {
        let base = match from {
            SeekFrom::Start(off) => off,
            SeekFrom::Current(delta) => self
                .cursor
                .load(Ordering::SeqCst)
                .checked_add(delta)
                .ok_or(Error::Internal("seek overflow"))?,
            SeekFrom::End(delta) => (self.bo.size as i64)
                .checked_add(delta)
                .ok_or(Error::Internal("seek overflow"))?,
        };
        if base < 0 {
            return Err(Error::ValidationFailed("seek before start of file"));
        }
        self.cursor.store(base, Ordering::SeqCst);
        Ok(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prime() -> PrimeFile {
        PrimeFile::new(Arc::new(BufferObject::new(1, 4096, 64, 64)))
    }

    #[test]
    fn seek_end_is_relative_to_bo_size() {
        let f = prime();
        assert_eq!(f.seek(SeekFrom::End(0)).unwrap(), 4096);
        assert_eq!(f.seek(SeekFrom::End(-100)).unwrap(), 3996);
    }

    #[test]
    fn seek_before_start_is_rejected() {
        let f = prime();
        assert!(f.seek(SeekFrom::Start(-1)).is_err());
    }

    #[test]
    fn seek_current_accumulates() {
        let f = prime();
        f.seek(SeekFrom::Start(100)).unwrap();
        assert_eq!(f.seek(SeekFrom::Current(50)).unwrap(), 150);
    }
}
