//! In-memory VFS for tests.
//!
//! Files are named byte vectors shared between all handles opened on the
//! same path, so close/reopen sequences observe the same contents a real
//! filesystem would.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use spool_error::{Result, SpoolError};

use crate::traits::{OpenFlags, Vfs, VfsFile};

#[derive(Debug, Default)]
struct MemoryVfsInner {
    files: HashMap<PathBuf, Arc<Mutex<Vec<u8>>>>,
}

/// An in-memory VFS with no persistence beyond its own lifetime.
#[derive(Debug, Clone, Default)]
pub struct MemoryVfs {
    inner: Arc<Mutex<MemoryVfsInner>>,
}

impl MemoryVfs {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_err() -> SpoolError {
    SpoolError::internal("memory vfs lock poisoned")
}

fn offset_err() -> SpoolError {
    SpoolError::internal("offset exceeds memory file range")
}

impl Vfs for MemoryVfs {
    type File = MemoryFile;

    fn name(&self) -> &'static str {
        "memory"
    }

    fn open(&self, path: &Path, flags: OpenFlags) -> Result<Self::File> {
        let mut inner = self.inner.lock().map_err(|_| lock_err())?;
        let storage = if let Some(existing) = inner.files.get(path) {
            Arc::clone(existing)
        } else if flags.contains(OpenFlags::CREATE) {
            let storage = Arc::new(Mutex::new(Vec::new()));
            inner.files.insert(path.to_path_buf(), Arc::clone(&storage));
            storage
        } else {
            return Err(SpoolError::CannotOpen {
                path: path.to_path_buf(),
            });
        };
        Ok(MemoryFile { storage })
    }

    fn delete(&self, path: &Path) -> Result<()> {
        self.inner.lock().map_err(|_| lock_err())?.files.remove(path);
        Ok(())
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self
            .inner
            .lock()
            .map_err(|_| lock_err())?
            .files
            .contains_key(path))
    }
}

/// A file handle in the memory VFS.
#[derive(Debug)]
pub struct MemoryFile {
    storage: Arc<Mutex<Vec<u8>>>,
}

impl VfsFile for MemoryFile {
    fn read(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let data = self.storage.lock().map_err(|_| lock_err())?;
        let offset = usize::try_from(offset).map_err(|_| offset_err())?;

        if offset >= data.len() {
            drop(data);
            buf.fill(0);
            return Ok(0);
        }

        let available = data.len() - offset;
        let to_read = buf.len().min(available);
        buf[..to_read].copy_from_slice(&data[offset..offset + to_read]);
        drop(data);

        if to_read < buf.len() {
            buf[to_read..].fill(0);
        }
        Ok(to_read)
    }

    fn write(&mut self, buf: &[u8], offset: u64) -> Result<()> {
        let mut data = self.storage.lock().map_err(|_| lock_err())?;
        let offset = usize::try_from(offset).map_err(|_| offset_err())?;
        let end = offset + buf.len();
        if end > data.len() {
            data.resize(end, 0);
        }
        data[offset..end].copy_from_slice(buf);
        Ok(())
    }

    fn set_len(&mut self, size: u64) -> Result<()> {
        let mut data = self.storage.lock().map_err(|_| lock_err())?;
        let size = usize::try_from(size).map_err(|_| offset_err())?;
        data.resize(size, 0);
        Ok(())
    }

    fn file_size(&self) -> Result<u64> {
        Ok(self.storage.lock().map_err(|_| lock_err())?.len() as u64)
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
