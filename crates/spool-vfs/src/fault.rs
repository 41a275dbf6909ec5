//! Fault-injecting VFS wrapper.
//!
//! [`FaultVfs`] wraps any backend and hands out a [`FaultSwitch`]: while the
//! switch is on, every `write` and `set_len` on every file opened through
//! the wrapper fails. Reads are never affected. The switch is a shared
//! handle rather than process-global state, so independent queues under
//! test do not interfere with one another.

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use spool_error::{Result, SpoolError};

use crate::traits::{OpenFlags, Vfs, VfsFile};

/// Shared control handle for a [`FaultVfs`].
#[derive(Debug, Clone, Default)]
pub struct FaultSwitch {
    fail_writes: Arc<AtomicBool>,
}

impl FaultSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write (and truncate/extend) fail until cleared.
    pub fn fail_writes(&self, enabled: bool) {
        self.fail_writes.store(enabled, Ordering::SeqCst);
    }

    pub fn writes_failing(&self) -> bool {
        self.fail_writes.load(Ordering::SeqCst)
    }
}

fn injected_failure() -> SpoolError {
    SpoolError::Io(io::Error::other("injected write failure"))
}

/// A VFS that can be instructed to fail writes.
#[derive(Debug)]
pub struct FaultVfs<V> {
    inner: V,
    switch: FaultSwitch,
}

impl<V: Vfs> FaultVfs<V> {
    pub fn new(inner: V) -> Self {
        Self {
            inner,
            switch: FaultSwitch::new(),
        }
    }

    /// The switch controlling all files opened through this VFS.
    pub fn switch(&self) -> FaultSwitch {
        self.switch.clone()
    }
}

impl<V: Vfs> Vfs for FaultVfs<V> {
    type File = FaultFile<V::File>;

    fn name(&self) -> &'static str {
        "fault"
    }

    fn open(&self, path: &Path, flags: OpenFlags) -> Result<Self::File> {
        let inner = self.inner.open(path, flags)?;
        Ok(FaultFile {
            inner,
            switch: self.switch.clone(),
        })
    }

    fn delete(&self, path: &Path) -> Result<()> {
        self.inner.delete(path)
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        self.inner.exists(path)
    }
}

/// A file handle whose writes fail while the switch is on.
#[derive(Debug)]
pub struct FaultFile<F> {
    inner: F,
    switch: FaultSwitch,
}

impl<F: VfsFile> VfsFile for FaultFile<F> {
    fn read(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.inner.read(buf, offset)
    }

    fn write(&mut self, buf: &[u8], offset: u64) -> Result<()> {
        if self.switch.writes_failing() {
            return Err(injected_failure());
        }
        self.inner.write(buf, offset)
    }

    fn set_len(&mut self, size: u64) -> Result<()> {
        if self.switch.writes_failing() {
            return Err(injected_failure());
        }
        self.inner.set_len(size)
    }

    fn file_size(&self) -> Result<u64> {
        self.inner.file_size()
    }

    fn sync(&mut self) -> Result<()> {
        self.inner.sync()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}
