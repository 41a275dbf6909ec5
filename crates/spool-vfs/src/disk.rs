//! Disk VFS backed by positional I/O over `std::fs::File`.
//!
//! Reads and writes never move a shared cursor; every operation names its
//! absolute offset, which is what the wrap-aware queue engine expects.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use spool_error::{Result, SpoolError};

use crate::traits::{OpenFlags, Vfs, VfsFile};

/// VFS over the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskVfs;

impl DiskVfs {
    pub fn new() -> Self {
        Self
    }
}

impl Vfs for DiskVfs {
    type File = DiskFile;

    fn name(&self) -> &'static str {
        "disk"
    }

    fn open(&self, path: &Path, flags: OpenFlags) -> Result<Self::File> {
        let file = OpenOptions::new()
            .read(true)
            .write(flags.contains(OpenFlags::READWRITE))
            .create(flags.contains(OpenFlags::CREATE))
            .open(path)
            .map_err(|_| SpoolError::CannotOpen {
                path: path.to_path_buf(),
            })?;
        Ok(DiskFile {
            file,
            path: path.to_path_buf(),
        })
    }

    fn delete(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path)?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(path.exists())
    }
}

/// A file handle on the local filesystem.
#[derive(Debug)]
pub struct DiskFile {
    file: File,
    path: PathBuf,
}

impl DiskFile {
    /// Path this handle was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::unix::fs::FileExt::read_at(file, buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::windows::fs::FileExt::seek_read(file, buf, offset)
}

#[cfg(unix)]
fn write_at(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    std::os::unix::fs::FileExt::write_at(file, buf, offset)
}

#[cfg(windows)]
fn write_at(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    std::os::windows::fs::FileExt::seek_write(file, buf, offset)
}

impl VfsFile for DiskFile {
    fn read(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            let n = read_at(&self.file, &mut buf[total..], offset + total as u64)?;
            if n == 0 {
                break;
            }
            total += n;
        }
        if total < buf.len() {
            buf[total..].fill(0);
        }
        Ok(total)
    }

    fn write(&mut self, buf: &[u8], offset: u64) -> Result<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = write_at(&self.file, &buf[written..], offset + written as u64)?;
            if n == 0 {
                return Err(SpoolError::Io(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "write returned zero bytes",
                )));
            }
            written += n;
        }
        Ok(())
    }

    fn set_len(&mut self, size: u64) -> Result<()> {
        self.file.set_len(size)?;
        Ok(())
    }

    fn file_size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn sync(&mut self) -> Result<()> {
        // sync_all so length changes from set_len are durable too.
        self.file.sync_all()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
