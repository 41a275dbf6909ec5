use std::path::Path;

use spool_error::Result;

bitflags::bitflags! {
    /// How a file should be opened.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        /// Open for both reading and writing.
        const READWRITE = 1 << 0;
        /// Create the file if it does not exist.
        const CREATE = 1 << 1;
    }
}

/// A virtual filesystem.
///
/// This trait abstracts the file system operations the queue needs, allowing
/// different backends: real files, in-memory storage for tests, or wrappers
/// that inject faults.
pub trait Vfs: Send + Sync {
    /// The file handle type produced by this VFS.
    type File: VfsFile;

    /// The name of this VFS (e.g., "disk", "memory").
    fn name(&self) -> &'static str;

    /// Open a file.
    fn open(&self, path: &Path, flags: OpenFlags) -> Result<Self::File>;

    /// Delete a file.
    fn delete(&self, path: &Path) -> Result<()>;

    /// Whether a file exists at `path`.
    fn exists(&self, path: &Path) -> Result<bool>;
}

/// A file handle opened by a [`Vfs`].
pub trait VfsFile: Send + Sync {
    /// Read up to `buf.len()` bytes starting at byte offset `offset`.
    ///
    /// Returns the number of bytes actually read. If fewer bytes are read
    /// than requested, the remaining bytes in `buf` are zeroed.
    fn read(&mut self, buf: &mut [u8], offset: u64) -> Result<usize>;

    /// Write all of `buf` starting at byte offset `offset`.
    fn write(&mut self, buf: &[u8], offset: u64) -> Result<()>;

    /// Truncate or extend the file to `size` bytes.
    ///
    /// Bytes gained by an extension read as zero.
    fn set_len(&mut self, size: u64) -> Result<()>;

    /// Return the current file size in bytes.
    fn file_size(&self) -> Result<u64>;

    /// Flush file contents to stable storage.
    ///
    /// On success, every previously successful write is durable.
    fn sync(&mut self) -> Result<()>;

    /// Close the file. After this call the handle should not be used.
    fn close(&mut self) -> Result<()>;
}
