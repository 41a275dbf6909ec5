//! Block I/O adapters for the spool queue file.
//!
//! The queue engine is generic over [`VfsFile`], so the same engine runs
//! against a real file ([`DiskVfs`]), an in-memory file ([`MemoryVfs`]),
//! or a fault-injecting wrapper around either ([`FaultVfs`]).

pub mod disk;
pub mod fault;
pub mod memory;
pub mod traits;

pub use disk::{DiskFile, DiskVfs};
pub use fault::{FaultFile, FaultSwitch, FaultVfs};
pub use memory::{MemoryFile, MemoryVfs};
pub use traits::{OpenFlags, Vfs, VfsFile};
