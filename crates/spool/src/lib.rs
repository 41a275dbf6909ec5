//! Public API facade for the spool queue file.
//!
//! Re-exports the queue engine and the VFS backends it runs on.

pub use spool_error::{Result, SpoolError};
pub use spool_queue::{Durability, QueueFile, QueueOptions};
pub use spool_vfs as vfs;

#[cfg(test)]
mod tests {
    use super::QueueFile;

    #[test]
    fn disk_queue_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("events.spool");

        let mut queue = QueueFile::open_path(&path).expect("open");
        queue.add(b"first event").expect("add");
        queue.add(b"second event").expect("add");
        drop(queue);

        let mut queue = QueueFile::open_path(&path).expect("reopen");
        assert_eq!(queue.size(), 2);
        assert_eq!(
            queue.peek().expect("peek").as_deref(),
            Some(&b"first event"[..])
        );
        queue.remove().expect("remove");
        assert_eq!(
            queue.peek().expect("peek").as_deref(),
            Some(&b"second event"[..])
        );
    }
}
