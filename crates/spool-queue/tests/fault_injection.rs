//! Failure-atomicity checks driven through the fault-injecting VFS: a
//! mutation whose writes fail must leave both the on-disk state and the
//! reopened view at the previous committed state.

use std::path::Path;

use spool_error::SpoolError;
use spool_queue::QueueFile;
use spool_vfs::{FaultFile, FaultVfs, MemoryFile, MemoryVfs, OpenFlags, Vfs, VfsFile};

const QUEUE_PATH: &str = "test.queue";

type FaultQueue = QueueFile<FaultFile<MemoryFile>>;

fn fault_vfs() -> FaultVfs<MemoryVfs> {
    FaultVfs::new(MemoryVfs::new())
}

fn open_queue(vfs: &FaultVfs<MemoryVfs>) -> FaultQueue {
    let file = vfs
        .open(
            Path::new(QUEUE_PATH),
            OpenFlags::CREATE | OpenFlags::READWRITE,
        )
        .expect("open file");
    QueueFile::open(file).expect("open queue")
}

/// Element of `len` bytes whose byte `j` equals `len - j`.
fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|j| (len - j) as u8).collect()
}

fn assert_peek_remove(queue: &mut FaultQueue, expected: &[u8]) {
    let head = queue.peek().expect("peek").expect("queue not empty");
    assert_eq!(head, expected);
    queue.remove().expect("remove");
}

#[test]
fn failed_add_is_invisible() {
    let vfs = fault_vfs();
    let switch = vfs.switch();

    let mut queue = open_queue(&vfs);
    queue.add(&pattern(253)).expect("add before fault");

    switch.fail_writes(true);
    assert!(matches!(
        queue.add(&pattern(252)),
        Err(SpoolError::Io(_))
    ));
    switch.fail_writes(false);

    // A subsequent add succeeds and lands right after the surviving element.
    queue.add(&pattern(251)).expect("add after fault cleared");
    queue.close().expect("close");
    drop(queue);

    let mut queue = open_queue(&vfs);
    assert_eq!(queue.size(), 2);
    assert_peek_remove(&mut queue, &pattern(253));
    assert_peek_remove(&mut queue, &pattern(251));
    assert!(queue.is_empty());
}

#[test]
fn failed_remove_keeps_the_head() {
    let vfs = fault_vfs();
    let switch = vfs.switch();

    let mut queue = open_queue(&vfs);
    queue.add(&pattern(253)).expect("add");

    switch.fail_writes(true);
    assert!(matches!(queue.remove(), Err(SpoolError::Io(_))));
    switch.fail_writes(false);

    queue.close().expect("close");
    drop(queue);

    let mut queue = open_queue(&vfs);
    assert_eq!(queue.size(), 1);
    assert_peek_remove(&mut queue, &pattern(253));

    queue.add(&pattern(99)).expect("add");
    assert_peek_remove(&mut queue, &pattern(99));
}

#[test]
fn failed_expansion_preserves_geometry() {
    let vfs = fault_vfs();
    let switch = vfs.switch();

    let mut queue = open_queue(&vfs);
    queue.add(&pattern(253)).expect("add");

    switch.fail_writes(true);
    assert!(matches!(
        queue.add(&vec![0_u8; 8000]),
        Err(SpoolError::Io(_))
    ));
    switch.fail_writes(false);

    queue.close().expect("close");
    drop(queue);

    let mut queue = open_queue(&vfs);
    assert_eq!(queue.size(), 1);
    assert_eq!(queue.file().file_size().expect("file size"), 4096);

    // The queue stays fully usable at its original size.
    queue.add(&pattern(99)).expect("add");
    assert_peek_remove(&mut queue, &pattern(253));
    assert_peek_remove(&mut queue, &pattern(99));
}

/// A failed header commit marks the cursors stale; the next operation
/// re-reads the header and continues from the committed state without a
/// reopen.
#[test]
fn stale_cursors_recover_without_reopen() {
    let vfs = fault_vfs();
    let switch = vfs.switch();

    let mut queue = open_queue(&vfs);
    queue.add(b"head").expect("add head");
    queue.add(b"tail").expect("add tail");

    // remove's only write is the header commit itself.
    switch.fail_writes(true);
    assert!(matches!(queue.remove(), Err(SpoolError::Io(_))));
    switch.fail_writes(false);

    assert_eq!(queue.size(), 2);
    assert_peek_remove(&mut queue, b"head");
    assert_peek_remove(&mut queue, b"tail");
    assert!(queue.is_empty());
}
