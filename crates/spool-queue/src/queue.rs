//! The queue engine.
//!
//! [`QueueFile`] keeps a FIFO of opaque byte records in a single file. The
//! payload area behind the 16-byte header is a circular buffer; every
//! mutation writes its data first and then publishes the change with a
//! single header write, so at any kill point the file decodes to either the
//! previous or the next committed state.

use std::path::Path;

use spool_error::{Result, SpoolError};
use spool_vfs::{DiskFile, DiskVfs, OpenFlags, Vfs, VfsFile};
use tracing::{debug, warn};

use crate::element::{self, Element, Ring, ELEMENT_HEADER_LEN};
use crate::header::{QueueHeader, HEADER_LEN, MIN_FILE_LENGTH};

/// Chunk size for block moves during expansion.
const COPY_CHUNK: usize = 64 * 1024;

/// When to push writes to stable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Durability {
    /// Sync element data before the header commit and sync the commit
    /// before returning. Every successful mutation is durable.
    #[default]
    Full,
    /// Never sync implicitly; callers batch with [`QueueFile::sync`].
    Relaxed,
}

/// Engine configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueOptions {
    pub durability: Durability,
}

/// A persistent FIFO queue of opaque byte records in a single file.
///
/// Generic over the [`VfsFile`] it stores into. The queue is a
/// single-accessor structure: `&mut self` on every mutation leaves external
/// synchronization to the caller.
pub struct QueueFile<F: VfsFile> {
    file: F,
    options: QueueOptions,
    /// Committed file length. The physical file may be longer after an
    /// interrupted expansion; the header value governs.
    file_length: u32,
    element_count: u32,
    first: Option<Element>,
    last: Option<Element>,
    /// Set when a header commit failed; the next operation re-reads the
    /// header so the cursors reflect what is actually on disk.
    stale: bool,
}

impl QueueFile<DiskFile> {
    /// Open or create a queue file on disk at `path`.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = DiskVfs::new().open(path.as_ref(), OpenFlags::CREATE | OpenFlags::READWRITE)?;
        Self::open(file)
    }
}

impl<F: VfsFile> QueueFile<F> {
    /// Open a queue stored in `file` with default options.
    pub fn open(file: F) -> Result<Self> {
        Self::open_with(file, QueueOptions::default())
    }

    /// Open a queue stored in `file`.
    ///
    /// An empty file is initialized: pre-sized to the minimum length and
    /// given an explicit empty header. Anything else must carry a valid
    /// header or the open fails with [`SpoolError::QueueCorrupt`].
    pub fn open_with(mut file: F, options: QueueOptions) -> Result<Self> {
        if file.file_size()? == 0 {
            file.set_len(u64::from(MIN_FILE_LENGTH))?;
            let header = QueueHeader::empty(MIN_FILE_LENGTH);
            file.write(&header.to_bytes(), 0)?;
            file.sync()?;
            debug!(file_length = MIN_FILE_LENGTH, "initialized fresh queue file");
            return Ok(Self {
                file,
                options,
                file_length: MIN_FILE_LENGTH,
                element_count: 0,
                first: None,
                last: None,
                stale: false,
            });
        }

        let mut queue = Self {
            file,
            options,
            file_length: 0,
            element_count: 0,
            first: None,
            last: None,
            stale: true,
        };
        queue.reload()?;
        debug!(
            element_count = queue.element_count,
            file_length = queue.file_length,
            "opened queue file"
        );
        Ok(queue)
    }

    /// Number of elements in the queue.
    pub fn size(&self) -> u32 {
        self.element_count
    }

    pub fn is_empty(&self) -> bool {
        self.element_count == 0
    }

    /// Committed file length in bytes.
    pub fn file_length(&self) -> u32 {
        self.file_length
    }

    /// The underlying file handle.
    pub fn file(&self) -> &F {
        &self.file
    }

    /// Append one element to the tail of the queue.
    ///
    /// Zero-length elements are legal and round-trip as an empty payload.
    pub fn add(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_fresh()?;
        let Ok(length) = u32::try_from(data.len()) else {
            return Err(SpoolError::CapacityExceeded {
                requested: data.len() as u64 + u64::from(ELEMENT_HEADER_LEN),
                max: u64::from(u32::MAX),
            });
        };
        self.expand_if_necessary(length)?;

        let offset = match self.last {
            Some(last) => self.ring().next_offset(&last),
            None => HEADER_LEN as u32,
        };
        let new_element = Element { offset, length };

        self.ring_write(offset, &element::encode_length(length))?;
        if !data.is_empty() {
            let payload_offset = self
                .ring()
                .wrap(u64::from(offset) + u64::from(ELEMENT_HEADER_LEN));
            self.ring_write(payload_offset, data)?;
        }
        self.sync_data()?;

        let header = QueueHeader {
            file_length: self.file_length,
            element_count: self.element_count + 1,
            first_offset: self.first.map_or(offset, |first| first.offset),
            last_offset: offset,
        };
        self.commit(&header)?;

        self.element_count += 1;
        if self.first.is_none() {
            self.first = Some(new_element);
        }
        self.last = Some(new_element);
        Ok(())
    }

    /// Return a copy of the head element, or `None` when the queue is empty.
    pub fn peek(&mut self) -> Result<Option<Vec<u8>>> {
        self.ensure_fresh()?;
        let Some(first) = self.first else {
            return Ok(None);
        };
        let mut data = vec![0_u8; first.length as usize];
        if !data.is_empty() {
            let payload_offset = self
                .ring()
                .wrap(u64::from(first.offset) + u64::from(ELEMENT_HEADER_LEN));
            self.ring_read(payload_offset, &mut data)?;
        }
        Ok(Some(data))
    }

    /// Remove the head element.
    ///
    /// The header rewrite is the only on-disk effect; the element's payload
    /// bytes stay in place until overwritten by later appends.
    pub fn remove(&mut self) -> Result<()> {
        self.ensure_fresh()?;
        let (Some(first), Some(last)) = (self.first, self.last) else {
            return Err(SpoolError::QueueEmpty);
        };

        if self.element_count == 1 {
            let header = QueueHeader::empty(self.file_length);
            self.commit(&header)?;
            self.element_count = 0;
            self.first = None;
            self.last = None;
            return Ok(());
        }

        let next_offset = self.ring().next_offset(&first);
        let next_length = self.read_element_length(next_offset)?;
        let header = QueueHeader {
            file_length: self.file_length,
            element_count: self.element_count - 1,
            first_offset: next_offset,
            last_offset: last.offset,
        };
        self.commit(&header)?;

        self.element_count -= 1;
        self.first = Some(Element {
            offset: next_offset,
            length: next_length,
        });
        Ok(())
    }

    /// Drop every element with a single header commit.
    ///
    /// The file keeps its current length; freed space is reused by later
    /// appends.
    pub fn clear(&mut self) -> Result<()> {
        self.ensure_fresh()?;
        let header = QueueHeader::empty(self.file_length);
        self.commit(&header)?;
        self.element_count = 0;
        self.first = None;
        self.last = None;
        Ok(())
    }

    /// Flush outstanding writes to stable storage.
    ///
    /// Only needed under [`Durability::Relaxed`]; with [`Durability::Full`]
    /// every mutation syncs before returning.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync()
    }

    /// Close the underlying file handle.
    ///
    /// No header rewrite happens here; every mutation already committed its
    /// own. Operations on a closed queue are undefined.
    pub fn close(&mut self) -> Result<()> {
        self.file.close()
    }

    fn ring(&self) -> Ring {
        Ring::new(self.file_length)
    }

    fn ensure_fresh(&mut self) -> Result<()> {
        if self.stale {
            self.reload()?;
        }
        Ok(())
    }

    /// Rebuild the in-memory cursors from the on-disk header.
    fn reload(&mut self) -> Result<()> {
        let mut buf = [0_u8; HEADER_LEN];
        let read = self.file.read(&mut buf, 0)?;
        if read < HEADER_LEN {
            return Err(SpoolError::corrupt(format!(
                "file too small for header: {read} bytes"
            )));
        }
        let header = QueueHeader::from_bytes(&buf)?;
        header.validate()?;

        // An interrupted expansion can leave the physical file longer than
        // the committed length; shorter is unrecoverable.
        let physical = self.file.file_size()?;
        if physical < u64::from(header.file_length) {
            return Err(SpoolError::corrupt(format!(
                "physical length {physical} below committed length {}",
                header.file_length
            )));
        }

        self.file_length = header.file_length;
        self.element_count = header.element_count;
        self.first = None;
        self.last = None;
        if header.element_count > 0 {
            let first_length = self.read_element_length(header.first_offset)?;
            self.first = Some(Element {
                offset: header.first_offset,
                length: first_length,
            });
            let last_length = if header.last_offset == header.first_offset {
                first_length
            } else {
                self.read_element_length(header.last_offset)?
            };
            self.last = Some(Element {
                offset: header.last_offset,
                length: last_length,
            });
        }
        self.stale = false;
        Ok(())
    }

    /// Write the header at offset 0, publishing a new committed state.
    fn commit(&mut self, header: &QueueHeader) -> Result<()> {
        let bytes = header.to_bytes();
        if let Err(err) = self.file.write(&bytes, 0) {
            warn!("header commit failed, cursors marked stale");
            self.stale = true;
            return Err(err);
        }
        if self.options.durability == Durability::Full {
            if let Err(err) = self.file.sync() {
                warn!("header commit sync failed, cursors marked stale");
                self.stale = true;
                return Err(err);
            }
        }
        Ok(())
    }

    fn sync_data(&mut self) -> Result<()> {
        if self.options.durability == Durability::Full {
            self.file.sync()?;
        }
        Ok(())
    }

    /// Payload bytes occupied by live records.
    fn used_bytes(&self) -> u64 {
        let (Some(first), Some(last)) = (self.first, self.last) else {
            return 0;
        };
        if last.offset >= first.offset {
            u64::from(last.offset - first.offset) + last.record_len()
        } else {
            u64::from(self.file_length - first.offset)
                + u64::from(last.offset)
                - HEADER_LEN as u64
                + last.record_len()
        }
    }

    /// Grow the file until an element of `data_length` payload bytes fits.
    ///
    /// If the live region wraps past end-of-file, the wrapped prefix is
    /// block-moved into the newly gained space so the region becomes
    /// contiguous. Element offsets are not stored on disk, so the single
    /// block move re-positions every relocated record at once; only the
    /// tail offset in the header needs adjusting.
    fn expand_if_necessary(&mut self, data_length: u32) -> Result<()> {
        let required = u64::from(ELEMENT_HEADER_LEN) + u64::from(data_length);
        let used = self.used_bytes();
        if u64::from(self.ring().capacity()) - used >= required {
            return Ok(());
        }

        let old_length = self.file_length;
        let mut new_length = u64::from(old_length);
        while new_length - HEADER_LEN as u64 - used < required {
            new_length *= 2;
            if new_length > u64::from(u32::MAX) {
                return Err(SpoolError::CapacityExceeded {
                    requested: required,
                    max: u64::from(u32::MAX) - HEADER_LEN as u64 - used,
                });
            }
        }
        let new_length = u32::try_from(new_length).expect("new length fits u32");
        debug!(old_length, new_length, used, required, "expanding queue file");
        self.file.set_len(u64::from(new_length))?;

        let (Some(first), Some(last)) = (self.first, self.last) else {
            let header = QueueHeader::empty(new_length);
            self.commit(&header)?;
            self.file_length = new_length;
            return Ok(());
        };

        // Bytes of the live region that wrapped into [HEADER_LEN, wrap_end)
        // logically follow the bytes at the old end-of-file; move them there.
        let wrap_end = Ring::new(old_length).next_offset(&last);
        let mut relocated = 0_u64;
        if wrap_end <= first.offset {
            relocated = u64::from(wrap_end) - HEADER_LEN as u64;
            if relocated > 0 {
                copy_region(
                    &mut self.file,
                    HEADER_LEN as u64,
                    u64::from(old_length),
                    relocated,
                )?;
            }
        }
        self.sync_data()?;

        let last = if last.offset < first.offset {
            Element {
                offset: old_length - HEADER_LEN as u32 + last.offset,
                length: last.length,
            }
        } else {
            last
        };

        let header = QueueHeader {
            file_length: new_length,
            element_count: self.element_count,
            first_offset: first.offset,
            last_offset: last.offset,
        };
        self.commit(&header)?;
        self.file_length = new_length;
        self.last = Some(last);

        // Under the new header the old prefix is free space; scrub the stale
        // copy of the relocated bytes. (Scrubbing before the commit would
        // destroy live data if the process died in between.)
        if relocated > 0 {
            zero_region(&mut self.file, HEADER_LEN as u64, relocated)?;
        }
        Ok(())
    }

    fn read_element_length(&mut self, offset: u32) -> Result<u32> {
        let mut buf = [0_u8; 4];
        self.ring_read(offset, &mut buf)?;
        Ok(element::decode_length(buf))
    }

    /// Read `buf.len()` bytes starting at `offset`, wrapping past
    /// end-of-file into the payload area.
    fn ring_read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()> {
        debug_assert!(offset >= HEADER_LEN as u32 && offset < self.file_length);
        let end = u64::from(offset) + buf.len() as u64;
        if end <= u64::from(self.file_length) {
            return read_exact_at(&mut self.file, buf, u64::from(offset));
        }
        let split = (u64::from(self.file_length) - u64::from(offset)) as usize;
        read_exact_at(&mut self.file, &mut buf[..split], u64::from(offset))?;
        read_exact_at(&mut self.file, &mut buf[split..], HEADER_LEN as u64)
    }

    /// Write `buf` starting at `offset`, wrapping past end-of-file into the
    /// payload area.
    fn ring_write(&mut self, offset: u32, buf: &[u8]) -> Result<()> {
        debug_assert!(offset >= HEADER_LEN as u32 && offset < self.file_length);
        let end = u64::from(offset) + buf.len() as u64;
        if end <= u64::from(self.file_length) {
            return self.file.write(buf, u64::from(offset));
        }
        let split = (u64::from(self.file_length) - u64::from(offset)) as usize;
        self.file.write(&buf[..split], u64::from(offset))?;
        self.file.write(&buf[split..], HEADER_LEN as u64)
    }
}

fn read_exact_at<F: VfsFile>(file: &mut F, buf: &mut [u8], offset: u64) -> Result<()> {
    let read = file.read(buf, offset)?;
    if read < buf.len() {
        return Err(SpoolError::ShortRead {
            expected: buf.len(),
            actual: read,
        });
    }
    Ok(())
}

fn copy_region<F: VfsFile>(file: &mut F, src: u64, dst: u64, len: u64) -> Result<()> {
    let mut buf = vec![0_u8; COPY_CHUNK.min(len as usize)];
    let mut moved = 0_u64;
    while moved < len {
        let chunk = COPY_CHUNK.min((len - moved) as usize);
        read_exact_at(file, &mut buf[..chunk], src + moved)?;
        file.write(&buf[..chunk], dst + moved)?;
        moved += chunk as u64;
    }
    Ok(())
}

fn zero_region<F: VfsFile>(file: &mut F, start: u64, len: u64) -> Result<()> {
    let zeroes = vec![0_u8; COPY_CHUNK.min(len as usize)];
    let mut cleared = 0_u64;
    while cleared < len {
        let chunk = COPY_CHUNK.min((len - cleared) as usize);
        file.write(&zeroes[..chunk], start + cleared)?;
        cleared += chunk as u64;
    }
    Ok(())
}
