//! Queue file header codec.

use spool_error::{Result, SpoolError};

/// Size of the file header in bytes.
pub const HEADER_LEN: usize = 16;

/// Minimum queue file length; fresh files are pre-sized to this.
pub const MIN_FILE_LENGTH: u32 = 4096;

/// Parsed 16-byte queue file header.
///
/// Layout (big-endian):
/// ```text
/// Offset  Size  Description
///   0       4   Total file length in bytes
///   4       4   Number of live elements
///   8       4   Absolute offset of the head element, 0 when empty
///  12       4   Absolute offset of the tail element, 0 when empty
/// ```
///
/// The header is the commit record: writing these 16 bytes at offset 0 is
/// the single step that publishes a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueHeader {
    /// Total file length in bytes.
    pub file_length: u32,
    /// Number of live elements in the queue.
    pub element_count: u32,
    /// Offset of the head element, 0 when the queue is empty.
    pub first_offset: u32,
    /// Offset of the tail element, 0 when the queue is empty.
    pub last_offset: u32,
}

impl QueueHeader {
    /// Header for an empty queue occupying `file_length` bytes.
    pub fn empty(file_length: u32) -> Self {
        Self {
            file_length,
            element_count: 0,
            first_offset: 0,
            last_offset: 0,
        }
    }

    /// Encode into the on-disk representation.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0_u8; HEADER_LEN];
        write_be_u32_at(&mut buf, 0, self.file_length);
        write_be_u32_at(&mut buf, 4, self.element_count);
        write_be_u32_at(&mut buf, 8, self.first_offset);
        write_be_u32_at(&mut buf, 12, self.last_offset);
        buf
    }

    /// Parse a header from raw bytes.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(SpoolError::corrupt(format!(
                "header too small: expected >= {HEADER_LEN}, got {}",
                buf.len()
            )));
        }
        Ok(Self {
            file_length: read_be_u32_at(buf, 0),
            element_count: read_be_u32_at(buf, 4),
            first_offset: read_be_u32_at(buf, 8),
            last_offset: read_be_u32_at(buf, 12),
        })
    }

    /// Check the structural invariants a committed header must satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.file_length < MIN_FILE_LENGTH {
            return Err(SpoolError::corrupt(format!(
                "file length {} below minimum {MIN_FILE_LENGTH}",
                self.file_length
            )));
        }
        let header_len = HEADER_LEN as u32;
        for (name, offset) in [("first", self.first_offset), ("last", self.last_offset)] {
            if offset != 0 && (offset < header_len || offset >= self.file_length) {
                return Err(SpoolError::corrupt(format!(
                    "{name} offset {offset} outside payload area [{header_len}, {})",
                    self.file_length
                )));
            }
        }
        let empty = self.element_count == 0;
        if empty != (self.first_offset == 0) || empty != (self.last_offset == 0) {
            return Err(SpoolError::corrupt(format!(
                "element count {} inconsistent with offsets ({}, {})",
                self.element_count, self.first_offset, self.last_offset
            )));
        }
        Ok(())
    }
}

fn read_be_u32_at(buf: &[u8], offset: usize) -> u32 {
    let mut out = [0_u8; 4];
    out.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_be_bytes(out)
}

fn write_be_u32_at(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let header = QueueHeader {
            file_length: 8192,
            element_count: 3,
            first_offset: 16,
            last_offset: 5000,
        };
        let decoded = QueueHeader::from_bytes(&header.to_bytes()).expect("decode");
        assert_eq!(header, decoded);
        decoded.validate().expect("valid");
    }

    #[test]
    fn encoding_is_big_endian() {
        let header = QueueHeader::empty(MIN_FILE_LENGTH);
        let bytes = header.to_bytes();
        assert_eq!(&bytes[..4], &[0x00, 0x00, 0x10, 0x00]);
        assert!(bytes[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn rejects_short_buffer() {
        for len in 0..HEADER_LEN {
            let err = QueueHeader::from_bytes(&vec![0_u8; len]).expect_err("short buffer");
            assert!(matches!(err, SpoolError::QueueCorrupt { .. }));
        }
    }

    #[test]
    fn empty_header_is_valid() {
        QueueHeader::empty(MIN_FILE_LENGTH).validate().expect("valid");
    }

    #[test]
    fn all_zero_header_is_invalid() {
        // A zero-filled file parses as file_length 0, below the minimum.
        let header = QueueHeader::from_bytes(&[0_u8; HEADER_LEN]).expect("decode");
        assert!(header.validate().is_err());
    }

    #[test]
    fn rejects_offsets_outside_payload_area() {
        let mut header = QueueHeader {
            file_length: MIN_FILE_LENGTH,
            element_count: 1,
            first_offset: 15,
            last_offset: 16,
        };
        assert!(header.validate().is_err());

        header.first_offset = 16;
        header.last_offset = MIN_FILE_LENGTH;
        assert!(header.validate().is_err());

        header.last_offset = MIN_FILE_LENGTH - 1;
        header.validate().expect("valid");
    }

    #[test]
    fn rejects_count_offset_mismatch() {
        let mut header = QueueHeader::empty(MIN_FILE_LENGTH);
        header.element_count = 1;
        assert!(header.validate().is_err());

        let mut header = QueueHeader::empty(MIN_FILE_LENGTH);
        header.first_offset = 16;
        assert!(header.validate().is_err());

        let mut header = QueueHeader::empty(MIN_FILE_LENGTH);
        header.last_offset = 16;
        assert!(header.validate().is_err());
    }
}
