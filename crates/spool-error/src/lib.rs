use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for spool operations.
///
/// Structured variants for the cases callers are expected to match on;
/// everything the filesystem reports funnels through [`SpoolError::Io`].
#[derive(Error, Debug)]
pub enum SpoolError {
    /// The queue file could not be opened.
    #[error("cannot open queue file: '{path}'")]
    CannotOpen { path: PathBuf },

    /// The file header failed validation; the queue is unusable.
    #[error("queue file is corrupt: {detail}")]
    QueueCorrupt { detail: String },

    /// `remove` was called on an empty queue.
    #[error("queue is empty")]
    QueueEmpty,

    /// An element would require a file larger than the header can address.
    #[error("element needs {requested} bytes but at most {max} are addressable")]
    CapacityExceeded { requested: u64, max: u64 },

    /// Fewer bytes than expected came back from a read.
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SpoolError {
    /// Create a corruption error with a detail message.
    pub fn corrupt(detail: impl Into<String>) -> Self {
        Self::QueueCorrupt {
            detail: detail.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SpoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SpoolError::corrupt("bad magic");
        assert_eq!(err.to_string(), "queue file is corrupt: bad magic");

        let err = SpoolError::QueueEmpty;
        assert_eq!(err.to_string(), "queue is empty");

        let err = SpoolError::ShortRead {
            expected: 16,
            actual: 3,
        };
        assert_eq!(err.to_string(), "short read: expected 16 bytes, got 3");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::other("disk fell off");
        let err = SpoolError::from(io);
        assert!(matches!(err, SpoolError::Io(_)));
    }
}
