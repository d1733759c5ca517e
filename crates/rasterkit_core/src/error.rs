use std::path::PathBuf;
use thiserror::Error;

/// Broad classes of failure, so callers can tell a corrupt file apart from
/// a valid file this crate cannot handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input is malformed or corrupted.
    Format,
    /// The input is well-formed but uses a feature that is not supported.
    Capability,
    /// A file could not be read or written, or a buffer would be too large.
    Resource,
    /// The compressed image stream could not be inflated.
    Decompression,
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Read of {requested} bytes at offset {offset} is out of bounds (len: {len})")]
    OutOfBounds {
        offset: usize,
        requested: usize,
        len: usize,
    },

    #[error("Missing terminator chunk")]
    MissingTerminator,

    #[error("Unrecognized filter {filter} at scanline {scanline}")]
    UnrecognizedFilter { filter: u8, scanline: u32 },

    #[error("CRC mismatch in chunk {tag}: stored {stored:#010x}, computed {computed:#010x}")]
    CrcMismatch {
        tag: String,
        stored: u32,
        computed: u32,
    },

    #[error("Truncated data: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Invalid buffer size: expected {expected}, got {actual}")]
    InvalidBufferSize { expected: usize, actual: usize },

    #[error("Decoded image would need {bytes} bytes (limit: {limit})")]
    TooLarge { bytes: usize, limit: usize },

    #[error("Inflate ended with status {status}")]
    Decompression { status: i32 },
}

impl CodecError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidFormat(_)
            | Self::OutOfBounds { .. }
            | Self::MissingTerminator
            | Self::UnrecognizedFilter { .. }
            | Self::CrcMismatch { .. }
            | Self::Truncated { .. }
            | Self::InvalidBufferSize { .. } => ErrorKind::Format,
            Self::Unsupported(_) => ErrorKind::Capability,
            Self::Io { .. } | Self::TooLarge { .. } => ErrorKind::Resource,
            Self::Decompression { .. } => ErrorKind::Decompression,
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
