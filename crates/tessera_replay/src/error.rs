//! # Replay Error Types

use thiserror::Error;

use tessera_core::KernelError;

/// Errors from reading or writing replay files.
///
/// Recording into a stream never errors; see [`crate::ReplayRecorder`].
#[derive(Error, Debug)]
pub enum ReplayError {
    /// Underlying reader/writer failed.
    #[error("replay i/o: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not start with the replay magic.
    #[error("not a replay file (magic {0:#010x})")]
    BadMagic(u32),

    /// Written by a newer format version.
    #[error("unsupported replay version {0}")]
    UnsupportedVersion(u32),

    /// Header flags this reader does not understand.
    #[error("unsupported replay flags {0:#x}")]
    UnsupportedFlags(u32),

    /// Body bytes do not match the header checksum.
    #[error("replay checksum mismatch: header {expected:#010x}, body {actual:#010x}")]
    ChecksumMismatch {
        /// CRC32 from the header.
        expected: u32,
        /// CRC32 of the body read.
        actual: u32,
    },

    /// Body length differs from the header.
    #[error("replay body is {actual} bytes, header says {expected}")]
    BodyLength {
        /// Length from the header.
        expected: u64,
        /// Length actually decoded.
        actual: u64,
    },

    /// Record count differs from the header.
    #[error("replay has {actual} records, header says {expected}")]
    RecordCount {
        /// Count from the header.
        expected: u32,
        /// Count actually decoded.
        actual: u32,
    },

    /// A record tag no reader version knows.
    #[error("unknown replay record tag {0}")]
    UnknownRecord(u32),

    /// LZ4 body could not be decompressed.
    #[error("replay body decompression failed: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),

    /// A record or TLV frame is malformed.
    #[error(transparent)]
    Kernel(#[from] KernelError),

    /// The stream is too large for the file format.
    #[error("replay too large: {0}")]
    TooLarge(&'static str),
}

/// Result type for replay persistence.
pub type ReplayResult<T> = Result<T, ReplayError>;
