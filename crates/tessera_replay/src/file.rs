//! # Replay Files
//!
//! Binary persistence for [`ReplayStream`]s.
//!
//! ## File Format
//!
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │ Header (32 bytes)                                  │
//! ├────────────────────────────────────────────────────┤
//! │ Magic (4) │ Version (4) │ Flags (4) │ Seed (4)     │
//! │ Records (4) │ Body CRC32 (4) │ Body length (8)     │
//! ├────────────────────────────────────────────────────┤
//! │ Body: one TLV record per replay record             │
//! │ (LZ4 block-compressed when flag bit 0 is set)      │
//! └────────────────────────────────────────────────────┘
//! ```
//!
//! The CRC and the body length describe the uncompressed body, so a file
//! can be recompressed without touching what it certifies.

use std::io::{Read, Write};

use tessera_core::{tlv, TlvReader};

use crate::error::{ReplayError, ReplayResult};
use crate::record::ReplayRecord;
use crate::stream::ReplayStream;

/// Magic number for replay files (`"TSRP"`).
pub const REPLAY_MAGIC: u32 = u32::from_le_bytes(*b"TSRP");

/// Current replay format version.
pub const REPLAY_VERSION: u32 = 1;

/// Flag bit: body is LZ4 block-compressed.
pub const FLAG_LZ4: u32 = 1;

/// Largest uncompressed body a reader accepts (1 GiB).
pub const MAX_REPLAY_BODY: u64 = 1 << 30;

/// LZ4 block format expands at most this many output bytes per input byte.
const LZ4_MAX_RATIO: u64 = 255;

/// Body encoding on disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Compression {
    /// Raw TLV body.
    #[default]
    None,
    /// LZ4 block compression.
    Lz4,
}

impl Compression {
    const fn flags(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Lz4 => FLAG_LZ4,
        }
    }
}

/// Replay file header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplayFileHeader {
    /// Magic number for file identification.
    pub magic: u32,
    /// Format version.
    pub version: u32,
    /// Encoding flags.
    pub flags: u32,
    /// Root seed of the recorded run.
    pub root_seed: u32,
    /// Number of records in the body.
    pub record_count: u32,
    /// CRC32 of the uncompressed body.
    pub body_crc: u32,
    /// Length of the uncompressed body.
    pub body_len: u64,
}

impl ReplayFileHeader {
    /// Size of header in bytes.
    pub const SIZE: usize = 32;

    /// Serializes the header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.magic.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.flags.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.root_seed.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.record_count.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.body_crc.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.body_len.to_le_bytes());
        bytes
    }

    /// Deserializes header from bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let word32 = |at| tlv::u32_at(bytes, at).unwrap_or_default();
        Self {
            magic: word32(0),
            version: word32(4),
            flags: word32(8),
            root_seed: word32(12),
            record_count: word32(16),
            body_crc: word32(20),
            body_len: tlv::u64_at(bytes, 24).unwrap_or_default(),
        }
    }

    /// Checks magic, version and flags.
    ///
    /// # Errors
    ///
    /// The first check that fails.
    pub fn validate(&self) -> ReplayResult<()> {
        if self.magic != REPLAY_MAGIC {
            return Err(ReplayError::BadMagic(self.magic));
        }
        if self.version == 0 || self.version > REPLAY_VERSION {
            return Err(ReplayError::UnsupportedVersion(self.version));
        }
        if self.flags & !FLAG_LZ4 != 0 {
            return Err(ReplayError::UnsupportedFlags(self.flags));
        }
        Ok(())
    }
}

/// Writes `stream` as a replay file.
///
/// # Errors
///
/// [`ReplayError::Io`] from the writer, [`ReplayError::TooLarge`] if the
/// stream has more than `u32::MAX` records, [`ReplayError::Kernel`] if a
/// record body exceeds a TLV length.
pub fn write<W: Write>(stream: &ReplayStream, writer: &mut W, compression: Compression) -> ReplayResult<()> {
    let record_count = u32::try_from(stream.len()).map_err(|_| ReplayError::TooLarge("record count"))?;

    let mut body = Vec::with_capacity(stream.len() * 32);
    for record in stream.records() {
        record.encode_into(&mut body)?;
    }

    let header = ReplayFileHeader {
        magic: REPLAY_MAGIC,
        version: REPLAY_VERSION,
        flags: compression.flags(),
        root_seed: stream.root_seed(),
        record_count,
        body_crc: crc32fast::hash(&body),
        body_len: body.len() as u64,
    };

    writer.write_all(&header.to_bytes())?;
    match compression {
        Compression::None => writer.write_all(&body)?,
        Compression::Lz4 => writer.write_all(&lz4_flex::compress(&body))?,
    }
    Ok(())
}

/// Reads a replay file written by [`write`].
///
/// # Errors
///
/// Header validation errors, [`ReplayError::TooLarge`] for a body length
/// over [`MAX_REPLAY_BODY`], [`ReplayError::ChecksumMismatch`],
/// [`ReplayError::BodyLength`], [`ReplayError::RecordCount`], or the first
/// malformed record.
pub fn read<R: Read>(reader: &mut R) -> ReplayResult<ReplayStream> {
    let mut header_bytes = [0u8; ReplayFileHeader::SIZE];
    reader.read_exact(&mut header_bytes)?;
    let header = ReplayFileHeader::from_bytes(&header_bytes);
    header.validate()?;

    if header.body_len > MAX_REPLAY_BODY {
        return Err(ReplayError::TooLarge("body length"));
    }

    let mut raw = Vec::new();
    reader.read_to_end(&mut raw)?;

    let body = if header.flags & FLAG_LZ4 == 0 {
        raw
    } else {
        // The header length sizes the output buffer, so it must be one the
        // compressed bytes could actually produce.
        if header.body_len > (raw.len() as u64).saturating_mul(LZ4_MAX_RATIO) {
            return Err(ReplayError::BodyLength {
                expected: header.body_len,
                actual: raw.len() as u64,
            });
        }
        let expected = usize::try_from(header.body_len).map_err(|_| ReplayError::TooLarge("body length"))?;
        lz4_flex::decompress(&raw, expected)?
    };

    if body.len() as u64 != header.body_len {
        return Err(ReplayError::BodyLength {
            expected: header.body_len,
            actual: body.len() as u64,
        });
    }
    let actual_crc = crc32fast::hash(&body);
    if actual_crc != header.body_crc {
        return Err(ReplayError::ChecksumMismatch {
            expected: header.body_crc,
            actual: actual_crc,
        });
    }

    let mut stream = ReplayStream::new(header.root_seed);
    for record in TlvReader::new(&body) {
        let record = record?;
        stream.push(ReplayRecord::decode(record.tag, record.payload)?);
    }

    let actual = u32::try_from(stream.len()).unwrap_or(u32::MAX);
    if actual != header.record_count {
        return Err(ReplayError::RecordCount {
            expected: header.record_count,
            actual,
        });
    }
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::InputHeader;

    fn sample_stream() -> ReplayStream {
        let mut stream = ReplayStream::new(7);
        for tick in 0..20 {
            stream.push(ReplayRecord::InputPacket {
                tick,
                header: InputHeader::new(1, 2, tick as u32),
                payload: vec![0x55; 24],
            });
            stream.push(ReplayRecord::HashSnapshot { tick, hash: tick * 31 });
        }
        stream
    }

    #[test]
    fn test_header_bytes() {
        let header = ReplayFileHeader {
            magic: REPLAY_MAGIC,
            version: REPLAY_VERSION,
            flags: FLAG_LZ4,
            root_seed: 42,
            record_count: 3,
            body_crc: 0xDEAD_BEEF,
            body_len: 1 << 40,
        };
        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], b"TSRP");
        assert_eq!(ReplayFileHeader::from_bytes(&bytes), header);
        assert!(header.validate().is_ok());
    }

    #[test]
    fn test_write_and_read() {
        let stream = sample_stream();
        for compression in [Compression::None, Compression::Lz4] {
            let mut buffer = Vec::new();
            write(&stream, &mut buffer, compression).unwrap();
            let loaded = read(&mut std::io::Cursor::new(buffer)).unwrap();
            assert_eq!(loaded, stream);
        }
    }

    #[test]
    fn test_lz4_shrinks_repetitive_body() {
        let stream = sample_stream();
        let mut raw = Vec::new();
        write(&stream, &mut raw, Compression::None).unwrap();
        let mut packed = Vec::new();
        write(&stream, &mut packed, Compression::Lz4).unwrap();
        assert!(packed.len() < raw.len());
    }

    #[test]
    fn test_corruption_detected() {
        let mut buffer = Vec::new();
        write(&sample_stream(), &mut buffer, Compression::None).unwrap();
        let last = buffer.len() - 1;
        buffer[last] ^= 0xFF;
        assert!(matches!(
            read(&mut std::io::Cursor::new(buffer)),
            Err(ReplayError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_bad_magic_and_version() {
        let mut buffer = Vec::new();
        write(&ReplayStream::new(1), &mut buffer, Compression::None).unwrap();

        let mut wrong_magic = buffer.clone();
        wrong_magic[0] = b'X';
        assert!(matches!(
            read(&mut wrong_magic.as_slice()),
            Err(ReplayError::BadMagic(_))
        ));

        let mut future = buffer;
        future[4..8].copy_from_slice(&(REPLAY_VERSION + 1).to_le_bytes());
        assert!(matches!(
            read(&mut future.as_slice()),
            Err(ReplayError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn test_forged_body_length_rejected() {
        let mut buffer = Vec::new();
        write(&ReplayStream::new(1), &mut buffer, Compression::Lz4).unwrap();

        let mut huge = buffer.clone();
        huge[24..32].copy_from_slice(&(1u64 << 46).to_le_bytes());
        assert!(matches!(
            read(&mut huge.as_slice()),
            Err(ReplayError::TooLarge("body length"))
        ));

        // Under the global cap but far past what one compressed byte expands to.
        let mut inflated = buffer;
        inflated[24..32].copy_from_slice(&(MAX_REPLAY_BODY / 2).to_le_bytes());
        assert!(matches!(
            read(&mut inflated.as_slice()),
            Err(ReplayError::BodyLength { .. })
        ));
    }

    #[test]
    fn test_truncated_file() {
        let mut buffer = Vec::new();
        write(&sample_stream(), &mut buffer, Compression::None).unwrap();
        buffer.truncate(buffer.len() - 3);
        assert!(matches!(
            read(&mut buffer.as_slice()),
            Err(ReplayError::BodyLength { .. })
        ));
        assert!(matches!(read(&mut &buffer[..10]), Err(ReplayError::Io(_))));
    }
}
