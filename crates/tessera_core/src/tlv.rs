//! # Key/Value TLV Codec
//!
//! Small parameter blobs attached to work items, content records and replay
//! records.
//!
//! ## Format
//!
//! ```text
//! ┌───────────┬──────────────┬─────────────────────┐
//! │ tag (u32) │ length (u32) │ payload[length]     │  repeated, densely packed
//! └───────────┴──────────────┴─────────────────────┘
//! ```
//!
//! Both header words are little-endian. No padding, no record count: the
//! blob's length ends iteration. No file header either; callers that embed
//! TLV inside their own framing own that.
//!
//! Reading never allocates. Every payload is a view into the caller's blob.

use crate::error::{KernelError, KernelResult};
use crate::fixed_point::Fx16_16;

/// Bytes of `tag` + `length`.
pub const TLV_HEADER_SIZE: usize = 8;

/// One decoded record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TlvRecord<'a> {
    /// Record tag.
    pub tag: u32,
    /// Payload view into the blob.
    pub payload: &'a [u8],
}

// =============================================================================
// Little-endian words
// =============================================================================

/// Reads the little-endian `u32` at byte offset `at`.
///
/// Returns `None` if fewer than 4 bytes remain.
#[inline]
#[must_use]
pub fn u32_at(bytes: &[u8], at: usize) -> Option<u32> {
    let word = bytes.get(at..at.checked_add(4)?)?;
    word.try_into().ok().map(u32::from_le_bytes)
}

/// Reads the little-endian `u64` at byte offset `at`.
///
/// Returns `None` if fewer than 8 bytes remain.
#[inline]
#[must_use]
pub fn u64_at(bytes: &[u8], at: usize) -> Option<u64> {
    let word = bytes.get(at..at.checked_add(8)?)?;
    word.try_into().ok().map(u64::from_le_bytes)
}

// =============================================================================
// Reading
// =============================================================================

/// Decodes the record at `*offset` and advances past it.
///
/// Returns `Ok(None)` when `*offset == blob.len()`. On error `*offset` is
/// left where it was.
///
/// # Errors
///
/// Returns [`KernelError::Malformed`] if fewer than 8 header bytes or fewer
/// than `length` payload bytes remain, or if `*offset` is past the end.
pub fn next<'a>(blob: &'a [u8], offset: &mut usize) -> KernelResult<Option<TlvRecord<'a>>> {
    let start = *offset;
    if start == blob.len() {
        return Ok(None);
    }
    let remaining = blob
        .len()
        .checked_sub(start)
        .ok_or(KernelError::malformed(start, "offset past end of blob"))?;
    let truncated = || KernelError::malformed(start, "truncated record header");
    if remaining < TLV_HEADER_SIZE {
        return Err(truncated());
    }
    let tag = u32_at(blob, start).ok_or_else(truncated)?;
    let len = u32_at(blob, start + 4).ok_or_else(truncated)? as usize;
    let body = start + TLV_HEADER_SIZE;
    if blob.len() - body < len {
        return Err(KernelError::malformed(start, "payload overruns blob"));
    }
    *offset = body + len;
    Ok(Some(TlvRecord {
        tag,
        payload: &blob[body..body + len],
    }))
}

/// Iterator over a TLV blob.
///
/// Yields each record, then stops. A malformed record is yielded once as an
/// error and ends iteration.
#[derive(Clone, Debug)]
pub struct TlvReader<'a> {
    blob: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> TlvReader<'a> {
    /// Starts at the beginning of `blob`.
    #[inline]
    #[must_use]
    pub const fn new(blob: &'a [u8]) -> Self {
        Self {
            blob,
            offset: 0,
            failed: false,
        }
    }

    /// Byte offset of the next record.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Decodes the next record; `Ok(None)` at the end of the blob.
    ///
    /// # Errors
    ///
    /// See [`next`].
    pub fn next_record(&mut self) -> KernelResult<Option<TlvRecord<'a>>> {
        next(self.blob, &mut self.offset)
    }
}

impl<'a> Iterator for TlvReader<'a> {
    type Item = KernelResult<TlvRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_record() {
            Ok(record) => record.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// Checks that every record in `blob` is well formed.
///
/// # Errors
///
/// The first [`KernelError::Malformed`] found.
pub fn validate(blob: &[u8]) -> KernelResult<usize> {
    let mut count = 0;
    for record in TlvReader::new(blob) {
        record?;
        count += 1;
    }
    Ok(count)
}

/// Payload of the first record with `tag`.
///
/// # Errors
///
/// Returns [`KernelError::Malformed`] if the blob is malformed before a
/// match is found.
pub fn find(blob: &[u8], tag: u32) -> KernelResult<Option<&[u8]>> {
    for record in TlvReader::new(blob) {
        let record = record?;
        if record.tag == tag {
            return Ok(Some(record.payload));
        }
    }
    Ok(None)
}

// =============================================================================
// Typed payloads
// =============================================================================

fn exact<const N: usize>(payload: &[u8], reason: &'static str) -> KernelResult<[u8; N]> {
    <[u8; N]>::try_from(payload).map_err(|_| KernelError::malformed(0, reason))
}

/// Reads a `u32` payload (exactly 4 bytes).
///
/// # Errors
///
/// [`KernelError::Malformed`] on any other length.
pub fn read_u32(payload: &[u8]) -> KernelResult<u32> {
    exact::<4>(payload, "u32 payload must be 4 bytes").map(u32::from_le_bytes)
}

/// Reads a `u16` payload: 2 bytes, or 4 bytes from older writers.
///
/// # Errors
///
/// [`KernelError::Malformed`] on any other length, or when a widened 4-byte
/// value does not fit in `u16`.
pub fn read_u16(payload: &[u8]) -> KernelResult<u16> {
    match payload.len() {
        2 => exact::<2>(payload, "u16 payload must be 2 bytes").map(u16::from_le_bytes),
        4 => {
            let wide = read_u32(payload)?;
            u16::try_from(wide).map_err(|_| KernelError::malformed(0, "widened u16 out of range"))
        }
        _ => Err(KernelError::malformed(0, "u16 payload must be 2 or 4 bytes")),
    }
}

/// Reads a `u64` payload (exactly 8 bytes).
///
/// # Errors
///
/// [`KernelError::Malformed`] on any other length.
pub fn read_u64(payload: &[u8]) -> KernelResult<u64> {
    exact::<8>(payload, "u64 payload must be 8 bytes").map(u64::from_le_bytes)
}

/// Reads an `i32` payload (exactly 4 bytes).
///
/// # Errors
///
/// [`KernelError::Malformed`] on any other length.
pub fn read_i32(payload: &[u8]) -> KernelResult<i32> {
    exact::<4>(payload, "i32 payload must be 4 bytes").map(i32::from_le_bytes)
}

/// Reads a 16.16 fixed-point payload (raw `i32`, exactly 4 bytes).
///
/// # Errors
///
/// [`KernelError::Malformed`] on any other length.
pub fn read_fx16_16(payload: &[u8]) -> KernelResult<Fx16_16> {
    exact::<4>(payload, "fx16.16 payload must be 4 bytes")
        .map(|raw| Fx16_16::from_raw(i32::from_le_bytes(raw)))
}

// =============================================================================
// Writing
// =============================================================================

/// Writes TLV records into a caller-owned buffer.
#[derive(Debug)]
pub struct TlvWriter<'b> {
    buf: &'b mut [u8],
    len: usize,
}

impl<'b> TlvWriter<'b> {
    /// Wraps an output buffer.
    #[inline]
    pub fn new(buf: &'b mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    /// Bytes written so far.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if nothing has been written.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The encoded blob.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Appends one record. Nothing is written on error.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::CapacityExceeded`] if the record does not fit
    /// the buffer or its payload exceeds `u32::MAX` bytes.
    pub fn push(&mut self, tag: u32, payload: &[u8]) -> KernelResult<()> {
        let needed = TLV_HEADER_SIZE + payload.len();
        let length = u32::try_from(payload.len()).map_err(|_| KernelError::CapacityExceeded {
            needed,
            capacity: u32::MAX as usize,
        })?;
        let available = self.buf.len() - self.len;
        if needed > available {
            return Err(KernelError::CapacityExceeded {
                needed,
                capacity: available,
            });
        }
        let at = self.len;
        self.buf[at..at + 4].copy_from_slice(&tag.to_le_bytes());
        self.buf[at + 4..at + 8].copy_from_slice(&length.to_le_bytes());
        self.buf[at + 8..at + needed].copy_from_slice(payload);
        self.len += needed;
        Ok(())
    }

    /// Appends a `u16` record.
    ///
    /// # Errors
    ///
    /// See [`Self::push`].
    pub fn push_u16(&mut self, tag: u32, value: u16) -> KernelResult<()> {
        self.push(tag, &value.to_le_bytes())
    }

    /// Appends a `u32` record.
    ///
    /// # Errors
    ///
    /// See [`Self::push`].
    pub fn push_u32(&mut self, tag: u32, value: u32) -> KernelResult<()> {
        self.push(tag, &value.to_le_bytes())
    }

    /// Appends a `u64` record.
    ///
    /// # Errors
    ///
    /// See [`Self::push`].
    pub fn push_u64(&mut self, tag: u32, value: u64) -> KernelResult<()> {
        self.push(tag, &value.to_le_bytes())
    }

    /// Appends a 16.16 fixed-point record.
    ///
    /// # Errors
    ///
    /// See [`Self::push`].
    pub fn push_fx16_16(&mut self, tag: u32, value: Fx16_16) -> KernelResult<()> {
        self.push(tag, &value.raw().to_le_bytes())
    }
}

/// Appends one record to a growable buffer owned by the caller.
///
/// # Errors
///
/// Returns [`KernelError::CapacityExceeded`] if the payload exceeds
/// `u32::MAX` bytes.
pub fn append_record(out: &mut Vec<u8>, tag: u32, payload: &[u8]) -> KernelResult<()> {
    let length = u32::try_from(payload.len()).map_err(|_| KernelError::CapacityExceeded {
        needed: payload.len(),
        capacity: u32::MAX as usize,
    })?;
    out.reserve(TLV_HEADER_SIZE + payload.len());
    out.extend_from_slice(&tag.to_le_bytes());
    out.extend_from_slice(&length.to_le_bytes());
    out.extend_from_slice(payload);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob() -> Vec<u8> {
        let mut out = Vec::new();
        append_record(&mut out, 1, &7u32.to_le_bytes()).unwrap();
        append_record(&mut out, 2, &[]).unwrap();
        append_record(&mut out, 3, b"hello").unwrap();
        out
    }

    #[test]
    fn test_layout_is_little_endian_and_dense() {
        let mut out = Vec::new();
        append_record(&mut out, 0x0403_0201, &[0xAA]).unwrap();
        assert_eq!(out, [1, 2, 3, 4, 1, 0, 0, 0, 0xAA]);
    }

    #[test]
    fn test_iterate_then_end() {
        let data = blob();
        let mut offset = 0;
        let first = next(&data, &mut offset).unwrap().unwrap();
        assert_eq!(first.tag, 1);
        assert_eq!(read_u32(first.payload), Ok(7));
        let second = next(&data, &mut offset).unwrap().unwrap();
        assert_eq!((second.tag, second.payload.len()), (2, 0));
        let third = next(&data, &mut offset).unwrap().unwrap();
        assert_eq!(third.payload, b"hello");
        assert_eq!(offset, data.len());
        assert_eq!(next(&data, &mut offset), Ok(None));
    }

    #[test]
    fn test_empty_blob_is_end() {
        let mut offset = 0;
        assert_eq!(next(&[], &mut offset), Ok(None));
        assert_eq!(validate(&[]), Ok(0));
    }

    #[test]
    fn test_truncated_header() {
        let data = blob();
        let cut = &data[..data.len() - 5 - 3];
        let mut offset = 0;
        next(cut, &mut offset).unwrap();
        next(cut, &mut offset).unwrap();
        let before = offset;
        assert_eq!(
            next(cut, &mut offset),
            Err(KernelError::malformed(before, "truncated record header"))
        );
        assert_eq!(offset, before);
    }

    #[test]
    fn test_payload_overrun() {
        let data = blob();
        let cut = &data[..data.len() - 1];
        let mut reader = TlvReader::new(cut);
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().unwrap().is_ok());
        assert!(matches!(
            reader.next(),
            Some(Err(KernelError::Malformed { reason: "payload overruns blob", .. }))
        ));
        assert!(reader.next().is_none());
        assert!(validate(cut).is_err());
    }

    #[test]
    fn test_huge_length_does_not_overflow() {
        let mut data = Vec::new();
        data.extend_from_slice(&9u32.to_le_bytes());
        data.extend_from_slice(&u32::MAX.to_le_bytes());
        let mut offset = 0;
        assert!(next(&data, &mut offset).is_err());
    }

    #[test]
    fn test_offset_past_end() {
        let mut offset = 10;
        assert!(next(&[0u8; 4], &mut offset).is_err());
    }

    #[test]
    fn test_fixed_size_readers() {
        assert_eq!(read_u16(&[0x34, 0x12]), Ok(0x1234));
        assert_eq!(read_u16(&[0x34, 0x12, 0, 0]), Ok(0x1234));
        assert!(read_u16(&[0, 0, 1, 0]).is_err());
        assert!(read_u16(&[1, 2, 3]).is_err());
        assert!(read_u32(&[1, 2]).is_err());
        assert!(read_u32(&[1, 2, 3, 4, 5]).is_err());
        assert_eq!(read_u64(&u64::MAX.to_le_bytes()), Ok(u64::MAX));
        assert_eq!(read_i32(&(-5i32).to_le_bytes()), Ok(-5));
        assert_eq!(read_fx16_16(&(1i32 << 16).to_le_bytes()), Ok(Fx16_16::ONE));
        assert!(read_fx16_16(&[0; 8]).is_err());
    }

    #[test]
    fn test_word_readers() {
        let bytes = [1, 0, 0, 0, 2, 0, 0, 0, 3];
        assert_eq!(u32_at(&bytes, 0), Some(1));
        assert_eq!(u32_at(&bytes, 4), Some(2));
        assert_eq!(u64_at(&bytes, 0), Some(0x2_0000_0001));
        assert_eq!(u32_at(&bytes, 6), None);
        assert_eq!(u64_at(&bytes, 2), None);
        assert_eq!(u32_at(&bytes, usize::MAX), None);
    }

    #[test]
    fn test_find() {
        let data = blob();
        assert_eq!(find(&data, 3), Ok(Some(&b"hello"[..])));
        assert_eq!(find(&data, 99), Ok(None));
    }

    #[test]
    fn test_writer_matches_append() {
        let mut buf = [0u8; 64];
        let mut writer = TlvWriter::new(&mut buf);
        writer.push_u32(1, 7).unwrap();
        writer.push(2, &[]).unwrap();
        writer.push(3, b"hello").unwrap();
        assert_eq!(writer.as_bytes(), blob().as_slice());
    }

    #[test]
    fn test_writer_capacity() {
        let mut buf = [0u8; 12];
        let mut writer = TlvWriter::new(&mut buf);
        writer.push_u16(1, 5).unwrap();
        assert_eq!(writer.len(), 10);
        assert_eq!(
            writer.push(2, &[]),
            Err(KernelError::CapacityExceeded {
                needed: 8,
                capacity: 2,
            })
        );
        assert_eq!(writer.len(), 10);
    }
}
