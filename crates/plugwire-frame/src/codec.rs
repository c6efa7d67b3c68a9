use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Longest valid varint for a 64-bit length.
pub const MAX_VARINT_LEN: usize = 10;

/// Default maximum payload size: 64 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024 * 1024;

/// Default buffered size at which a batch is written through: 64 KiB.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 64 * 1024;

/// Default buffer capacity above which the write buffer is released: 1 MiB.
pub const DEFAULT_RELEASE_THRESHOLD: usize = 1024 * 1024;

/// Append `value` as an unsigned LEB128 varint.
pub fn encode_varint(mut value: u64, dst: &mut impl BufMut) {
    while value >= 0x80 {
        dst.put_u8((value as u8) | 0x80);
        value >>= 7;
    }
    dst.put_u8(value as u8);
}

/// Number of bytes `value` occupies as a varint.
pub fn varint_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Decode a varint from the front of `src`.
///
/// Returns `Ok(None)` if `src` ends before the varint does, otherwise the
/// value and the number of bytes it occupied.
pub fn decode_varint(src: &[u8]) -> Result<Option<(u64, usize)>> {
    let mut value = 0u64;
    for (i, &byte) in src.iter().enumerate() {
        if i == MAX_VARINT_LEN - 1 && byte > 1 {
            return Err(FrameError::InvalidLength);
        }
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte < 0x80 {
            return Ok(Some((value, i + 1)));
        }
    }
    Ok(None)
}

/// Total wire size of a frame carrying `payload_len` bytes.
pub fn frame_size(payload_len: usize) -> usize {
    varint_len(payload_len as u64) + payload_len
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────────┬──────────────────┐
/// │ Length (varint)  │ Payload          │
/// │ 1..=10 bytes     │ (Length bytes)   │
/// └──────────────────┴──────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(frame_size(payload.len()));
    encode_varint(payload.len() as u64, dst);
    dst.put_slice(payload);
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Bytes>> {
    let Some((declared, header_len)) = decode_varint(src)? else {
        return Ok(None);
    };

    let payload_len = match usize::try_from(declared) {
        Ok(len) if len <= max_payload => len,
        _ => {
            return Err(FrameError::PayloadTooLarge {
                size: declared,
                max: max_payload,
            })
        }
    };

    let total = header_len + payload_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(header_len);
    Ok(Some(src.split_to(payload_len).freeze()))
}

/// Classify the leftover bytes of a stream that hit EOF.
pub(crate) fn eof_error(buffered: &[u8]) -> FrameError {
    if buffered.is_empty() {
        return FrameError::ConnectionClosed;
    }
    match decode_varint(buffered) {
        Ok(None) => FrameError::TruncatedLength,
        Ok(Some((expected, header_len))) => FrameError::TruncatedPayload {
            expected,
            received: buffered.len() - header_len,
        },
        Err(err) => err,
    }
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 64 MiB.
    pub max_payload_size: usize,
    /// Buffered bytes at which a writer writes through mid-batch. Default: 64 KiB.
    pub flush_threshold: usize,
    /// Buffer capacity above which a writer drops its buffer after a flush. Default: 1 MiB.
    pub release_threshold: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            release_threshold: DEFAULT_RELEASE_THRESHOLD,
        }
    }
}
