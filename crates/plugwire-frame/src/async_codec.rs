//! `tokio_util::codec` adapter for the varint frame format.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, eof_error, FrameConfig};
use crate::error::{FrameError, Result};

/// Decodes and encodes varint-prefixed frames for `Framed` streams.
#[derive(Debug, Clone)]
pub struct VarintCodec {
    max_payload_size: usize,
}

impl VarintCodec {
    /// Create a codec with the default payload cap.
    pub fn new() -> Self {
        Self::with_config(&FrameConfig::default())
    }

    /// Create a codec using the payload cap from `config`.
    pub fn with_config(config: &FrameConfig) -> Self {
        Self {
            max_payload_size: config.max_payload_size,
        }
    }
}

impl Default for VarintCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for VarintCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        decode_frame(src, self.max_payload_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            Ok(None)
        } else {
            Err(eof_error(src))
        }
    }
}

impl Encoder<Bytes> for VarintCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        if item.len() > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: item.len() as u64,
                max: self.max_payload_size,
            });
        }
        encode_frame(&item, dst);
        Ok(())
    }
}
