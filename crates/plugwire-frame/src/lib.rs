//! Varint length-prefixed framing for plugwire.
//!
//! Every message on the wire is a frame:
//! - An unsigned LEB128 varint holding the payload length
//! - Exactly that many payload bytes
//!
//! There is no magic number, version byte or channel id. Both directions of
//! a plugin stream are flat sequences of frames. [`FrameWriter`] batches
//! frames into one buffer and writes through at a size threshold;
//! [`FrameReader`] hands back complete payloads and reports truncation.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::VarintCodec;
pub use codec::{
    decode_frame, decode_varint, encode_frame, encode_varint, frame_size, varint_len, FrameConfig,
    DEFAULT_FLUSH_THRESHOLD, DEFAULT_MAX_PAYLOAD, DEFAULT_RELEASE_THRESHOLD, MAX_VARINT_LEN,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
