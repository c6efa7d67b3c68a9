use std::io::{Read, Write};

use bytes::Bytes;
use plugwire_frame::{FrameConfig, FrameError, FrameReader, FrameWriter};
use tracing::{debug, trace};

use crate::error::Result;

/// Plugin-side handler loop.
///
/// Reads request frames from `input` one at a time, runs `transform` on each
/// and frames the result onto `output`, one response per request in order.
/// Responses accumulate in the writer and go out when the buffer reaches the
/// flush threshold, or as soon as no further input is already buffered, so a
/// lull in requests never holds responses back.
///
/// Returns the number of requests handled when `input` ends cleanly on a
/// frame boundary. Any other read failure is returned as an error: once frame
/// boundaries are lost the stream cannot be resynchronized.
pub fn serve<R, W, F, O>(input: R, output: W, config: &FrameConfig, mut transform: F) -> Result<u64>
where
    R: Read,
    W: Write,
    F: FnMut(Bytes) -> O,
    O: AsRef<[u8]>,
{
    let mut reader = FrameReader::with_config(input, config.clone());
    let mut writer = FrameWriter::with_config(output, config.clone());
    let mut handled = 0u64;

    loop {
        let request = match reader.read_frame() {
            Ok(request) => request,
            Err(FrameError::ConnectionClosed) => {
                writer.flush()?;
                debug!(handled, "request stream closed");
                return Ok(handled);
            }
            Err(err) => {
                // Answers already computed are still valid; send them before failing.
                let _ = writer.flush();
                return Err(err.into());
            }
        };

        let response = transform(request);
        writer.push(response.as_ref())?;
        handled += 1;

        if !reader.has_buffered() {
            trace!(bytes = writer.buffered(), "input idle; flushing responses");
            writer.flush()?;
        }
    }
}
