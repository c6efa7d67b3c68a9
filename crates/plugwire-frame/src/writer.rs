use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{encode_frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes frames to any `Write` stream through an accumulation buffer.
///
/// [`push`](Self::push) only buffers, writing through once the buffer reaches
/// `flush_threshold`. [`flush`](Self::flush) writes whatever is left and, if
/// a large batch grew the buffer past `release_threshold`, drops it so the
/// next small batch does not keep the memory alive.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Buffer one frame, writing through if the buffer reached the flush threshold.
    pub fn push(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len() as u64,
                max: self.config.max_payload_size,
            });
        }

        encode_frame(payload, &mut self.buf);
        if self.buf.len() >= self.config.flush_threshold {
            self.write_buffered()?;
        }
        Ok(())
    }

    /// Encode and send a single frame immediately.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.push(payload)?;
        self.flush()
    }

    /// Write all buffered frames and flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        self.write_buffered()?;
        loop {
            match self.inner.flush() {
                Ok(()) => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        self.release_if_oversized();
        Ok(())
    }

    /// Bytes encoded but not yet written.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Current capacity of the accumulation buffer.
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    fn write_buffered(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        trace!(bytes = self.buf.len(), "writing buffered frames");

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        self.buf.clear();
        Ok(())
    }

    fn release_if_oversized(&mut self) {
        if self.buf.capacity() >= self.config.release_threshold {
            trace!(capacity = self.buf.capacity(), "releasing write buffer");
            self.buf = BytesMut::new();
        }
    }

    /// Consume the writer and return the inner stream. Buffered frames are discarded.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::{decode_frame, DEFAULT_FLUSH_THRESHOLD, DEFAULT_RELEASE_THRESHOLD};

    fn decode_all(bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut wire = BytesMut::from(bytes);
        let mut frames = Vec::new();
        while let Some(frame) = decode_frame(&mut wire, usize::MAX).unwrap() {
            frames.push(frame.to_vec());
        }
        assert!(wire.is_empty());
        frames
    }

    #[test]
    fn write_single_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send(b"hello").unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(decode_all(&wire), vec![b"hello".to_vec()]);
    }

    #[test]
    fn push_buffers_until_flush() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.push(b"one").unwrap();
        writer.push(b"two").unwrap();
        writer.push(b"three").unwrap();
        assert_eq!(writer.buffered(), 4 + 4 + 6);

        writer.flush().unwrap();
        assert_eq!(writer.buffered(), 0);

        let wire = writer.into_inner().into_inner();
        assert_eq!(
            decode_all(&wire),
            vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]
        );
    }

    #[test]
    fn push_writes_through_at_flush_threshold() {
        let sink = CountingWriter::default();
        let writes = Arc::clone(&sink.writes);
        let mut writer = FrameWriter::new(sink);

        let payload = vec![7u8; 1000];
        let mut pushed = 0;
        while writes.load(Ordering::SeqCst) == 0 {
            writer.push(&payload).unwrap();
            pushed += 1;
            assert!(pushed <= DEFAULT_FLUSH_THRESHOLD / 1000 + 1);
        }
        assert_eq!(writer.buffered(), 0);

        writer.push(&payload).unwrap();
        writer.flush().unwrap();
        assert_eq!(writes.load(Ordering::SeqCst), 2);
        assert_eq!(decode_all(&writer.into_inner().data).len(), pushed + 1);
    }

    #[test]
    fn oversized_buffer_released_after_flush() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        let large = vec![1u8; DEFAULT_RELEASE_THRESHOLD + 1];
        writer.push(&large).unwrap();
        writer.flush().unwrap();
        assert!(writer.capacity() < DEFAULT_RELEASE_THRESHOLD);

        writer.send(b"small").unwrap();
        let frames = decode_all(&writer.into_inner().into_inner());
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].len(), DEFAULT_RELEASE_THRESHOLD + 1);
        assert_eq!(frames[1], b"small");
    }

    #[test]
    fn payload_too_large_rejected() {
        let cfg = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);

        let err = writer.send(b"oversized").unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 9, max: 4 }));
        assert_eq!(writer.buffered(), 0);

        writer.send(b"four").unwrap();
        assert_eq!(decode_all(&writer.into_inner().into_inner()), vec![b"four".to_vec()]);
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        writer.send(b"x").unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_write_and_flush() {
        let writer_impl = FlakyWriter::new(ErrorKind::Interrupted);
        let mut writer = FrameWriter::new(writer_impl);
        writer.send(b"retry").unwrap();

        let inner = writer.into_inner();
        assert_eq!(decode_all(&inner.data), vec![b"retry".to_vec()]);
    }

    #[test]
    fn handles_would_block_write_and_flush() {
        let writer_impl = FlakyWriter::new(ErrorKind::WouldBlock);
        let mut writer = FrameWriter::new(writer_impl);
        writer.send(b"retry").unwrap();

        let inner = writer.into_inner();
        assert_eq!(decode_all(&inner.data), vec![b"retry".to_vec()]);
    }

    #[test]
    fn broken_pipe_is_io_error() {
        let mut writer = FrameWriter::new(FlakyWriter::new(ErrorKind::BrokenPipe));
        let err = writer.send(b"x").unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingWriter {
        writes: Arc<AtomicUsize>,
        data: Vec<u8>,
    }

    impl Write for CountingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Fails the first write and the first flush with `kind`.
    struct FlakyWriter {
        kind: ErrorKind,
        write_failed: bool,
        flush_failed: bool,
        data: Vec<u8>,
    }

    impl FlakyWriter {
        fn new(kind: ErrorKind) -> Self {
            Self {
                kind,
                write_failed: false,
                flush_failed: false,
                data: Vec::new(),
            }
        }
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.write_failed {
                self.write_failed = true;
                return Err(std::io::Error::from(self.kind));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_failed {
                self.flush_failed = true;
                return Err(std::io::Error::from(self.kind));
            }
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
