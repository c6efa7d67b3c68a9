use std::io::{Read, Write};
use std::sync::mpsc::Receiver;

use plugwire_frame::{FrameConfig, FrameReader, FrameWriter};
use tracing::{debug, error};

use crate::handle::Terminal;
use crate::queue::{next_batch, Message, Request, CLOSED_REASON};

/// The only owner of the plugin stream.
///
/// Each cycle drains the queue into a batch of at most `flush_threshold`
/// encoded bytes (or a single request), writes every request frame, then
/// reads exactly one response frame per request in write order.
pub(crate) struct Dispatcher<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    queue: Receiver<Message>,
    terminal: Terminal,
    max_batch_bytes: usize,
}

impl<R: Read, W: Write> Dispatcher<R, W> {
    pub(crate) fn new(
        reader: R,
        writer: W,
        queue: Receiver<Message>,
        terminal: Terminal,
        config: &FrameConfig,
    ) -> Self {
        Self {
            reader: FrameReader::with_config(reader, config.clone()),
            writer: FrameWriter::with_config(writer, config.clone()),
            queue,
            terminal,
            max_batch_bytes: config.flush_threshold,
        }
    }

    /// Run until the shutdown sentinel or the first stream failure.
    ///
    /// Returning drops the queue, the streams and any unanswered requests;
    /// the terminal reason is set first so every dropped request fails with it.
    pub(crate) fn run(mut self) {
        let mut batch = Vec::new();
        loop {
            let shutdown = next_batch(&self.queue, &mut batch, self.max_batch_bytes);

            if !batch.is_empty() {
                if let Err(err) = self.dispatch(&batch) {
                    error!(
                        error = %err,
                        protocol = err.is_protocol(),
                        unanswered = batch.len(),
                        "plugin stream failed; dispatch stopped"
                    );
                    self.terminal.set(format!("frame error: {err}"));
                    return;
                }
                batch.clear();
            }

            if shutdown {
                debug!("shutdown sentinel received");
                self.terminal.set(CLOSED_REASON);
                return;
            }
        }
    }

    fn dispatch(&mut self, batch: &[Request]) -> plugwire_frame::Result<()> {
        debug!(requests = batch.len(), "dispatching batch");

        for request in batch {
            self.writer.push(request.input())?;
        }
        self.writer.flush()?;

        for request in batch {
            let output = self.reader.read_frame()?;
            request.resolve(output);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    use bytes::{Bytes, BytesMut};
    use plugwire_frame::{decode_frame, encode_frame};

    use super::*;
    use crate::queue::{pending_queue, PendingSender};

    /// `Write` sink whose bytes stay inspectable after the dispatcher drops it.
    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn responses(payloads: &[&[u8]]) -> Cursor<Vec<u8>> {
        let mut wire = BytesMut::new();
        for payload in payloads {
            encode_frame(payload, &mut wire);
        }
        Cursor::new(wire.to_vec())
    }

    fn enqueue(
        tx: &PendingSender,
        terminal: &Terminal,
        input: &'static [u8],
    ) -> crate::ResponseHandle {
        let (request, handle) = Request::new(Bytes::from_static(input), terminal.clone());
        tx.send(Message::Request(request)).unwrap();
        handle
    }

    #[test]
    fn responses_resolve_requests_in_write_order() {
        let (tx, rx) = pending_queue(None);
        let terminal = Terminal::default();
        let sink = SharedSink::default();

        let first = enqueue(&tx, &terminal, b"first");
        let second = enqueue(&tx, &terminal, b"second");
        tx.send(Message::Shutdown).unwrap();

        let reader = responses(&[b"FIRST", b"SECOND"]);
        Dispatcher::new(reader, sink.clone(), rx, terminal.clone(), &FrameConfig::default())
            .run();

        assert_eq!(first.output().unwrap().as_ref(), b"FIRST");
        assert_eq!(second.output().unwrap().as_ref(), b"SECOND");
        assert_eq!(terminal.reason(), Some(CLOSED_REASON));

        let mut written = BytesMut::from(sink.0.lock().unwrap().as_slice());
        let a = decode_frame(&mut written, usize::MAX).unwrap().unwrap();
        let b = decode_frame(&mut written, usize::MAX).unwrap().unwrap();
        assert_eq!((a.as_ref(), b.as_ref()), (&b"first"[..], &b"second"[..]));
        assert!(written.is_empty());
    }

    #[test]
    fn short_response_stream_fails_rest_of_batch() {
        let (tx, rx) = pending_queue(None);
        let terminal = Terminal::default();

        let answered = enqueue(&tx, &terminal, b"one");
        let stranded = enqueue(&tx, &terminal, b"two");
        let queued_after_sentinel = {
            tx.send(Message::Shutdown).unwrap();
            enqueue(&tx, &terminal, b"three")
        };

        let mut wire = BytesMut::new();
        encode_frame(b"ONE", &mut wire);
        wire.extend_from_slice(&[0x04, b'T']);

        Dispatcher::new(
            Cursor::new(wire.to_vec()),
            SharedSink::default(),
            rx,
            terminal.clone(),
            &FrameConfig::default(),
        )
        .run();

        assert_eq!(answered.output().unwrap().as_ref(), b"ONE");
        let err = stranded.output().unwrap_err().to_string();
        assert!(err.contains("truncated payload"), "{err}");
        assert!(queued_after_sentinel.output().is_err());
        assert!(terminal.reason().unwrap().starts_with("frame error"));
    }

    #[test]
    fn sentinel_with_nothing_pending_stops_loop() {
        let (tx, rx) = pending_queue(Some(1));
        let terminal = Terminal::default();
        tx.send(Message::Shutdown).unwrap();

        let sink = SharedSink::default();
        Dispatcher::new(
            Cursor::new(Vec::new()),
            sink.clone(),
            rx,
            terminal.clone(),
            &FrameConfig::default(),
        )
        .run();

        assert!(sink.0.lock().unwrap().is_empty());
        assert_eq!(terminal.reason(), Some(CLOSED_REASON));
    }
}
