use std::sync::mpsc::{self, Receiver, RecvError, Sender, SyncSender, TryRecvError};
use std::sync::Arc;

use bytes::Bytes;
use plugwire_frame::frame_size;

use crate::handle::{ResponseHandle, Slot, Terminal};

pub(crate) const CLOSED_REASON: &str = "plugin closed";

/// A queued request. Owned by the queue and then the dispatch loop until
/// it is resolved.
///
/// Dropping an unresolved request fails its handle with the terminal reason,
/// so requests stranded in a dead queue or an aborted batch never hang.
#[derive(Debug)]
pub(crate) struct Request {
    input: Bytes,
    slot: Arc<Slot>,
    terminal: Terminal,
}

impl Request {
    pub(crate) fn new(input: Bytes, terminal: Terminal) -> (Self, ResponseHandle) {
        let slot = Arc::new(Slot::default());
        let handle = ResponseHandle::new(Arc::clone(&slot));
        (
            Self {
                input,
                slot,
                terminal,
            },
            handle,
        )
    }

    pub(crate) fn input(&self) -> &[u8] {
        &self.input
    }

    pub(crate) fn resolve(&self, output: Bytes) {
        self.slot.resolve(Ok(output));
    }
}

impl Drop for Request {
    fn drop(&mut self) {
        self.slot
            .fail(self.terminal.reason().unwrap_or(CLOSED_REASON));
    }
}

/// Pending-queue entry.
#[derive(Debug)]
pub(crate) enum Message {
    Request(Request),
    /// Shutdown sentinel. Never framed.
    Shutdown,
}

/// Producer side of the pending queue.
#[derive(Debug, Clone)]
pub(crate) enum PendingSender {
    Bounded(SyncSender<Message>),
    Unbounded(Sender<Message>),
}

impl PendingSender {
    /// Enqueue, blocking only when a bounded queue is full. Hands the
    /// message back if the dispatch loop is gone.
    pub(crate) fn send(&self, message: Message) -> Result<(), Message> {
        match self {
            PendingSender::Bounded(tx) => tx.send(message),
            PendingSender::Unbounded(tx) => tx.send(message),
        }
        .map_err(|err| err.0)
    }
}

/// Create the pending queue. `None` means unbounded.
pub(crate) fn pending_queue(max_pending: Option<usize>) -> (PendingSender, Receiver<Message>) {
    match max_pending {
        Some(bound) => {
            let (tx, rx) = mpsc::sync_channel(bound.max(1));
            (PendingSender::Bounded(tx), rx)
        }
        None => {
            let (tx, rx) = mpsc::channel();
            (PendingSender::Unbounded(tx), rx)
        }
    }
}

/// Block for one message, then drain whatever else is already queued into
/// `batch` until its encoded size reaches `max_bytes`. Returns true if the
/// sentinel was seen (or every producer is gone); requests drained before it
/// are still in `batch`.
///
/// The byte limit bounds what one batch puts in flight before any response
/// is read: a plugin can only absorb so much input while its own unread
/// output backs up. Requests left behind stay queued, in order, for the next
/// call. A single request of any size still forms a batch on its own.
pub(crate) fn next_batch(
    queue: &Receiver<Message>,
    batch: &mut Vec<Request>,
    max_bytes: usize,
) -> bool {
    let mut bytes = 0;
    match queue.recv() {
        Ok(Message::Request(request)) => {
            bytes += frame_size(request.input.len());
            batch.push(request);
        }
        Ok(Message::Shutdown) | Err(RecvError) => return true,
    }
    while bytes < max_bytes {
        match queue.try_recv() {
            Ok(Message::Request(request)) => {
                bytes += frame_size(request.input.len());
                batch.push(request);
            }
            Ok(Message::Shutdown) | Err(TryRecvError::Disconnected) => return true,
            Err(TryRecvError::Empty) => return false,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(input: &'static [u8]) -> (Message, ResponseHandle) {
        let (request, handle) = Request::new(Bytes::from_static(input), Terminal::default());
        (Message::Request(request), handle)
    }

    #[test]
    fn drains_everything_already_queued() {
        let (tx, rx) = pending_queue(None);
        for input in [&b"a"[..], &b"b"[..], &b"c"[..]] {
            tx.send(request(input).0).unwrap();
        }

        let mut batch = Vec::new();
        assert!(!next_batch(&rx, &mut batch, usize::MAX));
        let inputs: Vec<&[u8]> = batch.iter().map(Request::input).collect();
        assert_eq!(inputs, vec![&b"a"[..], &b"b"[..], &b"c"[..]]);
    }

    #[test]
    fn sentinel_ends_drain_but_keeps_earlier_requests() {
        let (tx, rx) = pending_queue(Some(8));
        tx.send(request(b"before").0).unwrap();
        tx.send(Message::Shutdown).unwrap();
        tx.send(request(b"after").0).unwrap();

        let mut batch = Vec::new();
        assert!(next_batch(&rx, &mut batch, usize::MAX));
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].input(), b"before");
    }

    #[test]
    fn drain_stops_at_byte_limit_and_keeps_the_rest_queued() {
        let (tx, rx) = pending_queue(None);
        for input in [&b"aaaa"[..], &b"bbbb"[..], &b"cccc"[..], &b"dddd"[..]] {
            tx.send(request(input).0).unwrap();
        }
        tx.send(Message::Shutdown).unwrap();

        // Each frame is 5 bytes on the wire; the limit is reached after two.
        let mut batch = Vec::new();
        assert!(!next_batch(&rx, &mut batch, 10));
        let inputs: Vec<&[u8]> = batch.iter().map(Request::input).collect();
        assert_eq!(inputs, vec![&b"aaaa"[..], &b"bbbb"[..]]);

        batch.clear();
        assert!(!next_batch(&rx, &mut batch, 10));
        let inputs: Vec<&[u8]> = batch.iter().map(Request::input).collect();
        assert_eq!(inputs, vec![&b"cccc"[..], &b"dddd"[..]]);

        batch.clear();
        assert!(next_batch(&rx, &mut batch, 10));
        assert!(batch.is_empty());
    }

    #[test]
    fn oversized_request_forms_its_own_batch() {
        let (tx, rx) = pending_queue(None);
        tx.send(request(b"far larger than the limit").0).unwrap();
        tx.send(request(b"next").0).unwrap();

        let mut batch = Vec::new();
        assert!(!next_batch(&rx, &mut batch, 4));
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].input(), b"far larger than the limit");
    }

    #[test]
    fn sentinel_alone_is_not_a_request() {
        let (tx, rx) = pending_queue(Some(1));
        tx.send(Message::Shutdown).unwrap();

        let mut batch = Vec::new();
        assert!(next_batch(&rx, &mut batch, usize::MAX));
        assert!(batch.is_empty());
    }

    #[test]
    fn dropped_request_fails_its_handle() {
        let terminal = Terminal::default();
        let (request, handle) = Request::new(Bytes::from_static(b"x"), terminal.clone());
        terminal.set("frame error: connection closed");
        drop(request);

        let err = handle.output().unwrap_err();
        assert_eq!(
            err.to_string(),
            "plugin disconnected: frame error: connection closed"
        );
    }

    #[test]
    fn resolved_request_keeps_output_after_drop() {
        let (request, handle) = Request::new(Bytes::from_static(b"x"), Terminal::default());
        request.resolve(Bytes::from_static(b"X"));
        drop(request);
        assert_eq!(handle.output().unwrap().as_ref(), b"X");
    }

    #[test]
    fn dropping_receiver_fails_queued_requests() {
        let (tx, rx) = pending_queue(Some(4));
        let (message, handle) = request(b"stranded");
        tx.send(message).unwrap();
        drop(rx);

        assert!(handle.output().is_err());
        let (message, handle) = request(b"late");
        assert!(tx.send(message).is_err());
        assert!(handle.output().is_err());
    }
}
