use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};

use bytes::Bytes;

use crate::error::{PeerError, Result};

type Outcome = std::result::Result<Bytes, String>;

/// Reason the dispatch loop stopped, shared by the host handle, the loop
/// and every queued request. Empty while the loop is alive.
#[derive(Debug, Clone, Default)]
pub(crate) struct Terminal(Arc<OnceLock<String>>);

impl Terminal {
    /// Record why the loop stopped. The first reason wins.
    pub(crate) fn set(&self, reason: impl Into<String>) {
        let _ = self.0.set(reason.into());
    }

    pub(crate) fn reason(&self) -> Option<&str> {
        self.0.get().map(String::as_str)
    }
}

/// One-shot completion cell written by the dispatch loop.
#[derive(Debug, Default)]
pub(crate) struct Slot {
    outcome: Mutex<Option<Outcome>>,
    ready: Condvar,
}

impl Slot {
    /// Store the outcome unless one is already set, and wake all waiters.
    pub(crate) fn resolve(&self, outcome: Outcome) -> bool {
        let mut guard = self.lock();
        if guard.is_some() {
            return false;
        }
        *guard = Some(outcome);
        drop(guard);
        self.ready.notify_all();
        true
    }

    /// Fail the slot with `reason` unless it is already resolved.
    pub(crate) fn fail(&self, reason: &str) {
        let mut guard = self.lock();
        if guard.is_none() {
            *guard = Some(Err(reason.to_string()));
            drop(guard);
            self.ready.notify_all();
        }
    }

    fn wait(&self) -> Outcome {
        let mut guard = self.lock();
        loop {
            if let Some(outcome) = guard.as_ref() {
                return outcome.clone();
            }
            guard = self
                .ready
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn peek(&self) -> Option<Outcome> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Outcome>> {
        self.outcome.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Caller-side token for one request's response.
///
/// Cloning is cheap; every clone observes the same result.
#[derive(Debug, Clone)]
pub struct ResponseHandle {
    slot: Arc<Slot>,
}

impl ResponseHandle {
    pub(crate) fn new(slot: Arc<Slot>) -> Self {
        Self { slot }
    }

    /// Block until the response arrives and return it.
    ///
    /// Fails with [`PeerError::Disconnected`] if the dispatch loop stopped
    /// before this request was answered.
    pub fn output(&self) -> Result<Bytes> {
        self.slot.wait().map_err(PeerError::Disconnected)
    }

    /// The response if it has already arrived, without blocking.
    pub fn try_output(&self) -> Option<Result<Bytes>> {
        self.slot
            .peek()
            .map(|outcome| outcome.map_err(PeerError::Disconnected))
    }

    /// True once the request is resolved, successfully or not.
    pub fn is_ready(&self) -> bool {
        self.slot.peek().is_some()
    }
}
