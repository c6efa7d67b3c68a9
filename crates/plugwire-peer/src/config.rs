use plugwire_frame::FrameConfig;

/// Default bound on queued, not-yet-dispatched requests.
pub const DEFAULT_MAX_PENDING: usize = 1024;

/// Host-side plugin configuration.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Frame limits and buffer thresholds for the dispatch loop.
    ///
    /// `flush_threshold` also caps the encoded size of one batch: the
    /// dispatch loop stops draining once a batch reaches it, so the bytes in
    /// flight before the first response is read stay within what a plugin
    /// that reads each request before answering can absorb. Keep it at or
    /// below the pipe buffer size (64 KiB on Linux).
    pub frame: FrameConfig,
    /// Queue bound. `send` blocks while this many requests wait for dispatch.
    /// `None` makes the queue unbounded.
    pub max_pending: Option<usize>,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            max_pending: Some(DEFAULT_MAX_PENDING),
        }
    }
}
