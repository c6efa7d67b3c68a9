/// Errors that can occur in plugin operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] plugwire_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] plugwire_frame::FrameError),

    /// The dispatch loop has stopped; the request was not, or will not be, answered.
    #[error("plugin disconnected: {0}")]
    Disconnected(String),

    /// The dispatch thread panicked.
    #[error("dispatch thread panicked")]
    DispatchPanicked,

    /// I/O error outside the frame stream (thread spawn, stdio locking).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PeerError>;
