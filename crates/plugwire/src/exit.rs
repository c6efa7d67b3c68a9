use std::fmt;
use std::io;

use plugwire_frame::FrameError;
use plugwire_peer::PeerError;
use plugwire_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const NOT_FOUND: i32 = 127;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

fn io_code(kind: io::ErrorKind) -> i32 {
    match kind {
        io::ErrorKind::NotFound => NOT_FOUND,
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::BrokenPipe => FAILURE,
        _ => INTERNAL,
    }
}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    CliError::new(io_code(err.kind()), format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Spawn { ref source, .. } => {
            CliError::new(io_code(source.kind()), format!("{context}: {err}"))
        }
        TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other if other.is_protocol() => {
            CliError::new(DATA_INVALID, format!("{context}: {other}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn peer_error(context: &str, err: PeerError) -> CliError {
    match err {
        PeerError::Transport(err) => transport_error(context, err),
        PeerError::Frame(err) => frame_error(context, err),
        PeerError::Io(err) => io_error(context, err),
        PeerError::Disconnected(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        PeerError::DispatchPanicked => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_of_missing_program_is_not_found() {
        let err = TransportError::Spawn {
            program: "/nonexistent/plugin".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        let cli = transport_error("open failed", err);
        assert_eq!(cli.code, NOT_FOUND);
        assert!(cli.message.contains("/nonexistent/plugin"));
    }

    #[test]
    fn protocol_violations_are_data_invalid() {
        let cli = peer_error(
            "send failed",
            PeerError::Frame(FrameError::PayloadTooLarge { size: 10, max: 4 }),
        );
        assert_eq!(cli.code, DATA_INVALID);

        let cli = frame_error("read failed", FrameError::InvalidLength);
        assert_eq!(cli.code, DATA_INVALID);
    }

    #[test]
    fn disconnects_are_plain_failures() {
        let cli = peer_error("call failed", PeerError::Disconnected("plugin closed".into()));
        assert_eq!(cli.code, FAILURE);
        assert!(cli.message.contains("plugin closed"));
    }
}
