/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The stream ended inside a length prefix.
    #[error("truncated length: stream ended inside a frame length prefix")]
    TruncatedLength,

    /// The stream ended before the declared payload was delivered.
    #[error("truncated payload ({received} of {expected} bytes)")]
    TruncatedPayload { expected: u64, received: usize },

    /// The length prefix is not a valid 64-bit varint.
    #[error("invalid frame length (varint overflows 64 bits)")]
    InvalidLength,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: u64, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended cleanly on a frame boundary, or refused further writes.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// True for errors caused by malformed or truncated frames rather than
    /// by the underlying stream.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            FrameError::TruncatedLength
                | FrameError::TruncatedPayload { .. }
                | FrameError::InvalidLength
                | FrameError::PayloadTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_errors_are_classified() {
        assert!(FrameError::TruncatedLength.is_protocol());
        assert!(FrameError::TruncatedPayload {
            expected: 8,
            received: 3
        }
        .is_protocol());
        assert!(FrameError::InvalidLength.is_protocol());
        assert!(!FrameError::ConnectionClosed.is_protocol());
        assert!(!FrameError::Io(std::io::Error::other("boom")).is_protocol());
    }

    #[test]
    fn truncated_payload_message_reports_counts() {
        let err = FrameError::TruncatedPayload {
            expected: 16,
            received: 9,
        };
        assert_eq!(err.to_string(), "truncated payload (9 of 16 bytes)");
    }
}
