//! Domain-specific error types for the framecast protocol.
//!
//! All fallible operations return `Result<T, CastError>`.
//! Transport faults never panic and never cross the consumer boundary —
//! the endpoint loops convert them into state transitions and reconnects.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// The canonical error type for the framecast protocol.
#[derive(Debug, Error)]
pub enum CastError {
    // ── Connection setup ─────────────────────────────────────────
    /// Binding the listening socket failed.
    #[error("bind failed: {0}")]
    Bind(#[source] io::Error),

    /// Accepting a peer failed.
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    /// The connect attempt was refused or the address is unreachable.
    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    // ── Established-link I/O ─────────────────────────────────────
    /// The peer closed the connection (zero-length read).
    #[error("peer closed the connection")]
    Disconnected,

    /// The socket reported a fault during a read.
    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    /// The socket reported a fault during a write.
    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    // ── Framing ──────────────────────────────────────────────────
    /// The header carried a negative payload length.
    #[error("malformed frame length: {0}")]
    MalformedFrame(i32),

    /// The payload length exceeds the configured maximum.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    // ── Coordination ─────────────────────────────────────────────
    /// A frame or event channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// A connection-state transition was requested from the wrong phase.
    #[error("invalid state transition: {0}")]
    InvalidTransition(&'static str),

    /// Encoding a frame payload failed (producer side).
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl CastError {
    /// `true` when the link is gone and a full reconnect is the only
    /// recovery. Partial frame state cannot be resumed mid-stream.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Self::Disconnected | Self::Read(_) | Self::Write(_)
        )
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for CastError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        CastError::ChannelClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = CastError::FrameTooLarge {
            size: 1000,
            max: 500,
        };
        assert!(e.to_string().contains("1000"));
        assert!(e.to_string().contains("500"));

        let e = CastError::MalformedFrame(-4);
        assert!(e.to_string().contains("-4"));
    }

    #[test]
    fn disconnect_classification() {
        assert!(CastError::Disconnected.is_disconnect());

        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe broke");
        assert!(CastError::Write(io_err).is_disconnect());

        assert!(!CastError::MalformedFrame(-1).is_disconnect());
        assert!(!CastError::Timeout(Duration::from_secs(1)).is_disconnect());
    }

    #[test]
    fn from_send_error() {
        let (tx, rx) = tokio::sync::mpsc::channel::<u8>(1);
        drop(rx);
        let err = tx.try_send(1).map_err(|_| {
            CastError::from(tokio::sync::mpsc::error::SendError(1u8))
        });
        assert!(matches!(err, Err(CastError::ChannelClosed)));
    }
}
