//! Connection lifecycle state machine shared by both endpoints.
//!
//! Transitions are validated and return `Result` instead of panicking.
//!
//! ```text
//!  Disconnected ──► Connecting ──► Connected
//!       ▲               │              │
//!       └───────────────┴──────────────┘
//! ```
//!
//! There is no `Connected → Connecting` edge: a fresh attempt always
//! starts from `Disconnected` with a fresh connection object.

use std::time::Instant;

use crate::error::CastError;

/// The current phase of a framecast link.
///
/// On the accept side, `Connecting` means "listening for a peer".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    /// No active connection. Initial / terminal state.
    #[default]
    Disconnected,

    /// A connect or accept is in flight.
    Connecting,

    /// The link is up and carrying frames.
    Connected {
        /// When the link entered the `Connected` state.
        since: Instant,
    },
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected { .. } => write!(f, "Connected"),
        }
    }
}

impl ConnectionPhase {
    /// `true` when the link is established and carrying traffic.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// `true` when no connection exists or is being attempted.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// How long the link has been in the `Connected` state.
    ///
    /// Returns `None` for any other phase.
    pub fn connected_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Connected { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Connecting`.
    ///
    /// Valid from: `Disconnected`.
    pub fn begin_connect(&mut self) -> Result<(), CastError> {
        match self {
            Self::Disconnected => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(CastError::InvalidTransition(
                "cannot connect: not in Disconnected state",
            )),
        }
    }

    /// Transition to `Connected`.
    ///
    /// Valid from: `Connecting`.
    pub fn established(&mut self) -> Result<(), CastError> {
        match self {
            Self::Connecting => {
                *self = Self::Connected {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(CastError::InvalidTransition(
                "cannot establish: not in Connecting state",
            )),
        }
    }

    /// Transition back to `Disconnected` after a failed attempt.
    ///
    /// Valid from: `Connecting`.
    pub fn attempt_failed(&mut self) -> Result<(), CastError> {
        match self {
            Self::Connecting => {
                *self = Self::Disconnected;
                Ok(())
            }
            _ => Err(CastError::InvalidTransition(
                "cannot fail attempt: not in Connecting state",
            )),
        }
    }

    /// Transition to `Disconnected` after a read/write error or a
    /// zero-length read on an established link.
    ///
    /// Valid from: `Connected`.
    pub fn connection_lost(&mut self) -> Result<(), CastError> {
        match self {
            Self::Connected { .. } => {
                *self = Self::Disconnected;
                Ok(())
            }
            _ => Err(CastError::InvalidTransition(
                "cannot lose connection: not in Connected state",
            )),
        }
    }

    /// Force-reset to `Disconnected` regardless of current state.
    pub fn force_disconnect(&mut self) {
        *self = Self::Disconnected;
    }
}

// ── Tests ────────────────────────────────────────────────────────
