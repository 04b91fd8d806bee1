//! Failure classification for connection attempts.

use crate::session::SessionState;
use thiserror::Error;

/// Default text shown when the server rejects an attempt without a reason.
pub const GENERIC_FAILURE_TEXT: &str = "Pending connection failed.";

/// Classified failure of a connection attempt.
///
/// Every fatal kind is recorded on the session and moves it to
/// [`SessionState::Failed`]; the `Display` text is exactly what the owning
/// application presents to the user. [`SessionError::ProtocolViolation`] is
/// the one non-fatal kind: it is logged and the offending message dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The transport could not be created, or the initial send failed.
    /// Fatal with no retry.
    #[error("Error initializing the network layer: {0}")]
    TransportCreate(String),

    /// The server runs an incompatible network version.
    #[error(
        "The match you are trying to join is running an incompatible version \
         of the game (local {local}, server {remote}). Please try upgrading \
         your game version."
    )]
    VersionMismatch { local: u32, remote: u32 },

    /// The server closed the attempt, e.g. the match is full or the login
    /// was rejected. Carries the server's reason verbatim.
    #[error("{0}")]
    ServerRejected(String),

    /// The transport closed without the server saying why.
    #[error("Your connection to the host has been lost.")]
    ConnectionLost,

    /// A message arrived that makes no sense in the current state. Logged
    /// and dropped; never stored on the session.
    #[error("unexpected {kind} message while {state}")]
    ProtocolViolation {
        state: SessionState,
        kind: &'static str,
    },
}

impl SessionError {
    /// Whether this kind terminates the attempt.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SessionError::ProtocolViolation { .. })
    }
}
