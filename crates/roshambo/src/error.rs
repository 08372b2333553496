//! Unified error type for Roshambo.

use roshambo_protocol::ProtocolError;
use roshambo_room::RoomError;
use roshambo_session::SessionError;
use roshambo_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `roshambo` crate, you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum RoshamboError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, malformed input).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (unknown room, bad secret, unbound player).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (full, wrong phase, actor gone).
    #[error(transparent)]
    Room(#[from] RoomError),
}
