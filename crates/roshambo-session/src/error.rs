//! Error types for the session layer.

use roshambo_protocol::{PlayerId, RoomId};
use roshambo_room::RoomError;

/// Errors that can occur in the session registry.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No room exists with this id.
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// The room refused the operation (full, wrong phase, bad name...).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The token secret cannot key the digest.
    #[error("invalid token secret")]
    InvalidSecret,

    /// The player has no seat registered here.
    /// This happens when attaching a connection to a player whose seat
    /// was already released.
    #[error("player {0} is not bound to a room")]
    NotBound(PlayerId),
}
