//! Error types for the room layer.

use roshambo_protocol::{PlayerId, RoomId};

/// Errors that can occur during room operations.
///
/// Most of these are contract violations by the caller: the state machine
/// refuses the operation and nothing is mutated.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Every seat is taken.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The player is already in this room.
    #[error("player {0} already in room {1}")]
    AlreadyInRoom(PlayerId, RoomId),

    /// The player is not in this room.
    #[error("player {0} not in room {1}")]
    NotInRoom(PlayerId, RoomId),

    /// The room is in a state that doesn't allow this operation.
    /// For example, trying to join a room whose round is running.
    #[error("invalid room state for this operation: {0}")]
    InvalidState(String),

    /// The room's command channel is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),

    /// Display names must be 1 to 20 characters.
    #[error("invalid player name {0:?}")]
    InvalidName(String),

    /// A room cannot be created with these settings.
    #[error("invalid room configuration: {0}")]
    InvalidConfig(String),

    /// A round can only start once every seat is taken.
    #[error("room {0} does not have enough players to start")]
    NotEnoughPlayers(RoomId),

    /// A choice arrived while no round is running.
    #[error("room {0} has no round in progress")]
    RoundNotStarted(RoomId),

    /// The player already locked in a choice this round.
    #[error("player {0} already submitted a choice")]
    ChoiceAlreadySubmitted(PlayerId),

    /// Resolution was attempted before every seated player chose.
    #[error("room {0} is still waiting for choices")]
    ChoicesPending(RoomId),
}
