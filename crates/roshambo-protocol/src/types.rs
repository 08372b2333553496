//! Core protocol types for Roshambo's wire format.
//!
//! Everything in this module travels "on the wire": it is what the server
//! serializes into the text frames a client receives, or what it parses
//! out of the frames a client sends.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a player.
///
/// Newtype over a random (v4) UUID. Assigned when the player is first
/// minted and never changes, even across reconnections.
///
/// `#[serde(transparent)]` serializes it as the bare UUID string rather
/// than `{ "0": "…" }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Mints a fresh, random player id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The raw bytes of the id.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unique identifier for a room.
///
/// Same newtype pattern as [`PlayerId`]. Clients address a room by this id
/// in the connection path, so it also parses from a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub Uuid);

impl RoomId {
    /// Mints a fresh, random room id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RoomId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ProtocolError::InvalidRoomId(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Choice
// ---------------------------------------------------------------------------

/// A sealed hand a player submits once per round.
///
/// On the wire a choice is the bare lowercase literal (`"rock"`,
/// `"paper"`, `"scissors"`), both in the client's input frame and in the
/// revealed choices attached to outcome events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Rock,
    Paper,
    Scissors,
}

impl Choice {
    /// Every choice, in a fixed order.
    pub const ALL: [Choice; 3] = [Choice::Rock, Choice::Paper, Choice::Scissors];

    /// Returns `true` if `self` defeats `other`.
    ///
    /// Paper covers rock, rock blunts scissors, scissors cut paper.
    pub fn beats(self, other: Choice) -> bool {
        matches!(
            (self, other),
            (Choice::Paper, Choice::Rock)
                | (Choice::Rock, Choice::Scissors)
                | (Choice::Scissors, Choice::Paper)
        )
    }

    /// The wire literal for this choice.
    pub fn as_str(self) -> &'static str {
        match self {
            Choice::Rock => "rock",
            Choice::Paper => "paper",
            Choice::Scissors => "scissors",
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a client's input frame. Surrounding whitespace is ignored; the
/// literal itself is case-sensitive.
impl FromStr for Choice {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "rock" => Ok(Choice::Rock),
            "paper" => Ok(Choice::Paper),
            "scissors" => Ok(Choice::Scissors),
            other => Err(ProtocolError::UnknownChoice(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Room state and snapshots
// ---------------------------------------------------------------------------

/// The phase a room is in.
///
/// ```text
/// WaitingPlayers ──(full, round started)──→ WaitingChoices
///       ↑                                         │
///       └─────(round resolved / seat released)────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoomState {
    /// Seats are open, or the room is full but the next round has not
    /// been started yet.
    #[default]
    WaitingPlayers,
    /// A round is running; seated players submit their choices.
    WaitingChoices,
}

impl fmt::Display for RoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaitingPlayers => write!(f, "WaitingPlayers"),
            Self::WaitingChoices => write!(f, "WaitingChoices"),
        }
    }
}

/// What other players may see about one seated player.
///
/// The choice itself is deliberately absent: only whether one was made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub has_chosen: bool,
    pub score: u32,
}

/// A consistent, point-in-time view of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub name: String,
    pub state: RoomState,
    pub required_players: usize,
    /// Seated players in join order.
    pub players: Vec<PlayerSnapshot>,
}

impl RoomSnapshot {
    /// Every seat is taken.
    pub fn is_full(&self) -> bool {
        self.players.len() == self.required_players
    }

    /// Looks up a seated player.
    pub fn player(&self, id: PlayerId) -> Option<&PlayerSnapshot> {
        self.players.iter().find(|p| p.id == id)
    }
}

/// One player's choice, revealed after the round resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedChoice {
    pub player_id: PlayerId,
    pub choice: Choice,
}

// ---------------------------------------------------------------------------
// RoomEvent: everything the server sends to a client
// ---------------------------------------------------------------------------

/// A message from the server to one connection.
///
/// `#[serde(tag = "event")]` produces internally tagged JSON:
///
/// ```json
/// { "event": "ConnectedToRoom", "room": { … }, "hash": "9f2c…" }
/// ```
///
/// Every variant carries the full room snapshot as of the moment the
/// event was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum RoomEvent {
    /// Sent only to the connecting client, on every join and every
    /// resume. `hash` is the player's reconnection token; other players
    /// never see it.
    ConnectedToRoom { room: RoomSnapshot, hash: String },

    /// Another player took a seat (or resumed one).
    NewPlayerConnected { room: RoomSnapshot },

    /// The room is full and a round has started: submit a choice.
    GameCanBeStart { room: RoomSnapshot },

    /// You were in the winner set, and not everyone was.
    Win {
        room: RoomSnapshot,
        choices: Vec<RevealedChoice>,
    },

    /// You were not in the winner set.
    Lose {
        room: RoomSnapshot,
        choices: Vec<RevealedChoice>,
    },

    /// Every player was in the winner set.
    Draw {
        room: RoomSnapshot,
        choices: Vec<RevealedChoice>,
    },

    /// Your last input was rejected; nothing changed.
    InvalidChoice { room: RoomSnapshot, reason: String },

    /// A player's seat was released and the room is waiting for players.
    PlayerDisconnected { room: RoomSnapshot },
}

impl RoomEvent {
    /// The event kind as it appears in the `"event"` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectedToRoom { .. } => "ConnectedToRoom",
            Self::NewPlayerConnected { .. } => "NewPlayerConnected",
            Self::GameCanBeStart { .. } => "GameCanBeStart",
            Self::Win { .. } => "Win",
            Self::Lose { .. } => "Lose",
            Self::Draw { .. } => "Draw",
            Self::InvalidChoice { .. } => "InvalidChoice",
            Self::PlayerDisconnected { .. } => "PlayerDisconnected",
        }
    }

    /// The room snapshot every event carries.
    pub fn room(&self) -> &RoomSnapshot {
        match self {
            Self::ConnectedToRoom { room, .. }
            | Self::NewPlayerConnected { room }
            | Self::GameCanBeStart { room }
            | Self::Win { room, .. }
            | Self::Lose { room, .. }
            | Self::Draw { room, .. }
            | Self::InvalidChoice { room, .. }
            | Self::PlayerDisconnected { room } => room,
        }
    }

    /// `true` for `Win`, `Lose` and `Draw`.
    pub fn is_outcome(&self) -> bool {
        matches!(self, Self::Win { .. } | Self::Lose { .. } | Self::Draw { .. })
    }
}

// ---------------------------------------------------------------------------
// Close statuses
// ---------------------------------------------------------------------------

/// A close code and reason the server ends a connection with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseStatus {
    pub code: u16,
    pub reason: &'static str,
}

impl CloseStatus {
    /// The room id in the path does not name a room.
    pub const ROOM_NOT_FOUND: Self = Self {
        code: 1003,
        reason: "room not found",
    };

    /// The room is full or a round is already running.
    pub const ROOM_UNAVAILABLE: Self = Self {
        code: 1008,
        reason: "room is not accepting players",
    };

    /// The display name is missing, empty, or too long.
    pub const INVALID_NAME: Self = Self {
        code: 1007,
        reason: "invalid player name",
    };

    /// The server ended the session while cleaning up after the client.
    pub const SESSION_ENDED: Self = Self {
        code: 1008,
        reason: "session ended",
    };

    /// The same player resumed its seat from another connection.
    pub const SUPERSEDED: Self = Self {
        code: 1000,
        reason: "superseded by a newer connection",
    };
}

impl fmt::Display for CloseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.reason)
    }
}

// =========================================================================
// Tests
// =========================================================================
