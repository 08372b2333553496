//! The session registry: who sits where, and how to reach them.
//!
//! This is the single source of truth binding rooms, players, tokens and
//! live connections. It keeps three directories:
//!
//! ```text
//! rooms        RoomId   → RoomHandle          (every room, forever)
//! players      token    → SeatedPlayer        (every seat, until released)
//! connections  PlayerId → ConnectionHandle    (every live socket)
//! ```
//!
//! `bind` and `unbind` update all of them together, so a player is either
//! fully registered or not at all.
//!
//! # Concurrency note
//!
//! The directories are plain `HashMap`s behind two Tokio locks, one for
//! rooms and one for seats and connections. Those locks are only ever held
//! for a map lookup or insert, never across a call into a room actor, so
//! two rooms never contend on anything but a quick map operation.
//! Ordering within one room is the caller's business: see
//! [`RoomHandle::begin_transition`].

use std::collections::HashMap;

use roshambo_protocol::{CloseStatus, PlayerId, RoomEvent, RoomId, RoomSnapshot};
use roshambo_room::{Player, Room, RoomConfig, RoomHandle, spawn_room};
use roshambo_transport::ConnectionId;
use tokio::sync::{Mutex, RwLock, mpsc};

use crate::{SessionConfig, SessionError, Tokenizer};

// ---------------------------------------------------------------------------
// Connection handles
// ---------------------------------------------------------------------------

/// Something the server wants a connection to do.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Send this event as a text frame.
    Event(RoomEvent),
    /// Close the socket with this status and stop.
    Close(CloseStatus),
}

/// Channel sender for delivering outbound messages to one connection.
pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

/// How the registry reaches a live connection.
///
/// The handler task that owns the socket holds the receiving end and
/// forwards whatever arrives. Sending never blocks and never fails
/// loudly: if the connection is gone the message is dropped.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: OutboundSender,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, sender: OutboundSender) -> Self {
        Self { id, sender }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues an event. Returns `false` if the connection is gone.
    pub fn send_event(&self, event: RoomEvent) -> bool {
        self.sender.send(Outbound::Event(event)).is_ok()
    }

    /// Asks the connection to close itself.
    pub fn close(&self, status: CloseStatus) -> bool {
        self.sender.send(Outbound::Close(status)).is_ok()
    }
}

/// Where a token leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatedPlayer {
    pub player_id: PlayerId,
    pub room_id: RoomId,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Tokens and live connections. Always updated together.
#[derive(Default)]
struct Seats {
    players: HashMap<String, SeatedPlayer>,
    connections: HashMap<PlayerId, ConnectionHandle>,
}

/// Process-wide directory of rooms, seats and connections.
///
/// Shared by reference between connection tasks; every method takes
/// `&self`.
pub struct Registry {
    rooms: RwLock<HashMap<RoomId, RoomHandle>>,
    seats: Mutex<Seats>,
    tokenizer: Tokenizer,
    room_config: RoomConfig,
}

impl Registry {
    /// Creates an empty registry.
    ///
    /// # Errors
    /// `SessionError::InvalidSecret` if the configured secret is empty.
    pub fn new(session: &SessionConfig, room_config: RoomConfig) -> Result<Self, SessionError> {
        Ok(Self {
            rooms: RwLock::new(HashMap::new()),
            seats: Mutex::new(Seats::default()),
            tokenizer: Tokenizer::new(&session.token_secret)?,
            room_config,
        })
    }

    // -- Rooms -------------------------------------------------------------

    /// Creates a room and starts its actor. Rooms live for the lifetime
    /// of the process.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// `SessionError::Room(InvalidConfig)` if `required_players` is zero.
    pub async fn create_room(
        &self,
        name: impl Into<String>,
        required_players: usize,
    ) -> Result<RoomSnapshot, SessionError> {
        let room = Room::new(name, required_players, self.room_config.consecutive_rounds)?;
        let snapshot = room.snapshot();
        let handle = spawn_room(room, &self.room_config);
        self.rooms.write().await.insert(snapshot.id, handle);

        tracing::info!(
            room_id = %snapshot.id,
            room_name = %snapshot.name,
            required_players,
            "room created"
        );
        Ok(snapshot)
    }

    pub async fn find_room(&self, room_id: RoomId) -> Option<RoomHandle> {
        self.rooms.read().await.get(&room_id).cloned()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.read().await.keys().copied().collect()
    }

    // -- Players -----------------------------------------------------------

    /// Resolves a reconnection token to a seated player.
    ///
    /// `None` means the caller has to mint a new player.
    pub async fn find_player_by_token(&self, token: &str) -> Option<SeatedPlayer> {
        self.seats.lock().await.players.get(token).copied()
    }

    /// Seats a new player and registers their connection.
    ///
    /// Returns the player's reconnection token and the room as it looks
    /// with them seated. Nothing is recorded if the room refuses.
    ///
    /// # Errors
    /// - `RoomNotFound` if the room does not exist
    /// - `Room(RoomFull | InvalidState | AlreadyInRoom)` if the room
    ///   cannot seat the player
    pub async fn bind(
        &self,
        player: Player,
        room_id: RoomId,
        connection: ConnectionHandle,
    ) -> Result<(String, RoomSnapshot), SessionError> {
        let room = self
            .find_room(room_id)
            .await
            .ok_or(SessionError::RoomNotFound(room_id))?;
        let player_id = player.id();
        let snapshot = room.join(player).await?;

        let token = self.tokenizer.issue(player_id);
        let mut seats = self.seats.lock().await;
        seats
            .players
            .insert(token.clone(), SeatedPlayer { player_id, room_id });
        seats.connections.insert(player_id, connection);

        tracing::debug!(%room_id, %player_id, "player bound");
        Ok((token, snapshot))
    }

    /// Points a seated player at a new connection.
    ///
    /// Returns the connection it replaced, if any; the caller decides
    /// what to tell it.
    ///
    /// # Errors
    /// `NotBound` if the player has no seat.
    pub async fn attach(
        &self,
        player_id: PlayerId,
        connection: ConnectionHandle,
    ) -> Result<Option<ConnectionHandle>, SessionError> {
        let mut seats = self.seats.lock().await;
        if !seats.players.contains_key(&self.tokenizer.issue(player_id)) {
            return Err(SessionError::NotBound(player_id));
        }
        tracing::debug!(%player_id, conn_id = %connection.id(), "connection attached");
        Ok(seats.connections.insert(player_id, connection))
    }

    /// Forgets a player's connection, but only if it is still `conn_id`.
    ///
    /// Returns `false` when a newer connection has taken over (or there
    /// was none), in which case nothing changes.
    pub async fn detach(&self, player_id: PlayerId, conn_id: ConnectionId) -> bool {
        let mut seats = self.seats.lock().await;
        match seats.connections.get(&player_id) {
            Some(handle) if handle.id() == conn_id => {
                seats.connections.remove(&player_id);
                true
            }
            _ => false,
        }
    }

    /// Releases a player's seat and forgets their token and connection.
    ///
    /// Any running round in the room is abandoned first, so the room is
    /// back in `WaitingPlayers` afterwards.
    ///
    /// # Errors
    /// `RoomNotFound`, or `Room(NotInRoom)` if the seat is already gone.
    pub async fn unbind(
        &self,
        player_id: PlayerId,
        room_id: RoomId,
    ) -> Result<RoomSnapshot, SessionError> {
        let room = self
            .find_room(room_id)
            .await
            .ok_or(SessionError::RoomNotFound(room_id))?;
        let snapshot = room.release(player_id).await?;

        let mut seats = self.seats.lock().await;
        seats.players.remove(&self.tokenizer.issue(player_id));
        seats.connections.remove(&player_id);

        tracing::debug!(%room_id, %player_id, "player unbound");
        Ok(snapshot)
    }

    /// The player still holds a seat.
    pub async fn is_bound(&self, player_id: PlayerId) -> bool {
        let token = self.tokenizer.issue(player_id);
        self.seats.lock().await.players.contains_key(&token)
    }

    // -- Connections -------------------------------------------------------

    pub async fn connection_for(&self, player_id: PlayerId) -> Option<ConnectionHandle> {
        self.seats.lock().await.connections.get(&player_id).cloned()
    }

    /// Queues `event` for one player. Returns `false` if they have no
    /// live connection.
    pub async fn send_to(&self, player_id: PlayerId, event: RoomEvent) -> bool {
        match self.seats.lock().await.connections.get(&player_id) {
            Some(conn) => conn.send_event(event),
            None => false,
        }
    }

    /// Live connections of a room's seated players, in seat order.
    /// Seats without a connection are skipped.
    pub async fn connections_for_room(
        &self,
        room: &RoomSnapshot,
    ) -> Vec<(PlayerId, ConnectionHandle)> {
        let seats = self.seats.lock().await;
        room.players
            .iter()
            .filter_map(|p| seats.connections.get(&p.id).map(|c| (p.id, c.clone())))
            .collect()
    }

    /// Sends `event` to every live connection in the room except
    /// `except`'s. Returns how many were reached.
    pub async fn broadcast(
        &self,
        room: &RoomSnapshot,
        except: Option<PlayerId>,
        event: &RoomEvent,
    ) -> usize {
        self.connections_for_room(room)
            .await
            .into_iter()
            .filter(|(id, _)| Some(*id) != except)
            .filter(|(_, conn)| conn.send_event(event.clone()))
            .count()
    }
}

// =========================================================================
// Tests
// =========================================================================
