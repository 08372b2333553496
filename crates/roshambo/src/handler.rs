//! Per-connection handler: join, play rounds, clean up.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Resolve the room from the request path
//!   2. Resume the player from `player_hash`, or seat a new one under `name`
//!   3. Queue `ConnectedToRoom` (with the token) for this connection and
//!      `NewPlayerConnected` for everyone else
//!   4. Loop: react to client input, queued events and room changes
//!   5. Clean up once, however the loop ended
//!
//! # Ordering
//!
//! Every room transition that other players must hear about (seating,
//! starting a round, resolving it, releasing a seat) is performed while
//! holding that room's transition lock, and its events are queued before
//! the lock is released. Each client therefore sees events in the order
//! the room went through them: a round's outcomes always arrive before the
//! next `GameCanBeStart`. Other rooms never wait on this lock.

use std::ops::ControlFlow;
use std::sync::Arc;

use roshambo_protocol::{
    Choice, CloseStatus, Codec, PlayerId, RoomEvent, RoomId, RoomSnapshot, RoomState,
};
use roshambo_room::{Outcome, Player, RoomError, RoomHandle, RoundResult, Submission};
use roshambo_session::{ConnectionHandle, Outbound, Registry, SessionError};
use roshambo_transport::{Connection, ConnectRequest, ConnectionId, WebSocketConnection};
use tokio::sync::{mpsc, watch};

use crate::RoshamboError;
use crate::server::ServerState;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), RoshamboError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, path = conn.request().path(), "handling new connection");

    // --- Step 1: Room ---
    let room = match room_id_from_request(conn.request()) {
        Some(room_id) => state.registry.find_room(room_id).await,
        None => None,
    };
    let Some(room) = room else {
        tracing::info!(%conn_id, path = conn.request().path(), "room not found");
        reject(&conn, CloseStatus::ROOM_NOT_FOUND).await;
        return Ok(());
    };

    // --- Steps 2-3: Player ---
    let watch = room.subscribe();
    let (tx, outbound) = mpsc::unbounded_channel();
    let handle = ConnectionHandle::new(conn_id, tx);

    let player_id = match join(&state, &room, conn.request(), handle).await {
        Ok(player_id) => player_id,
        Err(status) => {
            reject(&conn, status).await;
            return Ok(());
        }
    };

    let mut session = Session {
        conn,
        state,
        room,
        player_id,
        watch,
        outbound,
    };

    // --- Step 4: Rounds ---
    let result = session.run().await;

    // --- Step 5: Cleanup ---
    let exit = match &result {
        Ok(exit) => *exit,
        Err(_) => Exit::Disconnected,
    };
    session.cleanup(exit).await;

    result.map(|_| ())
}

/// Extracts the room id from `/start/{room_id}`.
fn room_id_from_request(request: &ConnectRequest) -> Option<RoomId> {
    let mut segments = request.segments();
    match (segments.next(), segments.next(), segments.next()) {
        (Some("start"), Some(id), None) => id.parse().ok(),
        _ => None,
    }
}

/// Closes a connection that never got a seat.
async fn reject(conn: &WebSocketConnection, status: CloseStatus) {
    tracing::debug!(conn_id = %conn.id(), %status, "rejecting connection");
    if let Err(e) = conn.close(status.code, status.reason).await {
        tracing::debug!(conn_id = %conn.id(), error = %e, "close failed");
    }
}

/// Resumes or seats the player, then queues the join events.
///
/// Returns the close status to reject the connection with if the player
/// cannot be seated.
async fn join<C: Codec>(
    state: &ServerState<C>,
    room: &RoomHandle,
    request: &ConnectRequest,
    handle: ConnectionHandle,
) -> Result<PlayerId, CloseStatus> {
    let room_id = room.room_id();
    let conn_id = handle.id();
    let registry = &state.registry;
    let _turn = room.begin_transition().await;

    let resumed = match request.param("player_hash").filter(|token| !token.is_empty()) {
        Some(token) => registry
            .find_player_by_token(token)
            .await
            .filter(|seat| seat.room_id == room_id)
            .map(|seat| (token, seat)),
        None => None,
    };

    let (player_id, token, snapshot) = match resumed {
        Some((token, seat)) => {
            let replaced = registry
                .attach(seat.player_id, handle.clone())
                .await
                .map_err(|_| CloseStatus::SESSION_ENDED)?;
            if let Some(old) = replaced {
                tracing::info!(
                    %room_id,
                    player_id = %seat.player_id,
                    old_conn = %old.id(),
                    %conn_id,
                    "connection superseded"
                );
                old.close(CloseStatus::SUPERSEDED);
            }
            tracing::info!(%room_id, player_id = %seat.player_id, %conn_id, "player resumed");
            (seat.player_id, token.to_string(), room.snapshot())
        }
        None => {
            let name = request.param("name").unwrap_or_default();
            let player = Player::new(name).map_err(|_| CloseStatus::INVALID_NAME)?;
            let player_id = player.id();
            let (token, snapshot) = registry
                .bind(player, room_id, handle.clone())
                .await
                .map_err(|e| rejection_status(&e))?;
            tracing::info!(%room_id, %player_id, %conn_id, player_name = name, "player seated");
            (player_id, token, snapshot)
        }
    };

    handle.send_event(RoomEvent::ConnectedToRoom {
        room: snapshot.clone(),
        hash: token,
    });
    registry
        .broadcast(
            &snapshot,
            Some(player_id),
            &RoomEvent::NewPlayerConnected {
                room: snapshot.clone(),
            },
        )
        .await;
    // A resumed player may have missed the start of the running round.
    if snapshot.state == RoomState::WaitingChoices {
        handle.send_event(RoomEvent::GameCanBeStart { room: snapshot });
    }

    Ok(player_id)
}

fn rejection_status(error: &SessionError) -> CloseStatus {
    match error {
        SessionError::RoomNotFound(_) => CloseStatus::ROOM_NOT_FOUND,
        SessionError::Room(RoomError::InvalidName(_)) => CloseStatus::INVALID_NAME,
        _ => CloseStatus::ROOM_UNAVAILABLE,
    }
}

// ---------------------------------------------------------------------------
// Session loop
// ---------------------------------------------------------------------------

/// Why the session loop stopped.
#[derive(Debug, Clone, Copy)]
enum Exit {
    /// The client went away, or the socket failed.
    Disconnected,
    /// The server asked this connection to close with a status.
    Closed(CloseStatus),
}

/// One seated player's live connection.
struct Session<C: Codec> {
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
    room: RoomHandle,
    player_id: PlayerId,
    watch: watch::Receiver<RoomSnapshot>,
    outbound: mpsc::UnboundedReceiver<Outbound>,
}

impl<C: Codec> Session<C> {
    fn conn_id(&self) -> ConnectionId {
        self.conn.id()
    }

    fn room_id(&self) -> RoomId {
        self.room.room_id()
    }

    /// Runs until the connection ends.
    ///
    /// Waiting for players and waiting for choices are both just waiting
    /// for the room to change: nothing is held while suspended here.
    async fn run(&mut self) -> Result<Exit, RoshamboError> {
        // The room may have filled up before we subscribed.
        self.room_changed().await?;

        loop {
            let step = tokio::select! {
                input = self.conn.recv() => match input {
                    Ok(Some(text)) => self.client_input(&text).await?,
                    Ok(None) => ControlFlow::Break(Exit::Disconnected),
                    Err(e) => {
                        tracing::debug!(conn_id = %self.conn_id(), error = %e, "recv error");
                        ControlFlow::Break(Exit::Disconnected)
                    }
                },
                outbound = self.outbound.recv() => match outbound {
                    Some(Outbound::Event(event)) => self.forward(&event).await?,
                    Some(Outbound::Close(status)) => ControlFlow::Break(Exit::Closed(status)),
                    // The registry dropped this connection.
                    None => ControlFlow::Break(Exit::Closed(CloseStatus::SESSION_ENDED)),
                },
                changed = self.watch.changed() => match changed {
                    Ok(()) => {
                        self.room_changed().await?;
                        ControlFlow::Continue(())
                    }
                    Err(_) => return Err(RoomError::Unavailable(self.room_id()).into()),
                },
            };

            if let ControlFlow::Break(exit) = step {
                return Ok(exit);
            }
        }
    }

    /// Starts the next round once every seat is taken.
    async fn room_changed(&mut self) -> Result<(), RoshamboError> {
        let ready = {
            let room = self.watch.borrow_and_update();
            room.is_full() && room.state == RoomState::WaitingPlayers
        };
        if !ready {
            return Ok(());
        }

        let _turn = self.room.begin_transition().await;
        match self.room.start_round().await {
            Ok(Some(snapshot)) => {
                tracing::info!(
                    room_id = %self.room_id(),
                    player_id = %self.player_id,
                    "round started"
                );
                let event = RoomEvent::GameCanBeStart {
                    room: snapshot.clone(),
                };
                self.state.registry.broadcast(&snapshot, None, &event).await;
            }
            // Someone else started it, or a seat emptied in the meantime.
            Ok(None) | Err(RoomError::NotEnoughPlayers(_)) => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// A frame from the client: a choice, or something to reject.
    async fn client_input(&mut self, text: &str) -> Result<ControlFlow<Exit>, RoshamboError> {
        let choice = match text.parse::<Choice>() {
            Ok(choice) => choice,
            Err(e) => {
                tracing::warn!(
                    room_id = %self.room_id(),
                    player_id = %self.player_id,
                    input = %text.trim(),
                    "invalid choice"
                );
                return self.invalid_choice(e.to_string()).await;
            }
        };

        let turn = self.room.begin_transition().await;
        match self.room.choose(self.player_id, choice).await {
            Ok(Submission::Pending(_)) => {}
            Ok(Submission::Resolved(result)) => fan_out(&self.state.registry, &result).await,
            Err(RoomError::RoundNotStarted(_)) => {
                drop(turn);
                return self.invalid_choice("round has not started".into()).await;
            }
            Err(RoomError::ChoiceAlreadySubmitted(_)) => {
                drop(turn);
                return self.invalid_choice("choice already submitted".into()).await;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Tells this client its input was rejected. Nothing else changes.
    async fn invalid_choice(&self, reason: String) -> Result<ControlFlow<Exit>, RoshamboError> {
        let event = RoomEvent::InvalidChoice {
            room: self.room.snapshot(),
            reason,
        };
        self.forward(&event).await
    }

    /// Writes one event to the socket.
    async fn forward(&self, event: &RoomEvent) -> Result<ControlFlow<Exit>, RoshamboError> {
        let text = self.state.codec.encode(event)?;
        match self.conn.send(&text).await {
            Ok(()) => {
                tracing::debug!(conn_id = %self.conn_id(), event = event.kind(), "event sent");
                Ok(ControlFlow::Continue(()))
            }
            Err(e) => {
                tracing::debug!(conn_id = %self.conn_id(), error = %e, "send failed");
                Ok(ControlFlow::Break(Exit::Disconnected))
            }
        }
    }

    /// Runs exactly once, after the loop, whichever way it ended.
    async fn cleanup(self, exit: Exit) {
        let status = match exit {
            Exit::Closed(status) => status,
            Exit::Disconnected => CloseStatus::SESSION_ENDED,
        };
        if self.conn.is_open() {
            if let Err(e) = self.conn.close(status.code, status.reason).await {
                tracing::debug!(conn_id = %self.conn_id(), error = %e, "close failed");
            }
        }

        let registry = &self.state.registry;
        let _turn = self.room.begin_transition().await;
        // A newer connection owns the seat now.
        if !registry.detach(self.player_id, self.conn_id()).await {
            tracing::debug!(player_id = %self.player_id, "seat kept by newer connection");
            return;
        }

        let grace = self.state.session.reconnect_grace;
        let room = self.room.snapshot();
        if !grace.is_zero() && room.is_full() && room.state == RoomState::WaitingChoices {
            tracing::info!(
                room_id = %self.room_id(),
                player_id = %self.player_id,
                grace_secs = grace.as_secs_f64(),
                "player dropped mid-round, holding seat"
            );
            let state = Arc::clone(&self.state);
            let room = self.room.clone();
            let player_id = self.player_id;
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                let registry = &state.registry;
                let _turn = room.begin_transition().await;
                if registry.is_bound(player_id).await
                    && registry.connection_for(player_id).await.is_none()
                {
                    let room_id = room.room_id();
                    tracing::info!(%room_id, %player_id, "reconnect grace expired");
                    release_seat(registry, player_id, room_id).await;
                }
            });
            return;
        }

        release_seat(registry, self.player_id, self.room_id()).await;
    }
}

/// Sends every seated player their own outcome for a resolved round.
///
/// Call with the room's transition lock held.
async fn fan_out(registry: &Registry, result: &RoundResult) {
    for (player_id, outcome) in &result.outcomes {
        let room = result.room.clone();
        let choices = result.revealed.clone();
        let event = match outcome {
            Outcome::Win => RoomEvent::Win { room, choices },
            Outcome::Lose => RoomEvent::Lose { room, choices },
            Outcome::Draw => RoomEvent::Draw { room, choices },
        };
        registry.send_to(*player_id, event).await;
    }
    if result.next_state == RoomState::WaitingChoices {
        let event = RoomEvent::GameCanBeStart {
            room: result.room.clone(),
        };
        registry.broadcast(&result.room, None, &event).await;
    }
}

/// Gives up a seat and tells whoever is left.
///
/// Call with the room's transition lock held.
async fn release_seat(registry: &Registry, player_id: PlayerId, room_id: RoomId) {
    match registry.unbind(player_id, room_id).await {
        Ok(snapshot) => {
            tracing::info!(%room_id, %player_id, "seat released");
            let event = RoomEvent::PlayerDisconnected {
                room: snapshot.clone(),
            };
            registry.broadcast(&snapshot, None, &event).await;
        }
        Err(e) => {
            tracing::warn!(%room_id, %player_id, error = %e, "failed to release seat");
        }
    }
}
