//! Room actor: an isolated Tokio task that owns one [`Room`].
//!
//! Each room runs in its own task, communicating with the outside world
//! through an mpsc channel. This is the "actor model": no shared
//! mutable state, just message passing. Every mutation of a room is a
//! command processed one at a time, so two players choosing in the same
//! instant are simply two commands in a queue.
//!
//! After every command that changes the room, the actor publishes a
//! fresh [`RoomSnapshot`] on a `watch` channel. Connection handlers wait
//! on that channel for "room is full" or "round resolved" instead of
//! polling, and never hold anything while they wait.
//!
//! Each handle also carries the room's transition lock. A caller that
//! changes the room and then tells the players about it holds the lock
//! across both, so events reach every client in the order the room went
//! through them. The lock belongs to one room only.

use std::sync::Arc;

use roshambo_protocol::{Choice, PlayerId, RoomId, RoomSnapshot};
use tokio::sync::{Mutex, OwnedMutexGuard, mpsc, oneshot, watch};

use crate::room::{Player, Room, RoundResult};
use crate::{RoomConfig, RoomError};

/// What happened to a submitted choice.
#[derive(Debug, Clone)]
pub enum Submission {
    /// Recorded; other players still have to choose.
    Pending(RoomSnapshot),
    /// This choice completed the round and the room resolved it. Exactly
    /// one submitter per round receives this.
    Resolved(RoundResult),
}

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

/// Held while one caller changes a room and queues the resulting events.
pub type TransitionGuard = OwnedMutexGuard<()>;

/// Commands sent to a room actor through its channel.
///
/// The `oneshot::Sender` in each variant is a "reply channel": the
/// caller sends a command and waits for the response on that channel.
enum RoomCommand {
    /// Seat a new player.
    Join {
        player: Player,
        reply: Reply<RoomSnapshot>,
    },

    /// Move a full room into `WaitingChoices`.
    StartRound {
        reply: Reply<Option<RoomSnapshot>>,
    },

    /// Record a choice and resolve the round if it was the last one.
    Choose {
        player_id: PlayerId,
        choice: Choice,
        reply: Reply<Submission>,
    },

    /// Abandon any running round and unseat the player.
    Release {
        player_id: PlayerId,
        reply: Reply<RoomSnapshot>,
    },
}

/// Handle to a running room actor. Used to send commands to it.
///
/// This is cheap to clone: an `mpsc::Sender`, a `watch::Receiver` and
/// the shared transition lock. The session registry holds one of these
/// per room.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
    watch: watch::Receiver<RoomSnapshot>,
    transitions: Arc<Mutex<()>>,
}

impl RoomHandle {
    /// Returns the room's unique ID.
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> RoomSnapshot {
        self.watch.borrow().clone()
    }

    /// A receiver that is notified after every mutation of the room.
    pub fn subscribe(&self) -> watch::Receiver<RoomSnapshot> {
        let mut rx = self.watch.clone();
        rx.mark_unchanged();
        rx
    }

    /// Waits for this room's transition lock.
    ///
    /// Only callers in the same room wait on each other.
    pub async fn begin_transition(&self) -> TransitionGuard {
        Arc::clone(&self.transitions).lock_owned().await
    }

    /// Seats a player.
    ///
    /// # Errors
    /// `RoomFull`, `AlreadyInRoom` or `InvalidState` from the room, or
    /// `Unavailable` if the actor is gone.
    pub async fn join(&self, player: Player) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Join { player, reply }).await
    }

    /// Starts a round in a full room.
    ///
    /// Returns the new snapshot if this call performed the transition,
    /// `None` if the round was already running.
    pub async fn start_round(&self) -> Result<Option<RoomSnapshot>, RoomError> {
        self.request(|reply| RoomCommand::StartRound { reply }).await
    }

    /// Submits a choice for the running round.
    pub async fn choose(
        &self,
        player_id: PlayerId,
        choice: Choice,
    ) -> Result<Submission, RoomError> {
        self.request(|reply| RoomCommand::Choose {
            player_id,
            choice,
            reply,
        })
        .await
    }

    /// Aborts the running round, if any, and unseats the player.
    pub async fn release(&self, player_id: PlayerId) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Release { player_id, reply })
            .await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    room: Room,
    publisher: watch::Sender<RoomSnapshot>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Processes commands until every handle is dropped.
    async fn run(mut self) {
        let room_id = self.room.id();
        tracing::info!(%room_id, room_name = self.room.name(), "room actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Join { player, reply } => {
                    let result = self.handle_join(player);
                    let _ = reply.send(result);
                }
                RoomCommand::StartRound { reply } => {
                    let result = self.handle_start_round();
                    let _ = reply.send(result);
                }
                RoomCommand::Choose {
                    player_id,
                    choice,
                    reply,
                } => {
                    let result = self.handle_choose(player_id, choice);
                    let _ = reply.send(result);
                }
                RoomCommand::Release { player_id, reply } => {
                    let result = self.handle_release(player_id);
                    let _ = reply.send(result);
                }
            }
        }

        tracing::info!(%room_id, "room actor stopped");
    }

    fn handle_join(&mut self, player: Player) -> Result<RoomSnapshot, RoomError> {
        let player_id = player.id();
        self.room.add_player(player)?;
        tracing::info!(
            room_id = %self.room.id(),
            %player_id,
            players = self.room.players().len(),
            required = self.room.required_players(),
            "player joined"
        );
        Ok(self.publish())
    }

    fn handle_start_round(&mut self) -> Result<Option<RoomSnapshot>, RoomError> {
        if !self.room.start_round()? {
            return Ok(None);
        }
        tracing::info!(room_id = %self.room.id(), "round started");
        Ok(Some(self.publish()))
    }

    fn handle_choose(
        &mut self,
        player_id: PlayerId,
        choice: Choice,
    ) -> Result<Submission, RoomError> {
        self.room.submit_choice(player_id, choice)?;
        tracing::debug!(room_id = %self.room.id(), %player_id, "choice submitted");

        if !self.room.all_choices_submitted() {
            return Ok(Submission::Pending(self.publish()));
        }

        let result = self.room.resolve_round()?;
        tracing::info!(
            room_id = %self.room.id(),
            next_state = %result.next_state,
            "round resolved"
        );
        self.publish();
        Ok(Submission::Resolved(result))
    }

    fn handle_release(&mut self, player_id: PlayerId) -> Result<RoomSnapshot, RoomError> {
        if self.room.player(player_id).is_none() {
            return Err(RoomError::NotInRoom(player_id, self.room.id()));
        }
        if self.room.abort_round() {
            tracing::info!(room_id = %self.room.id(), "round aborted");
        }
        self.room.remove_player(player_id)?;
        tracing::info!(
            room_id = %self.room.id(),
            %player_id,
            players = self.room.players().len(),
            "player left"
        );
        Ok(self.publish())
    }

    fn publish(&self) -> RoomSnapshot {
        let snapshot = self.room.snapshot();
        self.publisher.send_replace(snapshot.clone());
        snapshot
    }
}

/// Spawns a room actor task and returns a handle to communicate with it.
///
/// The channel is bounded by `config.command_buffer`; if it fills up,
/// senders wait.
pub fn spawn_room(room: Room, config: &RoomConfig) -> RoomHandle {
    let room_id = room.id();
    let (tx, rx) = mpsc::channel(config.command_buffer.max(1));
    let (publisher, watch) = watch::channel(room.snapshot());

    let actor = RoomActor {
        room,
        publisher,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
        watch,
        transitions: Arc::new(Mutex::new(())),
    }
}
