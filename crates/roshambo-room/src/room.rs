//! The room state machine.
//!
//! [`Room`] is plain data plus the rules for mutating it. It does no I/O
//! and knows nothing about locks: the actor in `actor.rs` owns exactly one
//! `Room` and is the only thing that ever touches it, which is what
//! serializes concurrent players.
//!
//! ```text
//!                 start_round (full)
//! WaitingPlayers ------------------> WaitingChoices
//!       ^                                  |
//!       |  resolve_round / abort_round     |
//!       +----------------------------------+
//! ```

use roshambo_protocol::{
    Choice, PlayerId, PlayerSnapshot, RevealedChoice, RoomId, RoomSnapshot, RoomState,
};

use crate::RoomError;
use crate::outcome::{self, Outcome};

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A seated participant.
#[derive(Debug, Clone)]
pub struct Player {
    id: PlayerId,
    name: String,
    choice: Option<Choice>,
    score: u32,
}

impl Player {
    /// Longest display name accepted, in characters.
    pub const MAX_NAME_LEN: usize = 20;

    /// Mints a new player with a fresh id.
    ///
    /// # Errors
    /// `RoomError::InvalidName` if the name is blank or longer than
    /// [`MAX_NAME_LEN`](Self::MAX_NAME_LEN) characters.
    pub fn new(name: impl Into<String>) -> Result<Self, RoomError> {
        let name = name.into();
        if name.trim().is_empty() || name.chars().count() > Self::MAX_NAME_LEN {
            return Err(RoomError::InvalidName(name));
        }
        Ok(Self {
            id: PlayerId::new(),
            name,
            choice: None,
            score: 0,
        })
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn choice(&self) -> Option<Choice> {
        self.choice
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            name: self.name.clone(),
            has_chosen: self.choice.is_some(),
            score: self.score,
        }
    }
}

// ---------------------------------------------------------------------------
// RoundResult
// ---------------------------------------------------------------------------

/// Everything a resolved round produced.
#[derive(Debug, Clone)]
pub struct RoundResult {
    /// One outcome per seated player, in seat order.
    pub outcomes: Vec<(PlayerId, Outcome)>,
    /// The choices that were made, in seat order.
    pub revealed: Vec<RevealedChoice>,
    /// The state the room moved to.
    pub next_state: RoomState,
    /// The room after scores were applied and choices cleared.
    pub room: RoomSnapshot,
}

impl RoundResult {
    /// The outcome for one player, if they were seated.
    pub fn outcome_for(&self, player_id: PlayerId) -> Option<Outcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| *id == player_id)
            .map(|(_, outcome)| *outcome)
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// One game: a fixed number of seats and the current round.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    name: String,
    state: RoomState,
    required_players: usize,
    /// Seat order is join order.
    players: Vec<Player>,
    consecutive_rounds: bool,
}

impl Room {
    /// Creates an empty room in `WaitingPlayers`.
    ///
    /// # Errors
    /// `RoomError::InvalidConfig` if `required_players` is zero.
    pub fn new(
        name: impl Into<String>,
        required_players: usize,
        consecutive_rounds: bool,
    ) -> Result<Self, RoomError> {
        if required_players == 0 {
            return Err(RoomError::InvalidConfig(
                "required_players must be at least 1".into(),
            ));
        }
        Ok(Self {
            id: RoomId::new(),
            name: name.into(),
            state: RoomState::WaitingPlayers,
            required_players,
            players: Vec::with_capacity(required_players),
            consecutive_rounds,
        })
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn required_players(&self) -> usize {
        self.required_players
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Seats a player at the end of the table.
    ///
    /// # Errors
    /// - `InvalidState` if a round is running
    /// - `AlreadyInRoom` if the player is already seated
    /// - `RoomFull` if every seat is taken
    pub fn add_player(&mut self, player: Player) -> Result<(), RoomError> {
        if self.state != RoomState::WaitingPlayers {
            return Err(RoomError::InvalidState(format!(
                "cannot join room in state {}",
                self.state
            )));
        }
        if self.player(player.id).is_some() {
            return Err(RoomError::AlreadyInRoom(player.id, self.id));
        }
        if self.players.len() >= self.required_players {
            return Err(RoomError::RoomFull(self.id));
        }
        self.players.push(player);
        Ok(())
    }

    /// Every seat is taken.
    pub fn can_start(&self) -> bool {
        self.players.len() == self.required_players
    }

    /// Moves a full room into `WaitingChoices`.
    ///
    /// Returns `false` when the round was already started by someone else.
    ///
    /// # Errors
    /// `NotEnoughPlayers` if a seat is still empty.
    pub fn start_round(&mut self) -> Result<bool, RoomError> {
        if self.state == RoomState::WaitingChoices {
            return Ok(false);
        }
        if !self.can_start() {
            return Err(RoomError::NotEnoughPlayers(self.id));
        }
        self.reset();
        self.state = RoomState::WaitingChoices;
        Ok(true)
    }

    /// Every seated player has a choice locked in.
    pub fn all_choices_submitted(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| p.choice.is_some())
    }

    /// Records a player's choice for the running round.
    ///
    /// # Errors
    /// - `RoundNotStarted` outside `WaitingChoices`
    /// - `NotInRoom` if the player is not seated here
    /// - `ChoiceAlreadySubmitted` on a second choice in the same round
    pub fn submit_choice(&mut self, player_id: PlayerId, choice: Choice) -> Result<(), RoomError> {
        if self.state != RoomState::WaitingChoices {
            return Err(RoomError::RoundNotStarted(self.id));
        }
        let room_id = self.id;
        let player = self
            .players
            .iter_mut()
            .find(|p| p.id == player_id)
            .ok_or(RoomError::NotInRoom(player_id, room_id))?;
        if player.choice.is_some() {
            return Err(RoomError::ChoiceAlreadySubmitted(player_id));
        }
        player.choice = Some(choice);
        Ok(())
    }

    /// Scores the round, clears every choice and moves to the next state.
    ///
    /// Winners gain one point unless everyone won.
    ///
    /// # Errors
    /// - `RoundNotStarted` outside `WaitingChoices`
    /// - `ChoicesPending` while a seated player has not chosen
    pub fn resolve_round(&mut self) -> Result<RoundResult, RoomError> {
        if self.state != RoomState::WaitingChoices {
            return Err(RoomError::RoundNotStarted(self.id));
        }
        let mut revealed = Vec::with_capacity(self.players.len());
        for player in &self.players {
            let choice = player.choice.ok_or(RoomError::ChoicesPending(self.id))?;
            revealed.push(RevealedChoice {
                player_id: player.id,
                choice,
            });
        }

        let choices: Vec<Choice> = revealed.iter().map(|r| r.choice).collect();
        let winners = outcome::winners(&choices);
        let full_draw = winners.len() == self.players.len();

        let outcomes = self
            .players
            .iter_mut()
            .enumerate()
            .map(|(seat, player)| {
                let is_winner = winners.contains(&seat);
                if is_winner && !full_draw {
                    player.score += 1;
                }
                (
                    player.id,
                    Outcome::classify(is_winner, winners.len(), choices.len()),
                )
            })
            .collect();

        self.reset();
        self.state = if self.consecutive_rounds {
            RoomState::WaitingChoices
        } else {
            RoomState::WaitingPlayers
        };

        Ok(RoundResult {
            outcomes,
            revealed,
            next_state: self.state,
            room: self.snapshot(),
        })
    }

    /// Unseats a player. Only allowed while no round is running.
    ///
    /// # Errors
    /// - `InvalidState` in `WaitingChoices`
    /// - `NotInRoom` if the player is not seated here
    pub fn remove_player(&mut self, player_id: PlayerId) -> Result<Player, RoomError> {
        if self.state != RoomState::WaitingPlayers {
            return Err(RoomError::InvalidState(format!(
                "cannot remove a player in state {}",
                self.state
            )));
        }
        let seat = self
            .players
            .iter()
            .position(|p| p.id == player_id)
            .ok_or(RoomError::NotInRoom(player_id, self.id))?;
        let player = self.players.remove(seat);
        self.state = RoomState::WaitingPlayers;
        Ok(player)
    }

    /// Abandons the running round: choices are cleared and the room goes
    /// back to `WaitingPlayers`. Returns `false` if no round was running.
    pub fn abort_round(&mut self) -> bool {
        if self.state != RoomState::WaitingChoices {
            return false;
        }
        self.reset();
        self.state = RoomState::WaitingPlayers;
        true
    }

    /// Clears every player's choice. Scores and seats are untouched.
    pub fn reset(&mut self) {
        for player in &mut self.players {
            player.choice = None;
        }
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            id: self.id,
            name: self.name.clone(),
            state: self.state,
            required_players: self.required_players,
            players: self.players.iter().map(Player::snapshot).collect(),
        }
    }
}
