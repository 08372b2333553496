//! Rooms for Roshambo.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns the
//! room's seats, choices and scores.
//!
//! # Key types
//!
//! - [`Room`]: the state machine (seats, rounds, scoring)
//! - [`verdict`] / [`winners`]: the pure winner rule
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomConfig`]: settings shared by every room

mod actor;
mod config;
mod error;
mod outcome;
mod room;

pub use actor::{RoomHandle, Submission, TransitionGuard, spawn_room};
pub use config::RoomConfig;
pub use error::RoomError;
pub use outcome::{Outcome, Verdict, verdict, winners};
pub use room::{Player, Room, RoundResult};
