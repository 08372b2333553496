//! # Roshambo
//!
//! Multiplayer rock-paper-scissors rooms over WebSockets.
//!
//! Clients connect to `/start/{room_id}?name=...` and are seated in the
//! room. Once every seat is taken a round starts; each player sends
//! `rock`, `paper` or `scissors`, and when the last choice is in every
//! player is told whether they won, lost or drew. A player who drops can
//! come back with the token they were given on join (`player_hash=...`).
//!
//! Rooms are created through [`ServerHandle::create_room`], or at runtime
//! over HTTP with the router in [`http`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roshambo::prelude::*;
//!
//! # async fn run() -> Result<(), RoshamboError> {
//! let server = RoshamboServer::builder().bind("127.0.0.1:7000").build().await?;
//! let lobby = server.handle().create_room("lobby", 3).await?;
//! println!("ws://127.0.0.1:7000/start/{}?name=you", lobby.id);
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
pub mod http;
mod server;

pub use error::RoshamboError;
pub use server::{RoshamboServer, RoshamboServerBuilder, ServerHandle};

/// Everything needed to run a server and talk about its rooms.
pub mod prelude {
    pub use crate::{RoshamboError, RoshamboServer, RoshamboServerBuilder, ServerHandle};
    pub use roshambo_protocol::{
        Choice, CloseStatus, PlayerId, PlayerSnapshot, RevealedChoice, RoomEvent, RoomId,
        RoomSnapshot, RoomState,
    };
    pub use roshambo_room::RoomConfig;
    pub use roshambo_session::{SeatedPlayer, SessionConfig};
}
