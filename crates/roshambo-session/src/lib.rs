//! Player identity and session bookkeeping for Roshambo.
//!
//! This crate answers two questions for the connection handler:
//!
//! 1. **Who is this?** A reconnection token ([`Tokenizer`]) lets a player
//!    resume their seat after a dropped connection.
//! 2. **Where are they, and how do I reach them?** The [`Registry`]
//!    binds rooms, seats, tokens and live connections together.
//!
//! # How it fits in the stack
//!
//! ```text
//! Handler (above)  ← looks players up, fans events out
//!     ↕
//! Session Layer (this crate)  ← owns the directories
//!     ↕
//! Room Layer (below)  ← owns seats, choices and scores
//! ```

mod config;
mod error;
mod registry;
mod tokenizer;

pub use config::{RECONNECT_GRACE_ENV, SessionConfig, TOKEN_SECRET_ENV};
pub use error::SessionError;
pub use registry::{ConnectionHandle, Outbound, OutboundSender, Registry, SeatedPlayer};
pub use tokenizer::Tokenizer;
