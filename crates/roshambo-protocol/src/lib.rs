//! Wire protocol for Roshambo.
//!
//! This crate defines the "language" the server and its clients speak:
//!
//! - **Types** ([`RoomEvent`], [`RoomSnapshot`], [`Choice`], etc.):
//!   the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how events are turned
//!   into text frames.
//! - **Errors** ([`ProtocolError`]): malformed input and codec failures.
//!
//! # Architecture
//!
//! The protocol layer knows nothing about connections or locking. Rooms
//! produce snapshots, the handler wraps them in events, and the codec
//! turns events into text.
//!
//! ```text
//! Room (snapshot) → Protocol (RoomEvent) → Transport (text frame)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Choice, CloseStatus, PlayerId, PlayerSnapshot, RevealedChoice, RoomEvent, RoomId,
    RoomSnapshot, RoomState,
};
