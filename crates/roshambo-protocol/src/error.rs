//! Error types for the protocol layer.

/// Errors that can occur in the protocol layer.
///
/// Encoding and decoding failures wrap the codec's own error; the other
/// variants are input a client sent that parses but means nothing.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into text).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning text into a Rust type).
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The input is not one of `rock`, `paper`, `scissors`.
    #[error("unknown choice {0:?}, expected rock, paper or scissors")]
    UnknownChoice(String),

    /// A room id that is not a UUID.
    #[error("invalid room id {0:?}")]
    InvalidRoomId(String),
}
