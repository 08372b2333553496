//! Codec trait and implementations for serializing/deserializing messages.
//!
//! The server speaks text frames, so a codec here converts between Rust
//! types and `String`s. Only [`JsonCodec`] exists today; the handler is
//! written against the [`Codec`] trait so a different text format could
//! be swapped in without touching it.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to text and decode text back.
///
/// `Send + Sync + 'static` because the codec lives in shared server state
/// that every connection task reads from.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a text frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes a text frame back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the text is malformed or does
    /// not match the expected type.
    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use roshambo_protocol::{Codec, JsonCodec, Choice};
///
/// let codec = JsonCodec;
/// let text = codec.encode(&Choice::Rock).unwrap();
/// assert_eq!(text, "\"rock\"");
///
/// let decoded: Choice = codec.decode(&text).unwrap();
/// assert_eq!(decoded, Choice::Rock);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}
