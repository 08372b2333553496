//! Reconnection tokens.
//!
//! A token is `HMAC-SHA256(secret, player_id)`, hex-encoded. It is:
//!
//! - **deterministic**: the same player and secret always give the same
//!   token, so the server never has to remember which token it issued;
//! - **one-way**: the token reveals neither the secret nor anything a
//!   client could have chosen (the display name plays no part);
//! - **unguessable**: forging one requires the secret.

use hmac::{Hmac, Mac};
use roshambo_protocol::PlayerId;
use sha2::Sha256;

use crate::SessionError;

type HmacSha256 = Hmac<Sha256>;

/// Issues reconnection tokens keyed by the server-held secret.
///
/// The keyed MAC state is computed once here and cloned per token.
#[derive(Clone)]
pub struct Tokenizer {
    mac: HmacSha256,
}

impl Tokenizer {
    /// # Errors
    /// `SessionError::InvalidSecret` if the secret is empty.
    pub fn new(secret: &[u8]) -> Result<Self, SessionError> {
        if secret.is_empty() {
            return Err(SessionError::InvalidSecret);
        }
        let mac = HmacSha256::new_from_slice(secret).map_err(|_| SessionError::InvalidSecret)?;
        Ok(Self { mac })
    }

    /// The token for `player_id`: 64 lowercase hex characters.
    pub fn issue(&self, player_id: PlayerId) -> String {
        let mut mac = self.mac.clone();
        mac.update(player_id.as_bytes());
        mac.finalize()
            .into_bytes()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}
