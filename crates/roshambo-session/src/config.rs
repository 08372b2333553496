//! Session configuration.
//!
//! Controls how reconnection tokens are derived and how long a dropped
//! player keeps their seat. Sensible defaults are provided; the bootstrap
//! binary reads overrides from the environment.

use std::fmt;
use std::time::Duration;

use rand::Rng;

/// Environment variable holding the server-held token secret.
pub const TOKEN_SECRET_ENV: &str = "ROSHAMBO_TOKEN_SECRET";

/// Environment variable holding the reconnect grace, in whole seconds.
pub const RECONNECT_GRACE_ENV: &str = "ROSHAMBO_RECONNECT_GRACE_SECS";

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
///
/// `#[derive(Clone)]` is needed because the config is shared: the
/// registry builds its tokenizer from it and the connection handlers read
/// the grace period from it.
#[derive(Clone)]
pub struct SessionConfig {
    /// Key for the reconnection token digest.
    ///
    /// The same secret always yields the same token for the same player,
    /// so a server restarted with the same secret issues the same tokens.
    /// A random secret means tokens do not survive a restart.
    pub token_secret: Vec<u8>,

    /// How long a player who dropped out of a running round keeps their
    /// seat before it is released.
    ///
    /// Default: zero. The seat is released as soon as the connection
    /// drops, and the room goes back to waiting for players.
    pub reconnect_grace: Duration,
}

/// `Default` generates a fresh random secret each time it is called.
impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_secret: random_secret(),
            reconnect_grace: Duration::ZERO,
        }
    }
}

impl SessionConfig {
    /// Builds a config from `ROSHAMBO_TOKEN_SECRET` and
    /// `ROSHAMBO_RECONNECT_GRACE_SECS`.
    ///
    /// A missing secret falls back to a random one (with a warning); a
    /// grace that isn't a whole number of seconds falls back to zero.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        match std::env::var(TOKEN_SECRET_ENV) {
            Ok(secret) if !secret.is_empty() => config.token_secret = secret.into_bytes(),
            _ => tracing::warn!(
                "{TOKEN_SECRET_ENV} not set, using a random secret; \
                 reconnection tokens will not survive a restart"
            ),
        }

        if let Ok(raw) = std::env::var(RECONNECT_GRACE_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => config.reconnect_grace = Duration::from_secs(secs),
                Err(e) => tracing::warn!(
                    value = %raw,
                    error = %e,
                    "ignoring invalid {RECONNECT_GRACE_ENV}"
                ),
            }
        }

        config
    }

    /// Sets the token secret.
    pub fn token_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.token_secret = secret.into();
        self
    }

    /// Sets the reconnect grace.
    pub fn reconnect_grace(mut self, grace: Duration) -> Self {
        self.reconnect_grace = grace;
        self
    }
}

// The secret stays out of logs.
impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("token_secret", &"<redacted>")
            .field("reconnect_grace", &self.reconnect_grace)
            .finish()
    }
}

/// 32 random bytes.
fn random_secret() -> Vec<u8> {
    let bytes: [u8; 32] = rand::rng().random();
    bytes.to_vec()
}
