//! Room configuration.

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Settings shared by every room the server creates.
///
/// The seat count is per room and passed to [`Room::new`] instead.
///
/// [`Room::new`]: crate::Room::new
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// When `true`, a resolved round goes straight back to
    /// `WaitingChoices` instead of `WaitingPlayers`.
    pub consecutive_rounds: bool,

    /// Capacity of each room actor's command channel. Senders wait when
    /// it fills up.
    pub command_buffer: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            consecutive_rounds: false,
            command_buffer: 64,
        }
    }
}

impl RoomConfig {
    /// Sets whether rounds run back to back.
    pub fn consecutive_rounds(mut self, enabled: bool) -> Self {
        self.consecutive_rounds = enabled;
        self
    }
}
