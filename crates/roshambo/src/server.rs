//! `RoshamboServer` builder and server loop.
//!
//! This is the entry point for running a Roshambo server. It ties
//! together all the layers: transport → protocol → session → room.

use std::sync::Arc;

use roshambo_protocol::{Codec, JsonCodec, RoomId, RoomSnapshot};
use roshambo_room::RoomConfig;
use roshambo_session::{Registry, SeatedPlayer, SessionConfig};
use roshambo_transport::{Connection, Transport, WebSocketTransport};

use crate::RoshamboError;
use crate::handler::handle_connection;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The
/// registry locks its own directories.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) registry: Registry,
    pub(crate) codec: C,
    pub(crate) session: SessionConfig,
}

/// Builder for configuring and starting a Roshambo server.
///
/// # Example
///
/// ```rust,no_run
/// use roshambo::prelude::*;
///
/// # async fn run() -> Result<(), RoshamboError> {
/// let server = RoshamboServer::builder()
///     .bind("0.0.0.0:7000")
///     .session_config(SessionConfig::from_env())
///     .build()
///     .await?;
/// server.handle().create_room("lobby", 3).await?;
/// server.run().await
/// # }
/// ```
pub struct RoshamboServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    room_config: RoomConfig,
}

impl RoshamboServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:7000".to_string(),
            session_config: SessionConfig::default(),
            room_config: RoomConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the session configuration (token secret, reconnect grace).
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets the configuration every room is created with.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<RoshamboServer<JsonCodec>, RoshamboError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let registry = Registry::new(&self.session_config, self.room_config)?;

        let state = Arc::new(ServerState {
            registry,
            codec: JsonCodec,
            session: self.session_config,
        });

        Ok(RoshamboServer { transport, state })
    }
}

impl Default for RoshamboServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Roshambo server.
///
/// Create rooms through [`handle()`](Self::handle), then call
/// [`run()`](Self::run) to start accepting connections.
pub struct RoshamboServer<C: Codec = JsonCodec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl RoshamboServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> RoshamboServerBuilder {
        RoshamboServerBuilder::new()
    }
}

impl<C: Codec> RoshamboServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle for managing rooms while the server runs.
    pub fn handle(&self) -> ServerHandle<C> {
        ServerHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each
    /// one. Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), RoshamboError> {
        tracing::info!(addr = ?self.local_addr().ok(), "Roshambo server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let conn_id = conn.id();
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                %conn_id,
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Cheap, cloneable access to a server's rooms and seats.
///
/// This is the surface an outer layer (an admin endpoint, the bootstrap
/// binary, a test) uses to create rooms and inspect them.
pub struct ServerHandle<C: Codec = JsonCodec> {
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Clone for ServerHandle<C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<C: Codec> ServerHandle<C> {
    /// Creates a room waiting for `required_players` players.
    ///
    /// # Errors
    /// Fails if `required_players` is zero.
    pub async fn create_room(
        &self,
        name: &str,
        required_players: usize,
    ) -> Result<RoomSnapshot, RoshamboError> {
        Ok(self.state.registry.create_room(name, required_players).await?)
    }

    /// The current snapshot of a room.
    pub async fn room(&self, room_id: RoomId) -> Option<RoomSnapshot> {
        self.state
            .registry
            .find_room(room_id)
            .await
            .map(|room| room.snapshot())
    }

    /// Every room's id.
    pub async fn room_ids(&self) -> Vec<RoomId> {
        self.state.registry.room_ids().await
    }

    /// Where a reconnection token currently leads, if anywhere.
    pub async fn resolve_token(&self, token: &str) -> Option<SeatedPlayer> {
        self.state.registry.find_player_by_token(token).await
    }
}
