//! Admin HTTP endpoint.
//!
//! Rooms can be created while the server runs:
//!
//! ```text
//! POST /create_room?name=duel&req_players=2
//! ```
//!
//! The response body is the new room's [`RoomSnapshot`] as JSON; clients
//! then connect to `/start/{id}` on the WebSocket listener. A missing or
//! malformed parameter is rejected with `400`, a player count of zero
//! with `422`.

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::post;
use roshambo_protocol::RoomSnapshot;
use roshambo_room::RoomError;
use roshambo_session::SessionError;
use serde::Deserialize;
use roshambo_transport::TransportError;
use tokio::net::TcpListener;

use crate::{RoshamboError, ServerHandle};

/// Query parameters of `POST /create_room`.
#[derive(Debug, Deserialize)]
pub struct CreateRoomParams {
    pub name: String,
    pub req_players: usize,
}

/// Routes for managing rooms over HTTP.
pub fn admin_router(handle: ServerHandle) -> Router {
    Router::new()
        .route("/create_room", post(create_room))
        .with_state(handle)
}

/// Serves [`admin_router`] on `listener` until the process exits.
pub async fn serve_admin(listener: TcpListener, handle: ServerHandle) -> Result<(), RoshamboError> {
    tracing::info!(addr = ?listener.local_addr().ok(), "admin endpoint running");
    axum::serve(listener, admin_router(handle))
        .await
        .map_err(|e| RoshamboError::from(TransportError::AcceptFailed(e)))
}

async fn create_room(
    State(handle): State<ServerHandle>,
    Query(params): Query<CreateRoomParams>,
) -> Result<Json<RoomSnapshot>, (StatusCode, String)> {
    match handle.create_room(&params.name, params.req_players).await {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(e @ RoshamboError::Session(SessionError::Room(RoomError::InvalidConfig(_)))) => {
            Err((StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
        }
        Err(e) => {
            tracing::error!(error = %e, "create_room failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}
