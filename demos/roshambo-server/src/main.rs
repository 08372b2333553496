use roshambo::prelude::*;
use tracing_subscriber::EnvFilter;

const BIND_ENV: &str = "ROSHAMBO_BIND";
const ROOMS_ENV: &str = "ROSHAMBO_ROOMS";
const HTTP_BIND_ENV: &str = "ROSHAMBO_HTTP_BIND";

const DEFAULT_BIND: &str = "127.0.0.1:7000";
const DEFAULT_ROOMS: &str = "lobby:3";
const DEFAULT_HTTP_BIND: &str = "127.0.0.1:7001";

// ---------------------------------------------------------------------------
// Room seeding
// ---------------------------------------------------------------------------

/// Parses `name:players` pairs separated by commas, e.g. `lobby:3,duel:2`.
fn parse_rooms(raw: &str) -> Result<Vec<(String, usize)>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, count) = entry
                .split_once(':')
                .ok_or_else(|| format!("room `{entry}` must look like name:players"))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(format!("room `{entry}` has no name"));
            }
            let count: usize = count
                .trim()
                .parse()
                .map_err(|_| format!("room `{entry}` has an invalid player count"))?;
            if count == 0 {
                return Err(format!("room `{entry}` needs at least one player"));
            }
            Ok((name.to_string(), count))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let bind = std::env::var(BIND_ENV).unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let rooms = parse_rooms(
        &std::env::var(ROOMS_ENV).unwrap_or_else(|_| DEFAULT_ROOMS.to_string()),
    )?;

    let server = RoshamboServer::builder()
        .bind(&bind)
        .session_config(SessionConfig::from_env())
        .build()
        .await?;

    let handle = server.handle();
    for (name, players) in &rooms {
        let room = handle.create_room(name, *players).await?;
        tracing::info!(
            room_id = %room.id,
            room_name = %room.name,
            required_players = room.required_players,
            "room ready at /start/{}",
            room.id
        );
    }

    let http_bind = std::env::var(HTTP_BIND_ENV).unwrap_or_else(|_| DEFAULT_HTTP_BIND.to_string());
    let admin = tokio::net::TcpListener::bind(&http_bind).await?;
    tokio::spawn(async move {
        if let Err(e) = roshambo::http::serve_admin(admin, handle).await {
            tracing::error!(error = %e, "admin endpoint stopped");
        }
    });

    server.run().await?;
    Ok(())
}
