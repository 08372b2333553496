//! Integration tests for the Roshambo server, handler, and full connection flow.
//!
//! Every test runs a real server on a random port and drives it with real
//! WebSocket clients.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use roshambo::prelude::*;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

const TIMEOUT: Duration = Duration::from_secs(2);

/// Starts a server on a random port and returns its address and handle.
async fn start_server_with(session: SessionConfig, rooms: RoomConfig) -> (String, ServerHandle) {
    let server = RoshamboServer::builder()
        .bind("127.0.0.1:0")
        .session_config(session.token_secret("integration-secret"))
        .room_config(rooms)
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let handle = server.handle();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    (addr, handle)
}

async fn start_server() -> (String, ServerHandle) {
    start_server_with(SessionConfig::default(), RoomConfig::default()).await
}

async fn connect(addr: &str, path_and_query: &str) -> ClientWs {
    let (ws, _) = tokio::time::timeout(
        TIMEOUT,
        tokio_tungstenite::connect_async(format!("ws://{addr}{path_and_query}")),
    )
    .await
    .expect("connect timed out")
    .expect("should connect");
    ws
}

/// Reads the next event, failing on close or timeout.
async fn next_event(ws: &mut ClientWs) -> Value {
    loop {
        let msg = tokio::time::timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .expect("websocket error");
        match msg {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("event should be JSON");
            }
            Message::Close(frame) => panic!("unexpected close: {frame:?}"),
            _ => continue,
        }
    }
}

/// Reads the next event and checks its kind.
async fn expect_event(ws: &mut ClientWs, kind: &str) -> Value {
    let event = next_event(ws).await;
    assert_eq!(event["event"], kind, "unexpected event: {event}");
    event
}

/// Skips events until one of `kind` arrives.
async fn wait_for_event(ws: &mut ClientWs, kind: &str) -> Value {
    loop {
        let event = next_event(ws).await;
        if event["event"] == kind {
            return event;
        }
    }
}

/// Reads until the server's close frame and returns its code and reason.
async fn expect_close(ws: &mut ClientWs) -> (u16, String) {
    loop {
        let msg = tokio::time::timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for close")
            .expect("stream ended without close frame")
            .expect("websocket error");
        if let Message::Close(frame) = msg {
            let frame = frame.expect("close frame should carry a status");
            return (u16::from(frame.code), frame.reason.as_str().to_string());
        }
    }
}

/// Asserts nothing arrives for a short while.
async fn expect_silence(ws: &mut ClientWs) {
    let result = tokio::time::timeout(Duration::from_millis(150), ws.next()).await;
    assert!(result.is_err(), "expected no message, got {result:?}");
}

async fn choose(ws: &mut ClientWs, text: &str) {
    ws.send(Message::text(text.to_string())).await.expect("send should succeed");
}

/// A seated test player.
struct Seat {
    ws: ClientWs,
    token: String,
    player_id: String,
}

/// Connects one player under `name` and reads their `ConnectedToRoom`.
async fn join(addr: &str, room: &RoomSnapshot, name: &str) -> Seat {
    let mut ws = connect(addr, &format!("/start/{}?name={name}", room.id)).await;
    let event = expect_event(&mut ws, "ConnectedToRoom").await;
    let token = event["hash"].as_str().expect("hash").to_string();
    let player_id = event["room"]["players"]
        .as_array()
        .and_then(|players| players.last())
        .and_then(|p| p["id"].as_str())
        .expect("joining player should be seated last")
        .to_string();
    Seat {
        ws,
        token,
        player_id,
    }
}

/// Seats `names` one by one and waits until every seat saw the round start.
async fn join_all_and_start(addr: &str, room: &RoomSnapshot, names: &[&str]) -> Vec<Seat> {
    let mut seats = Vec::with_capacity(names.len());
    for name in names {
        seats.push(join(addr, room, name).await);
    }
    for seat in &mut seats {
        let event = wait_for_event(&mut seat.ws, "GameCanBeStart").await;
        assert_eq!(event["room"]["state"], "WaitingChoices");
    }
    seats
}

fn score_of(event: &Value, player_id: &str) -> u64 {
    event["room"]["players"]
        .as_array()
        .and_then(|players| players.iter().find(|p| p["id"] == player_id))
        .and_then(|p| p["score"].as_u64())
        .expect("player should be in snapshot")
}

// =========================================================================
// Connecting
// =========================================================================

#[tokio::test]
async fn test_unknown_room_closed_with_not_found() {
    let (addr, _) = start_server().await;
    let mut ws = connect(&addr, &format!("/start/{}?name=ann", RoomId::new())).await;

    let (code, reason) = expect_close(&mut ws).await;
    assert_eq!(code, 1003);
    assert_eq!(reason, "room not found");
}

#[tokio::test]
async fn test_malformed_path_closed_with_not_found() {
    let (addr, _) = start_server().await;
    let mut ws = connect(&addr, "/start/not-a-room?name=ann").await;

    assert_eq!(expect_close(&mut ws).await.0, 1003);
}

#[tokio::test]
async fn test_invalid_name_closed_with_1007() {
    let (addr, handle) = start_server().await;
    let room = handle.create_room("lobby", 2).await.unwrap();

    for query in ["", "?name=", &format!("?name={}", "x".repeat(21))] {
        let mut ws = connect(&addr, &format!("/start/{}{query}", room.id)).await;
        let (code, reason) = expect_close(&mut ws).await;
        assert_eq!(code, 1007, "query {query:?}");
        assert_eq!(reason, "invalid player name");
    }
    assert!(handle.room(room.id).await.unwrap().players.is_empty());
}

#[tokio::test]
async fn test_join_sends_token_and_snapshot() {
    let (addr, handle) = start_server().await;
    let room = handle.create_room("lobby", 2).await.unwrap();

    let mut ws = connect(&addr, &format!("/start/{}?name=ann%20lee", room.id)).await;
    let event = expect_event(&mut ws, "ConnectedToRoom").await;

    let hash = event["hash"].as_str().unwrap();
    assert_eq!(hash.len(), 64);
    assert_eq!(event["room"]["id"], room.id.to_string());
    assert_eq!(event["room"]["name"], "lobby");
    assert_eq!(event["room"]["state"], "WaitingPlayers");
    assert_eq!(event["room"]["required_players"], 2);
    assert_eq!(event["room"]["players"][0]["name"], "ann lee");
    assert_eq!(event["room"]["players"][0]["has_chosen"], false);
    assert_eq!(event["room"]["players"][0]["score"], 0);

    let seat = handle.resolve_token(hash).await.expect("token should resolve");
    assert_eq!(seat.room_id, room.id);
}

#[tokio::test]
async fn test_second_player_announced_and_round_starts() {
    let (addr, handle) = start_server().await;
    let room = handle.create_room("duel", 2).await.unwrap();

    let mut a = join(&addr, &room, "ann").await;
    let mut b = join(&addr, &room, "bob").await;

    let announced = expect_event(&mut a.ws, "NewPlayerConnected").await;
    assert_eq!(announced["room"]["players"].as_array().unwrap().len(), 2);

    // Exactly one start, seen by everyone.
    expect_event(&mut a.ws, "GameCanBeStart").await;
    expect_event(&mut b.ws, "GameCanBeStart").await;
    expect_silence(&mut a.ws).await;
    expect_silence(&mut b.ws).await;
}

#[tokio::test]
async fn test_full_room_rejects_newcomer() {
    let (addr, handle) = start_server().await;
    let room = handle.create_room("duel", 2).await.unwrap();
    join_all_and_start(&addr, &room, &["ann", "bob"]).await;

    let mut late = connect(&addr, &format!("/start/{}?name=cat", room.id)).await;
    let (code, reason) = expect_close(&mut late).await;
    assert_eq!(code, 1008);
    assert_eq!(reason, "room is not accepting players");
    assert_eq!(handle.room(room.id).await.unwrap().players.len(), 2);
}

// =========================================================================
// Rounds
// =========================================================================

#[tokio::test]
async fn test_three_way_draw() {
    let (addr, handle) = start_server().await;
    let room = handle.create_room("trio", 3).await.unwrap();
    let mut seats = join_all_and_start(&addr, &room, &["a", "b", "c"]).await;

    choose(&mut seats[0].ws, "rock").await;
    choose(&mut seats[1].ws, "paper").await;
    choose(&mut seats[2].ws, "scissors").await;

    for seat in &mut seats {
        let event = wait_for_event(&mut seat.ws, "Draw").await;
        assert_eq!(event["room"]["state"], "WaitingPlayers");
        assert_eq!(event["choices"].as_array().unwrap().len(), 3);
        assert_eq!(score_of(&event, &seat.player_id), 0);
    }
}

#[tokio::test]
async fn test_rock_rock_paper_paper_wins() {
    let (addr, handle) = start_server().await;
    let room = handle.create_room("trio", 3).await.unwrap();
    let mut seats = join_all_and_start(&addr, &room, &["a", "b", "c"]).await;

    choose(&mut seats[0].ws, "rock").await;
    choose(&mut seats[1].ws, "rock").await;
    choose(&mut seats[2].ws, "paper").await;

    let lose_a = wait_for_event(&mut seats[0].ws, "Lose").await;
    wait_for_event(&mut seats[1].ws, "Lose").await;
    let win_c = wait_for_event(&mut seats[2].ws, "Win").await;

    let c_id = seats[2].player_id.clone();
    assert_eq!(score_of(&win_c, &c_id), 1);
    assert_eq!(score_of(&lose_a, &c_id), 1);
    assert_eq!(score_of(&lose_a, &seats[0].player_id), 0);

    let revealed = win_c["choices"].as_array().unwrap();
    assert!(revealed.iter().any(|c| c["player_id"] == c_id.as_str() && c["choice"] == "paper"));
}

#[tokio::test]
async fn test_outcome_arrives_before_next_round_starts() {
    let (addr, handle) = start_server().await;
    let room = handle.create_room("duel", 2).await.unwrap();
    let mut seats = join_all_and_start(&addr, &room, &["a", "b"]).await;

    choose(&mut seats[0].ws, "scissors").await;
    choose(&mut seats[1].ws, "paper").await;

    expect_event(&mut seats[0].ws, "Win").await;
    expect_event(&mut seats[1].ws, "Lose").await;
    let next = expect_event(&mut seats[0].ws, "GameCanBeStart").await;
    expect_event(&mut seats[1].ws, "GameCanBeStart").await;
    assert_eq!(score_of(&next, &seats[0].player_id), 1);

    // Scores carry into the next round.
    choose(&mut seats[0].ws, "scissors").await;
    choose(&mut seats[1].ws, "paper").await;
    let second = expect_event(&mut seats[0].ws, "Win").await;
    assert_eq!(score_of(&second, &seats[0].player_id), 2);
}

#[tokio::test]
async fn test_invalid_choice_does_not_advance_round() {
    let (addr, handle) = start_server().await;
    let room = handle.create_room("duel", 2).await.unwrap();
    let mut seats = join_all_and_start(&addr, &room, &["a", "b"]).await;

    choose(&mut seats[0].ws, "lizard").await;
    let notice = expect_event(&mut seats[0].ws, "InvalidChoice").await;
    assert!(notice["reason"].as_str().unwrap().contains("lizard"));
    assert_eq!(notice["room"]["players"][0]["has_chosen"], false);
    assert_eq!(notice["room"]["state"], "WaitingChoices");
    expect_silence(&mut seats[1].ws).await;

    choose(&mut seats[0].ws, "rock").await;
    choose(&mut seats[1].ws, "scissors").await;
    expect_event(&mut seats[0].ws, "Win").await;
    expect_event(&mut seats[1].ws, "Lose").await;
}

#[tokio::test]
async fn test_choice_before_round_rejected() {
    let (addr, handle) = start_server().await;
    let room = handle.create_room("duel", 2).await.unwrap();
    let mut a = join(&addr, &room, "ann").await;

    choose(&mut a.ws, "rock").await;
    let notice = expect_event(&mut a.ws, "InvalidChoice").await;
    assert_eq!(notice["reason"], "round has not started");
}

#[tokio::test]
async fn test_second_choice_in_round_rejected() {
    let (addr, handle) = start_server().await;
    let room = handle.create_room("duel", 2).await.unwrap();
    let mut seats = join_all_and_start(&addr, &room, &["a", "b"]).await;

    choose(&mut seats[0].ws, "rock").await;
    choose(&mut seats[0].ws, "paper").await;
    let notice = expect_event(&mut seats[0].ws, "InvalidChoice").await;
    assert_eq!(notice["reason"], "choice already submitted");

    // The first choice stands: rock beats scissors.
    choose(&mut seats[1].ws, "scissors").await;
    expect_event(&mut seats[0].ws, "Win").await;
}

#[tokio::test]
async fn test_input_is_trimmed() {
    let (addr, handle) = start_server().await;
    let room = handle.create_room("duel", 2).await.unwrap();
    let mut seats = join_all_and_start(&addr, &room, &["a", "b"]).await;

    choose(&mut seats[0].ws, " paper\n").await;
    choose(&mut seats[1].ws, "rock").await;
    expect_event(&mut seats[0].ws, "Win").await;
}

#[tokio::test]
async fn test_consecutive_rounds_restart_without_waiting() {
    let (addr, handle) = start_server_with(
        SessionConfig::default(),
        RoomConfig::default().consecutive_rounds(true),
    )
    .await;
    let room = handle.create_room("loop", 2).await.unwrap();
    let mut seats = join_all_and_start(&addr, &room, &["a", "b"]).await;

    choose(&mut seats[0].ws, "paper").await;
    choose(&mut seats[1].ws, "rock").await;

    let outcome = expect_event(&mut seats[0].ws, "Win").await;
    assert_eq!(outcome["room"]["state"], "WaitingChoices");
    expect_event(&mut seats[0].ws, "GameCanBeStart").await;
}

// =========================================================================
// Disconnects and reconnection
// =========================================================================

#[tokio::test]
async fn test_disconnect_mid_round_releases_seat() {
    let (addr, handle) = start_server().await;
    let room = handle.create_room("duel", 2).await.unwrap();
    let mut seats = join_all_and_start(&addr, &room, &["a", "b"]).await;
    let b = seats.pop().unwrap();
    let token_b = b.token.clone();

    drop(b);

    let event = expect_event(&mut seats[0].ws, "PlayerDisconnected").await;
    assert_eq!(event["room"]["state"], "WaitingPlayers");
    assert_eq!(event["room"]["players"].as_array().unwrap().len(), 1);
    assert!(handle.resolve_token(&token_b).await.is_none());

    // The old token no longer resumes anything: this is a new player.
    let mut back = connect(
        &addr,
        &format!("/start/{}?name=bob&player_hash={token_b}", room.id),
    )
    .await;
    let joined = expect_event(&mut back, "ConnectedToRoom").await;
    assert_ne!(joined["hash"], token_b.as_str());
    expect_event(&mut seats[0].ws, "NewPlayerConnected").await;
    expect_event(&mut seats[0].ws, "GameCanBeStart").await;
}

#[tokio::test]
async fn test_client_close_releases_seat() {
    let (addr, handle) = start_server().await;
    let room = handle.create_room("duel", 2).await.unwrap();
    let mut a = join(&addr, &room, "ann").await;

    a.ws.close(None).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(handle.room(room.id).await.unwrap().players.is_empty());
    assert!(handle.resolve_token(&a.token).await.is_none());
}

#[tokio::test]
async fn test_reconnect_takes_over_seat() {
    let (addr, handle) = start_server().await;
    let room = handle.create_room("duel", 2).await.unwrap();
    let mut seats = join_all_and_start(&addr, &room, &["a", "b"]).await;

    let mut resumed = connect(
        &addr,
        &format!("/start/{}?player_hash={}", room.id, seats[0].token),
    )
    .await;
    let joined = expect_event(&mut resumed, "ConnectedToRoom").await;
    assert_eq!(joined["hash"], seats[0].token.as_str());
    assert_eq!(joined["room"]["players"].as_array().unwrap().len(), 2);
    expect_event(&mut resumed, "GameCanBeStart").await;

    let (code, reason) = expect_close(&mut seats[0].ws).await;
    assert_eq!(code, 1000);
    assert_eq!(reason, "superseded by a newer connection");
    expect_event(&mut seats[1].ws, "NewPlayerConnected").await;

    // Same seat, same round.
    choose(&mut resumed, "rock").await;
    choose(&mut seats[1].ws, "paper").await;
    let lose = expect_event(&mut resumed, "Lose").await;
    expect_event(&mut seats[1].ws, "Win").await;
    assert_eq!(score_of(&lose, &seats[1].player_id), 1);
    assert_eq!(handle.room(room.id).await.unwrap().players.len(), 2);
}

#[tokio::test]
async fn test_token_for_other_room_seats_new_player() {
    let (addr, handle) = start_server().await;
    let first = handle.create_room("first", 2).await.unwrap();
    let second = handle.create_room("second", 2).await.unwrap();
    let a = join(&addr, &first, "ann").await;

    let mut ws = connect(
        &addr,
        &format!("/start/{}?name=ann&player_hash={}", second.id, a.token),
    )
    .await;
    let joined = expect_event(&mut ws, "ConnectedToRoom").await;
    assert_ne!(joined["hash"], a.token.as_str());
    assert_eq!(handle.room(first.id).await.unwrap().players.len(), 1);
}

#[tokio::test]
async fn test_grace_keeps_seat_for_reconnect() {
    let (addr, handle) = start_server_with(
        SessionConfig::default().reconnect_grace(Duration::from_secs(5)),
        RoomConfig::default(),
    )
    .await;
    let room = handle.create_room("duel", 2).await.unwrap();
    let mut seats = join_all_and_start(&addr, &room, &["a", "b"]).await;

    // a wins the first round, then picks in the second and drops.
    choose(&mut seats[0].ws, "rock").await;
    choose(&mut seats[1].ws, "scissors").await;
    expect_event(&mut seats[0].ws, "Win").await;
    wait_for_event(&mut seats[0].ws, "GameCanBeStart").await;
    wait_for_event(&mut seats[1].ws, "GameCanBeStart").await;

    choose(&mut seats[0].ws, "rock").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let a = seats.remove(0);
    let token_a = a.token.clone();
    let id_a = a.player_id.clone();
    drop(a);

    expect_silence(&mut seats[0].ws).await;
    assert!(handle.resolve_token(&token_a).await.is_some());

    let mut back = connect(
        &addr,
        &format!("/start/{}?player_hash={token_a}", room.id),
    )
    .await;
    let joined = expect_event(&mut back, "ConnectedToRoom").await;
    assert_eq!(joined["hash"], token_a.as_str());
    assert_eq!(joined["room"]["state"], "WaitingChoices");
    assert_eq!(joined["room"]["players"][0]["id"], id_a.as_str());
    assert_eq!(joined["room"]["players"][0]["has_chosen"], true);
    assert_eq!(score_of(&joined, &id_a), 1);
    expect_event(&mut back, "GameCanBeStart").await;

    choose(&mut seats[0].ws, "paper").await;
    let outcome = expect_event(&mut back, "Lose").await;
    assert_eq!(score_of(&outcome, &id_a), 1);
}

#[tokio::test]
async fn test_grace_expiry_releases_seat() {
    let (addr, handle) = start_server_with(
        SessionConfig::default().reconnect_grace(Duration::from_millis(200)),
        RoomConfig::default(),
    )
    .await;
    let room = handle.create_room("duel", 2).await.unwrap();
    let mut seats = join_all_and_start(&addr, &room, &["a", "b"]).await;
    let b = seats.pop().unwrap();
    let token_b = b.token.clone();
    drop(b);

    let event = expect_event(&mut seats[0].ws, "PlayerDisconnected").await;
    assert_eq!(event["room"]["state"], "WaitingPlayers");
    assert!(handle.resolve_token(&token_b).await.is_none());
}

#[tokio::test]
async fn test_rooms_do_not_interfere() {
    let (addr, handle) = start_server().await;
    let r1 = handle.create_room("one", 2).await.unwrap();
    let r2 = handle.create_room("two", 2).await.unwrap();
    let mut one = join_all_and_start(&addr, &r1, &["a", "b"]).await;
    let mut two = join_all_and_start(&addr, &r2, &["c", "d"]).await;

    choose(&mut one[0].ws, "rock").await;
    choose(&mut two[0].ws, "paper").await;
    choose(&mut one[1].ws, "rock").await;

    expect_event(&mut one[0].ws, "Lose").await;
    expect_silence(&mut two[0].ws).await;

    choose(&mut two[1].ws, "rock").await;
    expect_event(&mut two[0].ws, "Win").await;

    let ids = handle.room_ids().await;
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&r1.id) && ids.contains(&r2.id));
}

// =========================================================================
// Admin HTTP endpoint
// =========================================================================

/// Serves the admin router on a random port and returns its address.
async fn start_admin(handle: ServerHandle) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("admin listener should bind");
    let addr = listener.local_addr().expect("should have local addr").to_string();
    tokio::spawn(roshambo::http::serve_admin(listener, handle));
    addr
}

/// Sends a bodyless `POST` and returns the status code and body.
async fn post(addr: &str, path_and_query: &str) -> (u16, String) {
    let mut stream = tokio::net::TcpStream::connect(addr).await.expect("should connect");
    let request = format!(
        "POST {path_and_query} HTTP/1.1\r\nHost: {addr}\r\n\
         Content-Length: 0\r\nConnection: close\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.expect("write should succeed");

    let mut raw = String::new();
    tokio::time::timeout(TIMEOUT, stream.read_to_string(&mut raw))
        .await
        .expect("timed out waiting for response")
        .expect("read should succeed");

    let (head, body) = raw.split_once("\r\n\r\n").expect("response should have a body");
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .expect("status line should carry a code");
    (status, body.to_string())
}

#[tokio::test]
async fn test_create_room_over_http_then_join() {
    let (addr, handle) = start_server().await;
    let admin = start_admin(handle.clone()).await;

    let (status, body) = post(&admin, "/create_room?name=duel&req_players=2").await;
    assert_eq!(status, 200, "body: {body}");
    let room: RoomSnapshot = serde_json::from_str(&body).expect("body should be a room");
    assert_eq!(room.name, "duel");
    assert_eq!(room.required_players, 2);
    assert_eq!(room.state, RoomState::WaitingPlayers);
    assert!(handle.room_ids().await.contains(&room.id));

    let mut seats = join_all_and_start(&addr, &room, &["a", "b"]).await;
    choose(&mut seats[0].ws, "paper").await;
    choose(&mut seats[1].ws, "rock").await;
    expect_event(&mut seats[0].ws, "Win").await;
}

#[tokio::test]
async fn test_create_room_over_http_rejects_bad_params() {
    let (_, handle) = start_server().await;
    let admin = start_admin(handle.clone()).await;

    let (status, _) = post(&admin, "/create_room?name=empty&req_players=0").await;
    assert_eq!(status, 422);
    let (status, _) = post(&admin, "/create_room?name=nobody").await;
    assert_eq!(status, 400);
    let (status, _) = post(&admin, "/create_room?name=x&req_players=two").await;
    assert_eq!(status, 400);

    assert!(handle.room_ids().await.is_empty());
}
