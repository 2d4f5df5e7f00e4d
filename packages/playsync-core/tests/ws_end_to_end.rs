//! End-to-end tests against a live, locally bound server.
//!
//! Each test binds to an ephemeral port, connects one or more real WebSocket
//! clients via `tokio-tungstenite`, and exercises the documented join/play/
//! add-song/auto-advance scenarios over the wire.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use playsync_core::{start_server, AppState, Hub};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

async fn spawn_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let hub = Arc::new(Hub::new());
    let state = AppState::new(hub);
    tokio::spawn(async move {
        let _ = start_server(port, state).await;
    });

    for _ in 0..50 {
        if tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    port
}

type Client = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect(port: u16) -> Client {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{port}/ws"))
        .await
        .expect("client should connect");
    ws
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        match client.next().await.expect("connection should not end").unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            _ => continue,
        }
    }
}

async fn send_json(client: &mut Client, value: Value) {
    client
        .send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

#[tokio::test]
async fn connect_then_join_room_sends_room_joined_and_state_sync() {
    let port = spawn_server().await;
    let mut client = connect(port).await;

    let connected = next_json(&mut client).await;
    assert_eq!(connected["type"], "connected");

    send_json(&mut client, json!({"type":"join_room","roomId":"room1"})).await;

    let room_joined = next_json(&mut client).await;
    assert_eq!(room_joined["type"], "room_joined");
    assert_eq!(room_joined["roomId"], "room1");
    assert_eq!(room_joined["clientCount"], 1);

    let state_sync = next_json(&mut client).await;
    assert_eq!(state_sync["type"], "server_state_sync");
    assert_eq!(state_sync["isServerPlaying"], false);
}

#[tokio::test]
async fn second_client_joining_notifies_the_first() {
    let port = spawn_server().await;
    let mut c1 = connect(port).await;
    next_json(&mut c1).await; // connected
    send_json(&mut c1, json!({"type":"join_room","roomId":"room1"})).await;
    next_json(&mut c1).await; // room_joined
    next_json(&mut c1).await; // server_state_sync

    let mut c2 = connect(port).await;
    next_json(&mut c2).await; // connected
    send_json(&mut c2, json!({"type":"join_room","roomId":"room1"})).await;

    let client_joined = next_json(&mut c1).await;
    assert_eq!(client_joined["type"], "client_joined");
    assert_eq!(client_joined["clientCount"], 2);
}

#[tokio::test]
async fn server_play_broadcasts_to_all_room_members() {
    let port = spawn_server().await;
    let mut c1 = connect(port).await;
    next_json(&mut c1).await;
    send_json(&mut c1, json!({"type":"join_room","roomId":"room1"})).await;
    next_json(&mut c1).await;
    next_json(&mut c1).await;

    let mut c2 = connect(port).await;
    next_json(&mut c2).await;
    send_json(&mut c2, json!({"type":"join_room","roomId":"room1"})).await;
    next_json(&mut c2).await;
    next_json(&mut c2).await;
    next_json(&mut c1).await; // client_joined on c1

    send_json(
        &mut c1,
        json!({"type":"server_play","position":5.0,"songId":"song-1"}),
    )
    .await;

    let sync_on_c1 = next_json(&mut c1).await;
    assert_eq!(sync_on_c1["type"], "server_play_sync");
    assert_eq!(sync_on_c1["songId"], "song-1");

    let sync_on_c2 = next_json(&mut c2).await;
    assert_eq!(sync_on_c2["type"], "server_play_sync");
    assert_eq!(sync_on_c2["songId"], "song-1");
}

#[tokio::test]
async fn add_song_while_idle_and_set_as_current_plays_immediately() {
    let port = spawn_server().await;
    let mut client = connect(port).await;
    next_json(&mut client).await;
    send_json(&mut client, json!({"type":"join_room","roomId":"room1"})).await;
    next_json(&mut client).await;
    next_json(&mut client).await;

    send_json(
        &mut client,
        json!({"type":"add_song","song":{"id":"a"},"setAsCurrent":true}),
    )
    .await;

    let notification = next_json(&mut client).await;
    assert_eq!(notification["type"], "new_song_notification");
    assert_eq!(notification["wasIdle"], true);

    let added = next_json(&mut client).await;
    assert_eq!(added["type"], "song_added_response");
    assert_eq!(added["success"], true);
}

#[tokio::test]
async fn unknown_message_type_gets_an_error_reply_without_disconnecting() {
    let port = spawn_server().await;
    let mut client = connect(port).await;
    next_json(&mut client).await;

    send_json(&mut client, json!({"type":"not_a_real_type"})).await;
    let error = next_json(&mut client).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["message"], "Unknown message type: not_a_real_type");

    // connection still usable afterward
    send_json(&mut client, json!({"type":"join_room","roomId":"room1"})).await;
    let room_joined = next_json(&mut client).await;
    assert_eq!(room_joined["type"], "room_joined");
}
