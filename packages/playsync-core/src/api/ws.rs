//! WebSocket handler for real-time client communication.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use uuid::Uuid;

use crate::api::AppState;
use crate::clock::now_millis;
use crate::dispatcher;
use crate::protocol::Outbound;
use crate::session::Session;

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Drives one client's connection to completion: greets it, then alternates
/// between forwarding its outbound queue to the socket and dispatching
/// inbound frames, until the socket closes or the session is cancelled.
async fn handle_ws(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let session_id = Uuid::new_v4().to_string();
    let now = now_millis();
    let (session, mut outbound_rx) = Session::new(session_id.clone(), now);
    let session = Arc::new(session);
    let cancel_token = session.cancel_token();

    log::info!("[WS] New connection established: {session_id}");

    let greeting = Outbound::Connected {
        client_id: session_id.clone(),
        server_time: now,
    };
    if sender.send(Message::Text(greeting.to_text().into())).await.is_err() {
        log::warn!("[WS] Failed to greet client, disconnected immediately: {session_id}");
        return;
    }

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log::info!("[WS] Connection force-closed: {session_id}");
                break;
            }
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(frame) => {
                        if sender.send(Message::Text(frame.to_text().into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        dispatcher::dispatch(&state.hub, &session, &text);
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }

    dispatcher::disconnect(&state.hub, &session);
    session.close();
    log::info!("[WS] Connection unregistered: {session_id}");
}
