//! Routes parsed inbound frames to room operations and executes their effects.
//!
//! Everything in this module is synchronous: room state changes never await,
//! so a single dispatch call either fully applies or (on a parse error)
//! sends nothing but an `error` frame back to the originator. The connection
//! is never torn down for a malformed or unroutable frame.

use std::sync::Arc;

use serde_json::Value;

use crate::broadcast::fan_out;
use crate::clock::now_millis;
use crate::hub::Hub;
use crate::protocol::{parse_inbound, Inbound, Outbound};
use crate::room::{Room, RoomEffect};
use crate::session::Session;

/// Parses and routes one inbound text frame.
pub fn dispatch(hub: &Hub, session: &Arc<Session>, raw: &str) {
    match parse_inbound(raw) {
        Ok(msg) => handle(hub, session, msg),
        Err(err) => session.send(Outbound::Error {
            message: err.to_string(),
            timestamp: now_millis(),
        }),
    }
}

fn handle(hub: &Hub, session: &Arc<Session>, msg: Inbound) {
    match msg {
        Inbound::JoinRoom { room_id } => handle_join_room(hub, session, room_id),
        Inbound::LeaveRoom => detach_from_room(hub, session),
        Inbound::Unknown(msg_type) => session.send(Outbound::Error {
            message: format!("Unknown message type: {msg_type}"),
            timestamp: now_millis(),
        }),
        other => with_room(hub, session, |room| dispatch_room_op(room, session, other)),
    }
}

/// Dispatches a message that requires the session to already be in a room.
/// Must only be called with variants other than `JoinRoom`/`LeaveRoom`/`Unknown`.
fn dispatch_room_op(room: &Arc<Room>, session: &Arc<Session>, msg: Inbound) -> RoomEffect {
    match msg {
        Inbound::Play => room.play(),
        Inbound::Pause => room.pause(),
        Inbound::ClientPause => room.client_pause(&session.id),
        Inbound::ClientResume => room.client_resume(&session.id),
        Inbound::ServerPlay { position, song_id } => room.server_play(&session.id, position, song_id),
        Inbound::Seek { position } => room.seek(&session.id, position),
        Inbound::SongChange { song } => room.song_change(&session.id, song),
        Inbound::AddSong { song, set_as_current } => room.add_song(&session.id, song, set_as_current),
        Inbound::PlaybackEnded => room.playback_ended(),
        Inbound::GetRoomState { request_id } => room.get_room_state(request_id),
        Inbound::SyncRequest => room.sync_request(),
        Inbound::JoinRoom { .. } | Inbound::LeaveRoom | Inbound::Unknown(_) => unreachable!(
            "handled by handle() before dispatch_room_op is called"
        ),
    }
}

/// Runs `op` against the session's current room, if it is in one.
///
/// A message that requires a room is silently ignored when the session
/// hasn't joined one yet — the protocol treats this as a client ordering
/// bug, not something worth a reply frame over.
fn with_room(hub: &Hub, session: &Arc<Session>, op: impl FnOnce(&Arc<Room>) -> RoomEffect) {
    let Some(room_id) = session.current_room_id() else {
        return;
    };
    let Some(room) = hub.get_existing(&room_id) else {
        return;
    };
    let effect = op(&room);
    apply(session, effect);
    maybe_drop_room(hub, &room_id, &room);
}

fn handle_join_room(hub: &Hub, session: &Arc<Session>, room_id: Option<String>) {
    let Some(room_id) = room_id else {
        session.send(Outbound::Error {
            message: "Missing required field: roomId".to_string(),
            timestamp: now_millis(),
        });
        return;
    };

    detach_from_room(hub, session);

    let room = hub.get_or_create(&room_id);
    session.set_room_id(Some(room_id));
    let effect = room.join(session.clone());
    apply(session, effect);
}

/// Removes the session from its current room, if any, broadcasting
/// `client_left` and dropping the room from the registry if it is now empty.
fn detach_from_room(hub: &Hub, session: &Arc<Session>) {
    let Some(room_id) = session.current_room_id() else {
        return;
    };
    if let Some(room) = hub.get_existing(&room_id) {
        let effect = room.leave(&session.id);
        apply(session, effect);
        maybe_drop_room(hub, &room_id, &room);
    }
    session.set_room_id(None);
}

fn maybe_drop_room(hub: &Hub, room_id: &str, room: &Arc<Room>) {
    if room.is_empty() {
        hub.drop_if_empty(room_id);
    }
}

/// Delivers a [`RoomEffect`]'s frames: unicast to the originating session
/// first, then the broadcast (if any) to its target list.
fn apply(session: &Arc<Session>, effect: RoomEffect) {
    for frame in effect.unicast {
        session.send(frame);
    }
    if let Some((frame, targets)) = effect.broadcast {
        fan_out(&frame, &targets);
    }
}

/// Cleans up a session's room membership on disconnect.
pub fn disconnect(hub: &Hub, session: &Arc<Session>) {
    detach_from_room(hub, session);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_session(id: &str) -> Arc<Session> {
        let (session, _rx) = Session::new(id.to_string(), now_millis());
        Arc::new(session)
    }

    #[test]
    fn unknown_message_type_gets_exact_error_text() {
        let hub = Hub::new();
        let (session, mut rx) = Session::new("s1".into(), now_millis());
        let session = Arc::new(session);
        dispatch(&hub, &session, r#"{"type":"frobnicate"}"#);
        match rx.try_recv().unwrap() {
            Outbound::Error { message, .. } => {
                assert_eq!(message, "Unknown message type: frobnicate");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn join_room_missing_room_id_sends_error() {
        let hub = Hub::new();
        let (session, mut rx) = Session::new("s1".into(), now_millis());
        let session = Arc::new(session);
        dispatch(&hub, &session, r#"{"type":"join_room"}"#);
        match rx.try_recv().unwrap() {
            Outbound::Error { message, .. } => {
                assert_eq!(message, "Missing required field: roomId");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn room_scoped_message_without_joined_room_is_silently_ignored() {
        let hub = Hub::new();
        let (session, mut rx) = Session::new("s1".into(), now_millis());
        let session = Arc::new(session);
        dispatch(&hub, &session, r#"{"type":"play"}"#);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn play_replies_to_originator_only_without_broadcasting() {
        let hub = Hub::new();
        let (session1, mut rx1) = Session::new("s1".into(), now_millis());
        let session1 = Arc::new(session1);
        dispatch(&hub, &session1, r#"{"type":"join_room","roomId":"room1"}"#);
        rx1.try_recv().unwrap(); // room_joined
        rx1.try_recv().unwrap(); // server_state_sync

        let (session2, mut rx2) = Session::new("s2".into(), now_millis());
        let session2 = Arc::new(session2);
        dispatch(&hub, &session2, r#"{"type":"join_room","roomId":"room1"}"#);
        rx2.try_recv().unwrap(); // room_joined
        rx2.try_recv().unwrap(); // server_state_sync
        rx1.try_recv().unwrap(); // client_joined notification on session1

        dispatch(&hub, &session1, r#"{"type":"play"}"#);
        assert!(matches!(rx1.try_recv().unwrap(), Outbound::ServerStateSync { .. }));
        assert!(rx2.try_recv().is_err(), "play must not broadcast to other room members");
    }

    #[test]
    fn disconnect_removes_last_member_and_drops_room() {
        let hub = Hub::new();
        let session = make_session("s1");
        dispatch(&hub, &session, r#"{"type":"join_room","roomId":"room1"}"#);
        assert_eq!(hub.room_count(), 1);
        disconnect(&hub, &session);
        assert_eq!(hub.room_count(), 0);
    }

    #[test]
    fn join_room_while_already_in_a_room_leaves_the_first() {
        let hub = Hub::new();
        let session = make_session("s1");
        dispatch(&hub, &session, r#"{"type":"join_room","roomId":"room1"}"#);
        dispatch(&hub, &session, r#"{"type":"join_room","roomId":"room2"}"#);
        assert_eq!(session.current_room_id(), Some("room2".to_string()));
        assert_eq!(hub.room_count(), 1);
    }

    #[test]
    fn get_room_state_echoes_request_id_through_dispatch() {
        let hub = Hub::new();
        let (session, mut rx) = Session::new("s1".into(), now_millis());
        let session = Arc::new(session);
        dispatch(&hub, &session, r#"{"type":"join_room","roomId":"room1"}"#);
        rx.try_recv().unwrap();
        rx.try_recv().unwrap();
        dispatch(
            &hub,
            &session,
            r#"{"type":"get_room_state","requestId":"abc"}"#,
        );
        match rx.try_recv().unwrap() {
            Outbound::RoomStateResponse { request_id, .. } => {
                assert_eq!(request_id, Value::String("abc".to_string()));
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}
