//! Process-wide room registry.
//!
//! The hub's own lock and a room's internal lock are never held at the same
//! time. [`Room`] mirrors its member count into an atomic so [`Hub`] can
//! decide whether to drop an empty room without ever reaching into the
//! room's mutex while the registry lock is held.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::room::Room;

/// The authoritative registry of live rooms, keyed by room id.
#[derive(Default)]
pub struct Hub {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the room for `room_id` if it already exists.
    pub fn get_existing(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.read().get(room_id).cloned()
    }

    /// Returns the room for `room_id`, creating it if absent.
    pub fn get_or_create(&self, room_id: &str) -> Arc<Room> {
        if let Some(room) = self.get_existing(room_id) {
            return room;
        }
        let mut rooms = self.rooms.write();
        rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Arc::new(Room::new(room_id.to_string())))
            .clone()
    }

    /// Removes `room_id` from the registry if it is still empty.
    ///
    /// Called after a room's member-count mutation has already released the
    /// room's own lock, so this only ever needs the registry lock plus a
    /// lock-free atomic read on the room — never both locks nested.
    ///
    /// A fresh member joining between the caller's emptiness observation and
    /// this call is handled by the second `is_empty()` check taken under the
    /// write lock: a room that gained a member in that window survives.
    pub fn drop_if_empty(&self, room_id: &str) {
        if let Some(room) = self.get_existing(room_id) {
            if !room.is_empty() {
                return;
            }
            let mut rooms = self.rooms.write();
            if rooms
                .get(room_id)
                .is_some_and(|r| Arc::ptr_eq(r, &room) && r.is_empty())
            {
                rooms.remove(room_id);
            }
        }
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::now_millis;
    use crate::session::Session;
    use std::sync::Arc as StdArc;

    fn make_session(id: &str) -> StdArc<Session> {
        let (session, _rx) = Session::new(id.to_string(), now_millis());
        StdArc::new(session)
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let hub = Hub::new();
        let r1 = hub.get_or_create("room1");
        let r2 = hub.get_or_create("room1");
        assert!(Arc::ptr_eq(&r1, &r2));
        assert_eq!(hub.room_count(), 1);
    }

    #[test]
    fn get_existing_returns_none_for_unknown_room() {
        let hub = Hub::new();
        assert!(hub.get_existing("nope").is_none());
    }

    #[test]
    fn drop_if_empty_removes_an_empty_room() {
        let hub = Hub::new();
        hub.get_or_create("room1");
        hub.drop_if_empty("room1");
        assert_eq!(hub.room_count(), 0);
    }

    #[test]
    fn drop_if_empty_keeps_a_room_with_members() {
        let hub = Hub::new();
        let room = hub.get_or_create("room1");
        room.join(make_session("s1"));
        hub.drop_if_empty("room1");
        assert_eq!(hub.room_count(), 1);
    }

    #[test]
    fn last_leaver_cleanup_does_not_resurrect_prior_state() {
        let hub = Hub::new();
        let room = hub.get_or_create("room1");
        let s1 = make_session("s1");
        room.join(s1.clone());
        room.server_play("s1", 42.0, Some("song".into()));
        room.leave(&s1.id);
        hub.drop_if_empty("room1");
        assert_eq!(hub.room_count(), 0);

        let fresh = hub.get_or_create("room1");
        assert!(!StdArc::ptr_eq(&room, &fresh));
        let effect = fresh.sync_request();
        match &effect.unicast[0] {
            crate::protocol::Outbound::SyncResponse { playback, .. } => {
                assert!(!playback.is_playing);
                assert_eq!(playback.position, 0.0);
            }
            _ => panic!("expected SyncResponse"),
        }
    }
}
