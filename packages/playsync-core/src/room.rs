//! A single playback room: the unit of serialization for all state changes.
//!
//! Every mutating operation is a plain, synchronous method on [`Room`] that
//! takes the room's own lock, computes the new state and the frames that
//! must go out, then releases the lock *before* returning those frames to
//! the caller for actual delivery. This is what keeps the room lock from
//! ever being held across I/O or across the registry lock in [`crate::hub`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::clock::now_millis;
use crate::protocol::{Outbound, PlaybackState, Queue, Song, SERVER_TRIGGERED};
use crate::session::Session;

/// The frames a room operation produced, to be sent *after* the room lock
/// is released.
#[derive(Default)]
pub struct RoomEffect {
    /// A frame to fan out, and the exact set of sessions to deliver it to.
    pub broadcast: Option<(Outbound, Vec<Arc<Session>>)>,
    /// Frames to deliver only to the session that caused this effect.
    pub unicast: Vec<Outbound>,
    /// Set when this operation left the room with no members; the caller
    /// must invoke [`crate::hub::Hub::drop_if_empty`] after releasing any
    /// locks it holds.
    pub destroy_room: bool,
}

struct RoomInner {
    playback: PlaybackState,
    queue: Queue,
    members: HashMap<String, Arc<Session>>,
}

/// A room, keyed by room id in the [`crate::hub::Hub`] registry.
pub struct Room {
    pub id: String,
    inner: Mutex<RoomInner>,
    /// Mirrors `inner.members.len()` so the hub can check emptiness without
    /// ever acquiring this room's lock while holding the registry lock.
    member_count: AtomicUsize,
}

impl Room {
    pub fn new(id: String) -> Self {
        let now = now_millis();
        Self {
            id,
            inner: Mutex::new(RoomInner {
                playback: PlaybackState::idle(now),
                queue: Queue::new(),
                members: HashMap::new(),
            }),
            member_count: AtomicUsize::new(0),
        }
    }

    /// Lock-free emptiness check, safe to call while holding the registry lock.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.member_count.load(Ordering::SeqCst) == 0
    }

    #[must_use]
    pub fn member_count(&self) -> usize {
        self.member_count.load(Ordering::SeqCst)
    }

    fn others(inner: &RoomInner, exclude: &str) -> Vec<Arc<Session>> {
        inner
            .members
            .values()
            .filter(|s| s.id != exclude)
            .cloned()
            .collect()
    }

    fn all(inner: &RoomInner) -> Vec<Arc<Session>> {
        inner.members.values().cloned().collect()
    }

    /// Adds `session` to the room.
    ///
    /// Returns `room_joined` and `server_state_sync` as two separate unicast
    /// frames to the joiner, in that order, plus a `client_joined` broadcast
    /// to everyone else already present. The two unicast frames are
    /// intentionally not coalesced: both are part of the documented join
    /// sequence even though they overlap in content.
    pub fn join(&self, session: Arc<Session>) -> RoomEffect {
        let now = now_millis();
        let mut inner = self.inner.lock();
        inner.members.insert(session.id.clone(), session.clone());
        self.member_count.store(inner.members.len(), Ordering::SeqCst);

        let view = inner.playback.to_view(now);
        let client_count = inner.members.len();
        let others = Self::others(&inner, &session.id);
        drop(inner);

        RoomEffect {
            broadcast: Some((
                Outbound::ClientJoined {
                    client_id: session.id.clone(),
                    client_count,
                },
                others,
            )),
            unicast: vec![
                Outbound::RoomJoined {
                    room_id: self.id.clone(),
                    playback_state: view.clone(),
                    client_count,
                },
                Outbound::ServerStateSync {
                    is_server_playing: view.is_playing,
                    playback_state: view,
                    server_time: now,
                },
            ],
            destroy_room: false,
        }
    }

    /// Removes `session_id` from the room, broadcasting `client_left` to
    /// whoever remains.
    pub fn leave(&self, session_id: &str) -> RoomEffect {
        let mut inner = self.inner.lock();
        inner.members.remove(session_id);
        self.member_count.store(inner.members.len(), Ordering::SeqCst);
        let client_count = inner.members.len();
        let remaining = Self::all(&inner);
        let destroy_room = remaining.is_empty();
        drop(inner);

        RoomEffect {
            broadcast: Some((
                Outbound::ClientLeft {
                    client_id: session_id.to_string(),
                    client_count,
                },
                remaining,
            )),
            unicast: vec![],
            destroy_room,
        }
    }

    /// Local playback intent: does not change authoritative room state and
    /// is never broadcast. Replies to the caller alone with the room's
    /// current derived position, per the `server_state_sync` unicast shape.
    pub fn play(&self) -> RoomEffect {
        let now = now_millis();
        let inner = self.inner.lock();
        let view = inner.playback.to_view(now);
        drop(inner);

        RoomEffect {
            broadcast: None,
            unicast: vec![Outbound::ServerStateSync {
                is_server_playing: view.is_playing,
                playback_state: view,
                server_time: now,
            }],
            destroy_room: false,
        }
    }

    /// Local playback intent, the mirror of [`Self::play`]: no mutation, no
    /// broadcast, just a unicast reply with the room's derived state.
    pub fn pause(&self) -> RoomEffect {
        let now = now_millis();
        let inner = self.inner.lock();
        let view = inner.playback.to_view(now);
        drop(inner);

        RoomEffect {
            broadcast: None,
            unicast: vec![Outbound::ServerStateSync {
                is_server_playing: view.is_playing,
                playback_state: view,
                server_time: now,
            }],
            destroy_room: false,
        }
    }

    /// A client's local, non-authoritative pause (e.g. buffering). Does not
    /// change the room's authoritative state; only acknowledges to the
    /// caller so its UI can reflect the local pause.
    pub fn client_pause(&self, session_id: &str) -> RoomEffect {
        let now = now_millis();
        RoomEffect {
            broadcast: None,
            unicast: vec![Outbound::ClientPauseAck {
                client_id: session_id.to_string(),
                timestamp: now,
            }],
            destroy_room: false,
        }
    }

    /// A client's local resume out of a prior `client_pause`. Like
    /// `client_pause`, this does not touch authoritative state.
    pub fn client_resume(&self, _session_id: &str) -> RoomEffect {
        RoomEffect::default()
    }

    /// Authoritative, server-issued play command at an explicit position.
    ///
    /// Position and song id are accepted as given, with no validation against
    /// the current queue or prior state — see [`Self::apply_server_play`] for
    /// why this is isolated in its own function.
    pub fn server_play(&self, originator: &str, position: f64, song_id: Option<String>) -> RoomEffect {
        self.apply_server_play(originator, position, song_id)
    }

    /// Isolates the permissive, currently-unauthorized acceptance of an
    /// arbitrary `server_play` position/song id. A future authorization
    /// check belongs here, as the single call site for this behavior.
    fn apply_server_play(&self, originator: &str, position: f64, song_id: Option<String>) -> RoomEffect {
        let now = now_millis();
        let mut inner = self.inner.lock();
        let position = position.max(0.0);
        let start_time = now - (position * 1000.0) as u64;
        inner.playback.is_playing = true;
        inner.playback.position_seconds = position;
        inner.playback.start_time_ms = Some(start_time);
        inner.playback.song_id = song_id.clone();
        inner.playback.triggered_by = Some(originator.to_string());
        inner.playback.last_updated_ms = now;
        let targets = Self::all(&inner);
        drop(inner);

        RoomEffect {
            broadcast: Some((
                Outbound::ServerPlaySync {
                    position,
                    server_time: now,
                    start_time,
                    song_id,
                    triggered_by: originator.to_string(),
                },
                targets,
            )),
            unicast: vec![],
            destroy_room: false,
        }
    }

    /// Seeks to an explicit position, preserving the current play/pause state.
    pub fn seek(&self, originator: &str, position: f64) -> RoomEffect {
        let now = now_millis();
        let mut inner = self.inner.lock();
        let position = position.max(0.0);
        inner.playback.position_seconds = position;
        if inner.playback.is_playing {
            inner.playback.start_time_ms = Some(now - (position * 1000.0) as u64);
        }
        inner.playback.triggered_by = Some(originator.to_string());
        inner.playback.last_updated_ms = now;
        let is_playing = inner.playback.is_playing;
        let start_time = inner.playback.start_time_ms;
        let targets = Self::all(&inner);
        drop(inner);

        RoomEffect {
            broadcast: Some((
                Outbound::SeekSync {
                    position,
                    is_playing,
                    server_time: now,
                    start_time,
                    triggered_by: originator.to_string(),
                },
                targets,
            )),
            unicast: vec![],
            destroy_room: false,
        }
    }

    /// Swaps in a new current song, resetting position to zero.
    pub fn song_change(&self, originator: &str, song: Song) -> RoomEffect {
        let now = now_millis();
        let mut inner = self.inner.lock();
        inner.playback.current_song = Some(song.clone());
        inner.playback.song_id = song.id().map(str::to_owned);
        inner.playback.position_seconds = 0.0;
        if inner.playback.is_playing {
            inner.playback.start_time_ms = Some(now);
        }
        inner.playback.triggered_by = Some(originator.to_string());
        inner.playback.last_updated_ms = now;
        let start_time = inner.playback.start_time_ms.unwrap_or(now);
        let targets = Self::all(&inner);
        drop(inner);

        RoomEffect {
            broadcast: Some((
                Outbound::SongChangeSync {
                    song,
                    server_time: now,
                    start_time,
                    triggered_by: originator.to_string(),
                },
                targets,
            )),
            unicast: vec![],
            destroy_room: false,
        }
    }

    /// Enqueues `song`, unless the room is idle (no current song) or
    /// `set_as_current` is true, in which case the song is promoted to
    /// current immediately, overwriting any song already playing.
    /// `SongAddedResponse.set_as_current` reports whether the song actually
    /// became current, not the raw request flag.
    pub fn add_song(&self, originator: &str, song: Song, set_as_current: bool) -> RoomEffect {
        let now = now_millis();
        let mut inner = self.inner.lock();

        let was_idle = inner.playback.current_song.is_none();
        let play_immediately = was_idle || set_as_current;

        if play_immediately {
            inner.playback.current_song = Some(song.clone());
            inner.playback.song_id = song.id().map(str::to_owned);
            inner.playback.is_playing = true;
            inner.playback.position_seconds = 0.0;
            inner.playback.start_time_ms = Some(now);
            inner.playback.triggered_by = Some(originator.to_string());
            inner.playback.last_updated_ms = now;
        } else {
            inner.queue.push_back(song.clone());
        }
        let queue_length = inner.queue.len();
        let targets = Self::all(&inner);
        drop(inner);

        let broadcast = if play_immediately {
            Some((
                Outbound::NewSongNotification {
                    song: song.clone(),
                    start_time: now,
                    server_time: now,
                    was_idle: Some(was_idle),
                },
                targets,
            ))
        } else {
            None
        };

        RoomEffect {
            broadcast,
            unicast: vec![Outbound::SongAddedResponse {
                success: true,
                song,
                set_as_current: play_immediately,
                queue_length,
            }],
            destroy_room: false,
        }
    }

    /// The current song finished. Auto-advances to the next queued song, or
    /// returns the room to Idle if the queue is empty. Always attributed to
    /// [`SERVER_TRIGGERED`], never the reporting client.
    pub fn playback_ended(&self) -> RoomEffect {
        let now = now_millis();
        let mut inner = self.inner.lock();
        let next = inner.queue.pop_front();

        match next {
            Some(song) => {
                inner.playback.current_song = Some(song.clone());
                inner.playback.song_id = song.id().map(str::to_owned);
                inner.playback.is_playing = true;
                inner.playback.position_seconds = 0.0;
                inner.playback.start_time_ms = Some(now);
                inner.playback.triggered_by = Some(SERVER_TRIGGERED.to_string());
                inner.playback.last_updated_ms = now;
                let targets = Self::all(&inner);
                drop(inner);
                RoomEffect {
                    broadcast: Some((
                        Outbound::NewSongNotification {
                            song,
                            start_time: now,
                            server_time: now,
                            was_idle: Some(false),
                        },
                        targets,
                    )),
                    unicast: vec![],
                    destroy_room: false,
                }
            }
            // Empty queue: the room goes quietly idle. No frame goes out —
            // there is nothing new for any member to react to.
            None => {
                inner.playback = PlaybackState::idle(now);
                drop(inner);
                RoomEffect::default()
            }
        }
    }

    /// Answers a `get_room_state` request with the full queue snapshot.
    pub fn get_room_state(&self, request_id: Value) -> RoomEffect {
        let now = now_millis();
        let inner = self.inner.lock();
        let playback = inner.playback.to_view(now);
        let queue = inner.queue.snapshot();
        drop(inner);

        RoomEffect {
            broadcast: None,
            unicast: vec![Outbound::RoomStateResponse {
                playback,
                server_time: now,
                request_id,
                queue,
            }],
            destroy_room: false,
        }
    }

    /// Answers a lightweight `sync_request` with just the playback fields.
    pub fn sync_request(&self) -> RoomEffect {
        let now = now_millis();
        let inner = self.inner.lock();
        let playback = inner.playback.to_view(now);
        drop(inner);

        RoomEffect {
            broadcast: None,
            unicast: vec![Outbound::SyncResponse {
                playback,
                server_time: now,
            }],
            destroy_room: false,
        }
    }
}
