//! Wire protocol: inbound parsing, outbound frame shapes, and playback state.
//!
//! Inbound frames are parsed permissively against a `serde_json::Value` rather
//! than through a strictly-typed `Deserialize` impl, because the protocol
//! contract requires numeric fields to default to zero when missing or
//! non-numeric rather than rejecting the frame (see [`parse_inbound`]).
//! Outbound frames are fully typed since the hub controls their construction.

use std::collections::VecDeque;

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::CodecError;

/// Sentinel `triggeredBy` value used for server-initiated auto-advance.
///
/// Reserved and distinct from any session id (session ids are UUIDs), so it
/// can never collide with a real originator.
pub const SERVER_TRIGGERED: &str = "server";

/// An opaque, client-supplied song record.
///
/// The hub does not validate Song contents beyond treating `id`/`title` as
/// conventional fields; everything else round-trips verbatim because the
/// value is stored and re-serialized as-is.
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Song(pub Value);

impl Song {
    /// Returns the song's `id` field, if present and a string.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    /// Returns the song's `title` field, if present and a string.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.0.get("title").and_then(Value::as_str)
    }

    fn empty() -> Self {
        Song(json!({}))
    }
}

/// Authoritative per-room playback state.
///
/// Invariants (enforced by every mutating method in [`crate::room`]):
/// `is_playing ⇒ start_time_ms.is_some() ∧ current_song.is_some()`;
/// `!is_playing ⇒ start_time_ms.is_none()`; `position_seconds >= 0`;
/// `last_updated_ms` never decreases.
#[derive(Debug, Clone)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub current_song: Option<Song>,
    pub position_seconds: f64,
    pub start_time_ms: Option<u64>,
    pub last_updated_ms: u64,
    pub song_id: Option<String>,
    pub triggered_by: Option<String>,
}

impl PlaybackState {
    /// The Idle state: no song, not playing, zero position.
    pub fn idle(now_ms: u64) -> Self {
        Self {
            is_playing: false,
            current_song: None,
            position_seconds: 0.0,
            start_time_ms: None,
            last_updated_ms: now_ms,
            song_id: None,
            triggered_by: None,
        }
    }

    /// The logical playhead position at wall time `now_ms`.
    ///
    /// `max(0, (now - start_time) / 1000)` while playing, else the stored
    /// (clamped) `position_seconds`.
    #[must_use]
    pub fn derived_position(&self, now_ms: u64) -> f64 {
        if self.is_playing {
            let start = self.start_time_ms.unwrap_or(now_ms);
            let elapsed_ms = now_ms.saturating_sub(start);
            (elapsed_ms as f64 / 1000.0).max(0.0)
        } else {
            self.position_seconds.max(0.0)
        }
    }

    /// Builds the outbound, camelCase view of this state at `now_ms`.
    pub fn to_view(&self, now_ms: u64) -> PlaybackStateView {
        PlaybackStateView {
            is_playing: self.is_playing,
            current_song: self.current_song.clone(),
            position: self.derived_position(now_ms),
            start_time: self.start_time_ms,
            song_id: self.song_id.clone(),
            triggered_by: self.triggered_by.clone(),
            last_updated: self.last_updated_ms,
        }
    }
}

/// Serializable, camelCase snapshot of [`PlaybackState`] with position
/// already resolved to the caller's observation time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStateView {
    pub is_playing: bool,
    pub current_song: Option<Song>,
    pub position: f64,
    pub start_time: Option<u64>,
    pub song_id: Option<String>,
    pub triggered_by: Option<String>,
    pub last_updated: u64,
}

/// A room's FIFO song queue. Only enqueue-tail and dequeue-head are supported.
#[derive(Debug, Default)]
pub struct Queue(VecDeque<Song>);

impl Queue {
    pub fn new() -> Self {
        Self(VecDeque::new())
    }

    pub fn push_back(&mut self, song: Song) {
        self.0.push_back(song);
    }

    pub fn pop_front(&mut self) -> Option<Song> {
        self.0.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Song> {
        self.0.iter().cloned().collect()
    }
}

/// A parsed inbound message, already validated enough to route.
#[derive(Debug, Clone)]
pub enum Inbound {
    JoinRoom { room_id: Option<String> },
    LeaveRoom,
    Play,
    Pause,
    ClientPause,
    ClientResume,
    ServerPlay { position: f64, song_id: Option<String> },
    Seek { position: f64 },
    SongChange { song: Song },
    AddSong { song: Song, set_as_current: bool },
    PlaybackEnded,
    GetRoomState { request_id: Value },
    SyncRequest,
    /// Any `type` not recognized by the protocol.
    Unknown(String),
}

/// Parses one inbound WebSocket text frame.
///
/// Returns `Err` only for frames the codec cannot route at all (not JSON,
/// not an object, or missing the required `type` field). Message-specific
/// fields are read leniently: numeric fields default to `0.0` and booleans
/// default to `false` when missing or of the wrong type, per the protocol's
/// stated leniency. An unrecognized `type` is not a codec error — it becomes
/// `Inbound::Unknown` so the dispatcher can produce the documented
/// `"Unknown message type: <t>"` reply.
pub fn parse_inbound(raw: &str) -> Result<Inbound, CodecError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|_| CodecError::Malformed("invalid JSON"))?;
    let obj = value
        .as_object()
        .ok_or(CodecError::Malformed("expected a JSON object"))?;
    let msg_type = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or(CodecError::Malformed("missing required field: type"))?;

    let num_field = |key: &str| -> f64 { obj.get(key).and_then(Value::as_f64).unwrap_or(0.0) };
    let bool_field = |key: &str| -> bool { obj.get(key).and_then(Value::as_bool).unwrap_or(false) };
    let str_field = |key: &str| -> Option<String> {
        obj.get(key).and_then(Value::as_str).map(str::to_owned)
    };
    let song_field =
        |key: &str| -> Song { obj.get(key).cloned().map(Song).unwrap_or_else(Song::empty) };

    Ok(match msg_type {
        "join_room" => Inbound::JoinRoom {
            room_id: str_field("roomId"),
        },
        "leave_room" => Inbound::LeaveRoom,
        "play" => Inbound::Play,
        "pause" => Inbound::Pause,
        "client_pause" => Inbound::ClientPause,
        "client_resume" => Inbound::ClientResume,
        "server_play" => Inbound::ServerPlay {
            position: num_field("position"),
            song_id: str_field("songId"),
        },
        "seek" => Inbound::Seek {
            position: num_field("position"),
        },
        "song_change" => Inbound::SongChange {
            song: song_field("song"),
        },
        "add_song" => Inbound::AddSong {
            song: song_field("song"),
            set_as_current: bool_field("setAsCurrent"),
        },
        "playback_ended" => Inbound::PlaybackEnded,
        "get_room_state" => Inbound::GetRoomState {
            request_id: obj.get("requestId").cloned().unwrap_or(Value::Null),
        },
        "sync_request" => Inbound::SyncRequest,
        other => Inbound::Unknown(other.to_string()),
    })
}

/// A fully-formed outbound frame. `type` is injected by the tag attribute.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    Connected {
        client_id: String,
        server_time: u64,
    },
    Error {
        message: String,
        timestamp: u64,
    },
    RoomJoined {
        room_id: String,
        playback_state: PlaybackStateView,
        client_count: usize,
    },
    ServerStateSync {
        playback_state: PlaybackStateView,
        server_time: u64,
        is_server_playing: bool,
    },
    ClientJoined {
        client_id: String,
        client_count: usize,
    },
    ClientLeft {
        client_id: String,
        client_count: usize,
    },
    ServerPlaySync {
        position: f64,
        server_time: u64,
        start_time: u64,
        song_id: Option<String>,
        triggered_by: String,
    },
    SeekSync {
        position: f64,
        is_playing: bool,
        server_time: u64,
        start_time: Option<u64>,
        triggered_by: String,
    },
    SongChangeSync {
        song: Song,
        server_time: u64,
        start_time: u64,
        triggered_by: String,
    },
    NewSongNotification {
        song: Song,
        start_time: u64,
        server_time: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        was_idle: Option<bool>,
    },
    ClientPauseAck {
        client_id: String,
        timestamp: u64,
    },
    SyncResponse {
        #[serde(flatten)]
        playback: PlaybackStateView,
        server_time: u64,
    },
    RoomStateResponse {
        #[serde(flatten)]
        playback: PlaybackStateView,
        server_time: u64,
        request_id: Value,
        queue: Vec<Song>,
    },
    SongAddedResponse {
        success: bool,
        song: Song,
        set_as_current: bool,
        queue_length: usize,
    },
}

impl Outbound {
    /// Serializes this frame to its wire representation.
    ///
    /// # Panics
    ///
    /// Never panics in practice: every field type here is infallibly
    /// serializable (no maps with non-string keys, no `f64::NAN`).
    #[must_use]
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).expect("Outbound frames are always serializable")
    }
}
