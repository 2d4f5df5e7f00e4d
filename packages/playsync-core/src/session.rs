//! Per-connection session handle.
//!
//! A `Session` is the dispatcher's view of one WebSocket client: an outbound
//! channel, the room it currently belongs to (if any), and a cancellation
//! token used to force-close the connection's read/write tasks.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::protocol::Outbound;

/// Bound on each session's outbound queue. Past this, [`Session::send`]
/// closes the session rather than blocking the room lock's caller.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 64;

/// A single connected WebSocket client.
pub struct Session {
    pub id: String,
    pub joined_at_ms: u64,
    room_id: Mutex<Option<String>>,
    outbound_tx: mpsc::Sender<Outbound>,
    closed: AtomicBool,
    cancel: CancellationToken,
}

impl Session {
    /// Creates a new session and its outbound receiver half.
    pub fn new(id: String, joined_at_ms: u64) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let session = Self {
            id,
            joined_at_ms,
            room_id: Mutex::new(None),
            outbound_tx: tx,
            closed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        };
        (session, rx)
    }

    /// Enqueues a frame for delivery to this client.
    ///
    /// Never blocks. If the outbound queue is full or the receiving half has
    /// dropped, the session is marked closed and the send is dropped — this
    /// is the "close the session" branch of the two backpressure strategies
    /// the protocol permits; there is no way to evict an already-enqueued
    /// frame from an `mpsc::Sender`; to implement "drop the oldest" instead
    /// would require a different channel primitive.
    pub fn send(&self, msg: Outbound) {
        if self.is_closed() {
            return;
        }
        if self.outbound_tx.try_send(msg).is_err() {
            log::warn!("[WS] Outbound queue full or closed for session {}, closing", self.id);
            self.close();
        }
    }

    /// Marks the session closed and cancels its connection tasks.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn current_room_id(&self) -> Option<String> {
        self.room_id.lock().clone()
    }

    pub fn set_room_id(&self, room_id: Option<String>) {
        *self.room_id.lock() = room_id;
    }
}
