//! Connection Registry (spec.md §3 "Connection Registry", §4.1 step 7).
//!
//! Grounded on the pack's `dj1530954213-SatPlatform` `servertest` crate,
//! whose `Cargo.toml` already pulls in `dashmap` for the same "many
//! concurrent sessions, no session-spanning lock" role the teacher's
//! `parking_lot::Mutex<HashSet<Uuid>>` (`services/open_sessions.rs`) doesn't
//! quite fit here: that set only tracks membership, never a value other
//! code needs to reach through to send.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

use crate::session::{PathClass, SessionId};

/// The registry's per-session record: everything the Sender and Disconnect
/// logic need to reach a session without touching the session task itself.
///
/// Deliberately does not hold the raw [`WebSocket`]: axum splits the socket
/// into the owning per-connection task (see `service.rs`), not into shared
/// state. What's shared is the write half, since both the session's own
/// heartbeat loop and an external broadcast need to write to it.
#[derive(Clone)]
pub struct SessionHandle {
    sink: Arc<AsyncMutex<SplitSink<WebSocket, Message>>>,
    path_class: PathClass,
    cancel: CancellationToken,
}

impl SessionHandle {
    pub fn new(
        sink: SplitSink<WebSocket, Message>,
        path_class: PathClass,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            sink: Arc::new(AsyncMutex::new(sink)),
            path_class,
            cancel,
        }
    }

    pub fn path_class(&self) -> PathClass {
        self.path_class
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn sink(&self) -> &Arc<AsyncMutex<SplitSink<WebSocket, Message>>> {
        &self.sink
    }
}

/// Concurrent map from [`SessionId`] to [`SessionHandle`].
///
/// Every operation is a single `dashmap` call, so there is no window in
/// which a lookup and a subsequent remove race against a concurrent
/// registration under the same key (spec.md §8 "Registry consistency").
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    sessions: Arc<dashmap::DashMap<SessionId, SessionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: SessionId, handle: SessionHandle) {
        self.sessions.insert(id, handle);
    }

    /// Removes a session if present, returning its handle. Idempotent: a
    /// second call for the same id is a no-op returning `None` (spec.md §8
    /// "At-most-one-close").
    pub fn remove(&self, id: SessionId) -> Option<SessionHandle> {
        self.sessions.remove(&id).map(|(_, handle)| handle)
    }

    pub fn get(&self, id: SessionId) -> Option<SessionHandle> {
        self.sessions.get(&id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Snapshots every `(id, handle)` pair currently registered. Used by the
    /// Sender to fan a broadcast out to all sessions without holding any
    /// per-key lock across the sends themselves.
    pub fn snapshot(&self) -> Vec<(SessionId, SessionHandle)> {
        self.sessions
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }
}
