//! Sender (spec.md §4.6, §9 "global send serialization").
//!
//! Grounded on the teacher's `services/open_sessions.rs` for the general
//! shape of a small wrapper type guarding shared session state, but
//! deliberately diverges on the lock type: the critical section here spans
//! an `.await` (the actual socket write), and `open_sessions.rs`'s
//! `parking_lot::Mutex` is never held across one. A single
//! `tokio::sync::Mutex<()>` permit serializes every outbound write
//! service-wide, matching spec.md's "one send in flight at a time" rule.

use std::sync::Arc;

use axum::extract::ws::Message;
use futures::SinkExt;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{trace, warn};

use crate::logging::{truncate_for_log, EVT_SEND_MISSING_SESSION};
use crate::registry::ConnectionRegistry;
use crate::session::SessionId;

/// Errors `Sender` surfaces to its caller. A send racing a disconnect (the
/// session vanished from the registry) is deliberately *not* one of these
/// variants: spec.md §4.6 step 2 has that case "release and return
/// silently".
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The value could not be serialized to JSON.
    #[error("serialize failed: {0}")]
    Json(#[from] serde_json::Error),
    /// The underlying socket write failed.
    #[error("write failed: {0}")]
    Write(#[from] axum::Error),
}

/// Serializes and routes outbound traffic to one or all sessions.
#[derive(Clone)]
pub struct Sender {
    registry: ConnectionRegistry,
    permit: Arc<AsyncMutex<()>>,
}

impl Sender {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self {
            registry,
            permit: Arc::new(AsyncMutex::new(())),
        }
    }

    /// Serializes `value` once and routes it per spec.md §4.6:
    ///
    /// - `Some(id)`: sent to exactly that session, regardless of class. A
    ///   write failure is propagated to the caller (spec.md §7 "Send error
    ///   | per-call | surfaced to caller"); the heartbeat loop is the one
    ///   caller that turns this into a disconnect.
    /// - `None`: broadcast to every session except `api`-class ones (the
    ///   spec.md §9 "broadcast exclusion" fix; the source's equivalent
    ///   predicate excluded nothing, since it compared a class against
    ///   itself). Per-recipient write failures are logged by `send_to` and
    ///   otherwise not surfaced — a broadcast target's own receive loop
    ///   will observe its socket's death independently.
    pub async fn send_json<T: Serialize>(
        &self,
        value: &T,
        id: Option<SessionId>,
    ) -> Result<(), SendError> {
        let payload = serde_json::to_string(value)?;
        match id {
            Some(id) => self.send_to(id, &payload).await?,
            None => {
                // spec.md §4.6: broadcast fans out "concurrently; await
                // all" rather than one session at a time. The shared send
                // permit still totally orders the writes that actually hit
                // the wire; this only lets every target queue for it at
                // once instead of one-by-one.
                let targets: Vec<_> = self
                    .registry
                    .snapshot()
                    .into_iter()
                    .filter(|(_, handle)| !handle.path_class().is_api())
                    .map(|(id, _)| id)
                    .collect();
                futures::future::join_all(targets.into_iter().map(|id| self.send_to(id, &payload)))
                    .await;
            }
        }
        Ok(())
    }

    /// Sends a single pre-serialized text payload to one session.
    ///
    /// Returns `Ok(())` (after a warn-level log) if the session is no
    /// longer registered: a send racing a disconnect is not an error
    /// (spec.md §4.6 step 2, §8 invariant "no send to an absent session
    /// panics or corrupts state"). A write failure against a still-present
    /// session is returned to the caller.
    pub async fn send_to(&self, id: SessionId, payload: &str) -> Result<(), axum::Error> {
        let Some(handle) = self.registry.get(id) else {
            warn!(event_id = EVT_SEND_MISSING_SESSION, session_id = %id, "send targeted an absent session");
            return Ok(());
        };

        let _permit = self.permit.lock().await;
        let mut sink = handle.sink().lock().await;
        match sink.send(Message::Text(payload.to_owned().into())).await {
            Ok(()) => {
                trace!(session_id = %id, payload = %truncate_for_log(payload), "sent text frame");
                Ok(())
            }
            Err(err) => {
                warn!(session_id = %id, error = %err, "send failed");
                Err(err)
            }
        }
    }
}
