//! Session identity and path classification.
//!
//! Grounded on `oprf-types::crypto::PartyId` (a thin `Copy` newtype wrapper)
//! and the session-id handling in `oprf-service/src/services/open_sessions.rs`,
//! which also keys sessions by `uuid::Uuid`.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque 128-bit session identifier, rendered as the canonical UUID string.
///
/// Collisions are a bug: [`Uuid::new_v4`] is assumed to never repeat within
/// the lifetime of a running service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Allocates a fresh, unique session identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The class of a session, derived from the upgrade request's path.
///
/// Any path other than `/api[/]` or `/event[/]` is `Universal`. This is a
/// preserved behavior of the source bridge, not an oversight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    /// Request/response channel. No heartbeats, no broadcast events.
    Api,
    /// Server-to-client event/heartbeat channel. The server only reads to
    /// detect a close frame.
    Event,
    /// Receives messages, events, and heartbeats.
    Universal,
}

impl PathClass {
    /// Classifies a request path per spec.md §4.1 step 5.
    ///
    /// A trailing slash is tolerated on the two named paths; anything else
    /// (including unrelated paths) is `Universal`.
    pub fn classify(path: &str) -> Self {
        match path {
            "/api" | "/api/" => PathClass::Api,
            "/event" | "/event/" => PathClass::Event,
            _ => PathClass::Universal,
        }
    }

    /// Whether this class should never receive anything but a close frame.
    pub fn is_api(self) -> bool {
        matches!(self, PathClass::Api)
    }

    /// Whether this class runs a heartbeat loop (every non-`api` session).
    pub fn wants_heartbeat(self) -> bool {
        !self.is_api()
    }

    /// Whether this class reassembles and publishes inbound messages, as
    /// opposed to merely draining frames to detect a close.
    pub fn wants_receive_loop(self) -> bool {
        matches!(self, PathClass::Api | PathClass::Universal)
    }
}
