//! Wire payload shapes emitted on heartbeat-enabled sessions.
//!
//! The core treats everything it sends as an opaque serialized byte string
//! (spec.md §9 "Opaque payloads"); these two structs are the only payloads
//! the core itself originates (spec.md §6), everything else is handed to it
//! pre-serialized by the caller of [`crate::sender::Sender::send_json`].

use serde::Serialize;

/// One-shot "I am online" frame, sent immediately on any session that will
/// receive heartbeats (spec.md §4.5 step 1, §6).
#[derive(Debug, Serialize)]
pub struct LifecyclePayload {
    pub time: i64,
    pub self_id: i64,
    pub post_type: &'static str,
    pub meta_event_type: &'static str,
    pub sub_type: &'static str,
}

impl LifecyclePayload {
    pub fn connect(bot_uin: i64) -> Self {
        Self {
            time: chrono::Utc::now().timestamp(),
            self_id: bot_uin,
            post_type: "meta_event",
            meta_event_type: "lifecycle",
            sub_type: "connect",
        }
    }
}

/// Periodic status payload (spec.md §4.5 step 3, §6).
#[derive(Debug, Serialize)]
pub struct HeartbeatPayload {
    pub time: i64,
    pub self_id: i64,
    pub post_type: &'static str,
    pub meta_event_type: &'static str,
    pub status: HeartbeatStatus,
    pub interval: i64,
}

#[derive(Debug, Serialize)]
pub struct HeartbeatStatus {
    pub online: bool,
    pub good: bool,
}

impl HeartbeatPayload {
    pub fn now(bot_uin: i64, interval_ms: u64) -> Self {
        Self {
            time: chrono::Utc::now().timestamp(),
            self_id: bot_uin,
            post_type: "meta_event",
            meta_event_type: "heartbeat",
            status: HeartbeatStatus {
                online: true,
                good: true,
            },
            interval: interval_ms as i64,
        }
    }
}
