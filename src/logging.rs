//! Named log event IDs for the gateway.
//!
//! Grounded on `oprf-service/src/metrics.rs`, which names every observable
//! event as a `pub const` instead of inlining magic values at call sites.
//! spec.md §6 asks for "well-defined event IDs (10–14 informational, 992–999
//! error/critical)"; this module is that catalogue. An implementation may
//! renumber these (spec.md says so explicitly) but the set of observable
//! events they name must stay stable.

/// Service bound and accepting connections.
pub const EVT_SERVICE_STARTED: u16 = 10;
/// A session completed its HTTP upgrade and was registered.
pub const EVT_SESSION_REGISTERED: u16 = 11;
/// The one-shot lifecycle-connect payload was sent.
pub const EVT_LIFECYCLE_SENT: u16 = 12;
/// A periodic heartbeat payload was sent.
pub const EVT_HEARTBEAT_SENT: u16 = 13;
/// Terminal: a session was disconnected. Always logged, regardless of why.
pub const EVT_SESSION_DISCONNECTED: u16 = 14;

/// Auth validator rejected a request.
pub const EVT_AUTH_REJECTED: u16 = 992;
/// A non-upgrade HTTP request hit a WebSocket-only route.
pub const EVT_NON_UPGRADE_REJECTED: u16 = 993;
/// The WebSocket upgrade itself failed after auth passed.
pub const EVT_UPGRADE_FAILED: u16 = 994;
/// Frame read I/O error.
pub const EVT_READ_ERROR: u16 = 995;
/// Heartbeat send failed.
pub const EVT_HEARTBEAT_ERROR: u16 = 996;
/// A send was attempted against a session no longer in the registry.
pub const EVT_SEND_MISSING_SESSION: u16 = 997;
/// The accept loop died; the service is considered degraded.
pub const EVT_ACCEPT_LOOP_FATAL: u16 = 998;
/// Disconnect's close-frame write failed.
pub const EVT_DISCONNECT_WRITE_ERROR: u16 = 999;

/// Upper bound (inclusive) on payload characters logged at trace level
/// before truncation, per spec.md §6.
const TRACE_PAYLOAD_LIMIT: usize = 1024;

/// Truncates a payload for trace logging, appending a `"...N bytes"` suffix
/// when it exceeds [`TRACE_PAYLOAD_LIMIT`] characters.
pub fn truncate_for_log(payload: &str) -> std::borrow::Cow<'_, str> {
    if payload.chars().count() <= TRACE_PAYLOAD_LIMIT {
        std::borrow::Cow::Borrowed(payload)
    } else {
        let truncated: String = payload.chars().take(TRACE_PAYLOAD_LIMIT).collect();
        std::borrow::Cow::Owned(format!("{truncated}...{} bytes", payload.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_payloads_are_untouched() {
        assert_eq!(truncate_for_log("hello"), "hello");
    }

    #[test]
    fn long_payloads_are_truncated_with_suffix() {
        let payload = "x".repeat(2000);
        let truncated = truncate_for_log(&payload);
        assert!(truncated.ends_with("...2000 bytes"));
        assert!(truncated.len() < payload.len());
    }
}
