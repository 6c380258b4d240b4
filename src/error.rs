//! Internal error types for the gateway's transport layer.
//!
//! Grounded on `oprf-service/src/api/errors.rs`: a `thiserror` enum scoped to
//! one concern (there, a single WebSocket session; here, the same), plus a
//! conversion into the outbound close-frame status the session's `finally`
//! logic uses.

use axum::extract::ws::{CloseFrame, close_code};
use tungstenite::error::ProtocolError;

/// Errors that can terminate a single session's receive or heartbeat loop.
///
/// Carries the failed frame's `Display` text rather than the original
/// `axum::Error` itself: `is_peer_reset` already needs to consume that error
/// by value to downcast it (see below), so by the time a loop knows whether
/// to log at `trace` or `error` level, the original error is gone and only
/// its message survives.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer sent a frame we could not read, or the socket errored.
    #[error("frame read failed: {0}")]
    Read(String),

    /// A send (heartbeat or routed message) failed.
    #[error("frame write failed: {0}")]
    Write(String),

    /// The loop's cancellation token fired.
    #[error("session cancelled")]
    Cancelled,
}

impl TransportError {
    /// Maps a transport error to the close status spec.md §4.3/§4.7 specify:
    /// internal faults close with `InternalServerError`, cancellation closes
    /// with `NormalClosure`.
    pub fn close_status(&self) -> u16 {
        match self {
            TransportError::Cancelled => close_code::NORMAL,
            _ => 1011, // InternalServerError; axum's close_code module has no named constant for it.
        }
    }
}

/// Builds a close frame for the given status code with a short, static reason.
pub fn close_frame_for(code: u16, reason: &'static str) -> CloseFrame {
    CloseFrame {
        code,
        reason: reason.into(),
    }
}

/// Whether a frame-read failure is just the peer going away without a
/// handshake (TCP reset, socket drop) rather than a genuine protocol fault.
///
/// spec.md §8 scenario 6 still wants this logged and disconnected with
/// `InternalServerError` like any other read error; this only downgrades how
/// loudly it's logged, the same downcast the teacher's
/// `Error::into_close_frame` uses to decide whether a close frame is even
/// worth attempting. Takes `err` by value since `axum::Error::into_inner`
/// consumes it.
pub fn is_peer_reset(err: axum::Error) -> bool {
    let inner = err.into_inner();
    if let Some(tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake)) =
        inner.downcast_ref()
    {
        return true;
    }
    matches!(
        inner.downcast_ref::<std::io::Error>(),
        Some(io_err) if io_err.kind() == std::io::ErrorKind::ConnectionReset
    )
}
