//! Per-session task set: Receive Loop, Close-Wait Loop, Heartbeat Loop, and
//! Disconnect (spec.md §4.3–§4.7).
//!
//! Grounded on the teacher's `api::oprf::partial_oprf`
//! (`oprf-service/src/api/oprf.rs`): one function owning a session's whole
//! life cycle from upgraded socket to close. Split here into three
//! independently spawned tasks (rather than one function looping over a
//! `select!` of sub-states) because spec.md §5 requires a session's three
//! loops to be independently cancellable children of one scope; the
//! teacher's single-task-per-session model doesn't need that since it has
//! exactly one loop per session.

use std::sync::Arc;

use axum::extract::ws::{close_code, Message, WebSocket};
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{close_frame_for, is_peer_reset, TransportError};
use crate::logging::{
    truncate_for_log, EVT_DISCONNECT_WRITE_ERROR, EVT_HEARTBEAT_ERROR, EVT_HEARTBEAT_SENT,
    EVT_LIFECYCLE_SENT, EVT_READ_ERROR, EVT_SESSION_DISCONNECTED,
};
use crate::payloads::{HeartbeatPayload, LifecyclePayload};
use crate::registry::ConnectionRegistry;
use crate::sender::Sender;
use crate::session::SessionId;

/// Invoked once per inbound text message, with the session that sent it.
///
/// `axum`'s `Message::Text` already carries a reassembled, UTF-8-validated
/// `Utf8Bytes` for the whole logical message (tungstenite defragments frames
/// before handing them up), so there is no separate manual
/// growable-buffer-and-concatenate step to perform here; the concatenated
/// bytes spec.md §4.3 and §8 "Frame integrity" ask for are exactly what
/// `Message::Text` already holds.
pub type OnMessageReceived = Arc<dyn Fn(SessionId, String) + Send + Sync>;

/// Closes and removes a session, per spec.md §4.7.
///
/// Idempotent: a second call for an already-removed `id` finds nothing in
/// the registry and does nothing further, so concurrent disconnects from
/// different loops coalesce onto whichever one wins the registry race.
pub async fn disconnect(registry: &ConnectionRegistry, id: SessionId, code: u16, reason: &'static str) {
    disconnect_impl(registry, id, code, reason, true).await;
}

/// Same as [`disconnect`], but skips attempting the close-frame write.
///
/// For a peer reset without a closing handshake the socket is already gone;
/// writing to it would just produce another error worth nothing (the
/// teacher's `into_close_frame` downcast, `oprf-service/src/api/errors.rs`,
/// gates exactly this — whether a close frame is worth attempting at all,
/// never whether the read failure itself gets logged).
async fn disconnect_no_close_frame(registry: &ConnectionRegistry, id: SessionId, code: u16, reason: &'static str) {
    disconnect_impl(registry, id, code, reason, false).await;
}

async fn disconnect_impl(
    registry: &ConnectionRegistry,
    id: SessionId,
    code: u16,
    reason: &'static str,
    write_close_frame: bool,
) {
    let Some(handle) = registry.remove(id) else {
        return;
    };

    if write_close_frame {
        let frame = close_frame_for(code, reason);
        let mut sink = handle.sink().lock().await;
        if let Err(err) = sink.send(Message::Close(Some(frame))).await {
            error!(event_id = EVT_DISCONNECT_WRITE_ERROR, session_id = %id, error = %err, "failed to write close frame");
        }
    }
    info!(event_id = EVT_SESSION_DISCONNECTED, session_id = %id, code, "session disconnected");
}

/// Receive Loop (spec.md §4.3). Runs for `api` and `universal` sessions.
pub async fn receive_loop(
    id: SessionId,
    mut stream: SplitStream<WebSocket>,
    registry: ConnectionRegistry,
    cancel: CancellationToken,
    on_message: OnMessageReceived,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                disconnect(&registry, id, TransportError::Cancelled.close_status(), "cancelled").await;
                break;
            }
            frame = stream.next() => {
                match frame {
                    None | Some(Ok(Message::Close(_))) => {
                        disconnect(&registry, id, close_code::NORMAL, "peer closed").await;
                        break;
                    }
                    Some(Ok(Message::Text(text))) => {
                        tracing::trace!(session_id = %id, payload = %truncate_for_log(&text), "received text frame");
                        on_message(id, text.to_string());
                    }
                    Some(Ok(_)) => {
                        // Ping/Pong/Binary: axum answers pings itself; anything
                        // else is outside spec.md's opaque-text contract.
                    }
                    Some(Err(err)) => {
                        let message = err.to_string();
                        let transport_err = TransportError::Read(message.clone());
                        let peer_reset = is_peer_reset(err);
                        error!(event_id = EVT_READ_ERROR, session_id = %id, error = %message, peer_reset, "frame read failed");
                        if peer_reset {
                            disconnect_no_close_frame(&registry, id, transport_err.close_status(), "read error").await;
                        } else {
                            disconnect(&registry, id, transport_err.close_status(), "read error").await;
                        }
                        break;
                    }
                }
            }
        }
    }
    cancel.cancel();
}

/// Close-Wait Loop (spec.md §4.4). Runs for `event`-only sessions: identical
/// shape to the Receive Loop but never reassembles or publishes.
pub async fn close_wait_loop(
    id: SessionId,
    mut stream: SplitStream<WebSocket>,
    registry: ConnectionRegistry,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                disconnect(&registry, id, TransportError::Cancelled.close_status(), "cancelled").await;
                break;
            }
            frame = stream.next() => {
                match frame {
                    None | Some(Ok(Message::Close(_))) => {
                        disconnect(&registry, id, close_code::NORMAL, "peer closed").await;
                        break;
                    }
                    Some(Ok(_)) => {
                        // Any non-Close frame is discarded.
                    }
                    Some(Err(err)) => {
                        let message = err.to_string();
                        let transport_err = TransportError::Read(message.clone());
                        let peer_reset = is_peer_reset(err);
                        error!(event_id = EVT_READ_ERROR, session_id = %id, error = %message, peer_reset, "frame read failed");
                        if peer_reset {
                            disconnect_no_close_frame(&registry, id, transport_err.close_status(), "read error").await;
                        } else {
                            disconnect(&registry, id, transport_err.close_status(), "read error").await;
                        }
                        break;
                    }
                }
            }
        }
    }
    cancel.cancel();
}

/// Heartbeat Loop (spec.md §4.5). Runs for every non-`api` session.
pub async fn heartbeat_loop(
    id: SessionId,
    bot_uin: i64,
    heartbeat_interval_ms: u64,
    registry: ConnectionRegistry,
    sender: Sender,
    cancel: CancellationToken,
) {
    let interval = std::time::Duration::from_millis(heartbeat_interval_ms);

    if let Err(err) = sender
        .send_json(&LifecyclePayload::connect(bot_uin), Some(id))
        .await
    {
        error!(event_id = EVT_HEARTBEAT_ERROR, session_id = %id, error = %err, "failed to send lifecycle payload");
        let transport_err = TransportError::Write(err.to_string());
        disconnect(&registry, id, transport_err.close_status(), "heartbeat error").await;
        cancel.cancel();
        return;
    }
    info!(event_id = EVT_LIFECYCLE_SENT, session_id = %id, "lifecycle-connect sent");

    loop {
        let start = tokio::time::Instant::now();
        let payload = HeartbeatPayload::now(bot_uin, heartbeat_interval_ms);
        let send_result = sender.send_json(&payload, Some(id)).await;
        let elapsed = start.elapsed();

        match send_result {
            Ok(()) => {
                tracing::debug!(event_id = EVT_HEARTBEAT_SENT, session_id = %id, "heartbeat sent");
            }
            Err(err) => {
                error!(event_id = EVT_HEARTBEAT_ERROR, session_id = %id, error = %err, "heartbeat send failed");
                let transport_err = TransportError::Write(err.to_string());
                disconnect(&registry, id, transport_err.close_status(), "heartbeat error").await;
                break;
            }
        }

        let sleep_for = interval.saturating_sub(elapsed);
        tokio::select! {
            _ = cancel.cancelled() => {
                disconnect(&registry, id, TransportError::Cancelled.close_status(), "cancelled").await;
                break;
            }
            _ = tokio::time::sleep(sleep_for) => {}
        }
    }
    cancel.cancel();
}
