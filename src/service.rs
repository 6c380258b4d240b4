//! Listener / Acceptor and Service Lifecycle (spec.md §4.1, §4.8).
//!
//! Grounded on `oprf-service/src/lib.rs`'s `OprfServiceBuilder` (a router
//! built once, merged from sub-modules) and `oprf-service/examples/oprf-service-example.rs`'s
//! `start_service` (bind, spawn `axum::serve(..).with_graceful_shutdown(..)`,
//! await the root token, join on shutdown). Unlike the teacher, there is a
//! single route here rather than several nested sub-routers: every path on
//! this service is a WebSocket upgrade, classified inside one handler rather
//! than by axum's router (spec.md §4.1 step 5 needs to run after auth, which
//! must run before axum's extractor machinery would reject a non-upgrade
//! request).

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{FromRequestParts, Query, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures::StreamExt;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::auth;
use crate::config::ServiceConfig;
use crate::logging::{
    EVT_ACCEPT_LOOP_FATAL, EVT_AUTH_REJECTED, EVT_NON_UPGRADE_REJECTED, EVT_SERVICE_STARTED,
    EVT_SESSION_REGISTERED, EVT_UPGRADE_FAILED,
};
use crate::registry::{ConnectionRegistry, SessionHandle};
use crate::sender::Sender;
use crate::session::{PathClass, SessionId};
use crate::session_task::{close_wait_loop, heartbeat_loop, receive_loop, OnMessageReceived};

/// Everything a request handler needs to accept and register a session.
#[derive(Clone)]
pub struct AppState {
    config: Arc<ServiceConfig>,
    registry: ConnectionRegistry,
    sender: Sender,
    on_message: OnMessageReceived,
    root_cancel: CancellationToken,
}

impl AppState {
    pub fn new(config: Arc<ServiceConfig>, on_message: OnMessageReceived) -> Self {
        let registry = ConnectionRegistry::new();
        Self {
            sender: Sender::new(registry.clone()),
            registry,
            config,
            on_message,
            root_cancel: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    pub fn root_cancellation_token(&self) -> &CancellationToken {
        &self.root_cancel
    }
}

#[derive(Debug, Deserialize)]
struct AuthQuery {
    access_token: Option<String>,
}

/// Builds the single-route `Router` serving every accepted connection,
/// mirroring `oprf-service`'s one-route-per-concern `routes()` functions.
pub fn router(state: AppState) -> Router {
    Router::new()
        .fallback(accept)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Implements spec.md §4.1 steps 2-4 by hand rather than via required
/// extractors: auth (step 2) must run, and reject with 403, *before* the
/// websocket-upgrade check (step 3) rejects with 400. A `WebSocketUpgrade`
/// or `Query` extractor taken as a plain handler parameter would fail fast
/// and short-circuit the handler body before either check ran, which would
/// invert that ordering for a malformed, unauthenticated request.
async fn accept(State(state): State<AppState>, request: Request) -> Response {
    let id = SessionId::new();
    let (mut parts, _body) = request.into_parts();

    let query_token = Query::<AuthQuery>::from_request_parts(&mut parts, &state)
        .await
        .ok()
        .and_then(|Query(q)| q.access_token);

    if !auth::validate(&state.config.access_token, &parts.headers, query_token.as_deref()) {
        warn!(event_id = EVT_AUTH_REJECTED, session_id = %id, "auth rejected");
        return StatusCode::FORBIDDEN.into_response();
    }

    let path_class = PathClass::classify(parts.uri.path());

    let ws = match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(ws) => ws,
        Err(_rejection) => {
            warn!(event_id = EVT_NON_UPGRADE_REJECTED, session_id = %id, "non-upgrade request rejected");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    ws.on_failed_upgrade(move |err| {
        error!(event_id = EVT_UPGRADE_FAILED, session_id = %id, error = %err, "websocket upgrade failed");
    })
    .on_upgrade(move |socket| handle_session(socket, id, path_class, state))
}

/// Spawns the task set for a freshly upgraded session (spec.md §4.1 step 6).
async fn handle_session(
    socket: axum::extract::ws::WebSocket,
    id: SessionId,
    path_class: PathClass,
    state: AppState,
) {
    let session_cancel = state.root_cancel.child_token();
    let (sink, stream) = socket.split();
    let handle = SessionHandle::new(sink, path_class, session_cancel.clone());
    state.registry.insert(id, handle);
    info!(event_id = EVT_SESSION_REGISTERED, session_id = %id, ?path_class, "session registered");

    if path_class.wants_heartbeat() {
        tokio::spawn(heartbeat_loop(
            id,
            state.config.bot_uin,
            state.config.heartbeat_interval_ms,
            state.registry.clone(),
            state.sender.clone(),
            session_cancel.clone(),
        ));
    }

    if path_class.wants_receive_loop() {
        tokio::spawn(receive_loop(
            id,
            stream,
            state.registry.clone(),
            session_cancel,
            state.on_message.clone(),
        ));
    } else {
        tokio::spawn(close_wait_loop(id, stream, state.registry.clone(), session_cancel));
    }
}

/// Start/stop orchestration for the whole service (spec.md §4.8).
pub struct GatewayService {
    state: AppState,
    router: Router,
}

impl GatewayService {
    pub fn new(config: ServiceConfig, on_message: OnMessageReceived) -> Self {
        let state = AppState::new(Arc::new(config), on_message);
        let router = router(state.clone());
        Self { state, router }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Binds the configured address and serves until the root cancellation
    /// token fires, then returns. Mirrors `oprf-service-example.rs`'s
    /// `start_service`: bind, log, serve-with-graceful-shutdown, await the
    /// token, stop.
    pub async fn run(self) -> eyre::Result<()> {
        let addr = self.state.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|err| eyre::eyre!("failed to bind {addr}: {err}"))?;

        info!(event_id = EVT_SERVICE_STARTED, %addr, "service started");

        let cancel = self.state.root_cancel.clone();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
            .map_err(|err| {
                error!(event_id = EVT_ACCEPT_LOOP_FATAL, %err, "accept loop died, service is degraded");
                eyre::eyre!("accept loop failed: {err}")
            })?;

        Ok(())
    }

    pub fn shutdown_handle(&self) -> CancellationToken {
        self.state.root_cancel.clone()
    }
}
