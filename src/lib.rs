//! Forward-WebSocket gateway core: the OneBot v11-facing side of the bridge.
//!
//! Everything upstream of this crate (the proprietary protocol client, the
//! operation dispatcher, the OneBot entity/event schema) lives outside it;
//! this crate only multiplexes authenticated WebSocket sessions and routes
//! opaque JSON text between them and [`session_task::OnMessageReceived`].
//!
//! Grounded on `oprf-service/src/lib.rs`'s module layout: one file per
//! concern, composed through a small builder/entry type (here,
//! [`service::GatewayService`]) rather than a single monolithic `main`.

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod payloads;
pub mod registry;
pub mod sender;
pub mod service;
pub mod session;
pub mod session_task;

pub use config::ServiceConfig;
pub use service::{AppState, GatewayService};
pub use session::{PathClass, SessionId};
pub use session_task::OnMessageReceived;
