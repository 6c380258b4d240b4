//! Configuration for the Forward-WebSocket gateway.
//!
//! Grounded on `oprf-service/src/config.rs`'s `OprfNodeConfig`: a
//! `clap::Parser` struct with `long`/`env` pairs and `default_value`s, so the
//! same binary can be configured via flags or environment variables. The
//! access token follows the teacher's `SecretString` treatment of
//! `chain_ws_rpc_url`/`db_connection_string`: a value that must never show
//! up verbatim in a `Debug` print or a log line.

use std::time::Duration;

use clap::Parser;
use secrecy::SecretString;

/// Immutable service configuration, fixed for the lifetime of one run.
///
/// Matches spec.md §3 "Service configuration" field for field.
#[derive(Parser, Debug)]
pub struct ServiceConfig {
    /// Bind address. The literal `0.0.0.0` is accepted as-is; axum/hyper's
    /// TCP listener already treats it as the wildcard bind address, so no
    /// remapping is needed at this layer (spec.md §3 describes a remap that
    /// was necessary for the source's HTTP listener type, not for
    /// `tokio::net::TcpListener`).
    #[clap(long, env = "GATEWAY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// TCP port to bind.
    #[clap(long, env = "GATEWAY_PORT", default_value = "8080")]
    pub port: u16,

    /// Shared secret clients must present. Empty (the default) means "allow
    /// all" per spec.md §4.2.
    #[clap(long, env = "GATEWAY_ACCESS_TOKEN", default_value = "")]
    pub access_token: SecretString,

    /// Period of heartbeat emission, in milliseconds. Must be positive.
    #[clap(long, env = "GATEWAY_HEARTBEAT_INTERVAL_MS", default_value = "15000")]
    pub heartbeat_interval_ms: u64,

    /// Identity of the upstream bot account, carried in lifecycle/heartbeat
    /// payloads. The bot-core that owns this value is out of scope (spec.md
    /// §1); the gateway just needs to know what to stamp on its frames.
    #[clap(long, env = "GATEWAY_BOT_UIN")]
    pub bot_uin: i64,
}

impl ServiceConfig {
    /// The configured heartbeat interval as a [`Duration`].
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// `host:port`, used both to bind and in startup log lines.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn defaults_parse_from_bare_required_args() {
        let cfg = ServiceConfig::parse_from(["gateway", "--bot-uin", "12345"]);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.heartbeat_interval_ms, 15_000);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn heartbeat_interval_converts_to_duration() {
        let cfg = ServiceConfig::parse_from([
            "gateway",
            "--bot-uin",
            "1",
            "--heartbeat-interval-ms",
            "5000",
        ]);
        assert_eq!(cfg.heartbeat_interval(), Duration::from_millis(5000));
    }
}
