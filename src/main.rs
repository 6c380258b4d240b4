//! Binary entry point for the Forward-WebSocket gateway.
//!
//! Grounded on `oprf-service/examples/oprf-service-example.rs`'s `main`/
//! `start_service`: parse config, install a tracing subscriber, bind, serve
//! with graceful shutdown, join with a bounded wait. `nodes_observability`
//! and `nodes_common` (the teacher's shutdown-signal and tracing-install
//! helpers) aren't available outside the teacher's own workspace, so this
//! binary installs `tracing_subscriber::fmt` directly and implements its own
//! ctrl-c/SIGTERM future in their place.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use onebot_forward_ws::{GatewayService, ServiceConfig};
use tracing_subscriber::EnvFilter;

/// Flattens [`ServiceConfig`] with the binary-only shutdown timeout, the
/// same way the teacher's `ExampleOprfNodeConfig` flattens `OprfNodeConfig`.
#[derive(Parser, Debug)]
struct BinaryConfig {
    /// Max time to wait for in-flight sessions to drain after shutdown is
    /// requested before giving up and exiting anyway.
    #[clap(
        long,
        env = "GATEWAY_MAX_WAIT_TIME_SHUTDOWN",
        default_value = "10s",
        value_parser = humantime::parse_duration,
    )]
    max_wait_time_shutdown: Duration,

    #[clap(flatten)]
    service: ServiceConfig,
}

#[tokio::main]
async fn main() -> eyre::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = BinaryConfig::parse();
    tracing::info!("starting onebot-forward-ws with config: {config:#?}");

    let on_message = std::sync::Arc::new(|id: onebot_forward_ws::SessionId, message: String| {
        tracing::info!(session_id = %id, bytes = message.len(), "message received, no dispatcher bound");
    });

    let service = GatewayService::new(config.service, on_message);
    let shutdown = service.shutdown_handle();

    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.cancel();
    });

    match tokio::time::timeout(config.max_wait_time_shutdown + Duration::from_secs(5), service.run()).await {
        Ok(Ok(())) => {
            tracing::info!("shutdown complete");
            Ok(ExitCode::SUCCESS)
        }
        Ok(Err(err)) => {
            tracing::error!("{err:?}");
            Ok(ExitCode::FAILURE)
        }
        Err(_) => {
            tracing::warn!("could not finish shutdown within the configured bound");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Resolves on ctrl-c, or on SIGTERM where supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

