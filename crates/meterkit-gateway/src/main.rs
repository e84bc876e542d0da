//! meterkit demo gateway.
//!
//! - `GET /`              : simulated request (request.count, request.duration)
//! - `POST /v1/collect`   : manual collection printed as JSON
//! - `GET /metrics`       : pull scrape
//! - stdin                : press enter to collect
//!
//! Config path comes from `METERKIT_CONFIG` (default `meterkit.yaml`).

use std::net::SocketAddr;
use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use meterkit_gateway::{app_state::AppState, config, router, transport};

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.code().as_str(), error = %e, "meterkit-gateway failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> meterkit_core::Result<()> {
    let path = config::config_path();
    let cfg = config::load_from_file(&path)?;
    let listen: SocketAddr = cfg
        .service
        .listen
        .parse()
        .map_err(|e| meterkit_core::MeterError::Config(format!("service.listen: {e}")))?;
    let console_enabled = cfg.console.enabled;

    let state = AppState::new(cfg)?;
    let app = router::build_router(state.clone());

    if console_enabled {
        tokio::spawn(transport::console::run_stdin(state.clone()));
    }

    tracing::info!(%listen, config = %path, "meterkit-gateway starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| meterkit_core::MeterError::Config(format!("bind {listen}: {e}")))?;

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await
        .map_err(|e| meterkit_core::MeterError::Internal(format!("server failed: {e}")));

    // final pass for every reader, even if the server errored
    let shutdown = state.shutdown().await;
    served?;
    shutdown
}

async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    state.set_draining();
    tracing::info!("signal received, starting graceful shutdown");
}
