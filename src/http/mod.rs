//! Debug HTTP server surfaced only in `debug_http` builds.
//!
//! A lightweight Axum server exposing health, the current chart series, the
//! telemetry snapshot and an SSE stream of flushed windows.

mod routes;
mod sse;

pub use routes::{build_router, run_http_server, DebugHttpState, HttpServerError};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use log::{error, info, warn};

use crate::session::SharedChart;
use crate::telemetry::TelemetryHub;

pub const DEFAULT_TOKEN: &str = "cqm-debug";

static SERVER_STARTED: AtomicBool = AtomicBool::new(false);

/// Address from `CQM_DEBUG_HTTP_ADDR`, falling back to `127.0.0.1:8787`.
pub fn addr_from_env() -> SocketAddr {
    std::env::var("CQM_DEBUG_HTTP_ADDR")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8787)))
}

/// Token from `CQM_DEBUG_TOKEN`, falling back to [`DEFAULT_TOKEN`].
pub fn token_from_env() -> String {
    std::env::var("CQM_DEBUG_TOKEN").unwrap_or_else(|_| DEFAULT_TOKEN.to_string())
}

/// Serve the debug API on its own thread and runtime.
///
/// Only the first call starts a server; later calls return `false`.
pub fn spawn_debug_server(chart: SharedChart, telemetry: Arc<TelemetryHub>) -> bool {
    if SERVER_STARTED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        warn!("Debug HTTP server already running");
        return false;
    }

    let addr = addr_from_env();
    let token = token_from_env();
    let preview = token.chars().take(4).collect::<String>();

    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                error!("Failed to build tokio runtime for debug HTTP server: {}", err);
                SERVER_STARTED.store(false, Ordering::SeqCst);
                return;
            }
        };

        info!(
            "Debug HTTP server binding {} (token prefix {}***)",
            addr, preview
        );

        runtime.block_on(async move {
            let state = DebugHttpState::new(chart, telemetry, token);
            if let Err(err) = run_http_server(state, addr).await {
                error!("Debug HTTP server stopped: {}", err);
            }
        });
        SERVER_STARTED.store(false, Ordering::SeqCst);
    });

    true
}
