//! tracing-subscriber initialisation with a rolling daily log file.
//!
//! Log directory (platform-specific):
//!   macOS   -> ~/Library/Logs/dev.mindmesh/
//!   Linux   -> ~/.local/share/dev.mindmesh/
//!   Windows -> %APPDATA%\dev.mindmesh\
//!
//! Verbosity is controlled by `RUST_LOG` (defaults to `info`). Existing
//! `log::` call sites are forwarded into the tracing pipeline via `LogTracer`.

use std::{path::PathBuf, sync::OnceLock};

static GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

pub fn init() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let log_dir = resolve_log_dir();
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(&log_dir, "mindmesh.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = GUARD.set(guard);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .try_init()
        .ok();

    tracing_log::LogTracer::init().ok();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "mindmesh started");
}

fn resolve_log_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    let base = dirs::home_dir().map(|h| h.join("Library").join("Logs"));

    #[cfg(not(target_os = "macos"))]
    let base = dirs::data_local_dir();

    base.map(|d| d.join("dev.mindmesh"))
        .unwrap_or_else(std::env::temp_dir)
}
