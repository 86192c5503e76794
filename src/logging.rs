//! Logging setup for embedding hosts.
//!
//! The library itself only emits `tracing` events; hosts that have no
//! subscriber of their own can call [`init`] to get a filtered stderr
//! layer, optionally mirrored to a daily-rotated file.
//!
//! The filter is read from the `LUMIDEX_LOG` environment variable
//! (`error`, `warn`, `info` (default), `debug`, `trace`, or any
//! env-filter directive).

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init(log_dir: Option<PathBuf>) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_env("LUMIDEX_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            let file_appender = tracing_appender::rolling::daily(&dir, "lumidex.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // The guard must outlive the process; init() is called once.
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .init();
            tracing::info!(?dir, "logging initialized with file mirror");
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .init();
        }
    }

    Ok(())
}
