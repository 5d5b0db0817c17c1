//! Farming daemon binary.
//!
//! Loads configuration, wires up tracing (stderr plus an optional log
//! file), and runs the stdio command bridge until stdin closes, `quit`
//! arrives, or ctrl-c is received. Shutdown cancels every live worker and
//! waits a bounded grace period for them to exit.

use std::time::Duration;
use teafarm::config::BotConfig;
use teafarm::orchestrator::Orchestrator;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// How long shutdown waits for workers to observe cancellation.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;

    // Stdout is reserved for bridge replies; tracing goes to stderr and,
    // when configured, a non-blocking file appender.
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    let _file_guard = match &config.log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .unwrap_or_else(|| std::ffi::OsStr::new("teafarm.log"));
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
                dir,
                name.to_owned(),
            ));
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr.and(writer))
                .with_env_filter(filter())
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter())
                .init();
            None
        }
    };

    tracing::info!("teafarm daemon starting");
    let orchestrator = Orchestrator::from_config(&config)?;

    tokio::select! {
        result = teafarm::bridge::run_stdio_bridge(&orchestrator) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "bridge exited with error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received");
        }
        () = terminate_signal() => {
            tracing::info!("terminate signal received");
        }
    }

    if !orchestrator.shutdown(SHUTDOWN_GRACE).await {
        tracing::warn!("some workers did not stop within the grace period");
    }
    tracing::info!("teafarm daemon shut down");
    Ok(())
}

/// Resolve on SIGTERM, so a service-manager stop takes the same graceful
/// path as ctrl-c. Never resolves on other platforms.
#[cfg(unix)]
async fn terminate_signal() {
    use tokio::signal::unix::{SignalKind, signal};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            term.recv().await;
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate_signal() {
    std::future::pending::<()>().await;
}

fn load_config() -> anyhow::Result<BotConfig> {
    let path = match std::env::args_os().nth(1) {
        Some(arg) => Some(std::path::PathBuf::from(arg)),
        None => BotConfig::default_path(),
    };
    match path {
        Some(path) => Ok(BotConfig::load(&path)?),
        None => Ok(BotConfig::default()),
    }
}
