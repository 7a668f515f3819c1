//! File logging under the platform data directory.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the subscriber. Keep the guard alive for the whole process or
/// buffered lines are lost on exit.
pub fn setup_logging() -> Result<WorkerGuard> {
    let session = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| format!("session_{}", d.as_secs()))
        .unwrap_or_else(|_| "session".to_owned());
    let dir = log_directory().join(&session);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;

    let file_appender = tracing_appender::rolling::never(&dir, "haunts.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .context("a global subscriber is already installed")?;

    tracing::info!(target: "client", log = %dir.join("haunts.log").display(), "logging initialized");
    Ok(guard)
}

fn log_directory() -> PathBuf {
    ProjectDirs::from("", "", "haunts")
        .map(|dirs| dirs.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}
