use std::fs;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub fn log_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("aicademy").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// File-only logging. The terminal belongs to the UI.
///
/// `RUST_LOG` wins over `default_level`. Keep the guard alive for the whole run.
pub fn init(default_level: &str) -> WorkerGuard {
    let log_dir = log_dir();
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("Failed to create logs directory: {}", e);
    }

    let file_appender = tracing_appender::rolling::daily(&log_dir, "aicademy.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .json()
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(file_layer).init();

    guard
}
