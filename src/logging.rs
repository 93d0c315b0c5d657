use std::fs;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::constants::{LOG_DIR, LOG_FILE_NAME};

/// Initializes logging with console output and a daily-rolled JSON log file.
pub fn init_logging() {
    let _ = fs::create_dir_all(LOG_DIR);

    let file_appender = tracing_appender::rolling::daily(LOG_DIR, LOG_FILE_NAME);
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);

    let console_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_writer(std::io::stdout);

    // Respect RUST_LOG if set; otherwise info for our crate and dependencies
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wine_quality=info,info"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();

    // Keep the writer alive for the whole process so logs are flushed on exit
    std::mem::forget(_guard);
}
