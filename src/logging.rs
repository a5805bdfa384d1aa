use crate::config::LoggingConfig;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes console logging plus, when enabled, a daily-rotated JSON log file.
///
/// `RUST_LOG` wins over the configured level. Keep the returned guard alive
/// for the life of the process or buffered file output is lost on exit.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("hazard_feed=info,info"));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = if config.file && fs::create_dir_all(&config.dir).is_ok() {
        let file_appender = tracing_appender::rolling::daily(&config.dir, &config.file_prefix);
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
        let layer = fmt::layer().json().with_writer(non_blocking_writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // try_init so a second call (tests, embedding) leaves the first subscriber in place
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();

    guard
}
