//! 日志初始化
//!
//! Installs a `tracing-subscriber` fmt subscriber filtered by `RUST_LOG`
//! and forwards `log` records from dependencies into it.

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_DIRECTIVE: &str = "info";

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("A global tracing subscriber is already installed: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
    #[error("A global logger is already installed: {0}")]
    Log(#[from] tracing_log::log::SetLoggerError),
}

/// Install the subscriber with `default_directive` as fallback filter.
pub fn try_init_with(default_directive: &str) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;
    Ok(())
}

pub fn try_init() -> Result<(), LoggingError> {
    try_init_with(DEFAULT_DIRECTIVE)
}

/// Like [`try_init_with`], ignoring an already installed subscriber.
pub fn init_with(default_directive: &str) {
    if let Err(e) = try_init_with(default_directive) {
        tracing::debug!("Logging not initialized: {}", e);
    }
}

pub fn init() {
    init_with(DEFAULT_DIRECTIVE);
}

/// Initialise logging once.
///
/// ```rust
/// smarticle_sdk::init_logger!();
/// smarticle_sdk::init_logger!("smarticle_driver=debug");
/// ```
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::logging::init()
    };
    ($directive:expr) => {
        $crate::logging::init_with($directive)
    };
}
