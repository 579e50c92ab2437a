//! Log subscriber setup
//!
//! The collector only emits `tracing` events. A process that has no
//! subscriber of its own installs one from the `[log]` section here.

use tasklog_config::{LogConfig, LogFormat};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

use crate::error::Result;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Install the global subscriber described by `config`
///
/// # Errors
///
/// Returns `LoggingInit` if a global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    install(config, false)
}

/// Same as [`init_logging`], writing through the test harness capture
pub fn init_test_logging(config: &LogConfig) -> Result<()> {
    install(config, true)
}

fn install(config: &LogConfig, test_writer: bool) -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt_layer(config.format, test_writer))
        .with(env_filter(config))
        .try_init()?;
    Ok(())
}

fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_new(config.filter_directive()).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn fmt_layer(format: LogFormat, test_writer: bool) -> BoxedLayer {
    let layer = fmt::layer().with_target(true).with_thread_ids(false);
    match (format, test_writer) {
        (LogFormat::Console, false) => Box::new(layer),
        (LogFormat::Console, true) => Box::new(layer.with_test_writer()),
        (LogFormat::Json, false) => Box::new(layer.json()),
        (LogFormat::Json, true) => Box::new(layer.json().with_test_writer()),
    }
}
