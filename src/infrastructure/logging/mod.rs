// Logging module - Tracing setup and conversation log files
pub mod sink;

pub use sink::{LogSinks, TrafficLog};

use crate::domain::error::{RawComError, RawComResult};
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging system
///
/// `RUST_LOG` takes precedence; otherwise `level` applies to this crate, or debug
/// when `verbose` is set.
pub fn init_logging(level: &str, verbose: bool) -> RawComResult<()> {
    let level = if verbose { "debug" } else { level };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rawcom={},warn", level)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_level(true)
                .with_file(verbose)
                .with_line_number(verbose),
        )
        .try_init()
        .map_err(|e| RawComError::config(format!("Failed to initialize logging: {}", e)))?;

    tracing::debug!("RawCom logging system initialized");
    Ok(())
}
