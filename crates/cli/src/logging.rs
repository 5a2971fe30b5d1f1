use std::io;

use tracing::Level;
use upsell_core::config::{AppConfig, LogFormat};

/// Installs the global subscriber. Logs go to stderr so stdout stays
/// reserved for command payloads.
pub fn init(config: &AppConfig) {
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder =
        tracing_subscriber::fmt().with_target(false).with_max_level(log_level).with_writer(io::stderr);

    // A subscriber may already be installed when commands run inside tests.
    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
