use std::path::PathBuf;
use std::time::Duration;

use kdshell_config::Config;
use kdshell_target::ConnectionOptions;

/// The paths the session needs from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub source_root: PathBuf,
    pub symbol_output_root: PathBuf,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            source_root: config.paths.source_root.clone(),
            symbol_output_root: config.paths.symbol_output_root.clone(),
        }
    }
}

pub(crate) fn connection_options(config: &Config) -> ConnectionOptions {
    ConnectionOptions {
        connect_timeout: Duration::from_millis(config.connection.connect_timeout_ms),
        close_timeout: Duration::from_millis(config.connection.close_timeout_ms),
    }
}
