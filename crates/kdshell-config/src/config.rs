use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Log verbosity level.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Where sources and symbol images live.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root that relative source file names are joined onto.
    #[serde(default)]
    pub source_root: PathBuf,
    /// Build output tree searched for module images.
    #[serde(default)]
    pub symbol_output_root: PathBuf,
}

/// Transport timing and serial defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// How long a new connection waits for the previous one to drain.
    #[serde(default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,
    #[serde(default = "default_baud")]
    pub default_baud: u32,
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_close_timeout_ms() -> u64 {
    1_000
}

fn default_baud() -> u32 {
    115_200
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            close_timeout_ms: default_close_timeout_ms(),
            default_baud: default_baud(),
        }
    }
}

/// View discovery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewsConfig {
    /// Instantiate auto-start views right after discovery.
    #[serde(default = "default_true")]
    pub auto_start: bool,
    /// View type ids left out of discovery.
    #[serde(default)]
    pub disabled: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            auto_start: true,
            disabled: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
    /// Overrides the default file under the platform log dir.
    pub file: Option<PathBuf>,
}

/// Top-level kdshell configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub views: ViewsConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = Config::default();
        assert_eq!(cfg.paths.source_root, PathBuf::new());
        assert_eq!(cfg.connection.connect_timeout_ms, 5_000);
        assert_eq!(cfg.connection.close_timeout_ms, 1_000);
        assert_eq!(cfg.connection.default_baud, 115_200);
        assert!(cfg.views.auto_start);
        assert!(cfg.views.disabled.is_empty());
        assert_eq!(cfg.log.level, LogLevel::Info);
        assert!(cfg.log.file.is_none());
    }

    #[test]
    fn parse_partial_sections() {
        let input = r#"
[paths]
source_root = "/src/reactos"

[connection]
default_baud = 57600

[views]
disabled = ["modules"]
"#;
        let cfg: Config = toml::from_str(input).expect("parse toml");
        assert_eq!(cfg.paths.source_root, PathBuf::from("/src/reactos"));
        assert_eq!(cfg.paths.symbol_output_root, PathBuf::new());
        assert_eq!(cfg.connection.default_baud, 57_600);
        assert_eq!(cfg.connection.connect_timeout_ms, 5_000);
        assert_eq!(cfg.views.disabled, vec!["modules".to_string()]);
        assert!(cfg.views.auto_start);
    }

    #[test]
    fn serde_roundtrip_preserves_values() {
        let cfg = Config {
            paths: PathsConfig {
                source_root: "/src".into(),
                symbol_output_root: "/out".into(),
            },
            connection: ConnectionConfig {
                connect_timeout_ms: 250,
                close_timeout_ms: 50,
                default_baud: 9_600,
            },
            views: ViewsConfig {
                auto_start: false,
                disabled: vec!["console".into()],
            },
            log: LogConfig {
                level: LogLevel::Debug,
                file: Some("/tmp/kdshell.log".into()),
            },
        };
        let text = toml::to_string(&cfg).expect("serialize");
        let back: Config = toml::from_str(&text).expect("deserialize");
        assert_eq!(cfg, back);
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg: Config = toml::from_str("").expect("parse empty toml");
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn log_level_names() {
        assert_eq!(LogLevel::Warn.as_str(), "warn");
        assert_eq!(LogLevel::default().as_str(), "info");
    }
}
