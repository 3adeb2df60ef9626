use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::ConfigError;
use crate::merge::merge_configs;
use crate::validate::validate;

/// Written the first time the global config is looked up.
const DEFAULT_CONFIG_CONTENT: &str = r#"# kdshell configuration
# Uncomment and edit settings below to override defaults.

# [paths]
# source_root = "/path/to/reactos"
# symbol_output_root = "/path/to/output-MinGW-i386"

# [connection]
# connect_timeout_ms = 5000
# close_timeout_ms = 1000
# default_baud = 115200

# [views]
# auto_start = true
# disabled = []

# [log]
# level = "info"
"#;

/// Load and merge configuration.
///
/// Reads `config_dir/config.toml` (creating it with commented defaults when
/// missing), then the nearest `.kdshell/config.toml` at or above
/// `project_dir`, merges `defaults <- global <- project` and validates.
///
/// # Errors
///
/// Returns [`ConfigError`] on I/O, parse or validation failure.
pub fn load_config(config_dir: &Path, project_dir: Option<&Path>) -> Result<Config, ConfigError> {
    let global_path = config_dir.join("config.toml");

    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir)?;
    }

    if !global_path.exists() {
        std::fs::write(&global_path, DEFAULT_CONFIG_CONTENT)
            .map_err(|e| ConfigError::CreateDefault(e.to_string()))?;
        tracing::info!(path = %global_path.display(), "created default config");
    }

    let mut config = Config::default();

    let global_content = std::fs::read_to_string(&global_path)?;
    if has_non_comment_content(&global_content) {
        config = merge_configs(&config, &global_content)?;
    }

    if let Some(project_path) = project_dir.and_then(find_project_config) {
        tracing::debug!(path = %project_path.display(), "merging project config");
        let project_content = std::fs::read_to_string(&project_path)?;
        config = merge_configs(&config, &project_content)?;
    }

    check(&config)?;
    Ok(config)
}

/// Load a single explicit file over the defaults.
///
/// # Errors
///
/// `NotFound` if `path` does not exist, otherwise as [`load_from_str`].
pub fn load_file(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    load_from_str(&content)
}

/// Parse a TOML string directly into a validated [`Config`].
///
/// # Errors
///
/// Returns [`ConfigError`] on parse or validation failure.
pub fn load_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
    check(&config)?;
    Ok(config)
}

/// First validation error, if any.
fn check(config: &Config) -> Result<(), ConfigError> {
    validate(config).map_err(|errors| {
        for extra in errors.iter().skip(1) {
            tracing::warn!(%extra, "additional config problem");
        }
        errors
            .into_iter()
            .next()
            .unwrap_or_else(|| ConfigError::Validation {
                field: "unknown".to_string(),
                message: "validation failed".to_string(),
            })
    })
}

/// Walk from `start` upward looking for `.kdshell/config.toml`.
fn find_project_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(".kdshell").join("config.toml"))
        .find(|candidate| candidate.is_file())
}

fn has_non_comment_content(content: &str) -> bool {
    content.lines().any(|l| {
        let trimmed = l.trim();
        !trimmed.is_empty() && !trimmed.starts_with('#')
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn creates_default_when_missing() {
        let tmp = TempDir::new().unwrap();
        let cfg_dir = tmp.path().join("config");

        let config = load_config(&cfg_dir, None).unwrap();
        assert_eq!(config, Config::default());
        assert!(cfg_dir.join("config.toml").exists());
    }

    #[test]
    fn reads_existing_global() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("config.toml"),
            "[paths]\nsource_root = \"/src/reactos\"\n",
        )
        .unwrap();

        let config = load_config(tmp.path(), None).unwrap();
        assert_eq!(config.paths.source_root, PathBuf::from("/src/reactos"));
        assert_eq!(config.connection.default_baud, 115_200);
    }

    #[test]
    fn project_overrides_global() {
        let tmp = TempDir::new().unwrap();
        let cfg_dir = tmp.path().join("config");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(
            cfg_dir.join("config.toml"),
            "[connection]\ndefault_baud = 9600\nconnect_timeout_ms = 300\n",
        )
        .unwrap();

        let project = tmp.path().join("tree");
        std::fs::create_dir_all(project.join(".kdshell")).unwrap();
        std::fs::write(
            project.join(".kdshell").join("config.toml"),
            "[connection]\ndefault_baud = 57600\n",
        )
        .unwrap();

        let config = load_config(&cfg_dir, Some(&project)).unwrap();
        assert_eq!(config.connection.default_baud, 57_600);
        assert_eq!(config.connection.connect_timeout_ms, 300);
    }

    #[test]
    fn invalid_global_is_reported() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("config.toml"),
            "[connection]\nclose_timeout_ms = 0\n",
        )
        .unwrap();
        let err = load_config(tmp.path(), None).unwrap_err();
        assert!(err.to_string().contains("close_timeout_ms"));
    }

    #[test]
    fn load_file_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = load_file(&tmp.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn load_from_str_rejects_bad_toml() {
        assert!(matches!(load_from_str("{{bad}}"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn find_project_config_walks_up() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("repo");
        std::fs::create_dir_all(root.join(".kdshell")).unwrap();
        std::fs::write(root.join(".kdshell").join("config.toml"), "").unwrap();
        let deep = root.join("ntoskrnl").join("ke");
        std::fs::create_dir_all(&deep).unwrap();

        let found = find_project_config(&deep).unwrap();
        assert!(found.ends_with(".kdshell/config.toml"));
    }

    #[test]
    fn default_content_is_comment_only() {
        assert!(!has_non_comment_content(DEFAULT_CONFIG_CONTENT));
        assert!(has_non_comment_content("# c\n[log]\n"));
    }
}
