mod repl;

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use kdshell_config::{load_config, load_file, Config, ConfigError};
use kdshell_core::logging::{
    log_level_to_filter, prepare_log_file, resolve_log_path, DEFAULT_MAX_LOG_FILES,
    DEFAULT_MAX_LOG_SIZE,
};
use kdshell_platform::{PlatformPaths, Platform};
use kdshell_session::{Collaborators, SessionCoordinator};

/// Where configuration comes from for this run.
pub(crate) enum ConfigSource {
    /// `config.toml` in the platform config dir, overlaid by the nearest
    /// project `.kdshell/config.toml`.
    Layered {
        config_dir: PathBuf,
        project_dir: Option<PathBuf>,
    },
    /// A single file named on the command line.
    File(PathBuf),
}

impl ConfigSource {
    pub(crate) fn load(&self) -> Result<Config, ConfigError> {
        match self {
            ConfigSource::Layered {
                config_dir,
                project_dir,
            } => load_config(config_dir, project_dir.as_deref()),
            ConfigSource::File(path) => load_file(path),
        }
    }
}

/// Send `tracing` output to the log file. stdout belongs to the shell.
fn init_logging(config: &Config, log_dir: &Path) -> Result<PathBuf> {
    let log_path = resolve_log_path(config.log.file.as_deref(), log_dir);
    prepare_log_file(&log_path, DEFAULT_MAX_LOG_SIZE, DEFAULT_MAX_LOG_FILES)
        .with_context(|| format!("failed to prepare log file {}", log_path.display()))?;
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level_to_filter(config.log.level.as_str())));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Ok(log_path)
}

async fn run_shell(config_file: Option<PathBuf>) -> Result<()> {
    let platform = Platform::detect().context("failed to initialize platform")?;
    let (clipboard, paths) = platform.into_parts();

    let source = match config_file {
        Some(path) => ConfigSource::File(path),
        None => ConfigSource::Layered {
            config_dir: paths.config_dir(),
            project_dir: env::current_dir().ok(),
        },
    };
    let loaded = source.load();
    let config = loaded.as_ref().cloned().unwrap_or_default();

    let log_path = init_logging(&config, &paths.log_dir())?;
    if let Err(e) = &loaded {
        error!("config load failed, using defaults: {}", e);
        eprintln!("kdshell: config load failed, using defaults: {e}");
    }
    info!(log = %log_path.display(), "kdshell starting");

    let mut session = SessionCoordinator::new(&config, Collaborators::system(clipboard));
    repl::run(&mut session, &source).await?;

    info!("kdshell exited cleanly");
    Ok(())
}

#[tokio::main]
async fn main() {
    let config_file = env::args().nth(1).map(PathBuf::from);

    if let Err(e) = run_shell(config_file).await {
        eprintln!("kdshell: {:#}", e);
        std::process::exit(1);
    }
}
