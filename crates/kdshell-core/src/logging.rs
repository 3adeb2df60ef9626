//! Log-file helpers.
//!
//! The `tracing-subscriber` setup itself lives in the binary crate; this
//! module only decides where the log goes and keeps it from growing
//! without bound.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Size at which the active log file is rotated (10 MB).
pub const DEFAULT_MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files kept next to the active one.
pub const DEFAULT_MAX_LOG_FILES: u32 = 5;

/// File name used when the configuration does not name a log file.
pub const DEFAULT_LOG_FILE_NAME: &str = "kdshell.log";

/// Pick the log file: the configured path wins, otherwise
/// `<log_dir>/kdshell.log`.
pub fn resolve_log_path(configured: Option<&Path>, log_dir: &Path) -> PathBuf {
    match configured {
        Some(path) => path.to_path_buf(),
        None => log_dir.join(DEFAULT_LOG_FILE_NAME),
    }
}

/// Create the parent directory of `log_path` and rotate the file if it has
/// reached `max_size`. Call once before opening the log for writing.
pub fn prepare_log_file(log_path: &Path, max_size: u64, max_files: u32) -> io::Result<()> {
    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    rotate_log_files(log_path, max_size, max_files)
}

/// Rotate `kdshell.log` → `kdshell.log.1` → … → `kdshell.log.<max_files>`,
/// dropping the oldest. No-op when the file is missing or still small.
pub fn rotate_log_files(log_path: &Path, max_size: u64, max_files: u32) -> io::Result<()> {
    if !log_path.exists() || fs::metadata(log_path)?.len() < max_size {
        return Ok(());
    }

    let oldest = rotated_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }

    for i in (1..max_files).rev() {
        let from = rotated_path(log_path, i);
        if from.exists() {
            fs::rename(&from, rotated_path(log_path, i + 1))?;
        }
    }

    fs::rename(log_path, rotated_path(log_path, 1))?;
    tracing::debug!(path = %log_path.display(), "rotated log file");
    Ok(())
}

/// Map a configured level name onto an `EnvFilter` directive. Unknown
/// names fall back to `info`.
pub fn log_level_to_filter(level: &str) -> &'static str {
    match level.to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    }
}

fn rotated_path(base: &Path, index: u32) -> PathBuf {
    let name = base.file_name().unwrap_or_default().to_string_lossy();
    let parent = base.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{}.{}", name, index))
}
