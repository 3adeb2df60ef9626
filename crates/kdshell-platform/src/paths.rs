use std::path::PathBuf;

use crate::error::PlatformError;

/// Directories used by kdshell.
pub trait PlatformPaths: Send + Sync {
    /// `~/.config/kdshell`
    fn config_dir(&self) -> PathBuf;
    /// `~/.local/share/kdshell`
    fn data_dir(&self) -> PathBuf;
    /// `<data_dir>/logs`
    fn log_dir(&self) -> PathBuf;
    fn home_dir(&self) -> PathBuf;
}

/// Home-relative directories resolved through the `dirs` crate.
pub struct DefaultPaths {
    home: PathBuf,
}

impl DefaultPaths {
    /// # Errors
    ///
    /// Returns `PlatformError::Path` if no home directory can be found.
    pub fn new() -> Result<Self, PlatformError> {
        let home = dirs::home_dir()
            .or_else(|| std::env::var_os("HOME").map(PathBuf::from))
            .ok_or_else(|| PlatformError::Path("could not determine home directory".into()))?;
        Ok(Self { home })
    }

    /// Paths rooted at an explicit home directory.
    pub fn with_home(home: PathBuf) -> Self {
        Self { home }
    }
}

impl PlatformPaths for DefaultPaths {
    fn config_dir(&self) -> PathBuf {
        self.home.join(".config").join("kdshell")
    }

    fn data_dir(&self) -> PathBuf {
        self.home.join(".local").join("share").join("kdshell")
    }

    fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }

    fn home_dir(&self) -> PathBuf {
        self.home.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed() -> DefaultPaths {
        DefaultPaths::with_home(PathBuf::from("/home/dev"))
    }

    #[test]
    fn config_dir_is_under_dot_config() {
        assert_eq!(fixed().config_dir(), PathBuf::from("/home/dev/.config/kdshell"));
    }

    #[test]
    fn log_dir_is_under_data_dir() {
        let paths = fixed();
        assert!(paths.log_dir().starts_with(paths.data_dir()));
        assert!(paths.log_dir().ends_with("logs"));
    }

    #[test]
    fn detected_home_is_not_empty() {
        if let Ok(paths) = DefaultPaths::new() {
            assert!(!paths.home_dir().as_os_str().is_empty());
        }
    }

    #[test]
    fn default_paths_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DefaultPaths>();
    }
}
