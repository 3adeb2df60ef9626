pub mod clipboard;
pub mod error;
pub mod paths;

pub use clipboard::{Clipboard, InMemoryClipboard, SystemClipboard};
pub use error::PlatformError;
pub use paths::{DefaultPaths, PlatformPaths};

/// Platform services handed to the session at startup.
pub struct Platform {
    clipboard: Box<dyn Clipboard>,
    paths: Box<dyn PlatformPaths>,
}

impl Platform {
    pub fn new(clipboard: Box<dyn Clipboard>, paths: Box<dyn PlatformPaths>) -> Self {
        Self { clipboard, paths }
    }

    /// OS clipboard plus home-relative directories.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Path` if the home directory cannot be resolved.
    pub fn detect() -> Result<Self, PlatformError> {
        Ok(Self::new(
            Box::new(SystemClipboard),
            Box::new(DefaultPaths::new()?),
        ))
    }

    pub fn clipboard(&self) -> &dyn Clipboard {
        self.clipboard.as_ref()
    }

    pub fn paths(&self) -> &dyn PlatformPaths {
        self.paths.as_ref()
    }

    /// Give up the clipboard, e.g. to move it into the session coordinator.
    pub fn into_parts(self) -> (Box<dyn Clipboard>, Box<dyn PlatformPaths>) {
        (self.clipboard, self.paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_exposes_injected_clipboard() {
        let paths = DefaultPaths::with_home("/home/dev".into());
        let platform = Platform::new(Box::new(InMemoryClipboard::new()), Box::new(paths));
        platform.clipboard().set("eip=0x10001000").unwrap();
        assert_eq!(platform.clipboard().get().unwrap(), "eip=0x10001000");
        assert!(platform.paths().config_dir().ends_with(".config/kdshell"));
    }

    #[test]
    fn into_parts_keeps_services() {
        let paths = DefaultPaths::with_home("/home/dev".into());
        let platform = Platform::new(Box::new(InMemoryClipboard::new()), Box::new(paths));
        let (clipboard, paths) = platform.into_parts();
        clipboard.set("x").unwrap();
        assert_eq!(clipboard.get().unwrap(), "x");
        assert!(paths.log_dir().starts_with(paths.data_dir()));
    }
}
