use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Mutex;

use crate::error::PlatformError;

/// Destination for text copied out of a view.
pub trait Clipboard: Send + Sync {
    fn get(&self) -> Result<String, PlatformError>;
    fn set(&self, content: &str) -> Result<(), PlatformError>;
}

/// External program plus arguments.
struct Tool {
    program: &'static str,
    args: &'static [&'static str],
}

/// Clipboard backed by `pbcopy`/`pbpaste` on macOS and `xclip` on Linux.
pub struct SystemClipboard;

impl SystemClipboard {
    fn tool(paste: bool) -> Result<Tool, PlatformError> {
        let tool = match (std::env::consts::OS, paste) {
            ("macos", true) => Tool { program: "pbpaste", args: &[] },
            ("macos", false) => Tool { program: "pbcopy", args: &[] },
            ("linux", true) => Tool {
                program: "xclip",
                args: &["-selection", "clipboard", "-o"],
            },
            ("linux", false) => Tool {
                program: "xclip",
                args: &["-selection", "clipboard"],
            },
            (os, _) => {
                return Err(PlatformError::Unsupported {
                    os: os.into(),
                    detail: "no clipboard tool".into(),
                })
            }
        };
        Ok(tool)
    }
}

impl Clipboard for SystemClipboard {
    fn get(&self) -> Result<String, PlatformError> {
        let tool = Self::tool(true)?;
        let output = Command::new(tool.program)
            .args(tool.args)
            .output()
            .map_err(|e| PlatformError::Clipboard(format!("failed to run {}: {e}", tool.program)))?;
        if !output.status.success() {
            return Err(PlatformError::Clipboard(format!(
                "{} failed: {}",
                tool.program,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        String::from_utf8(output.stdout)
            .map_err(|e| PlatformError::Clipboard(format!("clipboard is not UTF-8: {e}")))
    }

    fn set(&self, content: &str) -> Result<(), PlatformError> {
        let tool = Self::tool(false)?;
        let mut child = Command::new(tool.program)
            .args(tool.args)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| PlatformError::Clipboard(format!("failed to spawn {}: {e}", tool.program)))?;

        // Drop stdin before waiting so the tool sees EOF.
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(content.as_bytes())
                .map_err(|e| PlatformError::Clipboard(format!("write to {}: {e}", tool.program)))?;
        }

        let status = child
            .wait()
            .map_err(|e| PlatformError::Clipboard(format!("wait on {}: {e}", tool.program)))?;
        if !status.success() {
            return Err(PlatformError::Clipboard(format!(
                "{} exited with {status}",
                tool.program
            )));
        }
        tracing::debug!(bytes = content.len(), tool = tool.program, "copied to clipboard");
        Ok(())
    }
}

/// Process-local clipboard, used by tests and when no system tool exists.
#[derive(Default)]
pub struct InMemoryClipboard {
    content: Mutex<String>,
}

impl InMemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clipboard for InMemoryClipboard {
    fn get(&self) -> Result<String, PlatformError> {
        self.content
            .lock()
            .map(|guard| guard.clone())
            .map_err(|e| PlatformError::Clipboard(format!("mutex poisoned: {e}")))
    }

    fn set(&self, content: &str) -> Result<(), PlatformError> {
        let mut guard = self
            .content
            .lock()
            .map_err(|e| PlatformError::Clipboard(format!("mutex poisoned: {e}")))?;
        content.clone_into(&mut guard);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_starts_empty() {
        assert_eq!(InMemoryClipboard::new().get().unwrap(), "");
    }

    #[test]
    fn in_memory_keeps_last_copy() {
        let cb = InMemoryClipboard::new();
        cb.set("eax=00000001").unwrap();
        cb.set("eax=00000001\nebx=00000002").unwrap();
        assert_eq!(cb.get().unwrap(), "eax=00000001\nebx=00000002");
    }

    #[test]
    fn in_memory_can_be_cleared() {
        let cb = InMemoryClipboard::new();
        cb.set("kd>").unwrap();
        cb.set("").unwrap();
        assert_eq!(cb.get().unwrap(), "");
    }

    #[test]
    fn in_memory_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<InMemoryClipboard>();
    }

    #[test]
    fn system_clipboard_round_trip_when_available() {
        let cb = SystemClipboard;
        let unique = format!("kdshell_test_{}", std::process::id());
        // Skipped silently on hosts without a clipboard tool.
        if cb.set(&unique).is_ok() {
            if let Ok(got) = cb.get() {
                assert_eq!(got, unique);
            }
        }
    }
}
