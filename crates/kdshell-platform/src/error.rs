use thiserror::Error;

/// Errors from platform services.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("clipboard operation failed: {0}")]
    Clipboard(String),

    #[error("path error: {0}")]
    Path(String),

    #[error("unsupported on {os}: {detail}")]
    Unsupported { os: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clipboard_error_mentions_cause() {
        let err = PlatformError::Clipboard("xclip missing".into());
        assert_eq!(err.to_string(), "clipboard operation failed: xclip missing");
    }

    #[test]
    fn unsupported_names_os() {
        let err = PlatformError::Unsupported {
            os: "haiku".into(),
            detail: "clipboard".into(),
        };
        assert_eq!(err.to_string(), "unsupported on haiku: clipboard");
    }
}
