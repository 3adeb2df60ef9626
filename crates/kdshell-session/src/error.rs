use kdshell_platform::PlatformError;
use kdshell_target::{ConnectionError, TransportError};
use kdshell_views::ViewError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unknown command {0:?} (try `help`)")]
    UnknownCommand(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("invalid {what}: {value:?}")]
    InvalidArgument { what: &'static str, value: String },

    #[error("nothing to copy")]
    NothingToCopy,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    View(#[from] ViewError),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

impl SessionError {
    /// User-correctable problems; everything else is reported as an error.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            SessionError::UnknownCommand(_)
                | SessionError::Usage(_)
                | SessionError::InvalidArgument { .. }
                | SessionError::NothingToCopy
                | SessionError::Connection(ConnectionError::NotConnected)
                | SessionError::View(
                    ViewError::UnknownType(_)
                        | ViewError::UnknownFloating(_)
                        | ViewError::SourceFileNotFound(_)
                )
        )
    }
}
