use std::path::PathBuf;

use thiserror::Error;

use crate::workspace::FloatingId;

#[derive(Debug, Error)]
pub enum ViewError {
    /// A view type could not be constructed.
    #[error("cannot instantiate view {type_id}: {reason}")]
    Instantiation { type_id: String, reason: String },

    #[error("unknown view type {0:?}")]
    UnknownType(String),

    #[error("no floating view {0}")]
    UnknownFloating(FloatingId),

    #[error("source file not found: {}", .0.display())]
    SourceFileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
