use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SymbolError {
    #[error("no image named {name} under {}", root.display())]
    ImageNotFound { name: String, root: PathBuf },

    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
