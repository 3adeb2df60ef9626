//! Shared plumbing for the kdshell workspace.
//!
//! Holds the log-file helpers used by the binary's `tracing-subscriber`
//! setup and the status log that backs the shell's status line history.

pub mod logging;
pub mod status;

pub use status::{StatusEntry, StatusLevel, StatusLog};
