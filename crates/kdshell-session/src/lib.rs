//! The debug session coordinator: connection, modules, symbols and views
//! wired together behind a command interface.

pub mod command;
pub mod coordinator;
pub mod error;
pub mod settings;
pub mod status;

pub use command::{ShellCommand, COMMANDS};
pub use coordinator::{Collaborators, CommandOutcome, SessionCoordinator, SessionPhase};
pub use error::SessionError;
pub use settings::Settings;
pub use status::StatusLine;
