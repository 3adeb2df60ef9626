//! Pluggable inspection views and the workspace that hosts them.

pub mod builtin;
pub mod capability;
pub mod error;
pub mod registry;
pub mod source;
pub mod view;
pub mod workspace;

pub use builtin::{builtin_views, ConsoleView, LocationView, ModulesView, RegistersView};
pub use capability::{
    CanCopy, CapabilitySet, ConnectionHandle, CopySink, Services, ShellHandle, SymbolsHandle,
    UsesConnection, UsesShell, UsesSymbols, ViewRequest,
};
pub use error::ViewError;
pub use registry::{MenuAction, ViewDescriptor, ViewRegistration, ViewRegistry};
pub use source::SourceView;
pub use view::{HostedView, View, ViewId};
pub use workspace::{FloatingId, TabInfo, Workspace};
