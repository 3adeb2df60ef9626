//! Capabilities a view can opt into, and the handles injected for them.
//!
//! Handles never call back into the coordinator directly. Anything that
//! would mutate the workspace or the connection is posted as a
//! [`ViewRequest`] and applied on the coordinator's next pump.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use kdshell_symbols::{SourceLocation, SymbolContext, SymbolStatus};
use kdshell_target::{ConnectionState, Notification};
use tokio::sync::{mpsc, watch};

/// Work a view asks the coordinator to do on its behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewRequest {
    /// Raw command text for the target's interactive console.
    Interactive(String),
    FocusAddress(u64),
    OpenSourceFile(PathBuf),
}

/// Which capabilities a view type declares.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CapabilitySet {
    pub connection: bool,
    pub symbols: bool,
    pub shell: bool,
}

impl CapabilitySet {
    pub fn is_empty(&self) -> bool {
        !(self.connection || self.symbols || self.shell)
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (self.connection, "connection"),
            (self.symbols, "symbols"),
            (self.shell, "shell"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();
        if names.is_empty() {
            f.write_str("-")
        } else {
            f.write_str(&names.join(","))
        }
    }
}

/// Read access to the connection state plus a way to send console input.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    state: watch::Receiver<ConnectionState>,
    requests: mpsc::UnboundedSender<ViewRequest>,
}

impl ConnectionHandle {
    pub fn new(
        state: watch::Receiver<ConnectionState>,
        requests: mpsc::UnboundedSender<ViewRequest>,
    ) -> Self {
        Self { state, requests }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    /// Queue console text for the target. Returns `false` once the
    /// coordinator is gone.
    pub fn send_interactive(&self, text: impl Into<String>) -> bool {
        self.requests
            .send(ViewRequest::Interactive(text.into()))
            .is_ok()
    }
}

/// Shared access to the session's [`SymbolContext`].
#[derive(Clone)]
pub struct SymbolsHandle(Rc<RefCell<SymbolContext>>);

impl SymbolsHandle {
    pub fn new(context: Rc<RefCell<SymbolContext>>) -> Self {
        Self(context)
    }

    /// Resolve `address`; unknown if the context is busy.
    pub fn resolve(&self, address: u64) -> SourceLocation {
        match self.0.try_borrow_mut() {
            Ok(mut context) => context.resolve(address),
            Err(_) => {
                tracing::debug!(address = format_args!("{address:#x}"), "symbol context busy");
                SourceLocation::unknown()
            }
        }
    }

    pub fn status(&self, base: u64) -> SymbolStatus {
        self.0
            .try_borrow()
            .map(|context| context.status(base))
            .unwrap_or(SymbolStatus::NotLoaded)
    }
}

impl fmt::Debug for SymbolsHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SymbolsHandle").finish()
    }
}

/// Workspace actions a view may request.
#[derive(Debug, Clone)]
pub struct ShellHandle {
    requests: mpsc::UnboundedSender<ViewRequest>,
}

impl ShellHandle {
    pub fn new(requests: mpsc::UnboundedSender<ViewRequest>) -> Self {
        Self { requests }
    }

    pub fn focus_address(&self, address: u64) -> bool {
        self.requests.send(ViewRequest::FocusAddress(address)).is_ok()
    }

    pub fn open_source_file(&self, path: impl Into<PathBuf>) -> bool {
        self.requests
            .send(ViewRequest::OpenSourceFile(path.into()))
            .is_ok()
    }
}

/// Everything the registry can inject.
#[derive(Debug, Clone)]
pub struct Services {
    pub connection: ConnectionHandle,
    pub symbols: SymbolsHandle,
    pub shell: ShellHandle,
}

/// Copy availability reported by copy-capable views to the workspace.
#[derive(Debug, Clone, Default)]
pub struct CopySink(Rc<Cell<bool>>);

impl CopySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, enabled: bool) {
        self.0.set(enabled);
    }

    pub fn enabled(&self) -> bool {
        self.0.get()
    }
}

pub trait UsesConnection {
    fn set_connection(&mut self, connection: ConnectionHandle);

    /// Called for every notification, after modules and symbols are updated.
    fn on_notification(&mut self, _notification: &Notification) {}
}

pub trait UsesSymbols {
    fn set_symbols(&mut self, symbols: SymbolsHandle);
}

pub trait UsesShell {
    fn set_shell(&mut self, shell: ShellHandle);
}

pub trait CanCopy {
    fn can_copy(&self) -> bool;

    /// Text for the clipboard, if anything is selected.
    fn copy_selection(&self) -> Option<String>;

    /// Report copy availability changes to `sink` from now on.
    fn subscribe_copy(&mut self, sink: CopySink);
}
