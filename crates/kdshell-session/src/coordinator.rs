//! Composition root of a debug session.
//!
//! The coordinator owns the connection, the module registry, the symbol
//! context and the workspace, and is the only thing that mutates them. Link
//! tasks and views talk to it through two queues that are drained by
//! [`SessionCoordinator::pump`] and [`SessionCoordinator::drain_pending`].

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use kdshell_config::Config;
use kdshell_core::{StatusEntry, StatusLevel, StatusLog};
use kdshell_platform::Clipboard;
use kdshell_symbols::{
    DwarfSymbolProvider, ModuleRegistry, SourceLocation, SymbolContext, SymbolProvider,
    SymbolStatus,
};
use kdshell_target::{
    ConnectionError, ConnectionManager, ConnectionMode, Connector, LinkMessage, LinkPhase,
    Notification, SystemConnector, TransportError,
};
use kdshell_views::{
    builtin_views, ConnectionHandle, ConsoleView, Services, ShellHandle, SymbolsHandle, ViewId,
    ViewRegistration, ViewRegistry, ViewRequest, Workspace,
};
use tokio::sync::mpsc;

use crate::command::{ShellCommand, COMMANDS};
use crate::error::SessionError;
use crate::settings::{connection_options, Settings};
use crate::status::StatusLine;

/// Replaceable outside world of a session.
pub struct Collaborators {
    pub connector: Arc<dyn Connector>,
    pub symbols: Box<dyn SymbolProvider>,
    pub clipboard: Box<dyn Clipboard>,
    pub views: Vec<ViewRegistration>,
}

impl Collaborators {
    /// Real transports, DWARF symbols and the built-in views.
    pub fn system(clipboard: Box<dyn Clipboard>) -> Self {
        Self {
            connector: Arc::new(SystemConnector),
            symbols: Box::new(DwarfSymbolProvider::default()),
            clipboard,
            views: builtin_views(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Disconnected,
    Connecting,
    Connected { running: bool },
}

/// What the shell should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Output(Vec<String>),
    /// Re-read configuration and pass it to
    /// [`SessionCoordinator::apply_config`].
    ReloadSettings,
    Quit,
}

enum Input {
    Link(LinkMessage),
    Request(ViewRequest),
}

pub struct SessionCoordinator {
    connection: ConnectionManager,
    link_rx: mpsc::UnboundedReceiver<LinkMessage>,
    requests_rx: mpsc::UnboundedReceiver<ViewRequest>,
    modules: ModuleRegistry,
    symbols: Rc<RefCell<SymbolContext>>,
    services: Services,
    registry: ViewRegistry,
    workspace: Workspace,
    settings: Settings,
    default_baud: u32,
    clipboard: Box<dyn Clipboard>,
    status: StatusLog,
    unseen: Vec<StatusEntry>,
    status_line: StatusLine,
}

impl SessionCoordinator {
    pub fn new(config: &Config, parts: Collaborators) -> Self {
        let settings = Settings::from(config);
        let (connection, link_rx) =
            ConnectionManager::new(parts.connector, connection_options(config));
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();

        let symbols = Rc::new(RefCell::new(SymbolContext::new(
            parts.symbols,
            settings.symbol_output_root.clone(),
        )));
        let services = Services {
            connection: ConnectionHandle::new(connection.subscribe(), requests_tx.clone()),
            symbols: SymbolsHandle::new(Rc::clone(&symbols)),
            shell: ShellHandle::new(requests_tx),
        };
        let registry = ViewRegistry::discover(parts.views, &config.views.disabled);
        let workspace = Workspace::new(settings.source_root.clone());

        let mut coordinator = Self {
            connection,
            link_rx,
            requests_rx,
            modules: ModuleRegistry::new(),
            symbols,
            services,
            registry,
            workspace,
            settings,
            default_baud: config.connection.default_baud,
            clipboard: parts.clipboard,
            status: StatusLog::new(),
            unseen: Vec::new(),
            status_line: StatusLine::default(),
        };

        if config.views.auto_start {
            for type_id in coordinator.registry.auto_start_ids() {
                if let Err(err) = coordinator.new_view(type_id) {
                    coordinator.report(StatusLevel::Error, err.to_string());
                }
            }
        }
        tracing::info!(
            view_types = coordinator.registry.descriptors().len(),
            tabs = coordinator.workspace.len(),
            "session ready"
        );
        coordinator.recompose_status();
        coordinator
    }

    pub fn phase(&self) -> SessionPhase {
        match self.connection.phase() {
            LinkPhase::Idle => SessionPhase::Disconnected,
            LinkPhase::Connecting => SessionPhase::Connecting,
            LinkPhase::Open => SessionPhase::Connected {
                running: self.connection.state().running,
            },
        }
    }

    pub fn status_line(&self) -> &StatusLine {
        &self.status_line
    }

    pub fn status_log(&self) -> &StatusLog {
        &self.status
    }

    /// Status entries added since the last call.
    pub fn take_status_updates(&mut self) -> Vec<StatusEntry> {
        std::mem::take(&mut self.unseen)
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    pub fn symbol_status(&self, base: u64) -> SymbolStatus {
        self.symbols.borrow().status(base)
    }

    pub fn registry(&self) -> &ViewRegistry {
        &self.registry
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn workspace_mut(&mut self) -> &mut Workspace {
        &mut self.workspace
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Wait for the next link message or view request, handle it, then
    /// everything else already queued.
    pub async fn pump(&mut self) {
        let input = tokio::select! {
            Some(message) = self.link_rx.recv() => Input::Link(message),
            Some(request) = self.requests_rx.recv() => Input::Request(request),
            else => return,
        };
        match input {
            Input::Link(message) => self.handle_link(message),
            Input::Request(request) => self.handle_request(request),
        }
        self.drain_pending();
    }

    /// Handle everything queued without waiting. Returns how many items
    /// were processed.
    pub fn drain_pending(&mut self) -> usize {
        let mut handled = 0;
        loop {
            if let Ok(message) = self.link_rx.try_recv() {
                self.handle_link(message);
            } else if let Ok(request) = self.requests_rx.try_recv() {
                self.handle_request(request);
            } else {
                return handled;
            }
            handled += 1;
        }
    }

    fn handle_link(&mut self, message: LinkMessage) {
        if let Err(err) = self.connection.accept(message) {
            self.report(StatusLevel::Error, err.to_string());
        }
        self.dispatch_notifications();
    }

    fn handle_request(&mut self, request: ViewRequest) {
        tracing::debug!(?request, "view request");
        match request {
            ViewRequest::Interactive(text) => {
                if let Err(err) = self.connection.send_interactive(&text) {
                    self.report(StatusLevel::Warning, err.to_string());
                }
            }
            ViewRequest::FocusAddress(address) => {
                self.workspace.focus_address(address, &self.services.symbols);
            }
            ViewRequest::OpenSourceFile(path) => {
                if let Err(err) = self.workspace.open_source_file(&path) {
                    self.report(StatusLevel::Warning, err.to_string());
                }
            }
        }
    }

    /// Deliver queued connection notifications: modules and symbols first,
    /// then views, then the status line.
    fn dispatch_notifications(&mut self) {
        for notification in self.connection.take_notifications() {
            self.track(&notification);
            for hosted in self.workspace.views_mut() {
                if let Some(user) = hosted.view_mut().as_connection_user() {
                    user.on_notification(&notification);
                }
            }
            self.recompose_status();
        }
    }

    fn track(&mut self, notification: &Notification) {
        match notification {
            Notification::ModeChanged(mode) if *mode != ConnectionMode::Disconnected => {
                self.modules.clear();
                self.symbols.borrow_mut().clear();
                self.report(StatusLevel::Info, format!("connected ({mode})"));
            }
            Notification::ModuleChanged { base, name } => {
                let change = self
                    .symbols
                    .borrow_mut()
                    .track(&mut self.modules, *base, name);
                if change.needs_symbols().is_some() {
                    if let SymbolStatus::Failed(reason) = self.symbol_status(*base) {
                        self.report(
                            StatusLevel::Warning,
                            format!("no symbols for {name}: {reason}"),
                        );
                    }
                }
            }
            _ => {}
        }
    }

    fn recompose_status(&mut self) {
        let state = self.connection.state().clone();
        let location = if state.is_stopped() {
            self.workspace
                .focus_address(u64::from(state.registers.eip), &self.services.symbols)
        } else if state.is_connected() {
            self.workspace.last_location().clone()
        } else {
            SourceLocation::unknown()
        };
        self.status_line = StatusLine {
            mode: state.mode,
            running: state.running,
            location,
        };
    }

    fn report(&mut self, level: StatusLevel, text: impl Into<String>) {
        let entry = StatusEntry::new(level, text);
        match level {
            StatusLevel::Info => tracing::debug!(status = entry.text()),
            StatusLevel::Warning | StatusLevel::Error => tracing::warn!(status = entry.text()),
        }
        self.status.push(level, entry.text());
        self.unseen.push(entry);
    }

    /// Run one shell command. Failures become status entries.
    pub fn execute(&mut self, command: ShellCommand) -> CommandOutcome {
        tracing::debug!(?command, "executing");
        let outcome = match command {
            ShellCommand::ReloadSettings => CommandOutcome::ReloadSettings,
            ShellCommand::Quit => {
                self.shutdown();
                CommandOutcome::Quit
            }
            command => match self.run(command) {
                Ok(lines) => CommandOutcome::Output(lines),
                Err(err) => {
                    let level = if err.is_warning() {
                        StatusLevel::Warning
                    } else {
                        StatusLevel::Error
                    };
                    self.report(level, err.to_string());
                    CommandOutcome::Output(Vec::new())
                }
            },
        };
        self.drain_pending();
        outcome
    }

    /// Parse and run a command line.
    pub fn execute_line(&mut self, line: &str) -> CommandOutcome {
        match line.parse::<ShellCommand>() {
            Ok(command) => self.execute(command),
            Err(err) => {
                self.report(StatusLevel::Warning, err.to_string());
                CommandOutcome::Output(Vec::new())
            }
        }
    }

    fn run(&mut self, command: ShellCommand) -> Result<Vec<String>, SessionError> {
        let mut out = Vec::new();
        match command {
            ShellCommand::ConnectTcp { host, port } => {
                self.connect(|c| c.start_tcp(&host, port))?;
            }
            ShellCommand::ConnectSerial { port, baud } => {
                let baud = baud.unwrap_or(self.default_baud);
                self.connect(|c| c.start_serial(&port, baud))?;
            }
            ShellCommand::ConnectPipe { name, mode } => {
                self.connect(|c| c.start_pipe(&name, mode))?;
            }
            ShellCommand::Disconnect => {
                if self.connection.phase() == LinkPhase::Idle {
                    return Err(ConnectionError::NotConnected.into());
                }
                self.connection.close(false);
                self.dispatch_notifications();
                self.report(StatusLevel::Info, "connection closed");
            }
            ShellCommand::Break => self.connection.break_in()?,
            ShellCommand::Step => self.connection.step()?,
            ShellCommand::Next => self.connection.next()?,
            ShellCommand::Continue => self.connection.continue_execution()?,
            ShellCommand::Input(text) => self.input(&text)?,
            ShellCommand::Open(path) => {
                let id = self.workspace.open_source_file(&path)?;
                out.push(format!("opened {} as {id}", path.display()));
            }
            ShellCommand::Views => out = self.describe_views(),
            ShellCommand::NewView(type_id) => {
                let id = self.new_view(&type_id)?;
                out.push(format!("opened {type_id} as {id}"));
            }
            ShellCommand::Tab(index) => {
                if !self.workspace.select_tab(index) {
                    return Err(bad_tab(index));
                }
            }
            ShellCommand::NextTab => self.workspace.focus_next(),
            ShellCommand::PrevTab => self.workspace.focus_prev(),
            ShellCommand::Close(None) => match self.workspace.close_active_view() {
                Some(id) => out.push(format!("closed {id}")),
                None => out.push("nothing to close".into()),
            },
            ShellCommand::Close(Some(index)) => {
                let id = self.workspace.close_tab(index).ok_or_else(|| bad_tab(index))?;
                out.push(format!("closed {id}"));
            }
            ShellCommand::Detach => match self.workspace.detach_to_floating() {
                Some(id) => out.push(format!("detached as floating {id}")),
                None => out.push("nothing to detach".into()),
            },
            ShellCommand::Redock(id) => {
                let view = self.workspace.redock(id)?;
                out.push(format!("redocked {view}"));
            }
            ShellCommand::CloseFloating(id) => {
                let view = self.workspace.close_floating(id)?;
                out.push(format!("closed {view}"));
            }
            ShellCommand::Show => match self.workspace.active() {
                Some(hosted) => {
                    out.push(format!("[{}]", hosted.view().title()));
                    out.extend(hosted.view().render());
                }
                None => out.push("(no views)".into()),
            },
            ShellCommand::Pick(index) => {
                let picked = self
                    .workspace
                    .active_mut()
                    .is_some_and(|hosted| hosted.view_mut().pick(index));
                if !picked {
                    return Err(SessionError::InvalidArgument {
                        what: "entry",
                        value: index.to_string(),
                    });
                }
            }
            ShellCommand::Copy => {
                let text = self
                    .workspace
                    .copy_active()
                    .ok_or(SessionError::NothingToCopy)?;
                self.clipboard.set(&text)?;
                out.push(format!("copied {} characters", text.chars().count()));
            }
            ShellCommand::Status => {
                out.push(self.status_line.to_string());
                out.extend(self.status.tail(10).map(ToString::to_string));
            }
            ShellCommand::Help => {
                out.extend(
                    COMMANDS
                        .iter()
                        .map(|(usage, about)| format!("{usage:<38} {about}")),
                );
            }
            ShellCommand::ReloadSettings | ShellCommand::Quit => {}
        }
        Ok(out)
    }

    fn connect(
        &mut self,
        start: impl FnOnce(&mut ConnectionManager) -> Result<(), TransportError>,
    ) -> Result<(), SessionError> {
        let result = start(&mut self.connection);
        // Closing the previous link produces notifications either way.
        self.dispatch_notifications();
        result?;
        if let Some(target) = self.connection.target() {
            let text = format!("connecting to {target}");
            self.report(StatusLevel::Info, text);
        }
        Ok(())
    }

    /// Send console text, through the console view when one is open so it
    /// shows up in the transcript.
    pub fn input(&mut self, text: &str) -> Result<(), SessionError> {
        let console = self
            .workspace
            .views_mut()
            .find_map(|hosted| hosted.downcast_mut::<ConsoleView>());
        match console {
            Some(console) => {
                if !console.submit(text) {
                    return Err(ConnectionError::NotConnected.into());
                }
            }
            None => self.connection.send_interactive(text)?,
        }
        Ok(())
    }

    pub fn new_view(&mut self, type_id: &str) -> Result<ViewId, SessionError> {
        let hosted = self.registry.instantiate(type_id, &self.services)?;
        Ok(self.workspace.add_view(hosted))
    }

    fn describe_views(&self) -> Vec<String> {
        let mut out = vec!["types:".to_string()];
        out.extend(self.registry.descriptors().iter().map(|d| {
            let auto = if d.auto_start { " auto" } else { "" };
            format!("  {:<10} [{}]{auto}", d.type_id, d.capabilities)
        }));
        out.push("new view:".into());
        out.extend(
            self.registry
                .menu()
                .into_iter()
                .map(|action| format!("  {:<14} new-view {}", action.label, action.type_id)),
        );
        out.push("tabs:".into());
        out.extend(self.workspace.tabs().into_iter().map(|tab| {
            let marker = if tab.active { '*' } else { ' ' };
            format!("{marker} {:>2} {} ({}) {}", tab.index, tab.title, tab.type_id, tab.id)
        }));
        let floating: Vec<String> = self
            .workspace
            .floating()
            .map(|(id, hosted)| format!("  {:>2} {} {}", id, hosted.view().title(), hosted.id()))
            .collect();
        if !floating.is_empty() {
            out.push("floating:".into());
            out.extend(floating);
        }
        out
    }

    /// Point the workspace and the symbol context at new roots and reload
    /// symbols for every known module.
    pub fn apply_settings(&mut self, settings: Settings) {
        self.workspace.set_source_root(settings.source_root.clone());
        let loaded = self
            .symbols
            .borrow_mut()
            .set_output_root(settings.symbol_output_root.clone(), self.modules.iter());
        let total = self.modules.len();
        self.settings = settings;
        self.report(
            StatusLevel::Info,
            format!("settings applied, symbols for {loaded} of {total} modules"),
        );
        self.recompose_status();
    }

    /// Apply a freshly loaded configuration. Connection timing takes effect
    /// on the next connection.
    pub fn apply_config(&mut self, config: &Config) {
        self.connection.set_options(connection_options(config));
        self.default_baud = config.connection.default_baud;
        self.apply_settings(Settings::from(config));
    }

    /// Abort the link and deliver the resulting notifications.
    pub fn shutdown(&mut self) {
        self.connection.close(true);
        self.dispatch_notifications();
        tracing::info!("session shut down");
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        self.connection.close(true);
    }
}

fn bad_tab(index: usize) -> SessionError {
    SessionError::InvalidArgument {
        what: "tab index",
        value: index.to_string(),
    }
}
