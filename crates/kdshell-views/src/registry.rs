//! Discovery and construction of view types.

use std::fmt;

use crate::capability::{CapabilitySet, Services};
use crate::error::ViewError;
use crate::view::{HostedView, View};

type Constructor = fn() -> Result<Box<dyn View>, ViewError>;

/// One entry of the registration table.
#[derive(Clone)]
pub struct ViewRegistration {
    type_id: &'static str,
    type_name: &'static str,
    label: Option<&'static str>,
    auto_start: bool,
    construct: Constructor,
}

impl ViewRegistration {
    pub fn new(type_id: &'static str, type_name: &'static str, construct: Constructor) -> Self {
        Self {
            type_id,
            type_name,
            label: None,
            auto_start: false,
            construct,
        }
    }

    /// Registration for a view type built with `Default`.
    pub fn of<T: View + Default>(type_id: &'static str) -> Self {
        Self::new(type_id, bare_type_name::<T>(), || Ok(Box::new(T::default())))
    }

    pub fn labeled(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn auto_start(mut self) -> Self {
        self.auto_start = true;
        self
    }

    pub fn type_id(&self) -> &'static str {
        self.type_id
    }
}

impl fmt::Debug for ViewRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewRegistration")
            .field("type_id", &self.type_id)
            .field("label", &self.label)
            .field("auto_start", &self.auto_start)
            .finish()
    }
}

fn bare_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// A discovered view type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewDescriptor {
    pub type_id: &'static str,
    pub display_name: String,
    pub auto_start: bool,
    pub capabilities: CapabilitySet,
}

/// "New view" menu entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuAction {
    pub label: String,
    pub type_id: &'static str,
}

#[derive(Debug, Default)]
pub struct ViewRegistry {
    descriptors: Vec<ViewDescriptor>,
    constructors: Vec<Constructor>,
}

impl ViewRegistry {
    /// Probe every registration not listed in `disabled`. Entries whose probe
    /// fails are logged and skipped.
    pub fn discover(table: Vec<ViewRegistration>, disabled: &[String]) -> Self {
        let mut registry = Self::default();

        for entry in table {
            if disabled.iter().any(|id| id == entry.type_id) {
                tracing::debug!(type_id = entry.type_id, "view type disabled");
                continue;
            }
            if registry.find(entry.type_id).is_some() {
                tracing::warn!(type_id = entry.type_id, "duplicate view registration ignored");
                continue;
            }

            let mut probe = match (entry.construct)() {
                Ok(view) => view,
                Err(err) => {
                    tracing::warn!(type_id = entry.type_id, error = %err, "skipping view type");
                    continue;
                }
            };

            let capabilities = CapabilitySet {
                connection: probe.as_connection_user().is_some(),
                symbols: probe.as_symbol_user().is_some(),
                shell: probe.as_shell_user().is_some(),
            };
            let title = probe.title();
            let display_name = match entry.label {
                Some(label) => label.to_string(),
                None if !title.is_empty() => title,
                None => entry.type_name.to_string(),
            };

            tracing::debug!(type_id = entry.type_id, %capabilities, "discovered view type");
            registry.descriptors.push(ViewDescriptor {
                type_id: entry.type_id,
                display_name,
                auto_start: entry.auto_start,
                capabilities,
            });
            registry.constructors.push(entry.construct);
        }

        registry
    }

    pub fn descriptors(&self) -> &[ViewDescriptor] {
        &self.descriptors
    }

    pub fn find(&self, type_id: &str) -> Option<&ViewDescriptor> {
        self.descriptors.iter().find(|d| d.type_id == type_id)
    }

    pub fn menu(&self) -> Vec<MenuAction> {
        self.descriptors
            .iter()
            .map(|d| MenuAction {
                label: d.display_name.clone(),
                type_id: d.type_id,
            })
            .collect()
    }

    /// Auto-start types in discovery order.
    pub fn auto_start_ids(&self) -> Vec<&'static str> {
        self.descriptors
            .iter()
            .filter(|d| d.auto_start)
            .map(|d| d.type_id)
            .collect()
    }

    /// Construct a view of `type_id` and inject its declared capabilities in
    /// the order connection, symbols, shell.
    pub fn instantiate(&self, type_id: &str, services: &Services) -> Result<HostedView, ViewError> {
        let index = self
            .descriptors
            .iter()
            .position(|d| d.type_id == type_id)
            .ok_or_else(|| ViewError::UnknownType(type_id.to_string()))?;
        let descriptor = &self.descriptors[index];
        let mut view = (self.constructors[index])()?;

        let caps = descriptor.capabilities;
        if caps.connection {
            if let Some(user) = view.as_connection_user() {
                user.set_connection(services.connection.clone());
            }
        }
        if caps.symbols {
            if let Some(user) = view.as_symbol_user() {
                user.set_symbols(services.symbols.clone());
            }
        }
        if caps.shell {
            if let Some(user) = view.as_shell_user() {
                user.set_shell(services.shell.clone());
            }
        }

        tracing::debug!(type_id = descriptor.type_id, "view instantiated");
        Ok(HostedView::new(descriptor.type_id, view))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{
        ConnectionHandle, ShellHandle, SymbolsHandle, UsesConnection, UsesShell, UsesSymbols,
    };
    use kdshell_symbols::{DwarfSymbolProvider, SymbolContext};
    use kdshell_target::ConnectionState;
    use std::any::Any;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tokio::sync::{mpsc, watch};

    #[derive(Default)]
    struct Plain;

    impl View for Plain {
        fn title(&self) -> String {
            String::new()
        }

        fn render(&self) -> Vec<String> {
            Vec::new()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    /// Counts every injection it receives.
    #[derive(Default)]
    struct Everything {
        calls: Vec<&'static str>,
    }

    impl View for Everything {
        fn title(&self) -> String {
            "Everything".into()
        }

        fn render(&self) -> Vec<String> {
            self.calls.iter().map(|c| c.to_string()).collect()
        }

        fn as_connection_user(&mut self) -> Option<&mut dyn UsesConnection> {
            Some(self)
        }

        fn as_symbol_user(&mut self) -> Option<&mut dyn UsesSymbols> {
            Some(self)
        }

        fn as_shell_user(&mut self) -> Option<&mut dyn UsesShell> {
            Some(self)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    impl UsesConnection for Everything {
        fn set_connection(&mut self, _connection: ConnectionHandle) {
            self.calls.push("connection");
        }
    }

    impl UsesSymbols for Everything {
        fn set_symbols(&mut self, _symbols: SymbolsHandle) {
            self.calls.push("symbols");
        }
    }

    impl UsesShell for Everything {
        fn set_shell(&mut self, _shell: ShellHandle) {
            self.calls.push("shell");
        }
    }

    fn broken() -> Result<Box<dyn View>, ViewError> {
        Err(ViewError::Instantiation {
            type_id: "broken".into(),
            reason: "no backing store".into(),
        })
    }

    fn services(root: &std::path::Path) -> Services {
        let (_state_tx, state_rx) = watch::channel(ConnectionState::default());
        let (req_tx, _req_rx) = mpsc::unbounded_channel();
        let context = SymbolContext::new(Box::new(DwarfSymbolProvider::new(root)), root);
        Services {
            connection: ConnectionHandle::new(state_rx, req_tx.clone()),
            symbols: SymbolsHandle::new(Rc::new(RefCell::new(context))),
            shell: ShellHandle::new(req_tx),
        }
    }

    fn table() -> Vec<ViewRegistration> {
        vec![
            ViewRegistration::of::<Plain>("plain").auto_start(),
            ViewRegistration::new("broken", "Broken", broken),
            ViewRegistration::of::<Everything>("everything").labeled("All The Things"),
        ]
    }

    #[test]
    fn failing_probe_is_skipped() {
        let registry = ViewRegistry::discover(table(), &[]);
        let ids: Vec<&str> = registry.descriptors().iter().map(|d| d.type_id).collect();
        assert_eq!(ids, vec!["plain", "everything"]);
    }

    #[test]
    fn capabilities_come_from_probe() {
        let registry = ViewRegistry::discover(table(), &[]);
        assert!(registry.find("plain").unwrap().capabilities.is_empty());
        let all = registry.find("everything").unwrap().capabilities;
        assert!(all.connection && all.symbols && all.shell);
    }

    #[test]
    fn menu_labels_fall_back_to_type_name() {
        let registry = ViewRegistry::discover(table(), &[]);
        let labels: Vec<String> = registry.menu().into_iter().map(|m| m.label).collect();
        assert_eq!(labels, vec!["Plain".to_string(), "All The Things".to_string()]);
    }

    #[test]
    fn probe_title_used_without_label() {
        let registry =
            ViewRegistry::discover(vec![ViewRegistration::of::<Everything>("everything")], &[]);
        assert_eq!(registry.find("everything").unwrap().display_name, "Everything");
    }

    #[test]
    fn disabled_types_are_not_discovered() {
        let registry = ViewRegistry::discover(table(), &["plain".to_string()]);
        assert!(registry.find("plain").is_none());
        assert!(registry.auto_start_ids().is_empty());
    }

    #[test]
    fn injection_happens_once_in_order() {
        let tmp = tempfile::TempDir::new().unwrap();
        let registry = ViewRegistry::discover(table(), &[]);
        let hosted = registry.instantiate("everything", &services(tmp.path())).unwrap();
        let view = hosted.downcast_ref::<Everything>().unwrap();
        assert_eq!(view.calls, vec!["connection", "symbols", "shell"]);
    }

    #[test]
    fn plain_view_gets_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let registry = ViewRegistry::discover(table(), &[]);
        let hosted = registry.instantiate("plain", &services(tmp.path())).unwrap();
        assert_eq!(hosted.type_id(), "plain");
    }

    #[test]
    fn unknown_type_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let registry = ViewRegistry::discover(table(), &[]);
        let err = registry.instantiate("memory", &services(tmp.path())).unwrap_err();
        assert!(matches!(err, ViewError::UnknownType(id) if id == "memory"));
        assert_eq!(registry.auto_start_ids(), vec!["plain"]);
    }
}
