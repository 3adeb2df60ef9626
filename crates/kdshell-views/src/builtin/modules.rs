use std::any::Any;
use std::collections::BTreeMap;

use kdshell_symbols::SymbolStatus;
use kdshell_target::{ConnectionMode, Notification};

use crate::capability::{ConnectionHandle, SymbolsHandle, UsesConnection, UsesSymbols};
use crate::view::View;

/// Modules reported by the target and whether their symbols loaded.
#[derive(Default)]
pub struct ModulesView {
    connection: Option<ConnectionHandle>,
    symbols: Option<SymbolsHandle>,
    modules: BTreeMap<u64, String>,
}

impl ModulesView {
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    fn symbol_column(&self, base: u64) -> String {
        match self.symbols.as_ref().map(|s| s.status(base)) {
            Some(SymbolStatus::Loaded(range)) => format!("symbols {range}"),
            Some(SymbolStatus::Failed(reason)) => format!("no symbols: {reason}"),
            Some(SymbolStatus::NotLoaded) | None => "no symbols".into(),
        }
    }
}

impl View for ModulesView {
    fn title(&self) -> String {
        "Modules".into()
    }

    fn render(&self) -> Vec<String> {
        if self.modules.is_empty() {
            let connected = self
                .connection
                .as_ref()
                .is_some_and(ConnectionHandle::is_connected);
            return vec![if connected { "(none reported)" } else { "(not connected)" }.into()];
        }
        self.modules
            .iter()
            .map(|(base, name)| format!("{base:#010x}  {name:<24} {}", self.symbol_column(*base)))
            .collect()
    }

    fn as_connection_user(&mut self) -> Option<&mut dyn UsesConnection> {
        Some(self)
    }

    fn as_symbol_user(&mut self) -> Option<&mut dyn UsesSymbols> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl UsesConnection for ModulesView {
    fn set_connection(&mut self, connection: ConnectionHandle) {
        self.connection = Some(connection);
    }

    fn on_notification(&mut self, notification: &Notification) {
        match notification {
            Notification::ModuleChanged { base, name } => {
                self.modules.insert(*base, name.clone());
            }
            // A new debuggee starts with no modules.
            Notification::ModeChanged(mode) if *mode != ConnectionMode::Disconnected => {
                self.modules.clear();
            }
            _ => {}
        }
    }
}

impl UsesSymbols for ModulesView {
    fn set_symbols(&mut self, symbols: SymbolsHandle) {
        self.symbols = Some(symbols);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::testing::harness;

    fn module(base: u64, name: &str) -> Notification {
        Notification::ModuleChanged {
            base,
            name: name.into(),
        }
    }

    #[test]
    fn lists_modules_with_symbol_status() {
        let h = harness();
        let mut view = ModulesView::default();
        view.set_symbols(h.services.symbols.clone());
        view.on_notification(&module(0x7c80_0000, "kernel32.dll"));
        view.on_notification(&module(0x1000_0000, "ntdll.dll"));

        let lines = view.render();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0x10000000  ntdll.dll"));
        assert!(lines[0].ends_with("no symbols"));
    }

    #[test]
    fn reload_replaces_name() {
        let mut view = ModulesView::default();
        view.on_notification(&module(0x1000_0000, "ntdll.dll"));
        view.on_notification(&module(0x1000_0000, "hal.dll"));
        assert_eq!(view.module_count(), 1);
        assert!(view.render()[0].contains("hal.dll"));
    }

    #[test]
    fn new_connection_clears_list() {
        let mut view = ModulesView::default();
        view.on_notification(&module(0x1000_0000, "ntdll.dll"));
        view.on_notification(&Notification::ModeChanged(ConnectionMode::Disconnected));
        assert_eq!(view.module_count(), 1);
        view.on_notification(&Notification::ModeChanged(ConnectionMode::Tcp));
        assert_eq!(view.module_count(), 0);
        assert_eq!(view.render(), vec!["(not connected)"]);
    }
}
