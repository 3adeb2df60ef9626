use std::any::Any;
use std::collections::VecDeque;

use kdshell_symbols::SourceLocation;
use kdshell_target::{ConnectionMode, Notification};

use crate::capability::{
    ConnectionHandle, ShellHandle, SymbolsHandle, UsesConnection, UsesShell, UsesSymbols,
};
use crate::view::View;

const MAX_STOPS: usize = 32;

/// Where the target stopped, newest first. Picking an entry asks the shell
/// to show that address again.
#[derive(Default)]
pub struct LocationView {
    connection: Option<ConnectionHandle>,
    symbols: Option<SymbolsHandle>,
    shell: Option<ShellHandle>,
    connected: bool,
    running: bool,
    stops: VecDeque<(u64, SourceLocation)>,
}

impl LocationView {
    pub fn stops(&self) -> impl Iterator<Item = &(u64, SourceLocation)> {
        self.stops.iter()
    }

    fn record_stop(&mut self, eip: u64) {
        if self.stops.front().is_some_and(|(last, _)| *last == eip) {
            return;
        }
        let location = self
            .symbols
            .as_ref()
            .map(|symbols| symbols.resolve(eip))
            .unwrap_or_else(SourceLocation::unknown);
        if self.stops.len() == MAX_STOPS {
            self.stops.pop_back();
        }
        self.stops.push_front((eip, location));
    }
}

impl View for LocationView {
    fn title(&self) -> String {
        "Location".into()
    }

    fn render(&self) -> Vec<String> {
        let mode = self
            .connection
            .as_ref()
            .map(|c| c.state().mode)
            .unwrap_or_default();
        let mut lines = vec![format!("{mode}, {} stops", self.stops.len())];
        lines.extend(
            self.stops
                .iter()
                .enumerate()
                .map(|(idx, (eip, location))| format!("{:>3}  {eip:#010x}  {location}", idx + 1)),
        );
        lines
    }

    /// `index` is 1-based, as rendered.
    fn pick(&mut self, index: usize) -> bool {
        let Some((eip, _)) = index.checked_sub(1).and_then(|idx| self.stops.get(idx)) else {
            return false;
        };
        self.shell
            .as_ref()
            .is_some_and(|shell| shell.focus_address(*eip))
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

impl UsesConnection for LocationView {
    fn set_connection(&mut self, connection: ConnectionHandle) {
        self.connected = connection.is_connected();
        self.connection = Some(connection);
    }

    fn on_notification(&mut self, notification: &Notification) {
        match notification {
            Notification::ModeChanged(mode) => {
                self.connected = *mode != ConnectionMode::Disconnected;
                self.running = false;
                if self.connected {
                    self.stops.clear();
                }
            }
            Notification::RunningChanged(running) => self.running = *running,
            Notification::RegistersChanged(registers) if self.connected && !self.running => {
                self.record_stop(u64::from(registers.eip));
            }
            _ => {}
        }
    }
}

impl UsesSymbols for LocationView {
    fn set_symbols(&mut self, symbols: SymbolsHandle) {
        self.symbols = Some(symbols);
    }
}

impl UsesShell for LocationView {
    fn set_shell(&mut self, shell: ShellHandle) {
        self.shell = Some(shell);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::testing::harness;
    use crate::capability::ViewRequest;
    use kdshell_target::Registers;

    fn registers(eip: u32) -> Notification {
        Notification::RegistersChanged(Registers {
            eip,
            ..Registers::default()
        })
    }

    fn wired() -> (LocationView, crate::builtin::testing::Harness) {
        let h = harness();
        let mut view = LocationView::default();
        view.set_connection(h.services.connection.clone());
        view.set_symbols(h.services.symbols.clone());
        view.set_shell(h.services.shell.clone());
        (view, h)
    }

    #[test]
    fn records_stops_newest_first() {
        let (mut view, _h) = wired();
        view.on_notification(&Notification::ModeChanged(ConnectionMode::Tcp));
        view.on_notification(&registers(0x1000));
        view.on_notification(&Notification::RunningChanged(true));
        view.on_notification(&registers(0x1500));
        view.on_notification(&Notification::RunningChanged(false));
        view.on_notification(&registers(0x2000));
        view.on_notification(&registers(0x2000));

        let eips: Vec<u64> = view.stops().map(|(eip, _)| *eip).collect();
        assert_eq!(eips, vec![0x2000, 0x1000]);
        assert!(view.stops().all(|(_, loc)| loc.is_unknown()));
    }

    #[test]
    fn ignores_registers_while_disconnected() {
        let (mut view, _h) = wired();
        view.on_notification(&registers(0x1000));
        assert_eq!(view.stops().count(), 0);
    }

    #[test]
    fn pick_posts_focus_request() {
        let (mut view, mut h) = wired();
        view.on_notification(&Notification::ModeChanged(ConnectionMode::Serial));
        view.on_notification(&registers(0x1000));
        view.on_notification(&registers(0x2000));

        assert!(view.pick(2));
        assert_eq!(h.requests.try_recv().unwrap(), ViewRequest::FocusAddress(0x1000));
        assert!(!view.pick(0));
        assert!(!view.pick(3));
    }

    #[test]
    fn reconnect_clears_history() {
        let (mut view, h) = wired();
        view.on_notification(&Notification::ModeChanged(ConnectionMode::Tcp));
        view.on_notification(&registers(0x1000));
        view.on_notification(&Notification::ModeChanged(ConnectionMode::Disconnected));
        assert_eq!(view.stops().count(), 1);
        view.on_notification(&Notification::ModeChanged(ConnectionMode::Pipe));
        assert_eq!(view.stops().count(), 0);
        assert!(h.symbols.borrow().loaded_count() == 0);
        assert!(view.render()[0].ends_with("0 stops"));
    }
}
