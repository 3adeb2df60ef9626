use std::any::Any;

use crate::capability::{ConnectionHandle, UsesConnection};
use crate::view::View;

/// Register snapshot of the halted target.
#[derive(Default)]
pub struct RegistersView {
    connection: Option<ConnectionHandle>,
}

impl View for RegistersView {
    fn title(&self) -> String {
        "Registers".into()
    }

    fn render(&self) -> Vec<String> {
        let Some(state) = self.connection.as_ref().map(ConnectionHandle::state) else {
            return vec!["(no connection)".into()];
        };
        if !state.is_connected() {
            return vec!["Disconnected".into()];
        }
        if state.running {
            return vec!["Running".into()];
        }
        state
            .registers
            .named()
            .iter()
            .map(|(name, value)| format!("{name:>6} {value:08x}"))
            .collect()
    }

    fn as_connection_user(&mut self) -> Option<&mut dyn UsesConnection> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl UsesConnection for RegistersView {
    fn set_connection(&mut self, connection: ConnectionHandle) {
        self.connection = Some(connection);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::testing::harness;
    use kdshell_target::{ConnectionMode, ConnectionState, Registers};

    #[test]
    fn renders_halted_registers() {
        let h = harness();
        let mut view = RegistersView::default();
        view.set_connection(h.services.connection.clone());
        assert_eq!(view.render(), vec!["Disconnected"]);

        h.state.send_replace(ConnectionState {
            mode: ConnectionMode::Tcp,
            running: false,
            registers: Registers {
                eip: 0x1000_1000,
                ..Registers::default()
            },
        });
        let lines = view.render();
        assert_eq!(lines.len(), 16);
        assert_eq!(lines[0], "   eip 10001000");
    }

    #[test]
    fn running_target_hides_registers() {
        let h = harness();
        let mut view = RegistersView::default();
        view.set_connection(h.services.connection.clone());
        h.state.send_replace(ConnectionState {
            mode: ConnectionMode::Serial,
            running: true,
            registers: Registers::default(),
        });
        assert_eq!(view.render(), vec!["Running"]);
    }
}
