use std::fmt;

use crate::protocol::Registers;

/// Which transport, if any, currently carries the session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionMode {
    #[default]
    Disconnected,
    Tcp,
    Serial,
    Pipe,
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionMode::Disconnected => "Disconnected",
            ConnectionMode::Tcp => "TCP",
            ConnectionMode::Serial => "Serial",
            ConnectionMode::Pipe => "Pipe",
        };
        f.write_str(name)
    }
}

/// Snapshot of the debuggee as last reported.
///
/// Reset to the default value whenever the link goes away.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConnectionState {
    pub mode: ConnectionMode,
    pub running: bool,
    pub registers: Registers,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        self.mode != ConnectionMode::Disconnected
    }

    /// Connected and halted, i.e. registers are meaningful.
    pub fn is_stopped(&self) -> bool {
        self.is_connected() && !self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_disconnected_and_stopped_flag_false() {
        let state = ConnectionState::default();
        assert_eq!(state.mode, ConnectionMode::Disconnected);
        assert!(!state.is_connected());
        assert!(!state.is_stopped());
    }

    #[test]
    fn connected_and_halted_is_stopped() {
        let state = ConnectionState {
            mode: ConnectionMode::Serial,
            running: false,
            registers: Registers::default(),
        };
        assert!(state.is_stopped());
    }

    #[test]
    fn mode_display_names() {
        assert_eq!(ConnectionMode::Tcp.to_string(), "TCP");
        assert_eq!(ConnectionMode::Disconnected.to_string(), "Disconnected");
    }
}
