use std::fmt;

use kdshell_symbols::SourceLocation;
use kdshell_target::ConnectionMode;

/// One-line session summary shown under the prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusLine {
    pub mode: ConnectionMode,
    pub running: bool,
    pub location: SourceLocation,
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConnectionMode: {} - Running: {} - Source Location: {}",
            self.mode, self.running, self.location
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_line() {
        assert_eq!(
            StatusLine::default().to_string(),
            "ConnectionMode: Disconnected - Running: false - Source Location: unknown:0"
        );
    }

    #[test]
    fn stopped_in_source() {
        let line = StatusLine {
            mode: ConnectionMode::Tcp,
            running: false,
            location: SourceLocation::new("ntdll/ldr.c", Some(42)),
        };
        assert_eq!(
            line.to_string(),
            "ConnectionMode: TCP - Running: false - Source Location: ntdll/ldr.c:42"
        );
    }
}
