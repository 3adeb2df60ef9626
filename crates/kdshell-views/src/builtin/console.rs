use std::any::Any;
use std::collections::VecDeque;

use kdshell_target::{ConnectionMode, Notification};

use crate::capability::{CanCopy, ConnectionHandle, CopySink, UsesConnection};
use crate::view::View;

const MAX_LINES: usize = 2_000;
/// Unterminated output longer than this is wrapped into a line.
const MAX_PARTIAL: usize = 4_096;

/// Transcript of the target's interactive console.
#[derive(Default)]
pub struct ConsoleView {
    connection: Option<ConnectionHandle>,
    lines: VecDeque<String>,
    /// Output that has not seen its newline yet.
    partial: String,
    copy_sink: Option<CopySink>,
}

impl ConsoleView {
    /// Echo `text` and send it to the target. Returns `false` without a
    /// live connection.
    pub fn submit(&mut self, text: &str) -> bool {
        let Some(connection) = &self.connection else {
            return false;
        };
        if !connection.is_connected() {
            return false;
        }
        let sent = connection.send_interactive(text);
        if sent {
            self.flush_partial();
            self.push_line(format!("kd> {text}"));
        }
        sent
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    fn append_output(&mut self, text: &str) {
        let mut rest = text;
        while let Some(pos) = rest.find('\n') {
            let (head, tail) = rest.split_at(pos);
            self.partial.push_str(head.trim_end_matches('\r'));
            let line = std::mem::take(&mut self.partial);
            self.push_line(line);
            rest = &tail[1..];
        }
        self.partial.push_str(rest);
        if self.partial.len() >= MAX_PARTIAL {
            self.flush_partial();
        }
    }

    fn flush_partial(&mut self) {
        if !self.partial.is_empty() {
            let line = std::mem::take(&mut self.partial);
            self.push_line(line);
        }
    }

    fn push_line(&mut self, line: String) {
        if self.lines.len() == MAX_LINES {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
        if let Some(sink) = &self.copy_sink {
            sink.report(true);
        }
    }
}

impl View for ConsoleView {
    fn title(&self) -> String {
        "Console".into()
    }

    fn render(&self) -> Vec<String> {
        let mut out: Vec<String> = self.lines.iter().cloned().collect();
        if !self.partial.is_empty() {
            out.push(self.partial.clone());
        }
        out
    }

    fn as_connection_user(&mut self) -> Option<&mut dyn UsesConnection> {
        Some(self)
    }

    fn as_copy_source(&mut self) -> Option<&mut dyn CanCopy> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl UsesConnection for ConsoleView {
    fn set_connection(&mut self, connection: ConnectionHandle) {
        self.connection = Some(connection);
    }

    fn on_notification(&mut self, notification: &Notification) {
        match notification {
            Notification::ConsoleOutput(text) => self.append_output(text),
            Notification::ModeChanged(ConnectionMode::Disconnected) => {
                self.flush_partial();
                self.push_line("-- disconnected --".into());
            }
            Notification::ModeChanged(mode) => {
                self.flush_partial();
                self.push_line(format!("-- connected ({mode}) --"));
            }
            _ => {}
        }
    }
}

impl CanCopy for ConsoleView {
    fn can_copy(&self) -> bool {
        !self.lines.is_empty()
    }

    /// The whole transcript.
    fn copy_selection(&self) -> Option<String> {
        if self.lines.is_empty() {
            return None;
        }
        Some(self.lines.iter().cloned().collect::<Vec<_>>().join("\n"))
    }

    fn subscribe_copy(&mut self, sink: CopySink) {
        sink.report(self.can_copy());
        self.copy_sink = Some(sink);
    }
}
