//! Parsing of shell command lines.

use std::path::PathBuf;
use std::str::FromStr;

use kdshell_target::PipeMode;
use kdshell_views::FloatingId;

use crate::error::SessionError;

/// `(usage, description)` for `help`.
pub const COMMANDS: &[(&str, &str)] = &[
    ("connect-tcp <host> <port>", "connect over TCP"),
    ("connect-serial <port> [baud]", "connect over a serial line"),
    ("connect-pipe <name> [client|server]", "connect over a named pipe"),
    ("disconnect", "close the connection"),
    ("break", "break into the target"),
    ("step", "single step"),
    ("next", "step over"),
    ("continue", "resume the target"),
    ("input <text>", "send a line to the target console"),
    ("open <path>", "open a source file"),
    ("views", "list view types, tabs and floating views"),
    ("new-view <type>", "open a view of the given type"),
    ("tab <index>", "activate a tab"),
    ("next-tab / prev-tab", "cycle tabs"),
    ("close [index]", "close the active tab or tab <index>"),
    ("detach", "move the active view to a floating host"),
    ("redock <id>", "put a floating view back into a tab"),
    ("close-floating <id>", "close a floating view"),
    ("show", "print the active view"),
    ("pick <n>", "act on entry <n> of the active view"),
    ("copy", "copy the active view's selection"),
    ("reload-settings", "re-read source and symbol roots"),
    ("status", "show recent status messages"),
    ("help", "this list"),
    ("quit", "exit"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    ConnectTcp { host: String, port: u16 },
    ConnectSerial { port: String, baud: Option<u32> },
    ConnectPipe { name: String, mode: PipeMode },
    Disconnect,
    Break,
    Step,
    Next,
    Continue,
    Input(String),
    Open(PathBuf),
    Views,
    NewView(String),
    Tab(usize),
    NextTab,
    PrevTab,
    Close(Option<usize>),
    Detach,
    Redock(FloatingId),
    CloseFloating(FloatingId),
    Show,
    Pick(usize),
    Copy,
    ReloadSettings,
    Status,
    Help,
    Quit,
}

impl FromStr for ShellCommand {
    type Err = SessionError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let mut args = rest.split_whitespace();

        let command = match word {
            "connect-tcp" => {
                let usage = "connect-tcp <host> <port>";
                let host = args.next().ok_or(SessionError::Usage(usage))?;
                let port = args.next().ok_or(SessionError::Usage(usage))?;
                ShellCommand::ConnectTcp {
                    host: host.to_string(),
                    port: number("port", port)?,
                }
            }
            "connect-serial" => {
                let port = args
                    .next()
                    .ok_or(SessionError::Usage("connect-serial <port> [baud]"))?;
                let baud = args.next().map(|b| number("baud rate", b)).transpose()?;
                ShellCommand::ConnectSerial {
                    port: port.to_string(),
                    baud,
                }
            }
            "connect-pipe" => {
                let name = args
                    .next()
                    .ok_or(SessionError::Usage("connect-pipe <name> [client|server]"))?;
                let mode = args.next().map(str::parse::<PipeMode>).transpose()?.unwrap_or_default();
                ShellCommand::ConnectPipe {
                    name: name.to_string(),
                    mode,
                }
            }
            "disconnect" => ShellCommand::Disconnect,
            "break" => ShellCommand::Break,
            "step" => ShellCommand::Step,
            "next" => ShellCommand::Next,
            "continue" | "go" => ShellCommand::Continue,
            "input" => {
                if rest.is_empty() {
                    return Err(SessionError::Usage("input <text>"));
                }
                ShellCommand::Input(rest.to_string())
            }
            "open" => {
                if rest.is_empty() {
                    return Err(SessionError::Usage("open <path>"));
                }
                ShellCommand::Open(PathBuf::from(rest))
            }
            "views" => ShellCommand::Views,
            "new-view" => ShellCommand::NewView(
                args.next()
                    .ok_or(SessionError::Usage("new-view <type>"))?
                    .to_string(),
            ),
            "tab" => ShellCommand::Tab(required_number(args.next(), "tab <index>", "tab index")?),
            "next-tab" => ShellCommand::NextTab,
            "prev-tab" => ShellCommand::PrevTab,
            "close" => ShellCommand::Close(args.next().map(|i| number("tab index", i)).transpose()?),
            "detach" => ShellCommand::Detach,
            "redock" => ShellCommand::Redock(floating_id(args.next(), "redock <id>")?),
            "close-floating" => {
                ShellCommand::CloseFloating(floating_id(args.next(), "close-floating <id>")?)
            }
            "show" => ShellCommand::Show,
            "pick" => ShellCommand::Pick(required_number(args.next(), "pick <n>", "entry")?),
            "copy" => ShellCommand::Copy,
            "reload-settings" => ShellCommand::ReloadSettings,
            "status" => ShellCommand::Status,
            "help" | "?" => ShellCommand::Help,
            "quit" | "exit" => ShellCommand::Quit,
            other => return Err(SessionError::UnknownCommand(other.to_string())),
        };
        Ok(command)
    }
}

fn number<T: FromStr>(what: &'static str, value: &str) -> Result<T, SessionError> {
    value.parse().map_err(|_| SessionError::InvalidArgument {
        what,
        value: value.to_string(),
    })
}

fn required_number<T: FromStr>(
    value: Option<&str>,
    usage: &'static str,
    what: &'static str,
) -> Result<T, SessionError> {
    number(what, value.ok_or(SessionError::Usage(usage))?)
}

fn floating_id(value: Option<&str>, usage: &'static str) -> Result<FloatingId, SessionError> {
    required_number::<u64>(value, usage, "floating id").map(FloatingId::from)
}
