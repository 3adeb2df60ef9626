//! Transports that carry the framed protocol.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::error::TransportError;
use crate::state::ConnectionMode;

/// Baud rates a serial target may be opened at.
pub const SUPPORTED_BAUD_RATES: &[u32] = &[
    1_200, 2_400, 4_800, 9_600, 19_200, 38_400, 57_600, 115_200, 230_400,
];

pub type LinkReader = Box<dyn AsyncRead + Send + Unpin>;
pub type LinkWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// An established byte stream to the target, split for concurrent use.
pub struct Link {
    pub reader: LinkReader,
    pub writer: LinkWriter,
}

impl Link {
    pub fn new(reader: LinkReader, writer: LinkWriter) -> Self {
        Self { reader, writer }
    }

    /// Split a bidirectional stream.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self::new(Box::new(reader), Box::new(writer))
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link").finish_non_exhaustive()
    }
}

/// Which end of a named pipe kdshell plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipeMode {
    #[default]
    Client,
    /// Create the pipe and wait for the target to open it.
    Server,
}

impl FromStr for PipeMode {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "client" => Ok(PipeMode::Client),
            "server" => Ok(PipeMode::Server),
            other => Err(TransportError::InvalidParameters(format!(
                "pipe mode must be client or server, got {other:?}"
            ))),
        }
    }
}

impl fmt::Display for PipeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipeMode::Client => f.write_str("client"),
            PipeMode::Server => f.write_str("server"),
        }
    }
}

/// Where to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportTarget {
    Tcp { host: String, port: u16 },
    Serial { port: String, baud: u32 },
    Pipe { name: String, mode: PipeMode },
}

impl TransportTarget {
    /// Mode reported once this target's link is established.
    pub fn mode(&self) -> ConnectionMode {
        match self {
            TransportTarget::Tcp { .. } => ConnectionMode::Tcp,
            TransportTarget::Serial { .. } => ConnectionMode::Serial,
            TransportTarget::Pipe { .. } => ConnectionMode::Pipe,
        }
    }

    /// Reject parameters no transport could accept.
    pub fn validate(&self) -> Result<(), TransportError> {
        let problem = match self {
            TransportTarget::Tcp { host, .. } if host.trim().is_empty() => "empty host".to_string(),
            TransportTarget::Tcp { port: 0, .. } => "port must be non-zero".to_string(),
            TransportTarget::Serial { port, .. } if port.trim().is_empty() => {
                "empty serial port".to_string()
            }
            TransportTarget::Serial { baud, .. } if !SUPPORTED_BAUD_RATES.contains(baud) => {
                format!("unsupported baud rate {baud}")
            }
            TransportTarget::Pipe { name, .. } if name.trim().is_empty() => {
                "empty pipe name".to_string()
            }
            _ => return Ok(()),
        };
        Err(TransportError::InvalidParameters(problem))
    }
}

impl fmt::Display for TransportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportTarget::Tcp { host, port } => write!(f, "tcp {host}:{port}"),
            TransportTarget::Serial { port, baud } => write!(f, "serial {port} @ {baud}"),
            TransportTarget::Pipe { name, mode } => write!(f, "pipe {name} ({mode})"),
        }
    }
}

pub type ConnectFuture = Pin<Box<dyn Future<Output = Result<Link, TransportError>> + Send>>;

/// Opens links. The connection manager bounds every attempt with its
/// connect timeout, so implementations need not.
pub trait Connector: Send + Sync {
    fn connect(&self, target: &TransportTarget) -> ConnectFuture;
}

/// Real sockets, ttys and pipes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConnector;

impl Connector for SystemConnector {
    fn connect(&self, target: &TransportTarget) -> ConnectFuture {
        let target = target.clone();
        Box::pin(async move {
            match &target {
                TransportTarget::Tcp { host, port } => connect_tcp(&target, host, *port).await,
                TransportTarget::Serial { port, baud } => serial::open(&target, port, *baud).await,
                TransportTarget::Pipe { name, mode } => pipe::open(&target, name, *mode).await,
            }
        })
    }
}

async fn connect_tcp(target: &TransportTarget, host: &str, port: u16) -> Result<Link, TransportError> {
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| io_failure(target, &e))?;
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(error = %e, "could not disable Nagle on debug socket");
    }
    let (reader, writer) = stream.into_split();
    Ok(Link::new(Box::new(reader), Box::new(writer)))
}

/// Refusals are `Rejected`, everything else `Unreachable`.
fn io_failure(target: &TransportTarget, err: &std::io::Error) -> TransportError {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::ConnectionRefused | ErrorKind::PermissionDenied => TransportError::Rejected {
            target: target.to_string(),
            reason: err.to_string(),
        },
        _ => TransportError::Unreachable {
            target: target.to_string(),
            reason: err.to_string(),
        },
    }
}

#[cfg(unix)]
mod serial {
    use std::fs::{File, OpenOptions};
    use std::os::unix::fs::OpenOptionsExt;

    use nix::fcntl::OFlag;
    use nix::sys::termios::{self, BaudRate, SetArg};

    use super::{Link, TransportTarget};
    use crate::error::TransportError;

    pub(super) async fn open(
        target: &TransportTarget,
        port: &str,
        baud: u32,
    ) -> Result<Link, TransportError> {
        let rate = baud_rate(baud).ok_or_else(|| {
            TransportError::InvalidParameters(format!("unsupported baud rate {baud}"))
        })?;
        let path = port.to_string();
        let failed = |reason: String| TransportError::Unreachable {
            target: target.to_string(),
            reason,
        };

        let file = tokio::task::spawn_blocking(move || open_raw(&path, rate))
            .await
            .map_err(|e| failed(e.to_string()))?
            .map_err(failed)?;

        // Separate handles so a blocked read never holds up a write.
        let reader = file.try_clone().map_err(|e| TransportError::Unreachable {
            target: target.to_string(),
            reason: e.to_string(),
        })?;
        tracing::debug!(port, baud, "serial line configured");
        Ok(Link::new(
            Box::new(tokio::fs::File::from_std(reader)),
            Box::new(tokio::fs::File::from_std(file)),
        ))
    }

    /// Open the tty without making it our controlling terminal and switch
    /// it to raw mode at `rate`.
    fn open_raw(path: &str, rate: BaudRate) -> Result<File, String> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(OFlag::O_NOCTTY.bits())
            .open(path)
            .map_err(|e| format!("open {path}: {e}"))?;
        let mut tio = termios::tcgetattr(&file).map_err(|e| format!("tcgetattr: {e}"))?;
        termios::cfmakeraw(&mut tio);
        termios::cfsetspeed(&mut tio, rate).map_err(|e| format!("cfsetspeed: {e}"))?;
        termios::tcsetattr(&file, SetArg::TCSANOW, &tio).map_err(|e| format!("tcsetattr: {e}"))?;
        Ok(file)
    }

    fn baud_rate(baud: u32) -> Option<BaudRate> {
        let rate = match baud {
            1_200 => BaudRate::B1200,
            2_400 => BaudRate::B2400,
            4_800 => BaudRate::B4800,
            9_600 => BaudRate::B9600,
            19_200 => BaudRate::B19200,
            38_400 => BaudRate::B38400,
            57_600 => BaudRate::B57600,
            115_200 => BaudRate::B115200,
            230_400 => BaudRate::B230400,
            _ => return None,
        };
        Some(rate)
    }

}

#[cfg(not(unix))]
mod serial {
    use super::{Link, TransportTarget};
    use crate::error::TransportError;

    pub(super) async fn open(
        _target: &TransportTarget,
        port: &str,
        _baud: u32,
    ) -> Result<Link, TransportError> {
        Err(TransportError::Unsupported(format!(
            "serial port {port} on {}",
            std::env::consts::OS
        )))
    }
}

#[cfg(unix)]
mod pipe {
    use std::os::unix::fs::FileTypeExt;
    use std::path::{Path, PathBuf};

    use tokio::net::{UnixListener, UnixStream};

    use super::{io_failure, Link, PipeMode, TransportTarget};
    use crate::error::TransportError;

    /// Relative names live in the temp dir.
    pub(super) fn socket_path(name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::temp_dir().join(name)
        }
    }

    pub(super) async fn open(
        target: &TransportTarget,
        name: &str,
        mode: PipeMode,
    ) -> Result<Link, TransportError> {
        let path = socket_path(name);
        let stream = match mode {
            PipeMode::Client => UnixStream::connect(&path)
                .await
                .map_err(|e| io_failure(target, &e))?,
            PipeMode::Server => {
                remove_stale_socket(&path);
                let listener = UnixListener::bind(&path).map_err(|e| io_failure(target, &e))?;
                tracing::info!(path = %path.display(), "waiting for target on pipe");
                let (stream, _) = listener.accept().await.map_err(|e| io_failure(target, &e))?;
                stream
            }
        };
        let (reader, writer) = stream.into_split();
        Ok(Link::new(Box::new(reader), Box::new(writer)))
    }

    fn remove_stale_socket(path: &Path) {
        let is_socket = std::fs::symlink_metadata(path)
            .map(|m| m.file_type().is_socket())
            .unwrap_or(false);
        if is_socket {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::warn!(path = %path.display(), error = %e, "could not remove stale socket");
            }
        }
    }
}

#[cfg(windows)]
mod pipe {
    use tokio::net::windows::named_pipe::{ClientOptions, ServerOptions};

    use super::{io_failure, Link, PipeMode, TransportTarget};
    use crate::error::TransportError;

    const PIPE_PREFIX: &str = r"\\.\pipe\";

    pub(super) async fn open(
        target: &TransportTarget,
        name: &str,
        mode: PipeMode,
    ) -> Result<Link, TransportError> {
        let path = if name.starts_with(PIPE_PREFIX) {
            name.to_string()
        } else {
            format!("{PIPE_PREFIX}{name}")
        };
        match mode {
            PipeMode::Client => {
                let client = ClientOptions::new()
                    .open(&path)
                    .map_err(|e| io_failure(target, &e))?;
                Ok(Link::from_stream(client))
            }
            PipeMode::Server => {
                let server = ServerOptions::new()
                    .first_pipe_instance(true)
                    .create(&path)
                    .map_err(|e| io_failure(target, &e))?;
                tracing::info!(%path, "waiting for target on pipe");
                server.connect().await.map_err(|e| io_failure(target, &e))?;
                Ok(Link::from_stream(server))
            }
        }
    }
}

#[cfg(not(any(unix, windows)))]
mod pipe {
    use super::{Link, PipeMode, TransportTarget};
    use crate::error::TransportError;

    pub(super) async fn open(
        _target: &TransportTarget,
        name: &str,
        _mode: PipeMode,
    ) -> Result<Link, TransportError> {
        Err(TransportError::Unsupported(format!("pipe {name}")))
    }
}
