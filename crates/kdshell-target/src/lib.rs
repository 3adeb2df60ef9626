//! Debug target connection: wire framing, transports and the
//! [`ConnectionManager`] state machine.

pub mod codec;
pub mod connection;
pub mod error;
pub mod link;
pub mod protocol;
pub mod state;

pub use connection::{
    ConnectionManager, ConnectionOptions, LinkEvent, LinkMessage, LinkPhase, Notification,
};
pub use error::{ConnectionError, TransportError};
pub use link::{Connector, Link, PipeMode, SystemConnector, TransportTarget};
pub use protocol::{Registers, TargetCommand, TargetEvent};
pub use state::{ConnectionMode, ConnectionState};
