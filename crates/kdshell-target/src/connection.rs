//! Single active connection to the debug target.
//!
//! Each connection runs in its own background task that dials, reads and
//! decodes target events, and writes queued commands. The task reports back
//! through [`LinkMessage`]s tagged with the connection's generation; the
//! owner feeds them to [`ConnectionManager::accept`], which drops anything
//! from a generation that has since been closed.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle};

use crate::codec::{encode_frame, FrameDecoder};
use crate::error::{ConnectionError, TransportError};
use crate::link::{Connector, Link, LinkWriter, PipeMode, TransportTarget};
use crate::protocol::{Registers, TargetCommand, TargetEvent};
use crate::state::{ConnectionMode, ConnectionState};

const READ_CHUNK: usize = 4096;

/// Timing knobs, normally from the `[connection]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub connect_timeout: Duration,
    /// Upper bound on waiting for the previous link to drain.
    pub close_timeout: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(5_000),
            close_timeout: Duration::from_millis(1_000),
        }
    }
}

/// What a link task reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Established,
    /// Dialing failed or timed out; the task has ended.
    Failed(TransportError),
    Event(TargetEvent),
    /// The link ended. `None` for a requested graceful close.
    Closed(Option<TransportError>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMessage {
    pub generation: u64,
    pub event: LinkEvent,
}

/// One field transition of the connection state, or a pass-through event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    ModeChanged(ConnectionMode),
    RunningChanged(bool),
    RegistersChanged(Registers),
    ModuleChanged { base: u64, name: String },
    ConsoleOutput(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPhase {
    Idle,
    Connecting,
    Open,
}

struct ActiveLink {
    target: TransportTarget,
    commands: mpsc::UnboundedSender<TargetCommand>,
    task: JoinHandle<()>,
}

/// Owns the one live link and the [`ConnectionState`] derived from it.
///
/// Every mutating call queues the resulting [`Notification`]s; drain them
/// with [`take_notifications`](Self::take_notifications).
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    options: ConnectionOptions,
    events: mpsc::UnboundedSender<LinkMessage>,
    generation: u64,
    phase: LinkPhase,
    active: Option<ActiveLink>,
    /// Task of the last gracefully closed link, still draining.
    draining: Option<JoinHandle<()>>,
    /// Every replaced link task that may still be dialing or draining. The
    /// join handles move into successor tasks, so aborts go through these.
    retired: Vec<AbortHandle>,
    state: ConnectionState,
    watch: watch::Sender<ConnectionState>,
    outbox: Vec<Notification>,
}

impl ConnectionManager {
    /// Returns the manager and the queue its link tasks report on.
    pub fn new(
        connector: Arc<dyn Connector>,
        options: ConnectionOptions,
    ) -> (Self, mpsc::UnboundedReceiver<LinkMessage>) {
        let (events, rx) = mpsc::unbounded_channel();
        let (watch, _) = watch::channel(ConnectionState::default());
        let manager = Self {
            connector,
            options,
            events,
            generation: 0,
            phase: LinkPhase::Idle,
            active: None,
            draining: None,
            retired: Vec::new(),
            state: ConnectionState::default(),
            watch,
            outbox: Vec::new(),
        };
        (manager, rx)
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Live view of the state for observers outside the owner.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.watch.subscribe()
    }

    pub fn phase(&self) -> LinkPhase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Target of the current (connecting or open) link.
    pub fn target(&self) -> Option<&TransportTarget> {
        self.active.as_ref().map(|link| &link.target)
    }

    pub fn options(&self) -> ConnectionOptions {
        self.options
    }

    /// Takes effect for the next connection.
    pub fn set_options(&mut self, options: ConnectionOptions) {
        self.options = options;
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.outbox)
    }

    pub fn start_tcp(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        self.start(TransportTarget::Tcp {
            host: host.to_string(),
            port,
        })
    }

    pub fn start_serial(&mut self, port: &str, baud: u32) -> Result<(), TransportError> {
        self.start(TransportTarget::Serial {
            port: port.to_string(),
            baud,
        })
    }

    pub fn start_pipe(&mut self, name: &str, mode: PipeMode) -> Result<(), TransportError> {
        self.start(TransportTarget::Pipe {
            name: name.to_string(),
            mode,
        })
    }

    /// Close any existing link gracefully, then begin dialing `target` in
    /// the background. Establishment is reported through `accept`.
    ///
    /// # Errors
    ///
    /// `InvalidParameters` if `target` fails validation; the state is left
    /// `Disconnected`.
    pub fn start(&mut self, target: TransportTarget) -> Result<(), TransportError> {
        self.close(false);
        target.validate()?;

        self.generation += 1;
        let generation = self.generation;
        let (commands, command_rx) = mpsc::unbounded_channel();
        tracing::info!(generation, peer = %target, "connecting");

        let task = tokio::spawn(run_link(LinkTask {
            generation,
            target: target.clone(),
            connector: Arc::clone(&self.connector),
            options: self.options,
            previous: self.draining.take(),
            commands: command_rx,
            events: self.events.clone(),
        }));

        self.active = Some(ActiveLink {
            target,
            commands,
            task,
        });
        self.phase = LinkPhase::Connecting;
        Ok(())
    }

    /// End the current link. Graceful close lets the task write every queued
    /// command before it exits; forced close aborts it. Either way nothing
    /// further from this connection is accepted.
    pub fn close(&mut self, force: bool) {
        if let Some(link) = self.active.take() {
            self.generation += 1;
            tracing::info!(peer = %link.target, force, "closing connection");
            if force {
                link.task.abort();
            } else {
                // Dropping the sender lets the task drain and finish.
                drop(link.commands);
                self.retired.retain(|handle| !handle.is_finished());
                self.retired.push(link.task.abort_handle());
                self.draining = Some(link.task);
            }
        }
        if force {
            self.abort_retired();
        }
        self.phase = LinkPhase::Idle;
        self.reset_state();
    }

    pub fn break_in(&self) -> Result<(), ConnectionError> {
        self.send(TargetCommand::Break)
    }

    pub fn step(&self) -> Result<(), ConnectionError> {
        self.send(TargetCommand::Step)
    }

    pub fn next(&self) -> Result<(), ConnectionError> {
        self.send(TargetCommand::Next)
    }

    pub fn continue_execution(&self) -> Result<(), ConnectionError> {
        self.send(TargetCommand::Continue)
    }

    /// Forward a raw console line.
    pub fn send_interactive(&self, text: &str) -> Result<(), ConnectionError> {
        self.send(TargetCommand::Interactive {
            text: text.to_string(),
        })
    }

    fn send(&self, command: TargetCommand) -> Result<(), ConnectionError> {
        match (&self.active, self.phase) {
            (Some(link), LinkPhase::Open) => {
                tracing::debug!(?command, "queueing command");
                link.commands
                    .send(command)
                    .map_err(|_| ConnectionError::NotConnected)
            }
            _ => Err(ConnectionError::NotConnected),
        }
    }

    /// Apply a message from a link task.
    ///
    /// # Errors
    ///
    /// Returns the transport failure when the current link failed to dial
    /// or was lost. Stale messages are dropped silently.
    pub fn accept(&mut self, message: LinkMessage) -> Result<(), TransportError> {
        if message.generation != self.generation || self.active.is_none() {
            tracing::trace!(
                generation = message.generation,
                current = self.generation,
                "dropping stale link message"
            );
            return Ok(());
        }

        match message.event {
            LinkEvent::Established => {
                if let Some(link) = &self.active {
                    tracing::info!(peer = %link.target, "connection established");
                    let mode = link.target.mode();
                    self.phase = LinkPhase::Open;
                    self.set_mode(mode);
                }
                Ok(())
            }
            LinkEvent::Failed(err) => {
                tracing::warn!(error = %err, "connection failed");
                self.active = None;
                self.phase = LinkPhase::Idle;
                self.reset_state();
                Err(err)
            }
            LinkEvent::Event(event) => {
                self.apply_event(event);
                Ok(())
            }
            LinkEvent::Closed(reason) => {
                self.active = None;
                self.phase = LinkPhase::Idle;
                self.reset_state();
                match reason {
                    Some(err) => {
                        tracing::warn!(error = %err, "connection lost");
                        Err(err)
                    }
                    None => Ok(()),
                }
            }
        }
    }

    fn apply_event(&mut self, event: TargetEvent) {
        if self.phase != LinkPhase::Open {
            return;
        }
        match event {
            TargetEvent::Running { running } => {
                if self.state.running != running {
                    self.state.running = running;
                    self.publish(Notification::RunningChanged(running));
                }
            }
            TargetEvent::Registers { registers } => {
                if self.state.registers != registers {
                    self.state.registers = registers;
                    self.publish(Notification::RegistersChanged(registers));
                }
            }
            TargetEvent::Module { base, name } => {
                self.outbox.push(Notification::ModuleChanged { base, name });
            }
            TargetEvent::Output { text } => {
                self.outbox.push(Notification::ConsoleOutput(text));
            }
        }
    }

    fn set_mode(&mut self, mode: ConnectionMode) {
        if self.state.mode != mode {
            self.state.mode = mode;
            self.publish(Notification::ModeChanged(mode));
        }
    }

    /// Back to the default state, notifying each field that changes.
    fn reset_state(&mut self) {
        let fresh = ConnectionState::default();
        self.set_mode(fresh.mode);
        if self.state.running {
            self.state.running = false;
            self.publish(Notification::RunningChanged(false));
        }
        if self.state.registers != fresh.registers {
            self.state.registers = fresh.registers;
            self.publish(Notification::RegistersChanged(fresh.registers));
        }
    }

    fn abort_retired(&mut self) {
        if let Some(task) = self.draining.take() {
            task.abort();
        }
        for handle in self.retired.drain(..) {
            handle.abort();
        }
    }

    fn publish(&mut self, notification: Notification) {
        self.watch.send_replace(self.state.clone());
        self.outbox.push(notification);
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(link) = self.active.take() {
            link.task.abort();
        }
        self.abort_retired();
    }
}

struct LinkTask {
    generation: u64,
    target: TransportTarget,
    connector: Arc<dyn Connector>,
    options: ConnectionOptions,
    previous: Option<JoinHandle<()>>,
    commands: mpsc::UnboundedReceiver<TargetCommand>,
    events: mpsc::UnboundedSender<LinkMessage>,
}

impl LinkTask {
    /// `false` once the owner has gone away.
    fn post(&self, event: LinkEvent) -> bool {
        self.events
            .send(LinkMessage {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

async fn run_link(mut task: LinkTask) {
    if let Some(previous) = task.previous.take() {
        let abort = previous.abort_handle();
        if tokio::time::timeout(task.options.close_timeout, previous)
            .await
            .is_err()
        {
            tracing::warn!("previous connection did not drain in time; aborting it");
            abort.abort();
        }
    }

    let timeout = task.options.connect_timeout;
    let link = match tokio::time::timeout(timeout, task.connector.connect(&task.target)).await {
        Ok(Ok(link)) => link,
        Ok(Err(err)) => {
            task.post(LinkEvent::Failed(err));
            return;
        }
        Err(_) => {
            task.post(LinkEvent::Failed(TransportError::TimedOut {
                target: task.target.to_string(),
                after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }));
            return;
        }
    };

    if !task.post(LinkEvent::Established) {
        return;
    }
    let outcome = pump_link(&mut task, link).await;
    tracing::debug!(generation = task.generation, ?outcome, "link task finished");
    task.post(LinkEvent::Closed(outcome));
}

/// Shuttle bytes until the link breaks or the command queue is closed.
async fn pump_link(task: &mut LinkTask, link: Link) -> Option<TransportError> {
    let Link {
        mut reader,
        mut writer,
    } = link;
    let mut decoder = FrameDecoder::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        tokio::select! {
            read = reader.read(&mut chunk) => match read {
                Ok(0) => return Some(TransportError::Lost("target closed the connection".into())),
                Ok(n) => {
                    decoder.push(&chunk[..n]);
                    if let Err(err) = forward_frames(task, &mut decoder) {
                        return Some(err);
                    }
                }
                Err(e) => return Some(TransportError::Lost(e.to_string())),
            },
            command = task.commands.recv() => match command {
                Some(command) => {
                    if let Err(err) = write_command(&mut writer, &command).await {
                        return Some(err);
                    }
                }
                None => {
                    // Every queued command has been written.
                    if let Err(e) = writer.shutdown().await {
                        tracing::debug!(error = %e, "shutdown after drain failed");
                    }
                    return None;
                }
            },
        }
    }
}

fn forward_frames(task: &LinkTask, decoder: &mut FrameDecoder) -> Result<(), TransportError> {
    while let Some(event) = decoder.next_frame::<TargetEvent>()? {
        if !task.post(LinkEvent::Event(event)) {
            return Err(TransportError::Lost("session went away".into()));
        }
    }
    Ok(())
}

async fn write_command(writer: &mut LinkWriter, command: &TargetCommand) -> Result<(), TransportError> {
    let frame = encode_frame(command)?;
    writer
        .write_all(&frame)
        .await
        .map_err(|e| TransportError::Lost(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| TransportError::Lost(e.to_string()))
}
