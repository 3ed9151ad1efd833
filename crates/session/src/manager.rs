//! Session manager: owns the connection lifecycle for one role.
//!
//! A single task serialises commands, channel events and the retry timer
//! through [`SessionMachine`], then carries out the resulting effects. Every
//! transition is published as a [`SessionSnapshot`] on a watch channel and,
//! where relevant, as a [`SessionEvent`].

use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::{debug, info, trace, warn};

use dispatchlink_protocol::constants::EVENT_DISCONNECT;
use dispatchlink_protocol::{DisconnectReason, InboundEvent, Role};

use crate::alerts::{AlertSink, NoopAlerts};
use crate::machine::{Effect, Input, SessionMachine};
use crate::transport::{ChannelHandle, ConnectRequest, Connector};
use crate::types::{ConnectivityState, SessionConfig, SessionEvent, SessionSnapshot};

const EVENT_BUFFER: usize = 256;
const LINK_EVENT_BUFFER: usize = 64;

#[derive(Debug)]
enum Command {
    Start(String),
    Stop,
    Shutdown,
}

/// Handle to a running notification session.
///
/// `start` and `stop` only enqueue a command and return immediately; the
/// effects show up on [`subscribe`](Self::subscribe) and the event stream.
pub struct SessionManager {
    role: Role,
    commands: mpsc::UnboundedSender<Command>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    events_rx: Mutex<Option<mpsc::Receiver<SessionEvent>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    /// Spawns the session task. Must be called inside a Tokio runtime.
    pub fn new(config: SessionConfig, connector: Arc<dyn Connector>) -> Self {
        Self::with_alerts(config, connector, Arc::new(NoopAlerts))
    }

    /// Like [`new`](Self::new), with a sink notified of every new order.
    pub fn with_alerts(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        let role = config.profile.role;
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::new(role));

        let session = SessionLoop {
            machine: SessionMachine::new(config.profile, config.reconnect),
            server_url: config.server_url,
            role,
            connector,
            alerts,
            link: None,
            retry: None,
            events_tx,
            snapshot_tx,
        };
        let task = tokio::spawn(session.run(commands_rx));

        Self {
            role,
            commands,
            snapshot_rx,
            events_rx: Mutex::new(Some(events_rx)),
            task: Mutex::new(Some(task)),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Opens the session for `identity`. Repeated calls with the same
    /// identity while a channel is active are no-ops.
    pub fn start(&self, identity: impl Into<String>) {
        self.command(Command::Start(identity.into()));
    }

    /// Closes the channel, cancels any pending retry and clears the queue.
    pub fn stop(&self) {
        self.command(Command::Stop);
    }

    /// Stops the session and waits for its task to exit. Idempotent.
    pub async fn shutdown(&self) {
        self.command(Command::Shutdown);
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "session task ended abnormally");
            }
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub async fn take_events(&self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.events_rx.lock().await.take()
    }

    /// Watch receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn state(&self) -> ConnectivityState {
        self.snapshot_rx.borrow().state()
    }

    fn command(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("session task already stopped, command dropped");
        }
    }
}

/// The open channel plus its event stream. `events` is `None` once the
/// transport has reported its final disconnect.
struct ActiveLink {
    handle: ChannelHandle,
    events: Option<mpsc::Receiver<InboundEvent>>,
}

struct SessionLoop {
    machine: SessionMachine,
    server_url: String,
    role: Role,
    connector: Arc<dyn Connector>,
    alerts: Arc<dyn AlertSink>,
    link: Option<ActiveLink>,
    retry: Option<Pin<Box<Sleep>>>,
    events_tx: mpsc::Sender<SessionEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl SessionLoop {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        debug!(role = %self.role, "session task started");

        loop {
            let input = tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command::Start(identity)) => Input::Start(identity),
                    Some(Command::Stop) => Input::Stop,
                    Some(Command::Shutdown) | None => break,
                },
                input = next_link_event(&mut self.link) => input,
                () = retry_elapsed(&mut self.retry) => {
                    self.retry = None;
                    Input::RetryDue
                }
            };
            self.apply(input);
        }

        self.apply(Input::Stop);
        debug!(role = %self.role, "session task stopped");
    }

    fn apply(&mut self, input: Input) {
        for effect in self.machine.handle(input) {
            self.execute(effect);
        }
        self.publish();
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::Open { identity } => {
                if let Some(old) = self.link.take() {
                    old.handle.close();
                }
                let (tx, rx) = mpsc::channel(LINK_EVENT_BUFFER);
                let request = ConnectRequest {
                    server_url: self.server_url.clone(),
                    role: self.role,
                    identity,
                };
                let handle = self.connector.connect(request, tx);
                self.link = Some(ActiveLink {
                    handle,
                    events: Some(rx),
                });
            }
            Effect::Send(event) => match &self.link {
                Some(link) => {
                    if let Err(e) = link.handle.send(event) {
                        warn!(error = %e, "failed to queue outbound event");
                    }
                }
                None => warn!(event = %event.name, "no channel to send on"),
            },
            Effect::ScheduleRetry(delay) => {
                self.retry = Some(Box::pin(tokio::time::sleep(delay)));
            }
            Effect::CancelRetry => self.retry = None,
            Effect::CloseLink => {
                if let Some(link) = self.link.take() {
                    link.handle.close();
                }
            }
            Effect::Emit(event) => self.emit(event),
        }
    }

    fn emit(&self, event: SessionEvent) {
        if let SessionEvent::OrderReceived(order) = &event {
            if let Err(e) = self.alerts.order_arrived(order) {
                warn!(order = %order.order_id, error = %e, "order alert failed");
            }
        }

        match self.events_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(?event, "session event buffer full, dropping");
            }
            Err(TrySendError::Closed(_)) => trace!("no session event listener"),
        }
    }

    fn publish(&self) {
        let next = self.machine.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

/// Waits for the next event of the current channel.
///
/// A transport that goes away without reporting a disconnect is treated as a
/// closed transport.
async fn next_link_event(link: &mut Option<ActiveLink>) -> Input {
    let Some(rx) = link.as_mut().and_then(|l| l.events.as_mut()) else {
        return std::future::pending().await;
    };

    let event = rx.recv().await;
    let finished = event.as_ref().map_or(true, |e| e.name == EVENT_DISCONNECT);
    if finished {
        if let Some(l) = link.as_mut() {
            l.events = None;
        }
    }

    match event {
        Some(event) => Input::Event(event),
        None => {
            info!("channel ended without reporting a disconnect");
            Input::Event(InboundEvent::disconnected(&DisconnectReason::TransportClose))
        }
    }
}

async fn retry_elapsed(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
