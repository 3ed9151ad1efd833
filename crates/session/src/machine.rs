//! Connection state machine.
//!
//! Pure: every input yields a list of [`Effect`]s for the session loop to
//! carry out. No I/O and no clocks live here, so the whole lifecycle can be
//! exercised without a network.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, trace, warn};

use dispatchlink_protocol::constants::{EVENT_CONNECT, EVENT_CONNECT_ERROR, EVENT_DISCONNECT};
use dispatchlink_protocol::{
    DisconnectReason, InboundEvent, OrderClaim, OrderNotification, OutboundEvent, SocketPacket,
    StatusPayload,
};

use crate::queue::NotificationQueue;
use crate::role::{RoleProfile, Route};
use crate::types::{Connectivity, ConnectivityState, ReconnectConfig, SessionEvent, SessionSnapshot};

/// Returns `true` for identities worth connecting with.
///
/// Rejects blanks and the `"undefined"` / `"null"` strings that leak out of
/// unset session storage.
pub fn is_valid_identity(identity: &str) -> bool {
    let trimmed = identity.trim();
    !trimmed.is_empty() && trimmed != "undefined" && trimmed != "null"
}

/// Something that happened to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Start(String),
    Stop,
    Event(InboundEvent),
    RetryDue,
}

/// Work the session loop must perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Open a new channel for `identity`, replacing any closed one.
    Open { identity: String },
    /// Emit an event on the open channel.
    Send(OutboundEvent),
    /// Arm the retry timer; expiry is fed back as [`Input::RetryDue`].
    ScheduleRetry(Duration),
    CancelRetry,
    /// Tear down the channel without reporting a disconnect.
    CloseLink,
    Emit(SessionEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPhase {
    Opening,
    Open,
    Closed,
}

#[derive(Debug, Clone)]
struct Link {
    identity: String,
    phase: LinkPhase,
}

type EventHandler = fn(&mut SessionMachine, Value) -> Vec<Effect>;

/// Lifecycle, counters and queue of one notification session.
pub struct SessionMachine {
    profile: RoleProfile,
    reconnect: ReconnectConfig,
    handlers: HashMap<String, EventHandler>,
    link: Option<Link>,
    connectivity: Connectivity,
    reconnecting: bool,
    attempt: u32,
    exhausted: bool,
    last_error: Option<String>,
    queue: NotificationQueue,
}

impl SessionMachine {
    pub fn new(profile: RoleProfile, reconnect: ReconnectConfig) -> Self {
        let mut handlers: HashMap<String, EventHandler> = HashMap::new();
        handlers.insert(EVENT_CONNECT.into(), Self::on_connect);
        handlers.insert(EVENT_DISCONNECT.into(), Self::on_disconnect);
        handlers.insert(EVENT_CONNECT_ERROR.into(), Self::on_connect_error);
        for (name, route) in profile.routes() {
            let handler: EventHandler = match route {
                Route::NewOrder => Self::on_new_order,
                Route::OrderClaimed => Self::on_order_claimed,
                Route::Status => Self::on_status,
            };
            handlers.insert(name.to_string(), handler);
        }

        Self {
            profile,
            reconnect,
            handlers,
            link: None,
            connectivity: Connectivity::Disconnected,
            reconnecting: false,
            attempt: 0,
            exhausted: false,
            last_error: None,
            queue: NotificationQueue::new(),
        }
    }

    /// Applies one input. A `StateChanged` event is appended whenever the
    /// derived connectivity moved.
    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        let before = self.state();
        let mut effects = match input {
            Input::Start(identity) => self.start(identity),
            Input::Stop => self.stop(),
            Input::Event(event) => self.dispatch(event),
            Input::RetryDue => self.retry_due(),
        };
        let after = self.state();
        if before != after {
            effects.push(Effect::Emit(SessionEvent::StateChanged(after)));
        }
        effects
    }

    pub fn state(&self) -> ConnectivityState {
        match (self.connectivity, self.reconnecting) {
            (Connectivity::Connected, _) => ConnectivityState::Connected,
            (Connectivity::Disconnected, true) => ConnectivityState::Reconnecting,
            (Connectivity::Disconnected, false) => ConnectivityState::Disconnected,
        }
    }

    pub fn phase(&self) -> Option<LinkPhase> {
        self.link.as_ref().map(|l| l.phase)
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn queue(&self) -> &NotificationQueue {
        &self.queue
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            role: self.profile.role,
            identity: self.link.as_ref().map(|l| l.identity.clone()),
            connectivity: self.connectivity,
            reconnecting: self.reconnecting,
            attempt: self.attempt,
            exhausted: self.exhausted,
            last_error: self.last_error.clone(),
            queue: self.queue.to_vec(),
        }
    }

    fn start(&mut self, identity: String) -> Vec<Effect> {
        if !is_valid_identity(&identity) {
            warn!(identity = %identity, "ignoring start with invalid identity");
            return Vec::new();
        }

        let Some(link) = self.link.as_mut() else {
            info!(role = %self.profile.role, identity = %identity, "starting session");
            self.link = Some(Link {
                identity: identity.clone(),
                phase: LinkPhase::Opening,
            });
            return vec![Effect::Open { identity }];
        };

        if link.identity != identity {
            warn!(
                current = %link.identity,
                requested = %identity,
                "session already bound to another identity, stop it first"
            );
            return Vec::new();
        }

        match link.phase {
            LinkPhase::Opening | LinkPhase::Open => {
                debug!(identity = %identity, phase = ?link.phase, "start ignored, link already active");
                Vec::new()
            }
            LinkPhase::Closed => {
                info!(identity = %identity, "link closed, reconnecting in place");
                link.phase = LinkPhase::Opening;
                if self.exhausted {
                    self.exhausted = false;
                    self.attempt = 0;
                }
                vec![Effect::CancelRetry, Effect::Open { identity }]
            }
        }
    }

    fn stop(&mut self) -> Vec<Effect> {
        let mut effects = vec![Effect::CancelRetry];
        if let Some(link) = self.link.take() {
            info!(identity = %link.identity, "stopping session");
            effects.push(Effect::CloseLink);
        }
        self.connectivity = Connectivity::Disconnected;
        self.reconnecting = false;
        self.attempt = 0;
        self.exhausted = false;
        self.last_error = None;
        self.queue.clear();
        effects
    }

    fn retry_due(&mut self) -> Vec<Effect> {
        let due = self.reconnecting
            && !self.exhausted
            && self.phase() == Some(LinkPhase::Closed);
        let Some(link) = self.link.as_mut().filter(|_| due) else {
            debug!("stale retry timer ignored");
            return Vec::new();
        };

        self.attempt = self.attempt.saturating_add(1);
        link.phase = LinkPhase::Opening;
        info!(identity = %link.identity, attempt = self.attempt, "reconnecting");
        vec![Effect::Open {
            identity: link.identity.clone(),
        }]
    }

    fn dispatch(&mut self, event: InboundEvent) -> Vec<Effect> {
        let Some(handler) = self.handlers.get(&event.name).copied() else {
            trace!(event = %event.name, "no route for event, ignoring");
            return Vec::new();
        };
        handler(self, event.payload)
    }

    /// Drops server pushes that arrive while the link is not open.
    fn accepting_pushes(&self, event: &str) -> bool {
        let open = self.phase() == Some(LinkPhase::Open);
        if !open {
            debug!(event, phase = ?self.phase(), "push while link not open, dropping");
        }
        open
    }

    fn on_connect(&mut self, _payload: Value) -> Vec<Effect> {
        let Some(link) = self.link.as_mut() else {
            debug!("connect without a link, ignoring");
            return Vec::new();
        };
        if link.phase != LinkPhase::Opening {
            debug!(phase = ?link.phase, "unexpected connect, ignoring");
            return Vec::new();
        }

        link.phase = LinkPhase::Open;
        self.connectivity = Connectivity::Connected;
        self.reconnecting = false;
        self.exhausted = false;
        self.attempt = 0;
        self.last_error = None;

        let role = self.profile.role;
        info!(role = %role, identity = %link.identity, "connected, joining {}", role.join_channel());
        vec![
            Effect::CancelRetry,
            Effect::Send(OutboundEvent::new(
                role.join_channel(),
                role.join_payload(&link.identity),
            )),
        ]
    }

    fn on_disconnect(&mut self, payload: Value) -> Vec<Effect> {
        let reason = payload
            .as_str()
            .map(DisconnectReason::parse)
            .unwrap_or(DisconnectReason::TransportClose);

        let Some(link) = self.link.as_mut() else {
            debug!(%reason, "disconnect without a link, ignoring");
            return Vec::new();
        };
        if link.phase == LinkPhase::Closed {
            debug!(%reason, "link already closed");
            return Vec::new();
        }

        link.phase = LinkPhase::Closed;
        self.connectivity = Connectivity::Disconnected;

        if reason.is_local() {
            info!(%reason, "disconnected");
            self.reconnecting = false;
            return Vec::new();
        }

        if self.attempt < self.reconnect.max_attempts {
            let delay = self.reconnect.delay_for_attempt(self.attempt);
            self.reconnecting = true;
            warn!(
                %reason,
                attempt = self.attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "connection lost, scheduling reconnect"
            );
            vec![
                Effect::ScheduleRetry(delay),
                Effect::Emit(SessionEvent::Reconnecting {
                    attempt: self.attempt + 1,
                    delay,
                }),
            ]
        } else {
            self.reconnecting = false;
            self.exhausted = true;
            warn!(
                %reason,
                attempts = self.attempt,
                "reconnect attempts exhausted, giving up"
            );
            vec![Effect::Emit(SessionEvent::ReconnectExhausted {
                attempts: self.attempt,
            })]
        }
    }

    fn on_connect_error(&mut self, payload: Value) -> Vec<Effect> {
        if self.link.is_none() {
            return Vec::new();
        }
        let message = SocketPacket::connect_error_message(&payload);
        warn!(error = %message, "connect error");
        self.last_error = Some(message.clone());
        vec![Effect::Emit(SessionEvent::ConnectError { message })]
    }

    fn on_new_order(&mut self, payload: Value) -> Vec<Effect> {
        if !self.accepting_pushes("new-order") {
            return Vec::new();
        }
        let order = match OrderNotification::decode(self.profile.role, &payload) {
            Ok(order) => order,
            Err(e) => {
                warn!(error = %e, "dropping undecodable order notification");
                return Vec::new();
            }
        };
        if self.queue.contains(&order.order_id) {
            debug!(order = %order.order_id, "order already queued, ignoring redelivery");
            return Vec::new();
        }

        info!(order = %order.order_id, number = ?order.order_number, "new order");
        self.queue.push(order.clone());
        vec![Effect::Emit(SessionEvent::OrderReceived(order))]
    }

    fn on_order_claimed(&mut self, payload: Value) -> Vec<Effect> {
        if !self.accepting_pushes("order-claimed") {
            return Vec::new();
        }
        let order_id = match OrderClaim::decode(&payload) {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "dropping undecodable order claim");
                return Vec::new();
            }
        };

        if self.queue.remove_by_order_id(&order_id) == 0 {
            debug!(order = %order_id, "claimed order not queued");
            return Vec::new();
        }
        info!(order = %order_id, "order claimed elsewhere, removed");
        vec![Effect::Emit(SessionEvent::OrderWithdrawn { order_id })]
    }

    fn on_status(&mut self, payload: Value) -> Vec<Effect> {
        if !self.accepting_pushes("status") {
            return Vec::new();
        }
        match StatusPayload::decode(&payload) {
            Ok(StatusPayload {
                online: Some(online),
                ..
            }) => {
                debug!(online, "status update");
                self.connectivity = if online {
                    Connectivity::Connected
                } else {
                    Connectivity::Disconnected
                };
            }
            Ok(_) => trace!("status without online flag"),
            Err(e) => warn!(error = %e, "dropping undecodable status"),
        }
        Vec::new()
    }
}
