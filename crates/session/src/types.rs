//! Public types for the notification session.

use std::time::Duration;

use dispatchlink_protocol::{OrderNotification, Role};

use crate::role::RoleProfile;

/// Server used when neither configuration nor environment name one.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";

/// Environment variable overriding the server URL.
pub const SERVER_URL_ENV: &str = "DISPATCH_SERVER_URL";

/// Primary connectivity as last reported by the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Connected,
    Disconnected,
}

/// Connectivity as shown to the UI.
///
/// Derived from [`Connectivity`] and the reconnecting flag: a live
/// connection wins, then a pending retry, else disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Disconnected,
    Connected,
    Reconnecting,
}

/// Events emitted by the session manager.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Derived connectivity changed.
    StateChanged(ConnectivityState),
    /// A new order was queued. UI layers hook toasts and sounds here.
    OrderReceived(OrderNotification),
    /// An order left the queue because another consumer claimed it.
    OrderWithdrawn { order_id: String },
    /// A reconnect attempt is scheduled.
    Reconnecting { attempt: u32, delay: Duration },
    /// The server refused or failed the connection. Not fatal.
    ConnectError { message: String },
    /// Retries are exhausted; only an explicit `start` revives the session.
    ReconnectExhausted { attempts: u32 },
}

/// Read-only view of a session, published after every transition.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub role: Role,
    pub identity: Option<String>,
    pub connectivity: Connectivity,
    pub reconnecting: bool,
    pub attempt: u32,
    pub exhausted: bool,
    pub last_error: Option<String>,
    pub queue: Vec<OrderNotification>,
}

impl SessionSnapshot {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            identity: None,
            connectivity: Connectivity::Disconnected,
            reconnecting: false,
            attempt: 0,
            exhausted: false,
            last_error: None,
            queue: Vec::new(),
        }
    }

    pub fn state(&self) -> ConnectivityState {
        match (self.connectivity, self.reconnecting) {
            (Connectivity::Connected, _) => ConnectivityState::Connected,
            (Connectivity::Disconnected, true) => ConnectivityState::Reconnecting,
            (Connectivity::Disconnected, false) => ConnectivityState::Disconnected,
        }
    }
}

/// Configuration for automatic reconnection with exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Maximum delay between attempts (backoff cap).
    pub max_delay: Duration,
    /// Attempts allowed before giving up until the next explicit start.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(60),
            max_attempts: 10,
        }
    }
}

impl ReconnectConfig {
    /// Delay before retrying after `attempt` previous failures (0-based):
    /// `min(initial_delay * 2^attempt, max_delay)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = u64::try_from(self.initial_delay.as_millis()).unwrap_or(u64::MAX);
        let cap = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(base.saturating_mul(factor).min(cap))
    }
}

/// Everything a session needs besides its transport.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL of the dispatch server, e.g. `https://api.example.com`.
    pub server_url: String,
    pub profile: RoleProfile,
    pub reconnect: ReconnectConfig,
}

impl SessionConfig {
    pub fn new(server_url: impl Into<String>, profile: RoleProfile) -> Self {
        Self {
            server_url: server_url.into(),
            profile,
            reconnect: ReconnectConfig::default(),
        }
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_one_second() {
        let cfg = ReconnectConfig::default();
        assert_eq!(cfg.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(cfg.delay_for_attempt(1), Duration::from_millis(2000));
        assert_eq!(cfg.delay_for_attempt(3), Duration::from_millis(8000));
        assert_eq!(cfg.delay_for_attempt(5), Duration::from_millis(32000));
        assert_eq!(cfg.delay_for_attempt(6), Duration::from_secs(60));
    }

    #[test]
    fn backoff_is_monotonic_and_capped() {
        let cfg = ReconnectConfig::default();
        for a1 in 0..=9u32 {
            for a2 in (a1 + 1)..=9 {
                assert!(cfg.delay_for_attempt(a1) <= cfg.delay_for_attempt(a2));
            }
        }
        for a in [0, 9, 10, 63, 64, 200, u32::MAX] {
            assert!(cfg.delay_for_attempt(a) <= Duration::from_secs(60));
        }
    }

    #[test]
    fn backoff_respects_custom_cap() {
        let cfg = ReconnectConfig {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(1),
            max_attempts: 3,
        };
        assert_eq!(cfg.delay_for_attempt(0), Duration::from_millis(250));
        assert_eq!(cfg.delay_for_attempt(2), Duration::from_secs(1));
        assert_eq!(cfg.delay_for_attempt(40), Duration::from_secs(1));
    }

    #[test]
    fn snapshot_state_derivation() {
        let mut snap = SessionSnapshot::new(Role::Courier);
        assert_eq!(snap.state(), ConnectivityState::Disconnected);

        snap.reconnecting = true;
        assert_eq!(snap.state(), ConnectivityState::Reconnecting);

        snap.connectivity = Connectivity::Connected;
        assert_eq!(snap.state(), ConnectivityState::Connected);
    }
}
