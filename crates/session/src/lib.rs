//! Realtime order-notification session for the dispatch server.
//!
//! Keeps one Socket.IO channel open per role, joins the role's broadcast
//! room, queues incoming orders and reconnects with bounded exponential
//! backoff when the channel drops.

pub mod alerts;
pub mod machine;
pub mod manager;
pub(crate) mod pumps;
pub mod queue;
pub mod role;
pub mod transport;
pub mod types;
pub mod ws_client;

pub use alerts::{AlertError, AlertSink, NoopAlerts};
pub use manager::SessionManager;
pub use queue::NotificationQueue;
pub use role::{RoleProfile, Route};
pub use transport::{ChannelHandle, ConnectRequest, Connector, TransportError};
pub use types::{
    Connectivity, ConnectivityState, ReconnectConfig, SessionConfig, SessionEvent,
    SessionSnapshot,
};
pub use ws_client::WsConnector;
