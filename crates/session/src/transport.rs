//! Seam between the session loop and the network.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;

use dispatchlink_protocol::{InboundEvent, OutboundEvent, Role};

/// Errors from a channel transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("handshake timed out")]
    Timeout,

    #[error("outbound buffer full")]
    Backpressure,

    #[error("connection closed")]
    Closed,
}

/// What a connector needs to open a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectRequest {
    pub server_url: String,
    pub role: Role,
    pub identity: String,
}

/// Opens channels to the dispatch server.
///
/// `connect` must return immediately and report progress through `events`:
/// `connect` once usable, `connect_error` when establishing fails, and a
/// final `disconnect` with a reason unless the handle was closed locally.
pub trait Connector: Send + Sync {
    fn connect(&self, request: ConnectRequest, events: mpsc::Sender<InboundEvent>)
    -> ChannelHandle;
}

/// Owning handle to one channel. Dropping it closes the channel.
#[derive(Debug)]
pub struct ChannelHandle {
    outbound: mpsc::Sender<OutboundEvent>,
    cancel: CancellationToken,
}

impl ChannelHandle {
    pub fn new(outbound: mpsc::Sender<OutboundEvent>, cancel: CancellationToken) -> Self {
        Self { outbound, cancel }
    }

    /// Queues an event for sending without waiting.
    pub fn send(&self, event: OutboundEvent) -> Result<(), TransportError> {
        self.outbound.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::Backpressure,
            TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    /// Closes the channel. No further events are reported for it.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
