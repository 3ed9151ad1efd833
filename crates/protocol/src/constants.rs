use std::fmt;
use std::time::Duration;

/// Engine.IO protocol revision spoken by the dispatch server.
pub const ENGINE_IO_VERSION: u8 = 4;

/// Default Socket.IO mount path on the dispatch server.
pub const SOCKET_IO_PATH: &str = "/socket.io/";

/// Root namespace.
pub const ROOT_NAMESPACE: &str = "/";

/// Maximum accepted size of a single text frame (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Time allowed for dial, Engine.IO open and namespace connect combined.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

/// Used as the liveness window until the server's open packet says otherwise.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(25);
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(20);

// Reserved lifecycle events, synthesized by the transport.
pub const EVENT_CONNECT: &str = "connect";
pub const EVENT_DISCONNECT: &str = "disconnect";
pub const EVENT_CONNECT_ERROR: &str = "connect_error";

// Push events from the dispatch server.
pub const EVENT_NEW_ORDER: &str = "new-order";
pub const EVENT_NEW_ORDER_ADMIN: &str = "new-order-admin";
pub const EVENT_ORDER_ACCEPTED: &str = "order-accepted";
pub const EVENT_ORDER_REJECTED: &str = "order-rejected";
pub const EVENT_STATUS: &str = "status";

// Join channels.
pub const JOIN_ADMIN: &str = "join-admin";
pub const JOIN_DELIVERER: &str = "join-deliverer";

/// Why a channel went away.
///
/// The string forms are the ones Socket.IO clients report, so logs and UI
/// text line up with what server operators see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Closed by this client. Never triggers a reconnect.
    ClientDisconnect,
    /// The server sent a namespace disconnect.
    ServerDisconnect,
    /// No traffic within the ping window.
    PingTimeout,
    /// The underlying connection was closed.
    TransportClose,
    /// The underlying connection failed or could not be established.
    TransportError,
    /// The server sent a frame that could not be decoded.
    ParseError,
    /// Anything else a server or test harness reports.
    Other(String),
}

impl DisconnectReason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ClientDisconnect => "io client disconnect",
            Self::ServerDisconnect => "io server disconnect",
            Self::PingTimeout => "ping timeout",
            Self::TransportClose => "transport close",
            Self::TransportError => "transport error",
            Self::ParseError => "parse error",
            Self::Other(s) => s,
        }
    }

    /// Parses a reason string. Unknown strings are kept verbatim.
    pub fn parse(s: &str) -> Self {
        match s {
            "io client disconnect" => Self::ClientDisconnect,
            "io server disconnect" => Self::ServerDisconnect,
            "ping timeout" => Self::PingTimeout,
            "transport close" => Self::TransportClose,
            "transport error" => Self::TransportError,
            "parse error" => Self::ParseError,
            other => Self::Other(other.to_string()),
        }
    }

    /// `true` only for a close requested by this side.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::ClientDisconnect)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
