//! Socket.IO-over-WebSocket connector for the dispatch server.
//!
//! Each call to [`WsConnector::connect`] spawns one channel task that dials,
//! runs the read and write pumps, and reports `connect`, `connect_error` and
//! `disconnect` through the session's event sender.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dispatchlink_protocol::constants::{
    ENGINE_IO_VERSION, HANDSHAKE_TIMEOUT, MAX_FRAME_SIZE, SOCKET_IO_PATH,
};
use dispatchlink_protocol::{DisconnectReason, InboundEvent, OutboundEvent};

use crate::pumps::read::{ReadContext, read_pump};
use crate::pumps::write::write_pump;
use crate::transport::{ChannelHandle, ConnectRequest, Connector, TransportError};

const OUTBOUND_BUFFER: usize = 64;
const WRITE_BUFFER: usize = 256;

/// Builds the WebSocket endpoint for a server base URL.
///
/// `http` and `https` map to `ws` and `wss`; `ws`/`wss` pass through.
pub fn socket_url(base: &str) -> Result<String, TransportError> {
    let base = base.trim().trim_end_matches('/');
    let (scheme, rest) = base
        .split_once("://")
        .ok_or_else(|| TransportError::InvalidUrl(base.to_string()))?;

    let scheme = match scheme.to_ascii_lowercase().as_str() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(TransportError::InvalidUrl(base.to_string())),
    };
    if rest.is_empty() {
        return Err(TransportError::InvalidUrl(base.to_string()));
    }

    Ok(format!(
        "{scheme}://{rest}{SOCKET_IO_PATH}?EIO={ENGINE_IO_VERSION}&transport=websocket"
    ))
}

/// Production [`Connector`] speaking Socket.IO protocol v5 (server v4) over a WebSocket.
#[derive(Debug, Clone)]
pub struct WsConnector {
    handshake_timeout: Duration,
}

impl WsConnector {
    pub fn new(handshake_timeout: Duration) -> Self {
        Self { handshake_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(HANDSHAKE_TIMEOUT)
    }
}

impl Connector for WsConnector {
    fn connect(
        &self,
        request: ConnectRequest,
        events: mpsc::Sender<InboundEvent>,
    ) -> ChannelHandle {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let cancel = CancellationToken::new();

        match socket_url(&request.server_url) {
            Ok(url) => {
                info!(
                    role = %request.role,
                    identity = %request.identity,
                    url = %url,
                    "opening channel"
                );
                tokio::spawn(run_channel(
                    url,
                    events,
                    outbound_rx,
                    cancel.clone(),
                    self.handshake_timeout,
                ));
            }
            Err(e) => {
                warn!(url = %request.server_url, error = %e, "cannot open channel");
                tokio::spawn(async move { fail(&events, &e).await });
            }
        }

        ChannelHandle::new(outbound_tx, cancel)
    }
}

/// Reports a channel that never got established.
async fn fail(events: &mpsc::Sender<InboundEvent>, err: &TransportError) {
    if events
        .send(InboundEvent::connect_error(err.to_string()))
        .await
        .is_ok()
    {
        let _ = events
            .send(InboundEvent::disconnected(&DisconnectReason::TransportError))
            .await;
    }
}

async fn run_channel(
    url: String,
    events: mpsc::Sender<InboundEvent>,
    outbound_rx: mpsc::Receiver<OutboundEvent>,
    cancel: CancellationToken,
    handshake_timeout: Duration,
) {
    let mut ws_config = tungstenite::protocol::WebSocketConfig::default();
    ws_config.max_message_size = Some(MAX_FRAME_SIZE);
    ws_config.max_frame_size = Some(MAX_FRAME_SIZE);

    let dial = tokio::time::timeout(
        handshake_timeout,
        tokio_tungstenite::connect_async_with_config(url.as_str(), Some(ws_config), false),
    );

    let ws_stream = tokio::select! {
        _ = cancel.cancelled() => {
            debug!(url = %url, "channel closed while dialing");
            return;
        }
        res = dial => match res {
            Ok(Ok((ws, _))) => ws,
            Ok(Err(e)) => {
                warn!(url = %url, error = %e, "dial failed");
                fail(&events, &TransportError::Ws(e)).await;
                return;
            }
            Err(_) => {
                warn!(url = %url, "dial timed out");
                fail(&events, &TransportError::Timeout).await;
                return;
            }
        }
    };
    let (write, read) = ws_stream.split();

    let (write_tx, write_rx) = mpsc::channel::<tungstenite::Message>(WRITE_BUFFER);
    let write_handle = tokio::spawn(write_pump(write, write_rx, cancel.clone()));

    let reason = read_pump(
        read,
        ReadContext {
            events: events.clone(),
            write_tx,
            outbound_rx,
            cancel: cancel.clone(),
            handshake_timeout,
        },
    )
    .await;

    cancel.cancel();
    let _ = write_handle.await;

    match reason {
        Some(reason) => {
            info!(url = %url, reason = %reason, "channel disconnected");
            let _ = events.send(InboundEvent::disconnected(&reason)).await;
        }
        None => debug!(url = %url, "channel closed locally"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatchlink_protocol::Role;
    use futures_util::SinkExt;
    use serde_json::json;
    use tokio::net::TcpListener;

    fn request(server_url: &str) -> ConnectRequest {
        ConnectRequest {
            server_url: server_url.into(),
            role: Role::Courier,
            identity: "courier-42".into(),
        }
    }

    #[test]
    fn socket_url_maps_schemes() {
        assert_eq!(
            socket_url("http://localhost:3000").unwrap(),
            "ws://localhost:3000/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            socket_url("https://dispatch.example.com/").unwrap(),
            "wss://dispatch.example.com/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            socket_url("ws://10.0.0.5:8080").unwrap(),
            "ws://10.0.0.5:8080/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn socket_url_rejects_garbage() {
        assert!(matches!(socket_url("ftp://x"), Err(TransportError::InvalidUrl(_))));
        assert!(matches!(socket_url("localhost:3000"), Err(TransportError::InvalidUrl(_))));
        assert!(matches!(socket_url("http://"), Err(TransportError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn invalid_url_reports_error_then_disconnect() {
        let (tx, mut rx) = mpsc::channel(8);
        let _handle = WsConnector::default().connect(request("ftp://x"), tx);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.name, "connect_error");
        assert!(first.payload["message"].as_str().unwrap().contains("invalid server URL"));
        assert_eq!(
            rx.recv().await.unwrap(),
            InboundEvent::disconnected(&DisconnectReason::TransportError)
        );
    }

    #[tokio::test]
    async fn unreachable_server_reports_transport_error() {
        let (tx, mut rx) = mpsc::channel(8);
        let _handle =
            WsConnector::new(Duration::from_secs(5)).connect(request("http://127.0.0.1:1"), tx);

        assert_eq!(rx.recv().await.unwrap().name, "connect_error");
        assert_eq!(
            rx.recv().await.unwrap(),
            InboundEvent::disconnected(&DisconnectReason::TransportError)
        );
    }

    #[tokio::test]
    async fn full_handshake_against_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (frames_tx, mut frames_rx) = mpsc::channel::<String>(8);
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(tungstenite::Message::Text(
                r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#
                    .to_string()
                    .into(),
            ))
            .await
            .unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if let tungstenite::Message::Text(t) = msg {
                    let t = t.as_str().to_string();
                    if t == "40" {
                        ws.send(tungstenite::Message::Text(r#"40{"sid":"n1"}"#.to_string().into()))
                            .await
                            .unwrap();
                    }
                    if frames_tx.send(t).await.is_err() {
                        break;
                    }
                }
            }
        });

        let (tx, mut rx) = mpsc::channel(8);
        let handle = WsConnector::default().connect(request(&format!("http://{addr}")), tx);

        assert_eq!(frames_rx.recv().await.unwrap(), "40");
        assert_eq!(rx.recv().await.unwrap(), InboundEvent::connected());

        handle
            .send(OutboundEvent::new(
                "join-deliverer",
                json!({"delivererId": "courier-42"}),
            ))
            .unwrap();
        assert_eq!(
            frames_rx.recv().await.unwrap(),
            r#"42["join-deliverer",{"delivererId":"courier-42"}]"#
        );

        handle.close();
        assert_eq!(frames_rx.recv().await.unwrap(), "41");
        // Locally closed channels report nothing further.
        assert!(rx.recv().await.is_none());
    }
}
