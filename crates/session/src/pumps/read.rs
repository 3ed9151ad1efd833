//! WebSocket read pump: decodes frames, drives the Socket.IO handshake and
//! reports channel events.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use dispatchlink_protocol::constants::{MAX_FRAME_SIZE, ROOT_NAMESPACE};
use dispatchlink_protocol::{DisconnectReason, EnginePacket, InboundEvent, OutboundEvent, SocketPacket};

/// Channels and limits shared by the read pump.
pub(crate) struct ReadContext {
    pub(crate) events: mpsc::Sender<InboundEvent>,
    pub(crate) write_tx: mpsc::Sender<tungstenite::Message>,
    pub(crate) outbound_rx: mpsc::Receiver<OutboundEvent>,
    pub(crate) cancel: CancellationToken,
    /// Deadline for the open + namespace connect exchange.
    pub(crate) handshake_timeout: Duration,
}

/// What the pump should do after a frame.
enum Flow {
    Continue,
    Disconnect(DisconnectReason),
    /// Nobody listens to our events any more.
    Abandoned,
}

/// Per-connection handshake state.
struct Handshake {
    liveness: Duration,
    connected: bool,
}

/// Reads frames until the channel ends.
///
/// Any incoming frame pushes the liveness deadline out. Before the namespace
/// is joined the deadline is the handshake timeout; afterwards it is the
/// server's `pingInterval + pingTimeout`.
///
/// Returns the disconnect reason, or `None` when the channel was closed
/// locally and nothing should be reported.
pub(crate) async fn read_pump<S>(mut read: S, mut ctx: ReadContext) -> Option<DisconnectReason>
where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    let mut hs = Handshake {
        liveness: ctx.handshake_timeout,
        connected: false,
    };
    let mut outbound_open = true;

    let deadline = tokio::time::sleep(hs.liveness);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => return None,

            () = &mut deadline => {
                if hs.connected {
                    warn!("no traffic within ping window, connection dead");
                    return Some(DisconnectReason::PingTimeout);
                }
                warn!("handshake timed out");
                if ctx.events.send(InboundEvent::connect_error("handshake timed out")).await.is_err() {
                    return None;
                }
                return Some(DisconnectReason::TransportError);
            }

            out = ctx.outbound_rx.recv(), if hs.connected && outbound_open => {
                match out {
                    Some(event) => send_event(&ctx.write_tx, event).await,
                    None => outbound_open = false,
                }
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(msg)) => {
                        deadline.as_mut().reset(tokio::time::Instant::now() + hs.liveness);

                        match msg {
                            tungstenite::Message::Text(text) => {
                                match handle_text(&text, &mut hs, &ctx).await {
                                    Flow::Continue => {
                                        deadline.as_mut().reset(tokio::time::Instant::now() + hs.liveness);
                                    }
                                    Flow::Disconnect(reason) => return Some(reason),
                                    Flow::Abandoned => return None,
                                }
                            }
                            tungstenite::Message::Ping(data) => {
                                trace!("received ping frame, sending pong");
                                let _ = ctx.write_tx.send(tungstenite::Message::Pong(data)).await;
                            }
                            tungstenite::Message::Close(frame) => {
                                debug!(?frame, "received close frame");
                                return Some(DisconnectReason::TransportClose);
                            }
                            _ => {} // Binary, Pong
                        }
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket read error: {e}");
                        return Some(DisconnectReason::TransportError);
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        return Some(DisconnectReason::TransportClose);
                    }
                }
            }
        }
    }
}

/// Encodes an outbound event as a Socket.IO frame and queues it.
async fn send_event(write_tx: &mpsc::Sender<tungstenite::Message>, event: OutboundEvent) {
    let packet = EnginePacket::Message(SocketPacket::event(event.name.clone(), event.payload));
    match packet.encode() {
        Ok(text) => {
            trace!(event = %event.name, "sending event");
            let _ = write_tx.send(tungstenite::Message::Text(text.into())).await;
        }
        Err(e) => warn!(event = %event.name, error = %e, "failed to encode outbound event"),
    }
}

async fn write_packet(write_tx: &mpsc::Sender<tungstenite::Message>, packet: EnginePacket) {
    match packet.encode() {
        Ok(text) => {
            let _ = write_tx.send(tungstenite::Message::Text(text.into())).await;
        }
        Err(e) => warn!(error = %e, "failed to encode packet"),
    }
}

async fn report(events: &mpsc::Sender<InboundEvent>, event: InboundEvent) -> Flow {
    if events.send(event).await.is_err() {
        Flow::Abandoned
    } else {
        Flow::Continue
    }
}

/// Handles one text frame.
async fn handle_text(text: &str, hs: &mut Handshake, ctx: &ReadContext) -> Flow {
    if text.len() > MAX_FRAME_SIZE {
        warn!("frame too large ({} bytes), dropping", text.len());
        return Flow::Continue;
    }

    let packet = match EnginePacket::decode(text) {
        Ok(p) => p,
        Err(e) => {
            warn!("failed to parse packet: {e}");
            return Flow::Continue;
        }
    };

    match packet {
        EnginePacket::Open(open) => {
            debug!(
                sid = %open.sid,
                ping_interval_ms = open.ping_interval,
                ping_timeout_ms = open.ping_timeout,
                "engine open, joining root namespace"
            );
            hs.liveness = Duration::from_millis(open.ping_interval.saturating_add(open.ping_timeout));
            write_packet(&ctx.write_tx, EnginePacket::Message(SocketPacket::connect_root())).await;
            Flow::Continue
        }
        EnginePacket::Ping(data) => {
            trace!("engine ping, sending pong");
            write_packet(&ctx.write_tx, EnginePacket::Pong(data)).await;
            Flow::Continue
        }
        EnginePacket::Pong(_) | EnginePacket::Noop | EnginePacket::Upgrade => Flow::Continue,
        EnginePacket::Close => {
            debug!("engine close");
            Flow::Disconnect(DisconnectReason::TransportClose)
        }
        EnginePacket::Message(msg) if msg.namespace() != ROOT_NAMESPACE => {
            trace!(namespace = %msg.namespace(), "packet for foreign namespace, ignoring");
            Flow::Continue
        }
        EnginePacket::Message(SocketPacket::Connect { data, .. }) => {
            if hs.connected {
                return Flow::Continue;
            }
            hs.connected = true;
            debug!(sid = ?data.as_ref().and_then(|d| d.get("sid")), "namespace joined");
            report(&ctx.events, InboundEvent::connected()).await
        }
        EnginePacket::Message(SocketPacket::ConnectError { data, .. }) => {
            let message = SocketPacket::connect_error_message(&data);
            warn!(error = %message, "server refused namespace connect");
            match report(&ctx.events, InboundEvent::connect_error(message)).await {
                Flow::Continue => Flow::Disconnect(DisconnectReason::ServerDisconnect),
                other => other,
            }
        }
        EnginePacket::Message(SocketPacket::Disconnect { .. }) => {
            debug!("server disconnected namespace");
            Flow::Disconnect(DisconnectReason::ServerDisconnect)
        }
        EnginePacket::Message(SocketPacket::Event { name, args, .. }) => {
            if !hs.connected {
                debug!(event = %name, "event before namespace connect, dropping");
                return Flow::Continue;
            }
            trace!(event = %name, "received event");
            let payload = args.into_iter().next().unwrap_or(serde_json::Value::Null);
            report(&ctx.events, InboundEvent::new(name, payload)).await
        }
        EnginePacket::Message(SocketPacket::Ack { ack_id, .. }) => {
            trace!(ack_id, "ack without pending request, ignoring");
            Flow::Continue
        }
    }
}
