//! WebSocket write pump: serialises outbound frames.

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::error;

use dispatchlink_protocol::{EnginePacket, SocketPacket};

/// Writes frames to the WebSocket until cancelled, then says goodbye with a
/// namespace disconnect and a close frame.
pub(crate) async fn write_pump<S>(
    mut write: S,
    mut write_rx: mpsc::Receiver<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = write_rx.recv() => {
                match msg {
                    Some(m) => {
                        if let Err(e) = write.send(m).await {
                            error!("WebSocket write error: {e}");
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    if let Ok(bye) = EnginePacket::Message(SocketPacket::disconnect_root()).encode() {
        let _ = write.send(tungstenite::Message::Text(bye.into())).await;
    }
    let _ = write.send(tungstenite::Message::Close(None)).await;
}
