//! Application orchestrator: runs one session and reports on it until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use dispatchlink_session::{SessionEvent, SessionManager, WsConnector};

use crate::alerts::ConsoleAlerts;
use crate::config::Config;

/// Runs the session until shutdown is requested.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let identity = config
        .identity
        .clone()
        .context("no identity configured; pass --identity or set DISPATCH_IDENTITY")?;

    let alerts = Arc::new(ConsoleAlerts::new(&config.alerts));
    let manager = SessionManager::with_alerts(
        config.session_config(),
        Arc::new(WsConnector::default()),
        alerts,
    );
    let mut events = manager
        .take_events()
        .await
        .context("session events already taken")?;

    tracing::info!(
        role = %config.role,
        identity = %identity,
        server = %config.server_url,
        "starting session"
    );
    manager.start(identity);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("SIGINT received, shutting down");
                break;
            }
            event = events.recv() => match event {
                Some(event) => report(&manager, event),
                None => break,
            },
        }
    }

    manager.stop();
    manager.shutdown().await;
    Ok(())
}

fn report(manager: &SessionManager, event: SessionEvent) {
    match event {
        SessionEvent::StateChanged(state) => {
            tracing::info!(?state, "connection state changed");
        }
        SessionEvent::OrderReceived(order) => {
            tracing::debug!(
                order = %order.order_id,
                pending = manager.snapshot().queue.len(),
                "order queued"
            );
        }
        SessionEvent::OrderWithdrawn { order_id } => {
            tracing::info!(
                order = %order_id,
                pending = manager.snapshot().queue.len(),
                "order taken by another courier"
            );
        }
        SessionEvent::Reconnecting { attempt, delay } => {
            tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting");
        }
        SessionEvent::ConnectError { message } => {
            tracing::warn!(error = %message, "connection error");
        }
        SessionEvent::ReconnectExhausted { attempts } => {
            tracing::error!(
                attempts,
                "giving up on the dispatch server; restart to try again"
            );
        }
    }
}
