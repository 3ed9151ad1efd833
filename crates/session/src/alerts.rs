//! Hook for user-facing alerts (toast, sound) on new orders.

use dispatchlink_protocol::OrderNotification;

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("alert I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("alert playback failed: {0}")]
    Playback(String),
}

/// Receives every newly queued order. Failures are logged by the caller and
/// never affect the session.
pub trait AlertSink: Send + Sync {
    fn order_arrived(&self, order: &OrderNotification) -> Result<(), AlertError>;
}

/// Sink that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAlerts;

impl AlertSink for NoopAlerts {
    fn order_arrived(&self, _order: &OrderNotification) -> Result<(), AlertError> {
        Ok(())
    }
}
