//! Terminal alerts: a log line per order plus a sound.

use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;

use dispatchlink_protocol::OrderNotification;
use dispatchlink_session::{AlertError, AlertSink};

use crate::config::AlertSettings;

/// Logs a toast line for every new order and plays the configured sound
/// through an external player, ringing the terminal bell when that fails.
pub struct ConsoleAlerts {
    sound: bool,
    player: String,
    sound_file: Option<PathBuf>,
}

impl ConsoleAlerts {
    pub fn new(settings: &AlertSettings) -> Self {
        Self {
            sound: settings.sound,
            player: settings.player.clone(),
            sound_file: settings.sound_file.clone(),
        }
    }

    fn play(&self) -> Result<(), AlertError> {
        let Some(file) = &self.sound_file else {
            return ring_bell();
        };

        let spawned = tokio::process::Command::new(&self.player)
            .arg(file)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!(player = %self.player, error = %e, "sound player unavailable");
                return ring_bell();
            }
        };

        // Reap the player in the background; a failed playback falls back to the bell.
        let player = self.player.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {}
                Ok(status) => {
                    tracing::debug!(%player, %status, "sound player failed");
                    if let Err(e) = ring_bell() {
                        tracing::warn!(error = %e, "terminal bell failed");
                    }
                }
                Err(e) => tracing::warn!(%player, error = %e, "sound player wait failed"),
            }
        });
        Ok(())
    }
}

impl AlertSink for ConsoleAlerts {
    fn order_arrived(&self, order: &OrderNotification) -> Result<(), AlertError> {
        tracing::info!(target: "toast", "{}", toast_line(order));
        if self.sound {
            self.play()?;
        }
        Ok(())
    }
}

fn ring_bell() -> Result<(), AlertError> {
    let mut out = std::io::stdout().lock();
    out.write_all(b"\x07")?;
    out.flush()?;
    Ok(())
}

/// One-line summary such as `New order #1001 · $25.50 · Centro · 3.2 km`.
pub fn toast_line(order: &OrderNotification) -> String {
    let mut parts = vec![
        format!("New order {}", order.label()),
        format!("${:.2}", order.effective_total()),
    ];
    if let Some(zone) = order.enrichment.zone() {
        parts.push(zone.name().to_string());
    }
    if let Some(km) = order.enrichment.distance_km() {
        parts.push(format!("{km:.1} km"));
    }
    if let Some(address) = &order.delivery_address {
        parts.push(address.summary());
    }
    parts.join(" · ")
}
