use cctop_core::{SessionMonitor, SessionRow};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::config::Settings;

/// Message sent from poller to main loop
#[derive(Debug)]
pub enum PollMessage {
    /// Updated, sorted list of sessions
    SessionsUpdated(Vec<SessionRow>),
}

/// Drives the session monitor from a timer
pub struct Poller {
    monitor: SessionMonitor,
    tick: Duration,
}

impl Poller {
    /// Create a new poller
    pub fn new(settings: &Settings) -> Self {
        Self::with_monitor(
            SessionMonitor::new(&settings.monitor),
            settings.monitor.tick(),
        )
    }

    pub fn with_monitor(monitor: SessionMonitor, tick: Duration) -> Self {
        Self { monitor, tick }
    }

    /// Start polling in a background task
    pub fn start(self) -> mpsc::Receiver<PollMessage> {
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            self.run(tx).await;
        });

        rx
    }

    /// Run the polling loop until the receiver goes away
    async fn run(mut self, tx: mpsc::Sender<PollMessage>) {
        let mut interval = tokio::time::interval(self.tick);
        // A slow full scan must not be followed by a burst of catch-up ticks
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = tx.closed() => break,
            }

            if let Some(rows) = self.monitor.tick() {
                debug!(sessions = rows.len(), "sessions refreshed");
                if tx.send(PollMessage::SessionsUpdated(rows)).await.is_err() {
                    break; // Receiver dropped
                }
            }
        }

        self.monitor.shutdown();
    }
}
