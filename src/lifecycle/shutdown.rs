//! Shutdown coordination.

use tokio::sync::broadcast;

/// Broadcast-based shutdown trigger.
///
/// The HTTP server holds one receiver and stops accepting connections when
/// it fires; in-flight contact submissions are allowed to finish.
pub struct Shutdown {
    /// Capacity 1: only the first trigger matters.
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a coordinator with no subscribers yet.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver for the server's graceful-shutdown future.
    ///
    /// Subscribe before triggering; a receiver created afterwards never
    /// sees the signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Notify every subscriber. Safe to call with none listening.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Receivers still alive, i.e. servers that have not finished draining.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
