//! Progress stream published while syncs run.

use nlmsync_core::types::StatusUpdate;
use tokio::sync::broadcast;
use tracing::info;

#[derive(Clone)]
pub struct StatusSender {
    tx: broadcast::Sender<StatusUpdate>,
}

impl StatusSender {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.tx.subscribe()
    }

    /// Publish a status line. Nobody listening is fine.
    pub fn update(&self, project: &str, text: impl Into<String>) {
        let update = StatusUpdate::new(project, text);
        info!(project = %update.project, "{}", update.text);
        let _ = self.tx.send(update);
    }
}

impl Default for StatusSender {
    fn default() -> Self {
        Self::new()
    }
}
