//! Progress events emitted during segment generation.
//!
//! Fan-out is keyed by project id over `tokio::sync::broadcast`:
//! ephemeral, at-least-once per state transition, never replayed. A
//! subscriber joining mid-run sees only events from that point on.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};

use crate::project::PipelineState;

/// Buffered events per subscriber before lagging ones drop messages.
const PROGRESS_CHANNEL_SIZE: usize = 64;

/// One progress notification.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Project the update belongs to.
    pub project_id: String,
    /// Segments completed so far.
    pub current_count: u32,
    /// Total segments in the project.
    pub total_count: u32,
    /// Human-readable position, e.g. `"Segment 3/10"`.
    pub label: String,
    /// Pipeline state at the time of the update.
    pub pipeline_state: PipelineState,
}

/// Fan-out notification hub keyed by project id.
///
/// Cheaply cloneable; all clones share the same per-project senders.
#[derive(Debug, Clone, Default)]
pub struct ProgressHub {
    senders: Arc<Mutex<HashMap<String, broadcast::Sender<ProgressUpdate>>>>,
}

impl ProgressHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to updates for one project.
    ///
    /// Only updates published after this call are delivered.
    pub async fn subscribe(&self, project_id: &str) -> broadcast::Receiver<ProgressUpdate> {
        let mut senders = self.senders.lock().await;
        senders
            .entry(project_id.to_owned())
            .or_insert_with(|| broadcast::channel(PROGRESS_CHANNEL_SIZE).0)
            .subscribe()
    }

    /// Publish an update to all current subscribers of its project.
    ///
    /// A send with no subscribers is not an error; the update is
    /// simply dropped.
    pub async fn publish(&self, update: ProgressUpdate) {
        let senders = self.senders.lock().await;
        if let Some(tx) = senders.get(&update.project_id) {
            let _ = tx.send(update);
        }
    }

    /// Drop the channel for a project (e.g. after deletion).
    pub async fn remove(&self, project_id: &str) {
        let mut senders = self.senders.lock().await;
        senders.remove(project_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(project_id: &str, current: u32) -> ProgressUpdate {
        ProgressUpdate {
            project_id: project_id.to_owned(),
            current_count: current,
            total_count: 10,
            label: format!("Segment {}/10", current + 1),
            pipeline_state: PipelineState::Generating,
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_updates() {
        let hub = ProgressHub::new();
        let mut rx = hub.subscribe("p1").await;

        hub.publish(update("p1", 3)).await;

        let received = match rx.recv().await {
            Ok(u) => u,
            Err(e) => panic!("recv failed: {e}"),
        };
        assert_eq!(received.current_count, 3);
        assert_eq!(received.label, "Segment 4/10");
    }

    #[tokio::test]
    async fn updates_are_keyed_by_project() {
        let hub = ProgressHub::new();
        let mut rx_a = hub.subscribe("a").await;
        let mut rx_b = hub.subscribe("b").await;

        hub.publish(update("a", 1)).await;

        let got = match rx_a.recv().await {
            Ok(u) => u,
            Err(e) => panic!("recv failed: {e}"),
        };
        assert_eq!(got.project_id, "a");
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_updates() {
        let hub = ProgressHub::new();
        let _early = hub.subscribe("p1").await;

        hub.publish(update("p1", 0)).await;

        let mut late = hub.subscribe("p1").await;
        hub.publish(update("p1", 1)).await;

        let got = match late.recv().await {
            Ok(u) => u,
            Err(e) => panic!("recv failed: {e}"),
        };
        assert_eq!(got.current_count, 1);
        assert!(late.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let hub = ProgressHub::new();
        hub.publish(update("ghost", 0)).await;
    }
}
