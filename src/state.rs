//! Session-scoped holder of the active analysis.
//!
//! Views receive an `Arc<SharedState>` when they are built and subscribe
//! to it; there is no global instance. Every `set_active` notifies all
//! subscribers, even if the new analysis equals the old one.

use crate::models::AnalysisResult;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

pub type ActiveAnalysis = Option<Arc<AnalysisResult>>;

pub struct SharedState {
    active: watch::Sender<ActiveAnalysis>,
}

impl SharedState {
    pub fn new() -> Self {
        let (active, _) = watch::channel(None);
        Self { active }
    }

    /// The analysis currently on display. `None` means nothing to show.
    pub fn get_active(&self) -> ActiveAnalysis {
        self.active.borrow().clone()
    }

    /// Replace the active analysis. Only the orchestrator calls this.
    pub fn set_active(&self, analysis: Arc<AnalysisResult>) {
        debug!(
            "Publishing analysis for {}",
            analysis.reference_app.app_id
        );
        self.active.send_replace(Some(analysis));
    }

    /// Drop the active analysis, e.g. on sign-out.
    pub fn clear(&self) {
        self.active.send_replace(None);
    }

    /// Receive a notification on every change.
    pub fn subscribe(&self) -> watch::Receiver<ActiveAnalysis> {
        self.active.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.active.receiver_count()
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_analysis;

    #[test]
    fn test_absent_before_first_publish() {
        let state = SharedState::new();
        assert!(state.get_active().is_none());
        assert_eq!(state.subscriber_count(), 0);
    }

    #[test]
    fn test_set_active_replaces() {
        let state = SharedState::new();
        state.set_active(Arc::new(sample_analysis("com.a", &["com.b"])));
        state.set_active(Arc::new(sample_analysis("com.c", &[])));

        let active = state.get_active().unwrap();
        assert_eq!(active.reference_app.app_id, "com.c");
        assert!(active.competitors.is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_see_every_publish() {
        let state = SharedState::new();
        let mut view_a = state.subscribe();
        let mut view_b = state.subscribe();
        assert_eq!(state.subscriber_count(), 2);

        let analysis = Arc::new(sample_analysis("com.a", &[]));
        state.set_active(Arc::clone(&analysis));

        view_a.changed().await.unwrap();
        view_b.changed().await.unwrap();
        assert_eq!(view_a.borrow_and_update().as_deref(), Some(&*analysis));

        // Publishing an equal value still counts as a change.
        state.set_active(Arc::clone(&analysis));
        assert!(view_a.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_clear_notifies() {
        let state = SharedState::new();
        state.set_active(Arc::new(sample_analysis("com.a", &[])));
        let mut view = state.subscribe();

        state.clear();
        view.changed().await.unwrap();
        assert!(view.borrow().is_none());
        assert!(state.get_active().is_none());
    }
}
