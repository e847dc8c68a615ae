//! The per-user session handed to every view.
//!
//! A `Session` bundles the shared state, the index and the orchestrator
//! behind the signed-in user id, and reacts to sign-in/sign-out events from
//! the authentication provider.

use crate::compute::ComputeService;
use crate::error::{InsightsError, InsightsResult};
use crate::index::AnalysisIndex;
use crate::models::{validate_user_id, AnalysisIndexEntry, AnalysisKey};
use crate::orchestrator::{Delivery, Orchestrator, RequestPhase};
use crate::state::{ActiveAnalysis, SharedState};
use crate::store::AnalysisStore;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Transitions reported by the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn { user_id: String },
    SignedOut,
}

pub struct Session {
    user: RwLock<Option<String>>,
    state: Arc<SharedState>,
    index: Arc<AnalysisIndex>,
    orchestrator: Orchestrator,
}

impl Session {
    pub fn new(store: Arc<dyn AnalysisStore>, compute: Arc<dyn ComputeService>) -> Self {
        let state = Arc::new(SharedState::new());
        let index = Arc::new(AnalysisIndex::new(Arc::clone(&store)));
        let orchestrator =
            Orchestrator::new(store, compute, Arc::clone(&state), Arc::clone(&index));

        Self {
            user: RwLock::new(None),
            state,
            index,
            orchestrator,
        }
    }

    pub fn handle_auth_event(&self, event: AuthEvent) -> InsightsResult<()> {
        match event {
            AuthEvent::SignedIn { user_id } => {
                validate_user_id(&user_id)?;
                let mut user = self.user.write();
                if user.as_deref() != Some(user_id.as_str()) {
                    self.reset();
                    self.index.scope_to(&user_id);
                    info!("Signed in as {}", user_id);
                    *user = Some(user_id);
                }
            }
            AuthEvent::SignedOut => {
                let mut user = self.user.write();
                if let Some(previous) = user.take() {
                    info!("Signed out {}", previous);
                }
                self.reset();
            }
        }
        Ok(())
    }

    /// Drop everything tied to the previous user.
    fn reset(&self) {
        self.orchestrator.supersede_all();
        self.state.clear();
        self.index.clear();
    }

    pub fn user_id(&self) -> InsightsResult<String> {
        self.user
            .read()
            .clone()
            .ok_or_else(|| InsightsError::InvalidRequest("no user is signed in".to_string()))
    }

    #[cfg(test)]
    pub fn is_signed_in(&self) -> bool {
        self.user.read().is_some()
    }

    pub async fn list_analyses(&self) -> InsightsResult<Vec<AnalysisIndexEntry>> {
        let user_id = self.user_id()?;
        self.index.list_analyses(&user_id).await
    }

    /// Open a listed analysis by its `app_id;region` key.
    pub async fn open_existing(&self, document_id: &str) -> InsightsResult<Delivery> {
        let key = AnalysisKey::from_document_id(&self.user_id()?, document_id)?;
        self.orchestrator.open_existing(&key).await
    }

    pub async fn run_new(&self, app_id: &str, region: &str) -> InsightsResult<Delivery> {
        let user_id = self.user_id()?;
        self.orchestrator.run_new(&user_id, app_id, region).await
    }

    pub async fn request(&self, app_id: &str, region: &str) -> InsightsResult<Delivery> {
        let user_id = self.user_id()?;
        self.orchestrator.request(&user_id, app_id, region).await
    }

    pub fn get_active(&self) -> ActiveAnalysis {
        self.state.get_active()
    }

    #[allow(dead_code)] // for views that redraw on every publish; the CLI renders once
    pub fn subscribe(&self) -> watch::Receiver<ActiveAnalysis> {
        self.state.subscribe()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<RequestPhase> {
        self.orchestrator.subscribe_phase()
    }

    /// Last listing plus analyses computed since, without a store round trip.
    #[allow(dead_code)] // for views that redraw the dashboard; the CLI lists once
    pub fn cached_listing(&self) -> Vec<AnalysisIndexEntry> {
        self.index.snapshot()
    }
}
