//! Cache-or-compute orchestration.
//!
//! Each request walks `Idle -> Checking -> {Loading | Computing} ->
//! Publishing -> Idle`, or ends in `Failed`. Requests take a ticket from a
//! per-session sequence; only the holder of the latest ticket may publish
//! to the shared state, so a slow computation cannot overwrite a selection
//! the user made after starting it.

pub mod inflight;

pub use inflight::InFlight;

use crate::compute::{ComputeError, ComputeRequest, ComputeService};
use crate::error::{InsightsError, InsightsResult};
use crate::index::AnalysisIndex;
use crate::models::{AnalysisIndexEntry, AnalysisKey, AnalysisResult};
use crate::state::SharedState;
use crate::store::AnalysisStore;
use futures::future::{BoxFuture, FutureExt};
use inflight::ComputeOutcome;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Where the latest request currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Idle,
    /// Looking the key up in the index.
    Checking,
    /// Reading a stored analysis.
    Loading,
    /// Waiting on the compute service.
    Computing,
    Publishing,
    Failed,
}

impl fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestPhase::Idle => write!(f, "idle"),
            RequestPhase::Checking => write!(f, "checking"),
            RequestPhase::Loading => write!(f, "loading"),
            RequestPhase::Computing => write!(f, "computing"),
            RequestPhase::Publishing => write!(f, "publishing"),
            RequestPhase::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket(u64);

/// A successfully retrieved analysis.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub analysis: Arc<AnalysisResult>,
    /// `false` when a newer request superseded this one before it finished.
    pub published: bool,
}

pub struct Orchestrator {
    store: Arc<dyn AnalysisStore>,
    compute: Arc<dyn ComputeService>,
    state: Arc<SharedState>,
    index: Arc<AnalysisIndex>,
    in_flight: Arc<InFlight>,
    /// Latest ticket handed out. Also guards publishing.
    sequence: Mutex<u64>,
    phase: watch::Sender<RequestPhase>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn AnalysisStore>,
        compute: Arc<dyn ComputeService>,
        state: Arc<SharedState>,
        index: Arc<AnalysisIndex>,
    ) -> Self {
        let (phase, _) = watch::channel(RequestPhase::Idle);
        Self {
            store,
            compute,
            state,
            index,
            in_flight: Arc::new(InFlight::new()),
            sequence: Mutex::new(0),
            phase,
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> RequestPhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<RequestPhase> {
        self.phase.subscribe()
    }

    /// Number of computations currently running.
    #[cfg(test)]
    pub fn computations_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Load a stored analysis and publish it. Bypasses the index.
    pub async fn open_existing(&self, key: &AnalysisKey) -> InsightsResult<Delivery> {
        let ticket = self.begin();
        self.set_phase(ticket, RequestPhase::Loading);
        self.load(ticket, key).await
    }

    /// Compute a fresh analysis, persist it, then publish it.
    ///
    /// Joins an identical computation that is already running instead of
    /// starting a second one. Never retries on its own.
    pub async fn run_new(
        &self,
        user_id: &str,
        app_id: &str,
        region: &str,
    ) -> InsightsResult<Delivery> {
        let key = AnalysisKey::new(user_id, app_id, region)?;
        let ticket = self.begin();
        self.compute_and_publish(ticket, key).await
    }

    /// Serve the analysis from the store when it exists, compute it otherwise.
    pub async fn request(
        &self,
        user_id: &str,
        app_id: &str,
        region: &str,
    ) -> InsightsResult<Delivery> {
        let key = AnalysisKey::new(user_id, app_id, region)?;
        let ticket = self.begin();
        self.set_phase(ticket, RequestPhase::Checking);

        let listed = match self.index.list_analyses(user_id).await {
            Ok(entries) => entries.into_iter().any(|entry| entry.key == key),
            Err(e) => return self.fail(ticket, e),
        };

        if listed {
            debug!("Cache hit for {}", key);
            self.set_phase(ticket, RequestPhase::Loading);
            self.load(ticket, &key).await
        } else {
            debug!("Cache miss for {}", key);
            self.compute_and_publish(ticket, key).await
        }
    }

    /// Make every request in flight stale, e.g. when the session ends.
    pub fn supersede_all(&self) {
        let mut sequence = self.sequence.lock();
        *sequence += 1;
        self.phase.send_replace(RequestPhase::Idle);
    }

    async fn load(&self, ticket: Ticket, key: &AnalysisKey) -> InsightsResult<Delivery> {
        match self.store.get(key).await {
            Ok(Some(analysis)) => Ok(self.deliver(ticket, Arc::new(analysis))),
            Ok(None) => {
                warn!("Listed analysis {} has no stored payload", key);
                self.fail(ticket, InsightsError::NotFound(key.document_id()))
            }
            Err(e) => self.fail(ticket, e),
        }
    }

    async fn compute_and_publish(
        &self,
        ticket: Ticket,
        key: AnalysisKey,
    ) -> InsightsResult<Delivery> {
        self.set_phase(ticket, RequestPhase::Computing);
        let pending = self
            .in_flight
            .join_or_start(&key, || self.start_computation(key.clone()));

        match pending.await {
            Ok(analysis) => Ok(self.deliver(ticket, analysis)),
            Err(e) => self.fail(ticket, e),
        }
    }

    /// The detached part of a computation: call the service, then persist.
    fn start_computation(&self, key: AnalysisKey) -> BoxFuture<'static, ComputeOutcome> {
        let compute = Arc::clone(&self.compute);
        let store = Arc::clone(&self.store);
        let index = Arc::clone(&self.index);

        async move {
            info!("Requesting new analysis for {} ({})", key.app_id, key.region);
            let analysis = compute.run(&ComputeRequest::from(&key)).await?;
            analysis.validate().map_err(ComputeError::Malformed)?;

            let timestamp = store.put(&key, &analysis).await?;
            index.record(AnalysisIndexEntry { key, timestamp });
            Ok::<_, InsightsError>(Arc::new(analysis))
        }
        .boxed()
    }

    fn begin(&self) -> Ticket {
        let mut sequence = self.sequence.lock();
        *sequence += 1;
        Ticket(*sequence)
    }

    fn set_phase(&self, ticket: Ticket, phase: RequestPhase) {
        let sequence = self.sequence.lock();
        if *sequence == ticket.0 {
            debug!("Request {} -> {}", ticket.0, phase);
            self.phase.send_replace(phase);
        }
    }

    fn deliver(&self, ticket: Ticket, analysis: Arc<AnalysisResult>) -> Delivery {
        self.set_phase(ticket, RequestPhase::Publishing);

        // Check and publish under one lock so no newer ticket can slip in between.
        let published = {
            let sequence = self.sequence.lock();
            if *sequence == ticket.0 {
                self.state.set_active(Arc::clone(&analysis));
                self.phase.send_replace(RequestPhase::Idle);
                true
            } else {
                false
            }
        };

        if published {
            info!("Now showing {}", analysis.reference_app.app_id);
        } else {
            info!(
                "Request {} for {} was superseded; not publishing",
                ticket.0, analysis.reference_app.app_id
            );
        }

        Delivery {
            analysis,
            published,
        }
    }

    fn fail<T>(&self, ticket: Ticket, error: InsightsError) -> InsightsResult<T> {
        self.set_phase(ticket, RequestPhase::Failed);
        warn!("Request {} failed: {}", ticket.0, error);
        Err(error)
    }
}
