//! At-most-one computation per key.
//!
//! The first request for a key spawns the computation and registers a
//! shared handle to it; later requests for the same key await that handle.
//! The spawned task outlives its callers, so a result is persisted even
//! if everyone waiting for it has gone away.

use crate::compute::ComputeError;
use crate::error::{InsightsError, InsightsResult};
use crate::models::{AnalysisKey, AnalysisResult};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub type ComputeOutcome = InsightsResult<Arc<AnalysisResult>>;
pub type PendingAnalysis = Shared<BoxFuture<'static, ComputeOutcome>>;

#[derive(Default)]
pub struct InFlight {
    pending: Mutex<HashMap<AnalysisKey, PendingAnalysis>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the computation running for `key`, or spawn `start()` if none is.
    pub fn join_or_start<F>(self: &Arc<Self>, key: &AnalysisKey, start: F) -> PendingAnalysis
    where
        F: FnOnce() -> BoxFuture<'static, ComputeOutcome>,
    {
        let mut pending = self.pending.lock();
        if let Some(running) = pending.get(key) {
            debug!("Joining in-flight computation for {}", key);
            return running.clone();
        }

        let registry = Arc::clone(self);
        let slot = key.clone();
        let work = start();
        // The registry lock is held until the handle is inserted, so the
        // task cannot remove its slot before it exists.
        let task = tokio::spawn(async move {
            let outcome = work.await;
            registry.pending.lock().remove(&slot);
            outcome
        });

        let handle = async move {
            task.await.unwrap_or_else(|e| {
                Err(InsightsError::ComputeFailed(ComputeError::Transport(
                    format!("computation task ended abnormally: {}", e),
                )))
            })
        }
        .boxed()
        .shared();

        pending.insert(key.clone(), handle.clone());
        handle
    }

    #[cfg(test)]
    pub fn is_running(&self, key: &AnalysisKey) -> bool {
        self.pending.lock().contains_key(key)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }
}
