//! Shared helpers for unit tests.

use crate::compute::{ComputeError, ComputeRequest, ComputeService};
use crate::models::{AnalysisResult, App, Insight};
use crate::store::FileStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Semaphore;

pub fn sample_app(app_id: &str) -> App {
    App {
        app_id: app_id.to_string(),
        title: format!("Title of {}", app_id),
        description: format!("<p>{} helps you do things.</p>", app_id),
        genre: "Education".to_string(),
        icon_url: format!("https://icons.example.com/{}.png", app_id),
        installs: "10M+".to_string(),
        ratings: Some(4.5),
        in_app_product_price: None,
        insights: vec![Insight {
            title: "Great onboarding".to_string(),
            amount: 12,
            quotes: vec!["Set up in a minute.".to_string()],
            sentiments: vec!["positive".to_string()],
        }],
    }
}

pub fn sample_analysis(reference: &str, competitors: &[&str]) -> AnalysisResult {
    AnalysisResult {
        reference_app: sample_app(reference),
        competitors: competitors.iter().map(|id| sample_app(id)).collect(),
    }
}

pub fn temp_store() -> (TempDir, Arc<FileStore>) {
    let dir = TempDir::new().expect("temp dir");
    let store = Arc::new(FileStore::new(dir.path()));
    (dir, store)
}

/// Compute service double that counts calls and can hold them open.
pub struct StubCompute {
    outcome: Mutex<Result<AnalysisResult, ComputeError>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ComputeRequest>>,
    gate: Option<Semaphore>,
}

impl StubCompute {
    pub fn returning(analysis: AnalysisResult) -> Arc<Self> {
        Arc::new(Self::build(Ok(analysis), None))
    }

    pub fn failing(error: ComputeError) -> Arc<Self> {
        Arc::new(Self::build(Err(error), None))
    }

    /// Every call blocks until `release` is called.
    pub fn gated(analysis: AnalysisResult) -> Arc<Self> {
        Arc::new(Self::build(Ok(analysis), Some(Semaphore::new(0))))
    }

    fn build(outcome: Result<AnalysisResult, ComputeError>, gate: Option<Semaphore>) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            gate,
        }
    }

    pub fn release(&self) {
        if let Some(ref gate) = self.gate {
            gate.add_permits(1024);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ComputeRequest> {
        self.requests.lock().clone()
    }

    /// Yield until at least `n` calls have started.
    pub async fn wait_for_calls(&self, n: usize) {
        while self.calls() < n {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl ComputeService for StubCompute {
    async fn run(&self, request: &ComputeRequest) -> Result<AnalysisResult, ComputeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        if let Some(ref gate) = self.gate {
            let _permit = gate.acquire().await.expect("gate closed");
        }
        self.outcome.lock().clone()
    }
}
