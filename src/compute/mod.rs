//! External compute service.
//!
//! The service that actually produces an analysis is opaque, slow (1-3
//! minutes) and fallible. This module defines the seam the orchestrator
//! talks to and the HTTP client used in production.

pub mod client;

pub use client::HttpComputeClient;

use crate::models::{AnalysisKey, AnalysisResult};
use async_trait::async_trait;

/// Parameters of one compute call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeRequest {
    pub app_id: String,
    pub region: String,
    pub user_id: String,
}

impl From<&AnalysisKey> for ComputeRequest {
    fn from(key: &AnalysisKey) -> Self {
        Self {
            app_id: key.app_id.clone(),
            region: key.region.clone(),
            user_id: key.user_id.clone(),
        }
    }
}

/// Why a compute call produced no usable analysis.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComputeError {
    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("cannot connect to the analysis service at {url}")]
    Connect { url: String },

    #[error("analysis service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(String),

    /// The body did not match the analysis schema or broke its invariants.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Anything that can turn a request into an analysis.
#[async_trait]
pub trait ComputeService: Send + Sync {
    async fn run(&self, request: &ComputeRequest) -> Result<AnalysisResult, ComputeError>;
}

/// Parse and validate a response body at the service boundary.
pub fn parse_analysis(body: &str) -> Result<AnalysisResult, ComputeError> {
    let analysis: AnalysisResult =
        serde_json::from_str(body).map_err(|e| ComputeError::Malformed(e.to_string()))?;
    analysis.validate().map_err(ComputeError::Malformed)?;
    Ok(analysis)
}
