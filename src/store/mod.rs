//! Durable analysis store.
//!
//! Documents are keyed hierarchically by user id, then by the encoded
//! `app_id;region` document id. The core reads, lists and writes; a write
//! to an existing key replaces its document and timestamp. Nothing is
//! ever deleted.

pub mod file;

pub use file::FileStore;

use crate::error::InsightsResult;
use crate::models::{AnalysisKey, AnalysisResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored document id and when it was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredKey {
    pub document_id: String,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Load the full analysis stored under `key`, if any.
    async fn get(&self, key: &AnalysisKey) -> InsightsResult<Option<AnalysisResult>>;

    /// Enumerate a user's stored keys without reading payloads.
    async fn list_keys(&self, user_id: &str) -> InsightsResult<Vec<StoredKey>>;

    /// Persist `analysis` under `key` and return its timestamp.
    async fn put(&self, key: &AnalysisKey, analysis: &AnalysisResult)
        -> InsightsResult<DateTime<Utc>>;
}
