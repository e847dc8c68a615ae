//! Filesystem-backed analysis store.
//!
//! Layout under the root directory:
//!
//! ```text
//! users/<user_id>/index.json                 document id -> timestamp
//! users/<user_id>/analyses/<app;region>.json full analysis payload
//! ```
//!
//! Listing only reads `index.json`, so it stays cheap however many
//! analyses a user has accumulated.

use super::{AnalysisStore, StoredKey};
use crate::error::{InsightsError, InsightsResult};
use crate::models::{validate_user_id, AnalysisKey, AnalysisResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

const MANIFEST_FILE: &str = "index.json";
const ANALYSES_DIR: &str = "analyses";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    #[serde(default)]
    analyses: BTreeMap<String, DateTime<Utc>>,
}

pub struct FileStore {
    root: PathBuf,
    /// Serializes manifest read-modify-write cycles.
    manifest_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        info!("Analysis store at: {}", root.display());
        Self {
            root,
            manifest_lock: Mutex::new(()),
        }
    }

    fn user_dir(&self, user_id: &str) -> PathBuf {
        self.root.join("users").join(user_id)
    }

    fn manifest_path(&self, user_id: &str) -> PathBuf {
        self.user_dir(user_id).join(MANIFEST_FILE)
    }

    fn document_path(&self, key: &AnalysisKey) -> PathBuf {
        self.user_dir(&key.user_id)
            .join(ANALYSES_DIR)
            .join(format!("{}.json", key.document_id()))
    }

    async fn read_manifest(&self, user_id: &str) -> InsightsResult<Manifest> {
        let path = self.manifest_path(user_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| InsightsError::store(format!("corrupt index {}", path.display()), e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Manifest::default()),
            Err(e) => Err(InsightsError::store(
                format!("failed to read {}", path.display()),
                e,
            )),
        }
    }
}

/// Write through a temporary sibling so readers never see a partial file.
async fn write_atomic(path: &Path, bytes: &[u8]) -> InsightsResult<()> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| InsightsError::store(format!("failed to write {}", tmp.display()), e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| InsightsError::store(format!("failed to move {}", path.display()), e))
}

#[async_trait]
impl AnalysisStore for FileStore {
    async fn get(&self, key: &AnalysisKey) -> InsightsResult<Option<AnalysisResult>> {
        let path = self.document_path(key);
        debug!("Reading {}", path.display());

        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
                InsightsError::store(format!("corrupt analysis {}", path.display()), e)
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(InsightsError::store(
                format!("failed to read {}", path.display()),
                e,
            )),
        }
    }

    async fn list_keys(&self, user_id: &str) -> InsightsResult<Vec<StoredKey>> {
        validate_user_id(user_id)?;
        let manifest = self.read_manifest(user_id).await?;

        Ok(manifest
            .analyses
            .into_iter()
            .map(|(document_id, timestamp)| StoredKey {
                document_id,
                timestamp,
            })
            .collect())
    }

    async fn put(
        &self,
        key: &AnalysisKey,
        analysis: &AnalysisResult,
    ) -> InsightsResult<DateTime<Utc>> {
        let path = self.document_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                InsightsError::store(format!("failed to create {}", parent.display()), e)
            })?;
        }

        let payload = serde_json::to_vec_pretty(analysis)
            .map_err(|e| InsightsError::store("failed to encode analysis", e))?;
        write_atomic(&path, &payload).await?;

        // The payload is in place before the key becomes listable.
        let timestamp = Utc::now();
        let _guard = self.manifest_lock.lock().await;
        let mut manifest = self.read_manifest(&key.user_id).await?;
        manifest.analyses.insert(key.document_id(), timestamp);

        let encoded = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| InsightsError::store("failed to encode index", e))?;
        write_atomic(&self.manifest_path(&key.user_id), &encoded).await?;

        info!("Stored analysis {} for user {}", key, key.user_id);
        Ok(timestamp)
    }
}
