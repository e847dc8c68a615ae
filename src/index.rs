//! Listing of a user's stored analyses.
//!
//! The index asks the store for keys and timestamps only and turns them
//! into typed entries. It also keeps the last listing for the signed-in
//! user so views can re-render without another store round trip. Entries
//! of any other user never reach that snapshot, so work still running for
//! a previous user cannot leak into the next session.

use crate::error::InsightsResult;
use crate::models::{AnalysisIndexEntry, AnalysisKey};
use crate::store::AnalysisStore;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct AnalysisIndex {
    store: Arc<dyn AnalysisStore>,
    snapshot: RwLock<Snapshot>,
}

#[derive(Default)]
struct Snapshot {
    /// User the entries belong to; `None` while nobody is signed in.
    owner: Option<String>,
    entries: Vec<AnalysisIndexEntry>,
}

impl Snapshot {
    fn owned_by(&self, user_id: &str) -> bool {
        self.owner.as_deref() == Some(user_id)
    }
}

impl AnalysisIndex {
    pub fn new(store: Arc<dyn AnalysisStore>) -> Self {
        Self {
            store,
            snapshot: RwLock::new(Snapshot::default()),
        }
    }

    /// Start an empty snapshot for `user_id`.
    pub fn scope_to(&self, user_id: &str) {
        let mut snapshot = self.snapshot.write();
        snapshot.owner = Some(user_id.to_string());
        snapshot.entries.clear();
    }

    /// List every stored analysis of `user_id`, in no particular order.
    ///
    /// A user without analyses gets an empty list, not an error.
    pub async fn list_analyses(&self, user_id: &str) -> InsightsResult<Vec<AnalysisIndexEntry>> {
        let stored = self.store.list_keys(user_id).await?;

        let entries: Vec<AnalysisIndexEntry> = stored
            .into_iter()
            .filter_map(|stored| {
                match AnalysisKey::from_document_id(user_id, &stored.document_id) {
                    Ok(key) => Some(AnalysisIndexEntry {
                        key,
                        timestamp: stored.timestamp,
                    }),
                    Err(e) => {
                        warn!("Skipping stored key '{}': {}", stored.document_id, e);
                        None
                    }
                }
            })
            .collect();

        debug!("Listed {} analyses for user {}", entries.len(), user_id);
        let mut snapshot = self.snapshot.write();
        if snapshot.owned_by(user_id) {
            snapshot.entries = entries.clone();
        } else {
            debug!("Not caching listing of {}: not the signed-in user", user_id);
        }
        Ok(entries)
    }

    /// The entries from the last listing, plus any recorded since.
    pub fn snapshot(&self) -> Vec<AnalysisIndexEntry> {
        self.snapshot.read().entries.clone()
    }

    /// Add or refresh one entry after a new analysis was stored.
    ///
    /// Ignored unless the entry belongs to the user the index is scoped to.
    pub fn record(&self, entry: AnalysisIndexEntry) {
        let mut snapshot = self.snapshot.write();
        if !snapshot.owned_by(&entry.key.user_id) {
            debug!("Not recording {}: not the signed-in user", entry.key);
            return;
        }
        snapshot.entries.retain(|existing| existing.key != entry.key);
        snapshot.entries.push(entry);
    }

    /// Forget the snapshot and its owner.
    pub fn clear(&self) {
        *self.snapshot.write() = Snapshot::default();
    }
}

/// Sort entries newest first, for display.
pub fn newest_first(entries: &mut [AnalysisIndexEntry]) {
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}
