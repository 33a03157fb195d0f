//! Persisted sync history: which file versions a notebook has already
//! received. The need-to-sync predicate lives here next to the store.

use std::collections::HashMap;

use nlmsync_core::types::{FileCandidate, SyncHistoryEntry};
use nlmsync_core::{Paths, Result};
use tracing::debug;

pub type SyncHistory = HashMap<String, SyncHistoryEntry>;

pub fn history_key(notebook_id: &str, file_id: i64) -> String {
    format!("{}_{}", notebook_id, file_id)
}

/// A file needs syncing when the notebook has never received it, when its
/// content hash changed, or (for items without a hash) when its
/// modification date changed.
pub fn needs_sync(history: &SyncHistory, notebook_id: &str, file: &FileCandidate) -> bool {
    let Some(entry) = history.get(&history_key(notebook_id, file.id)) else {
        return true;
    };
    if file.has_hash() {
        return entry.hash != file.hash;
    }
    entry.date_modified != file.date_modified
}

pub struct SyncHistoryStore {
    paths: Paths,
}

impl SyncHistoryStore {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    pub async fn load(&self) -> Result<SyncHistory> {
        let path = self.paths.sync_history_file();
        if !path.exists() {
            return Ok(SyncHistory::new());
        }
        let content = tokio::fs::read_to_string(&path).await?;
        let history: SyncHistory = serde_json::from_str(&content)?;
        Ok(history)
    }

    /// Merge one confirmed-injected batch into the history.
    ///
    /// Read-modify-write per batch: a run that dies later still keeps the
    /// progress recorded for its completed batches.
    pub async fn record_batch(
        &self,
        notebook_id: &str,
        files: &[(i64, SyncHistoryEntry)],
    ) -> Result<()> {
        let mut history = self.load().await?;
        for (file_id, entry) in files {
            history.insert(history_key(notebook_id, *file_id), entry.clone());
        }
        self.write(&history).await?;
        debug!(notebook = notebook_id, count = files.len(), "Recorded batch in sync history");
        Ok(())
    }

    async fn write(&self, history: &SyncHistory) -> Result<()> {
        let path = self.paths.sync_history_file();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(history)?;
        tokio::fs::write(&path, content).await?;
        Ok(())
    }
}
