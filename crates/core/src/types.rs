use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user-defined sync target: which Zotero items go to which notebook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub library_id: Option<i64>,
    #[serde(default)]
    pub library_name: Option<String>,
    #[serde(default)]
    pub collection_id: Option<i64>,
    #[serde(default)]
    pub collection_name: Option<String>,
    #[serde(default)]
    pub notebook_id: Option<String>,
    #[serde(default)]
    pub notebook_name: Option<String>,
}

impl Project {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            tag: None,
            library_id: None,
            library_name: None,
            collection_id: None,
            collection_name: None,
            notebook_id: None,
            notebook_name: None,
        }
    }
}

/// An item surfaced by the Zotero lister. Ephemeral, fetched per sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCandidate {
    pub id: i64,
    pub parent_id: i64,
    pub title: String,
    pub filename: String,
    /// May be unknown at list time; the authoritative type comes back with
    /// the file bytes.
    #[serde(default)]
    pub mime_type: Option<String>,
    pub date_modified: String,
    #[serde(default)]
    pub version: i64,
    /// Empty string means the lister had no content hash for this item.
    #[serde(default)]
    pub hash: String,
}

impl FileCandidate {
    pub fn has_hash(&self) -> bool {
        !self.hash.is_empty()
    }
}

/// Sync history record, keyed by `(notebookId, fileId)` in the store.
/// Only written after the batch containing the file was confirmed injected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncHistoryEntry {
    #[serde(default)]
    pub hash: String,
    pub date_modified: String,
    #[serde(default)]
    pub version: i64,
    pub timestamp_ms: i64,
}

/// Per-calendar-day usage counters. `sync_count` counts attempts, not
/// completions: it is incremented before any network I/O so early failures
/// cannot bypass the daily cap.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub sync_count: u32,
    #[serde(default)]
    pub file_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AutoSyncSettings {
    #[serde(default)]
    pub sync_on_page_visit: bool,
    #[serde(default)]
    pub interval_enabled: bool,
    #[serde(default)]
    pub interval_minutes: Option<u32>,
}

/// Outcome of the duplicate guard for the last sync run that hit it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DedupReport {
    pub timestamp_ms: i64,
    pub project_name: String,
    /// Filenames that were withheld because the user chose to skip them.
    #[serde(default)]
    pub blocked_possible_duplicates: Vec<String>,
    /// Duplicate groups already present in the notebook itself.
    #[serde(default)]
    pub existing_notebook_duplicates: Vec<DuplicateGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    pub normalized_name: String,
    pub count: u32,
}

/// Terminal state of a single project sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Files were injected into the notebook.
    Completed { files_synced: usize },
    /// Nothing matched the project filters.
    NoItems,
    /// Everything matching was already in the sync history.
    UpToDate,
    /// Another sync was already in progress; this request was dropped.
    Skipped,
    /// The run stopped before completing; message is user-visible.
    Aborted { reason: String },
}

/// Progress line published while a sync runs; the CLI/daemon renders these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub project: String,
    pub text: String,
    pub timestamp_ms: i64,
}

impl StatusUpdate {
    pub fn new(project: &str, text: impl Into<String>) -> Self {
        Self {
            project: project.to_string(),
            text: text.into(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}
