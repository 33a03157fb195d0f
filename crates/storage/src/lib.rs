pub mod history;
pub mod projects;
pub mod settings;
pub mod stats;

pub use history::{history_key, needs_sync, SyncHistoryStore};
pub use projects::ProjectStore;
pub use settings::{AutoSyncStore, DedupReportStore};
pub use stats::{can_sync, SyncStatsStore};
