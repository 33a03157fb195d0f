pub mod config;
pub mod error;
pub mod paths;
pub mod tier;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use paths::Paths;
pub use tier::{resolve_tier, TierConfig, FREE, PRO};
pub use types::{
    AutoSyncSettings, DedupReport, DuplicateGroup, FileCandidate, Project, StatusUpdate,
    SyncHistoryEntry, SyncOutcome, SyncStats,
};
