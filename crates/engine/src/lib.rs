pub mod auto_sync;
pub mod control;
pub mod dedup;
pub mod orchestrator;
pub mod source;
pub mod status;

pub use auto_sync::AutoSyncScheduler;
pub use control::{run_control_loop, ControlMessage, TierInfo};
pub use dedup::{AutoSkipPrompt, DecisionPrompt, DedupDecision};
pub use orchestrator::{EngineDeps, SyncEngine};
pub use source::FileSource;
pub use status::StatusSender;
