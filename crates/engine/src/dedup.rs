//! User-in-the-loop duplicate guard.
//!
//! When files about to be injected already appear among the notebook's
//! sources, the user decides whether to import anyway. The wait is
//! bounded; an unattended daemon defaults to skipping the suspects.

use std::time::Duration;

use async_trait::async_trait;

/// How long the orchestrator waits for a decision before defaulting to
/// `Skip`.
pub const DECISION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupDecision {
    /// Leave the suspected duplicates out of this run.
    Skip,
    ImportAnyway,
}

#[async_trait]
pub trait DecisionPrompt: Send + Sync {
    /// Ask about `files` (display filenames) for `project`. Dismissal
    /// should resolve to `Skip`.
    async fn decide(&self, project: &str, files: &[String]) -> DedupDecision;
}

/// Headless default: always skip suspected duplicates.
pub struct AutoSkipPrompt;

#[async_trait]
impl DecisionPrompt for AutoSkipPrompt {
    async fn decide(&self, _project: &str, _files: &[String]) -> DedupDecision {
        DedupDecision::Skip
    }
}
