//! Automatic syncing: the all-projects sweep, the interval timer, and the
//! page-visit watcher. All three are Pro-gated.

use std::sync::Arc;
use std::time::Duration;

use nlmsync_core::Result;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::orchestrator::SyncEngine;

/// How often the page-visit watcher looks at open tabs.
const PAGE_VISIT_POLL: Duration = Duration::from_secs(5);
/// Grace period after a notebook page loads before the sweep starts.
const PAGE_VISIT_DELAY: Duration = Duration::from_secs(3);

impl SyncEngine {
    /// Sync every configured project, sequentially. Re-entry while a sweep
    /// runs is dropped, like the single-project lock.
    pub async fn run_auto_sync(self: &Arc<Self>) -> Result<()> {
        let Ok(_guard) = self.auto_sync_lock.try_lock() else {
            info!("Auto-sync already running, skipping duplicate trigger");
            return Ok(());
        };

        let projects = self.list_projects().await?;
        if projects.is_empty() {
            info!("Auto-sync skipped: no projects configured");
            return Ok(());
        }

        // Without a saved notebook anywhere we can only sync into an
        // already-open notebook tab.
        let has_stored_notebook = projects.iter().any(|p| p.notebook_id.is_some());
        if !has_stored_notebook && self.navigator().find_app_tab().await?.is_none() {
            info!("Auto-sync skipped: no notebook tab open and no projects have a saved notebook");
            return Ok(());
        }

        info!(count = projects.len(), "Auto-sync starting");
        for project in &projects {
            self.run_sync(project).await;
        }
        Ok(())
    }
}

/// Owns the interval trigger. `reschedule()` wakes the loop so settings or
/// tier changes apply immediately.
pub struct AutoSyncScheduler {
    engine: Arc<SyncEngine>,
    reschedule_tx: watch::Sender<()>,
    reschedule_rx: watch::Receiver<()>,
}

impl AutoSyncScheduler {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        let (reschedule_tx, reschedule_rx) = watch::channel(());
        Self {
            engine,
            reschedule_tx,
            reschedule_rx,
        }
    }

    /// Re-read settings and tier on the next loop turn.
    pub fn reschedule(&self) {
        let _ = self.reschedule_tx.send(());
    }

    /// The interval loop. Runs until the process exits.
    pub async fn run(&self) {
        let mut reschedule_rx = self.reschedule_rx.clone();
        loop {
            let interval = self.current_interval().await;
            match interval {
                Some(period) => {
                    debug!(minutes = period.as_secs() / 60, "Auto-sync interval armed");
                    tokio::select! {
                        _ = tokio::time::sleep(period) => {
                            info!("Interval triggered auto-sync");
                            let _ = self.engine.run_auto_sync().await;
                        }
                        _ = reschedule_rx.changed() => {
                            debug!("Auto-sync schedule changed, re-reading settings");
                        }
                    }
                }
                None => {
                    debug!("Auto-sync interval disabled");
                    if reschedule_rx.changed().await.is_err() {
                        return;
                    }
                }
            }
        }
    }

    async fn current_interval(&self) -> Option<Duration> {
        let tier = self.engine.tier().await;
        if !tier.auto_sync_enabled {
            return None;
        }
        let settings = self.engine.auto_sync_settings().await.ok()?;
        if !settings.interval_enabled {
            return None;
        }
        settings
            .interval_minutes
            .filter(|m| *m > 0)
            .map(|m| Duration::from_secs(u64::from(m) * 60))
    }
}

/// Watch open tabs for a notebook page visit and trigger a sweep shortly
/// after one loads. Polling over the narrow backend interface stands in
/// for the host's tab-update events.
pub async fn watch_page_visits(engine: Arc<SyncEngine>) {
    let mut last_seen: Option<(String, String)> = None;
    loop {
        tokio::time::sleep(PAGE_VISIT_POLL).await;

        let tab = match engine.navigator().find_app_tab().await {
            Ok(Some(tab)) => tab,
            Ok(None) => {
                last_seen = None;
                continue;
            }
            Err(_) => continue,
        };
        let key = (tab.target_id.clone(), tab.url.clone());
        if last_seen.as_ref() == Some(&key) {
            continue;
        }
        last_seen = Some(key);

        if nlmsync_browser::tabs::extract_notebook_id(&tab.url).is_none() {
            continue;
        }
        let tier = engine.tier().await;
        if !tier.auto_sync_enabled {
            continue;
        }
        let Ok(settings) = engine.auto_sync_settings().await else {
            continue;
        };
        if !settings.sync_on_page_visit {
            continue;
        }

        info!("Notebook page visit detected, triggering auto-sync");
        tokio::time::sleep(PAGE_VISIT_DELAY).await;
        let _ = engine.run_auto_sync().await;
    }
}
