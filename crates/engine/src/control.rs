//! Typed control surface for the daemon: the message actions the UI (or
//! another process) sends, plus the answers flowing back.

use std::sync::Arc;

use nlmsync_core::types::{AutoSyncSettings, Project, SyncStats};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::auto_sync::AutoSyncScheduler;
use crate::orchestrator::SyncEngine;

#[derive(Debug)]
pub enum ControlMessage {
    StartSync {
        project: Project,
    },
    SyncAll,
    UpdateAutoSyncSettings {
        settings: AutoSyncSettings,
    },
    GetTierInfo {
        respond_to: oneshot::Sender<TierInfo>,
    },
    /// An external "paid" event: drop the license cache and re-arm the
    /// auto-sync schedule under the new tier.
    RefreshLicense,
}

/// Snapshot for UIs: which tier applies and how much of today's quota is
/// used.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierInfo {
    pub pro: bool,
    pub tier_name: String,
    pub max_syncs_per_day: Option<u32>,
    pub max_files_per_sync: Option<u32>,
    pub auto_sync_enabled: bool,
    pub stats: SyncStats,
}

impl TierInfo {
    pub async fn snapshot(engine: &SyncEngine) -> Self {
        let tier = engine.tier().await;
        let stats = engine.stats_today().await.unwrap_or_default();
        Self {
            pro: engine.license().is_pro().await,
            tier_name: tier.name.to_string(),
            max_syncs_per_day: tier.max_syncs_per_day,
            max_files_per_sync: tier.max_files_per_sync,
            auto_sync_enabled: tier.auto_sync_enabled,
            stats,
        }
    }
}

/// Drain control messages until all senders are gone.
pub async fn run_control_loop(
    engine: Arc<SyncEngine>,
    scheduler: Arc<AutoSyncScheduler>,
    mut rx: mpsc::Receiver<ControlMessage>,
) {
    while let Some(msg) = rx.recv().await {
        match msg {
            ControlMessage::StartSync { project } => {
                let outcome = engine.run_sync(&project).await;
                info!(project = %project.name, ?outcome, "Sync request finished");
            }
            ControlMessage::SyncAll => {
                if let Err(e) = engine.run_auto_sync().await {
                    warn!(error = %e, "Sweep failed");
                }
            }
            ControlMessage::UpdateAutoSyncSettings { settings } => {
                match engine.update_auto_sync_settings(settings).await {
                    Ok(()) => scheduler.reschedule(),
                    Err(e) => warn!(error = %e, "Rejected auto-sync settings update"),
                }
            }
            ControlMessage::GetTierInfo { respond_to } => {
                let _ = respond_to.send(TierInfo::snapshot(&engine).await);
            }
            ControlMessage::RefreshLicense => {
                engine.license().invalidate().await;
                scheduler.reschedule();
            }
        }
    }
}
