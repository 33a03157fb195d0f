//! Daily usage counters backing the tier caps.

use chrono::Local;
use nlmsync_core::tier::TierConfig;
use nlmsync_core::types::SyncStats;
use nlmsync_core::{Paths, Result};
use tracing::debug;

fn today_key() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

pub struct SyncStatsStore {
    paths: Paths,
}

impl SyncStatsStore {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    /// Today's counters. Stored counters from a previous day read as zero.
    pub async fn today(&self) -> Result<SyncStats> {
        let path = self.paths.sync_stats_file();
        let today = today_key();

        if !path.exists() {
            return Ok(SyncStats {
                date: today,
                ..Default::default()
            });
        }

        let content = tokio::fs::read_to_string(&path).await?;
        let stats: SyncStats = serde_json::from_str(&content)?;
        if stats.date != today {
            debug!(stored = %stats.date, "Sync stats rolled over to new day");
            return Ok(SyncStats {
                date: today,
                ..Default::default()
            });
        }
        Ok(stats)
    }

    /// Count one sync attempt plus `files_synced` files under today's key.
    ///
    /// Called once per attempt, before any network I/O that could fail, so
    /// the daily cap cannot be bypassed by early failures.
    pub async fn increment(&self, files_synced: u32) -> Result<SyncStats> {
        let mut stats = self.today().await?;
        stats.sync_count += 1;
        stats.file_count += files_synced;
        stats.date = today_key();
        self.write(&stats).await?;
        Ok(stats)
    }

    async fn write(&self, stats: &SyncStats) -> Result<()> {
        let path = self.paths.sync_stats_file();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(stats)?;
        tokio::fs::write(&path, content).await?;
        Ok(())
    }
}

/// Whether a sync attempt may start under the given tier.
///
/// `Err(reason)` carries the user-visible denial message.
pub fn can_sync(tier: &TierConfig, stats: &SyncStats) -> std::result::Result<(), String> {
    let Some(limit) = tier.max_syncs_per_day else {
        return Ok(());
    };
    if stats.sync_count >= limit {
        return Err(format!(
            "Daily sync limit reached ({limit}/{limit}). Resets tomorrow or upgrade to Pro for unlimited syncs."
        ));
    }
    Ok(())
}
