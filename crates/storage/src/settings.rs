use nlmsync_core::types::{AutoSyncSettings, DedupReport};
use nlmsync_core::{Paths, Result};

pub struct AutoSyncStore {
    paths: Paths,
}

impl AutoSyncStore {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    pub async fn load(&self) -> Result<AutoSyncSettings> {
        let path = self.paths.auto_sync_file();
        if !path.exists() {
            return Ok(AutoSyncSettings::default());
        }
        let content = tokio::fs::read_to_string(&path).await?;
        let settings: AutoSyncSettings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    pub async fn save(&self, settings: &AutoSyncSettings) -> Result<()> {
        let path = self.paths.auto_sync_file();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(settings)?;
        tokio::fs::write(&path, content).await?;
        Ok(())
    }
}

pub struct DedupReportStore {
    paths: Paths,
}

impl DedupReportStore {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    /// The last report, or `None` when absent or older than 24h (stale
    /// reports from much older runs are not worth surfacing).
    pub async fn load_recent(&self) -> Result<Option<DedupReport>> {
        let path = self.paths.dedup_report_file();
        if !path.exists() {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(&path).await?;
        let report: DedupReport = serde_json::from_str(&content)?;
        let age_ms = chrono::Utc::now().timestamp_millis() - report.timestamp_ms;
        if age_ms > 24 * 60 * 60 * 1000 {
            return Ok(None);
        }
        Ok(Some(report))
    }

    pub async fn save(&self, report: &DedupReport) -> Result<()> {
        let path = self.paths.dedup_report_file();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(report)?;
        tokio::fs::write(&path, content).await?;
        Ok(())
    }
}
