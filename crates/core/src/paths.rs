use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".nlmsync"))
            .unwrap_or_else(|| PathBuf::from(".nlmsync"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    pub fn projects_file(&self) -> PathBuf {
        self.base.join("projects.json")
    }

    pub fn sync_history_file(&self) -> PathBuf {
        self.base.join("sync_history.json")
    }

    pub fn sync_stats_file(&self) -> PathBuf {
        self.base.join("sync_stats.json")
    }

    pub fn auto_sync_file(&self) -> PathBuf {
        self.base.join("auto_sync.json")
    }

    pub fn dedup_report_file(&self) -> PathBuf {
        self.base.join("dedup_report.json")
    }

    /// User data dir for a browser instance we launch ourselves.
    pub fn browser_profile_dir(&self) -> PathBuf {
        self.base.join("browser-profile")
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.base)?;
        std::fs::create_dir_all(self.browser_profile_dir())?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
