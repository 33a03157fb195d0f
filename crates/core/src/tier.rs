//! Service tier policy.
//!
//! Two immutable tiers exist: Free and Pro. Limits that are unbounded on
//! Pro are modeled as `None`. Which tier applies is decided per-check by
//! the licensing layer; tier values are never persisted.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierConfig {
    pub name: &'static str,
    /// Maximum number of configured projects. `None` = unlimited.
    pub max_projects: Option<u32>,
    /// Maximum sync attempts per calendar day. `None` = unlimited.
    pub max_syncs_per_day: Option<u32>,
    /// Maximum files injected per sync run. `None` = unlimited.
    pub max_files_per_sync: Option<u32>,
    /// Files per injection batch.
    pub batch_size: usize,
    /// Pause between batches.
    pub batch_pause_ms: u64,
    pub auto_sync_enabled: bool,
    pub allowed_mime_types: &'static [&'static str],
    /// Lookback window for the notebook picker.
    pub notebook_history_days: u32,
    pub notebook_max_results: u32,
}

impl TierConfig {
    pub fn allows_mime(&self, mime: &str) -> bool {
        self.allowed_mime_types.contains(&mime)
    }
}

pub const FREE: TierConfig = TierConfig {
    name: "Free",
    max_projects: Some(1),
    max_syncs_per_day: Some(5),
    max_files_per_sync: Some(10),
    batch_size: 3,
    batch_pause_ms: 5000,
    auto_sync_enabled: false,
    allowed_mime_types: &["application/pdf"],
    notebook_history_days: 7,
    notebook_max_results: 5,
};

pub const PRO: TierConfig = TierConfig {
    name: "Pro",
    max_projects: None,
    max_syncs_per_day: None,
    max_files_per_sync: None,
    batch_size: 10,
    batch_pause_ms: 2000,
    auto_sync_enabled: true,
    allowed_mime_types: &[
        "application/pdf",
        "text/plain",
        "text/markdown",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ],
    notebook_history_days: 180,
    notebook_max_results: 500,
};

pub fn resolve_tier(paid: bool) -> &'static TierConfig {
    if paid {
        &PRO
    } else {
        &FREE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_tier() {
        assert_eq!(resolve_tier(false).name, "Free");
        assert_eq!(resolve_tier(true).name, "Pro");
    }

    #[test]
    fn test_free_tier_limits() {
        assert_eq!(FREE.max_syncs_per_day, Some(5));
        assert_eq!(FREE.max_files_per_sync, Some(10));
        assert_eq!(FREE.batch_size, 3);
        assert!(!FREE.auto_sync_enabled);
        assert!(FREE.allows_mime("application/pdf"));
        assert!(!FREE.allows_mime("text/plain"));
    }

    #[test]
    fn test_pro_tier_unlimited() {
        assert_eq!(PRO.max_syncs_per_day, None);
        assert_eq!(PRO.max_files_per_sync, None);
        assert!(PRO.auto_sync_enabled);
        assert!(PRO.allows_mime("text/markdown"));
    }
}
