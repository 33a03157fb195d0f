//! The sync state machine.
//!
//! One project sync at a time, process-wide: a concurrent request is
//! dropped with a "skipped" status, never queued. Policy is checked and
//! the attempt counted before any network I/O; history is recorded per
//! confirmed batch so a run that dies keeps its partial progress.

use std::sync::Arc;
use std::time::Duration;

use nlmsync_browser::helper::SourceScanner;
use nlmsync_browser::injector::{FilePayload, Injector};
use nlmsync_browser::tabs::{extract_notebook_id, Navigator};
use nlmsync_browser::TabHandle;
use nlmsync_core::types::{
    DedupReport, FileCandidate, Project, SyncHistoryEntry, SyncOutcome, SyncStats,
};
use nlmsync_core::{Error, Paths, Result, TierConfig};
use nlmsync_licensing::LicenseCache;
use nlmsync_storage::{can_sync, needs_sync};
use nlmsync_storage::{AutoSyncStore, DedupReportStore, ProjectStore, SyncHistoryStore, SyncStatsStore};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::dedup::{DecisionPrompt, DedupDecision, DECISION_TIMEOUT};
use crate::source::{filter_for, FileSource};
use crate::status::StatusSender;

pub struct EngineDeps {
    pub license: Arc<LicenseCache>,
    pub source: Arc<dyn FileSource>,
    pub navigator: Arc<dyn Navigator>,
    pub injector: Arc<dyn Injector>,
    pub scanner: Arc<dyn SourceScanner>,
    pub prompt: Arc<dyn DecisionPrompt>,
    pub paths: Paths,
}

pub struct SyncEngine {
    license: Arc<LicenseCache>,
    source: Arc<dyn FileSource>,
    navigator: Arc<dyn Navigator>,
    injector: Arc<dyn Injector>,
    scanner: Arc<dyn SourceScanner>,
    prompt: Arc<dyn DecisionPrompt>,
    status: StatusSender,
    stats: SyncStatsStore,
    history: SyncHistoryStore,
    projects: ProjectStore,
    auto_settings: AutoSyncStore,
    dedup_reports: DedupReportStore,
    /// At most one project sync runs at a time, process-wide.
    sync_lock: Mutex<()>,
    /// Guards the all-projects sweep against re-entry.
    pub(crate) auto_sync_lock: Mutex<()>,
}

impl SyncEngine {
    pub fn new(deps: EngineDeps) -> Arc<Self> {
        Arc::new(Self {
            license: deps.license,
            source: deps.source,
            navigator: deps.navigator,
            injector: deps.injector,
            scanner: deps.scanner,
            prompt: deps.prompt,
            status: StatusSender::new(),
            stats: SyncStatsStore::new(deps.paths.clone()),
            history: SyncHistoryStore::new(deps.paths.clone()),
            projects: ProjectStore::new(deps.paths.clone()),
            auto_settings: AutoSyncStore::new(deps.paths.clone()),
            dedup_reports: DedupReportStore::new(deps.paths),
            sync_lock: Mutex::new(()),
            auto_sync_lock: Mutex::new(()),
        })
    }

    pub fn subscribe_status(&self) -> tokio::sync::broadcast::Receiver<nlmsync_core::StatusUpdate> {
        self.status.subscribe()
    }

    pub fn license(&self) -> &Arc<LicenseCache> {
        &self.license
    }

    pub(crate) fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    // ─── Accessors for the control surface and CLI ────────────────────

    pub async fn tier(&self) -> &'static TierConfig {
        self.license.tier().await
    }

    pub async fn stats_today(&self) -> Result<SyncStats> {
        self.stats.today().await
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        self.projects.load().await
    }

    /// Project creation is where the tier's project cap bites.
    pub async fn add_project(&self, project: Project) -> Result<()> {
        let tier = self.tier().await;
        if let Some(max) = tier.max_projects {
            let existing = self.projects.load().await?;
            if existing.len() as u32 >= max {
                return Err(Error::PolicyDenied(format!(
                    "You've reached the free project limit ({max}). Upgrade to Pro for unlimited projects."
                )));
            }
        }
        self.projects.add(project).await
    }

    pub async fn remove_project(&self, name: &str) -> Result<Project> {
        let project = self.projects.find_by_name(name).await?;
        self.projects.remove(project.id).await
    }

    pub async fn find_project(&self, name: &str) -> Result<Project> {
        self.projects.find_by_name(name).await
    }

    pub async fn auto_sync_settings(&self) -> Result<nlmsync_core::AutoSyncSettings> {
        self.auto_settings.load().await
    }

    pub async fn update_auto_sync_settings(
        &self,
        settings: nlmsync_core::AutoSyncSettings,
    ) -> Result<()> {
        let tier = self.tier().await;
        if !tier.auto_sync_enabled && (settings.sync_on_page_visit || settings.interval_enabled) {
            return Err(Error::PolicyDenied(
                "Auto-sync is a Pro feature. Upgrade to enable it.".to_string(),
            ));
        }
        self.auto_settings.save(&settings).await
    }

    pub async fn last_dedup_report(&self) -> Result<Option<DedupReport>> {
        self.dedup_reports.load_recent().await
    }

    // ─── The sync run ─────────────────────────────────────────────────

    pub async fn run_sync(&self, project: &Project) -> SyncOutcome {
        let Ok(_guard) = self.sync_lock.try_lock() else {
            info!(project = %project.name, "Sync already in progress, skipping");
            return SyncOutcome::Skipped;
        };

        // The guard drops on every exit path below, releasing the run-lock.
        match self.run_sync_inner(project).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // Degrade every failure to a terminal status; the process
                // never dies because one run did.
                self.status.update(&project.name, format!("Sync error: {e}"));
                SyncOutcome::Aborted {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn run_sync_inner(&self, project: &Project) -> Result<SyncOutcome> {
        self.status.update(&project.name, "Getting list...");

        // Policy gate. A denial does not count as an attempt.
        let tier = self.tier().await;
        let stats = self.stats.today().await?;
        if let Err(reason) = can_sync(tier, &stats) {
            self.status.update(&project.name, reason.clone());
            return Ok(SyncOutcome::Aborted { reason });
        }

        // Count the attempt before any network I/O that could fail.
        self.stats.increment(0).await?;

        let candidates = self.source.list(&filter_for(project)).await?;
        if candidates.is_empty() {
            self.status
                .update(&project.name, "No items found matching filters.");
            return Ok(SyncOutcome::NoItems);
        }

        // Known-disallowed types drop here; unknown types pass through and
        // are re-checked against the authoritative type at fetch time.
        let before = candidates.len();
        let candidates: Vec<FileCandidate> = candidates
            .into_iter()
            .filter(|f| match &f.mime_type {
                Some(mime) => tier.allows_mime(mime),
                None => true,
            })
            .collect();
        let skipped = before - candidates.len();
        if skipped > 0 {
            info!(skipped, "Skipped files with unsupported type in current tier");
        }
        if candidates.is_empty() {
            self.status.update(
                &project.name,
                "No supported file types found. Upgrade to Pro for TXT, MD, DOCX support.",
            );
            return Ok(SyncOutcome::NoItems);
        }

        // Resolve the target notebook tab.
        let (tab, notebook_id) = match &project.notebook_id {
            Some(id) => {
                self.status.update(&project.name, "Opening notebook...");
                (self.navigator.ensure_tab(id).await?, id.clone())
            }
            None => match self.navigator.find_app_tab().await? {
                Some(tab) => {
                    let id = extract_notebook_id(&tab.url).unwrap_or_else(|| "global".to_string());
                    (tab, id)
                }
                None => {
                    let reason = "No notebook selected. Edit the project to choose a notebook, or open NotebookLM first.".to_string();
                    self.status.update(&project.name, reason.clone());
                    return Ok(SyncOutcome::Aborted { reason });
                }
            },
        };
        info!(notebook = %notebook_id, "Target notebook resolved");

        // Need-to-sync against history.
        let history = self.history.load().await?;
        let needed: Vec<FileCandidate> = candidates
            .into_iter()
            .filter(|f| needs_sync(&history, &notebook_id, f))
            .collect();
        if needed.is_empty() {
            self.status.update(&project.name, "All items up to date.");
            return Ok(SyncOutcome::UpToDate);
        }

        // Per-run cap: stable prefix, with a visible truncation notice.
        let mut capped = needed;
        if let Some(max) = tier.max_files_per_sync {
            let max = max as usize;
            if capped.len() > max {
                self.status.update(
                    &project.name,
                    format!(
                        "Free tier: syncing {} of {} files. Upgrade for unlimited.",
                        max,
                        capped.len()
                    ),
                );
                capped.truncate(max);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }

        let capped = self.apply_dedup_guard(project, &tab, capped).await;
        if capped.is_empty() {
            self.status
                .update(&project.name, "All pending files were skipped as possible duplicates.");
            return Ok(SyncOutcome::UpToDate);
        }

        let total = capped.len();
        self.status
            .update(&project.name, format!("Found {total} files to sync..."));
        tokio::time::sleep(Duration::from_secs(1)).await;

        let synced = self
            .run_batches(project, &tab, &notebook_id, &capped, tier)
            .await?;

        self.status
            .update(&project.name, format!("Success! {synced} files synced."));
        Ok(SyncOutcome::Completed {
            files_synced: synced,
        })
    }

    async fn run_batches(
        &self,
        project: &Project,
        tab: &TabHandle,
        notebook_id: &str,
        files: &[FileCandidate],
        tier: &TierConfig,
    ) -> Result<usize> {
        let total = files.len();
        let total_batches = total.div_ceil(tier.batch_size);
        let mut synced = 0usize;

        for (index, chunk) in files.chunks(tier.batch_size).enumerate() {
            let batch_num = index + 1;
            self.status.update(
                &project.name,
                format!(
                    "Batch {batch_num}/{total_batches}: Fetching {} files...",
                    chunk.len()
                ),
            );

            let mut payloads: Vec<FilePayload> = Vec::new();
            let mut recorded: Vec<(i64, SyncHistoryEntry)> = Vec::new();
            for file in chunk {
                let fetched = match self.source.fetch(file.id).await {
                    Ok(f) => f,
                    Err(e) => {
                        // Per-file failure only skips that file.
                        warn!(file = %file.title, error = %e, "Failed to fetch file, skipping");
                        continue;
                    }
                };
                // The fetch-time MIME type is authoritative; this covers
                // candidates whose type was unknown at list time.
                if !tier.allows_mime(&fetched.mime_type) {
                    info!(file = %file.title, mime = %fetched.mime_type, "Skipped file, type not in tier");
                    continue;
                }
                info!(
                    file = %file.filename,
                    approx_bytes = base64::decoded_len_estimate(fetched.data_base64.len()),
                    "Fetched file"
                );
                payloads.push(FilePayload::from_base64(
                    &file.filename,
                    &fetched.mime_type,
                    &fetched.data_base64,
                ));
                recorded.push((
                    file.id,
                    SyncHistoryEntry {
                        hash: file.hash.clone(),
                        date_modified: file.date_modified.clone(),
                        version: file.version,
                        timestamp_ms: chrono::Utc::now().timestamp_millis(),
                    },
                ));
            }

            if !payloads.is_empty() {
                self.status.update(
                    &project.name,
                    format!("Batch {batch_num}/{total_batches}: Injecting..."),
                );
                // An injection failure aborts the whole run; history from
                // earlier batches stays recorded.
                self.injector.inject_batch(tab, &payloads).await?;
                self.history.record_batch(notebook_id, &recorded).await?;
                synced += payloads.len();

                if batch_num < total_batches {
                    self.status
                        .update(&project.name, format!("Batch {batch_num} done. Resting..."));
                    tokio::time::sleep(Duration::from_millis(tier.batch_pause_ms)).await;
                }
            }
        }

        Ok(synced)
    }

    /// Drop files that already appear among the notebook's sources, unless
    /// the user says otherwise. Best-effort: a failed scan never blocks
    /// the run.
    async fn apply_dedup_guard(
        &self,
        project: &Project,
        tab: &TabHandle,
        files: Vec<FileCandidate>,
    ) -> Vec<FileCandidate> {
        let scan = match self.scanner.scan(tab).await {
            Ok(scan) => scan,
            Err(e) => {
                warn!(error = %e, "Notebook source scan failed, skipping duplicate guard");
                return files;
            }
        };

        let suspects: Vec<&FileCandidate> = files
            .iter()
            .filter(|f| scan.contains(&nlmsync_browser::helper::normalize_filename(&f.filename)))
            .collect();

        let mut blocked: Vec<String> = Vec::new();
        let kept = if suspects.is_empty() {
            files
        } else {
            let names: Vec<String> = suspects.iter().map(|f| f.filename.clone()).collect();
            let suspect_ids: Vec<i64> = suspects.iter().map(|f| f.id).collect();
            self.status.update(
                &project.name,
                format!("{} possible duplicate(s) detected, awaiting decision...", names.len()),
            );
            let decision = tokio::time::timeout(
                DECISION_TIMEOUT,
                self.prompt.decide(&project.name, &names),
            )
            .await
            .unwrap_or(DedupDecision::Skip);

            match decision {
                DedupDecision::ImportAnyway => files,
                DedupDecision::Skip => {
                    blocked = names;
                    files
                        .into_iter()
                        .filter(|f| !suspect_ids.contains(&f.id))
                        .collect()
                }
            }
        };

        if !blocked.is_empty() || !scan.duplicates.is_empty() {
            let report = DedupReport {
                timestamp_ms: chrono::Utc::now().timestamp_millis(),
                project_name: project.name.clone(),
                blocked_possible_duplicates: blocked,
                existing_notebook_duplicates: scan.duplicates.clone(),
            };
            if let Err(e) = self.dedup_reports.save(&report).await {
                warn!(error = %e, "Failed to persist dedup report");
            }
        }

        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::AutoSkipPrompt;
    use async_trait::async_trait;
    use nlmsync_browser::helper::{ScannedSource, SourceScan};
    use nlmsync_browser::tabs::Navigator;
    use nlmsync_core::types::StatusUpdate;
    use nlmsync_licensing::{EntitlementChecker, UserState};
    use nlmsync_zotero::{FetchedFile, ListFilter};
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex as StdMutex;
    use tokio::sync::broadcast;
    use tokio::sync::Notify;
    use tokio::time::Instant;

    struct StaticChecker {
        paid: bool,
    }

    #[async_trait]
    impl EntitlementChecker for StaticChecker {
        async fn fetch_user(&self) -> Result<UserState> {
            Ok(UserState {
                paid: self.paid,
                ..Default::default()
            })
        }
    }

    struct MockSource {
        candidates: Vec<FileCandidate>,
        fetch_mimes: HashMap<i64, String>,
        fail_fetch: HashSet<i64>,
        fail_list: bool,
        fetched: StdMutex<Vec<i64>>,
    }

    #[async_trait]
    impl crate::source::FileSource for MockSource {
        async fn list(&self, _filter: &ListFilter) -> Result<Vec<FileCandidate>> {
            if self.fail_list {
                return Err(Error::Network("Zotero unreachable".to_string()));
            }
            Ok(self.candidates.clone())
        }

        async fn fetch(&self, id: i64) -> Result<FetchedFile> {
            self.fetched.lock().unwrap().push(id);
            if self.fail_fetch.contains(&id) {
                return Err(Error::Network("fetch failed".to_string()));
            }
            let mime = self
                .fetch_mimes
                .get(&id)
                .cloned()
                .unwrap_or_else(|| "application/pdf".to_string());
            Ok(FetchedFile {
                data_base64: "aGVsbG8=".to_string(),
                mime_type: mime,
            })
        }
    }

    struct MockNavigator {
        tab: Option<TabHandle>,
    }

    #[async_trait]
    impl Navigator for MockNavigator {
        async fn ensure_tab(&self, notebook_id: &str) -> Result<TabHandle> {
            self.tab.clone().ok_or_else(|| {
                Error::Navigation(format!("No tab for notebook {notebook_id}"))
            })
        }

        async fn find_app_tab(&self) -> Result<Option<TabHandle>> {
            Ok(self.tab.clone())
        }
    }

    #[derive(Default)]
    struct MockInjector {
        batches: StdMutex<Vec<Vec<String>>>,
        times: StdMutex<Vec<Instant>>,
        fail_on_call: Option<usize>,
        started: Option<Arc<Notify>>,
        release: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl Injector for MockInjector {
        async fn inject_batch(&self, _tab: &TabHandle, files: &[FilePayload]) -> Result<usize> {
            let call = {
                let mut batches = self.batches.lock().unwrap();
                batches.push(files.iter().map(|f| f.name.clone()).collect());
                self.times.lock().unwrap().push(Instant::now());
                batches.len()
            };
            if let Some(started) = &self.started {
                started.notify_one();
            }
            if let Some(release) = &self.release {
                release.notified().await;
            }
            if self.fail_on_call == Some(call) {
                return Err(Error::Automation("File input not found".to_string()));
            }
            Ok(files.len())
        }
    }

    struct MockScanner {
        scan: SourceScan,
    }

    #[async_trait]
    impl SourceScanner for MockScanner {
        async fn scan(&self, _tab: &TabHandle) -> Result<SourceScan> {
            Ok(self.scan.clone())
        }
    }

    struct MockPrompt {
        decision: DedupDecision,
        asked: StdMutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl DecisionPrompt for MockPrompt {
        async fn decide(&self, _project: &str, files: &[String]) -> DedupDecision {
            self.asked.lock().unwrap().push(files.to_vec());
            self.decision
        }
    }

    fn pdf(id: i64) -> FileCandidate {
        FileCandidate {
            id,
            parent_id: id * 100,
            title: format!("Item {id}"),
            filename: format!("item-{id}.pdf"),
            mime_type: Some("application/pdf".to_string()),
            date_modified: "2026-01-01 10:00:00".to_string(),
            version: 1,
            hash: format!("hash-{id}"),
        }
    }

    fn notebook_tab() -> TabHandle {
        TabHandle {
            target_id: "t1".to_string(),
            url: "https://notebooklm.google.com/notebook/nb-1".to_string(),
            title: "My notebook".to_string(),
        }
    }

    fn scan_with(names: &[&str]) -> SourceScan {
        SourceScan {
            sources: names
                .iter()
                .map(|n| ScannedSource {
                    raw_name: n.to_string(),
                    normalized_name: n.to_lowercase(),
                })
                .collect(),
            duplicates: Vec::new(),
            scan_method: "selector".to_string(),
        }
    }

    struct Fixture {
        paid: bool,
        candidates: Vec<FileCandidate>,
        fetch_mimes: HashMap<i64, String>,
        fail_fetch: HashSet<i64>,
        fail_list: bool,
        tab: Option<TabHandle>,
        scan: SourceScan,
        prompt: Arc<dyn DecisionPrompt>,
        injector: Arc<MockInjector>,
    }

    impl Default for Fixture {
        fn default() -> Self {
            Self {
                paid: false,
                candidates: Vec::new(),
                fetch_mimes: HashMap::new(),
                fail_fetch: HashSet::new(),
                fail_list: false,
                tab: Some(notebook_tab()),
                scan: SourceScan::default(),
                prompt: Arc::new(AutoSkipPrompt),
                injector: Arc::new(MockInjector::default()),
            }
        }
    }

    struct Harness {
        engine: Arc<SyncEngine>,
        source: Arc<MockSource>,
        injector: Arc<MockInjector>,
        paths: Paths,
        status_rx: broadcast::Receiver<StatusUpdate>,
        _dir: tempfile::TempDir,
    }

    impl Fixture {
        fn build(self) -> Harness {
            let dir = tempfile::tempdir().unwrap();
            let paths = Paths::with_base(dir.path().to_path_buf());
            let source = Arc::new(MockSource {
                candidates: self.candidates,
                fetch_mimes: self.fetch_mimes,
                fail_fetch: self.fail_fetch,
                fail_list: self.fail_list,
                fetched: StdMutex::new(Vec::new()),
            });
            let engine = SyncEngine::new(EngineDeps {
                license: Arc::new(LicenseCache::new(Arc::new(StaticChecker {
                    paid: self.paid,
                }))),
                source: source.clone(),
                navigator: Arc::new(MockNavigator { tab: self.tab }),
                injector: self.injector.clone(),
                scanner: Arc::new(MockScanner { scan: self.scan }),
                prompt: self.prompt,
                paths: paths.clone(),
            });
            let status_rx = engine.subscribe_status();
            Harness {
                engine,
                source,
                injector: self.injector,
                paths,
                status_rx,
                _dir: dir,
            }
        }
    }

    impl Harness {
        fn statuses(&mut self) -> Vec<String> {
            let mut out = Vec::new();
            while let Ok(update) = self.status_rx.try_recv() {
                out.push(update.text);
            }
            out
        }

        fn batch_sizes(&self) -> Vec<usize> {
            self.injector
                .batches
                .lock()
                .unwrap()
                .iter()
                .map(|b| b.len())
                .collect()
        }
    }

    fn project() -> Project {
        let mut p = Project::new("Research");
        p.notebook_id = Some("nb-1".to_string());
        p
    }

    #[tokio::test(start_paused = true)]
    async fn test_free_tier_caps_at_ten_with_notice() {
        let mut h = Fixture {
            candidates: (1..=12).map(pdf).collect(),
            ..Default::default()
        }
        .build();

        let outcome = h.engine.run_sync(&project()).await;
        assert_eq!(outcome, SyncOutcome::Completed { files_synced: 10 });
        assert_eq!(h.batch_sizes(), vec![3, 3, 3, 1]);
        let statuses = h.statuses();
        assert!(
            statuses.iter().any(|s| s.contains("10 of 12")),
            "expected truncation notice, got {statuses:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_sizes_and_pauses() {
        let mut h = Fixture {
            candidates: (1..=7).map(pdf).collect(),
            ..Default::default()
        }
        .build();

        let start = Instant::now();
        let outcome = h.engine.run_sync(&project()).await;
        let end = Instant::now();
        assert_eq!(outcome, SyncOutcome::Completed { files_synced: 7 });
        assert_eq!(h.batch_sizes(), vec![3, 3, 1]);

        let times = h.injector.times.lock().unwrap().clone();
        // 1s "found files" delay before the first batch.
        assert_eq!(times[0] - start, Duration::from_secs(1));
        // 5s free-tier pause after batches 1 and 2...
        assert_eq!(times[1] - times[0], Duration::from_secs(5));
        assert_eq!(times[2] - times[1], Duration::from_secs(5));
        // ...but none after the final batch.
        assert_eq!(end - times[2], Duration::from_secs(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mime_filtering_at_list_and_fetch_time() {
        let mut known_bad = pdf(2);
        known_bad.mime_type = Some("text/plain".to_string());
        known_bad.filename = "notes-2.txt".to_string();
        let mut unknown = pdf(3);
        unknown.mime_type = None;
        unknown.filename = "mystery-3.bin".to_string();

        let mut h = Fixture {
            candidates: vec![pdf(1), known_bad, unknown],
            fetch_mimes: HashMap::from([(3, "text/plain".to_string())]),
            ..Default::default()
        }
        .build();

        let outcome = h.engine.run_sync(&project()).await;
        assert_eq!(outcome, SyncOutcome::Completed { files_synced: 1 });

        // Known-disallowed was never fetched; unknown was fetched, then
        // dropped on the authoritative type.
        assert_eq!(*h.source.fetched.lock().unwrap(), vec![1, 3]);
        assert_eq!(h.injector.batches.lock().unwrap().clone(), vec![vec![
            "item-1.pdf".to_string()
        ]]);

        // Only the injected file went into history.
        let history = SyncHistoryStore::new(h.paths.clone()).load().await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history.contains_key("nb-1_1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_run_is_up_to_date() {
        let mut h = Fixture {
            candidates: (1..=3).map(pdf).collect(),
            ..Default::default()
        }
        .build();

        assert_eq!(
            h.engine.run_sync(&project()).await,
            SyncOutcome::Completed { files_synced: 3 }
        );
        assert_eq!(h.engine.run_sync(&project()).await, SyncOutcome::UpToDate);
        // No second injection happened.
        assert_eq!(h.batch_sizes(), vec![3]);
        let statuses = h.statuses();
        assert!(statuses.iter().any(|s| s.contains("up to date")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_counted_even_when_listing_fails() {
        let h = Fixture {
            fail_list: true,
            ..Default::default()
        }
        .build();

        let outcome = h.engine.run_sync(&project()).await;
        assert!(matches!(outcome, SyncOutcome::Aborted { .. }));
        let stats = SyncStatsStore::new(h.paths.clone()).today().await.unwrap();
        assert_eq!(stats.sync_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_daily_cap_denies_without_counting() {
        let mut h = Fixture {
            candidates: vec![pdf(1)],
            ..Default::default()
        }
        .build();

        let stats_store = SyncStatsStore::new(h.paths.clone());
        for _ in 0..5 {
            stats_store.increment(0).await.unwrap();
        }

        let outcome = h.engine.run_sync(&project()).await;
        match outcome {
            SyncOutcome::Aborted { reason } => assert!(reason.contains("5/5"), "{reason}"),
            other => panic!("expected Aborted, got {other:?}"),
        }
        // The denied attempt was not counted.
        assert_eq!(stats_store.today().await.unwrap().sync_count, 5);
        assert!(h.batch_sizes().is_empty());
        let _ = h.statuses();
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_sync_is_skipped_not_queued() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let injector = Arc::new(MockInjector {
            started: Some(started.clone()),
            release: Some(release.clone()),
            ..Default::default()
        });
        let h = Fixture {
            candidates: vec![pdf(1)],
            injector,
            ..Default::default()
        }
        .build();

        let engine = h.engine.clone();
        let first = tokio::spawn(async move { engine.run_sync(&project()).await });

        // Wait until the first run is mid-injection, holding the lock.
        started.notified().await;
        assert_eq!(h.engine.run_sync(&project()).await, SyncOutcome::Skipped);

        release.notify_one();
        assert_eq!(
            first.await.unwrap(),
            SyncOutcome::Completed { files_synced: 1 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_injection_failure_aborts_but_keeps_prior_batches() {
        let injector = Arc::new(MockInjector {
            fail_on_call: Some(2),
            ..Default::default()
        });
        let h = Fixture {
            candidates: (1..=6).map(pdf).collect(),
            injector,
            ..Default::default()
        }
        .build();

        let outcome = h.engine.run_sync(&project()).await;
        assert!(matches!(outcome, SyncOutcome::Aborted { .. }));

        // Batch 1 was recorded before batch 2 failed; nothing from the
        // failed batch leaked into history.
        let history = SyncHistoryStore::new(h.paths.clone()).load().await.unwrap();
        assert_eq!(history.len(), 3);
        for id in 1..=3 {
            assert!(history.contains_key(&format!("nb-1_{id}")));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_file_fetch_failure_skips_file_only() {
        let mut h = Fixture {
            candidates: (1..=3).map(pdf).collect(),
            fail_fetch: HashSet::from([2]),
            ..Default::default()
        }
        .build();

        let outcome = h.engine.run_sync(&project()).await;
        assert_eq!(outcome, SyncOutcome::Completed { files_synced: 2 });
        assert_eq!(
            h.injector.batches.lock().unwrap().clone(),
            vec![vec!["item-1.pdf".to_string(), "item-3.pdf".to_string()]]
        );
        let _ = h.statuses();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_tab_and_no_saved_notebook_aborts() {
        let mut h = Fixture {
            candidates: vec![pdf(1)],
            tab: None,
            ..Default::default()
        }
        .build();

        let mut p = project();
        p.notebook_id = None;
        let outcome = h.engine.run_sync(&p).await;
        match outcome {
            SyncOutcome::Aborted { reason } => {
                assert!(reason.contains("No notebook selected"), "{reason}")
            }
            other => panic!("expected Aborted, got {other:?}"),
        }
        let _ = h.statuses();
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_listing_is_no_items() {
        let h = Fixture::default().build();
        assert_eq!(h.engine.run_sync(&project()).await, SyncOutcome::NoItems);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dedup_skip_blocks_suspects_and_reports() {
        let prompt = Arc::new(MockPrompt {
            decision: DedupDecision::Skip,
            asked: StdMutex::new(Vec::new()),
        });
        let h = Fixture {
            candidates: (1..=3).map(pdf).collect(),
            scan: scan_with(&["item-2.pdf"]),
            prompt: prompt.clone(),
            ..Default::default()
        }
        .build();

        let outcome = h.engine.run_sync(&project()).await;
        assert_eq!(outcome, SyncOutcome::Completed { files_synced: 2 });
        assert_eq!(
            h.injector.batches.lock().unwrap().clone(),
            vec![vec!["item-1.pdf".to_string(), "item-3.pdf".to_string()]]
        );
        assert_eq!(
            prompt.asked.lock().unwrap().clone(),
            vec![vec!["item-2.pdf".to_string()]]
        );

        let report = DedupReportStore::new(h.paths.clone())
            .load_recent()
            .await
            .unwrap()
            .expect("report saved");
        assert_eq!(report.blocked_possible_duplicates, vec!["item-2.pdf"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dedup_import_anyway_keeps_all() {
        let prompt = Arc::new(MockPrompt {
            decision: DedupDecision::ImportAnyway,
            asked: StdMutex::new(Vec::new()),
        });
        let h = Fixture {
            candidates: (1..=3).map(pdf).collect(),
            scan: scan_with(&["item-2.pdf"]),
            prompt,
            ..Default::default()
        }
        .build();

        let outcome = h.engine.run_sync(&project()).await;
        assert_eq!(outcome, SyncOutcome::Completed { files_synced: 3 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_project_limit_enforced_on_add() {
        let h = Fixture::default().build();
        h.engine.add_project(Project::new("first")).await.unwrap();
        let err = h.engine.add_project(Project::new("second")).await.unwrap_err();
        assert!(matches!(err, Error::PolicyDenied(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pro_tier_has_no_file_cap() {
        let mut h = Fixture {
            paid: true,
            candidates: (1..=12).map(pdf).collect(),
            ..Default::default()
        }
        .build();

        let outcome = h.engine.run_sync(&project()).await;
        assert_eq!(outcome, SyncOutcome::Completed { files_synced: 12 });
        // Pro batch size is 10.
        assert_eq!(h.batch_sizes(), vec![10, 2]);
        let _ = h.statuses();
    }
}
