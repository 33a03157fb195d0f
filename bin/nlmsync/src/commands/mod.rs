pub mod autosync;
pub mod completions;
pub mod daemon;
pub mod doctor;
pub mod projects;
pub mod status;
pub mod sync;

use std::sync::Arc;
use std::time::Duration;

use nlmsync_browser::helper::PageSourceScanner;
use nlmsync_browser::{BatchInjector, CdpBackend, TabNavigator};
use nlmsync_core::{Config, Paths};
use nlmsync_engine::{DecisionPrompt, EngineDeps, SyncEngine};
use nlmsync_licensing::{HttpEntitlementChecker, LicenseCache};
use nlmsync_zotero::ZoteroClient;

/// Wire the engine against the real collaborators.
pub fn build_engine(prompt: Arc<dyn DecisionPrompt>) -> anyhow::Result<(Arc<SyncEngine>, Config, Paths)> {
    let paths = Paths::new();
    paths.ensure_dirs()?;
    let config = Config::load(&paths)?;

    let backend = Arc::new(CdpBackend::new(
        config.browser.debug_port,
        Duration::from_millis(config.browser.settle_delay_ms),
    ));
    let navigator = Arc::new(TabNavigator::new(
        backend.clone(),
        &config.notebook.base_url,
        Duration::from_secs(config.browser.tab_load_timeout_secs),
    ));
    let injector = Arc::new(BatchInjector::new(
        backend.clone(),
        &config.notebook.base_url,
    ));
    let scanner = Arc::new(PageSourceScanner::new(backend));
    let license = Arc::new(LicenseCache::new(Arc::new(HttpEntitlementChecker::new(
        &config.licensing,
    ))));
    let source = Arc::new(ZoteroClient::new(&config.zotero.host));

    let engine = SyncEngine::new(EngineDeps {
        license,
        source,
        navigator,
        injector,
        scanner,
        prompt,
        paths: paths.clone(),
    });
    Ok((engine, config, paths))
}

/// Print status updates as the engine publishes them.
pub fn spawn_status_printer(engine: &SyncEngine) -> tokio::task::JoinHandle<()> {
    let mut rx = engine.subscribe_status();
    tokio::spawn(async move {
        while let Ok(update) = rx.recv().await {
            println!("[{}] {}", update.project, update.text);
        }
    })
}
