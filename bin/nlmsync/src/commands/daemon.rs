use std::sync::Arc;

use nlmsync_browser::launch::ensure_browser;
use nlmsync_engine::auto_sync::watch_page_visits;
use nlmsync_engine::{run_control_loop, AutoSkipPrompt, AutoSyncScheduler};
use tokio::sync::mpsc;
use tracing::info;

use super::{build_engine, spawn_status_printer};

/// Long-lived process: interval trigger, page-visit watcher, and the
/// control channel. Unattended, so duplicate suspects default to skip.
pub async fn run() -> anyhow::Result<()> {
    let (engine, config, paths) = build_engine(Arc::new(AutoSkipPrompt))?;

    let _browser = ensure_browser(&config.browser, &paths).await?;
    let _printer = spawn_status_printer(&engine);

    let scheduler = Arc::new(AutoSyncScheduler::new(engine.clone()));
    let (_control_tx, control_rx) = mpsc::channel(16);

    let scheduler_task = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run().await })
    };
    let watcher_task = tokio::spawn(watch_page_visits(engine.clone()));
    let control_task = tokio::spawn(run_control_loop(engine, scheduler, control_rx));

    info!("Daemon running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    scheduler_task.abort();
    watcher_task.abort();
    control_task.abort();
    Ok(())
}
