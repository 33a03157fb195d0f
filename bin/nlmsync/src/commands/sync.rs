use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use nlmsync_browser::launch::ensure_browser;
use nlmsync_core::types::SyncOutcome;
use nlmsync_engine::{DecisionPrompt, DedupDecision};

use super::{build_engine, spawn_status_printer};

/// Interactive duplicate decision at the terminal. Anything but an
/// explicit yes skips the suspects.
struct StdinPrompt;

#[async_trait]
impl DecisionPrompt for StdinPrompt {
    async fn decide(&self, project: &str, files: &[String]) -> DedupDecision {
        println!("Possible duplicates in \"{project}\":");
        for (i, file) in files.iter().enumerate() {
            println!("  {}. {}", i + 1, file);
        }
        print!("Import anyway? [y/N] ");
        let _ = std::io::stdout().flush();

        let answer = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            let _ = std::io::stdin().read_line(&mut line);
            line
        })
        .await
        .unwrap_or_default();

        if answer.trim().eq_ignore_ascii_case("y") {
            DedupDecision::ImportAnyway
        } else {
            DedupDecision::Skip
        }
    }
}

pub async fn run(project_name: &str) -> anyhow::Result<()> {
    let (engine, config, paths) = build_engine(Arc::new(StdinPrompt))?;
    let project = engine.find_project(project_name).await?;

    // Keep the launched-browser handle alive for the whole run.
    let _browser = ensure_browser(&config.browser, &paths).await?;

    let printer = spawn_status_printer(&engine);
    let outcome = engine.run_sync(&project).await;
    printer.abort();

    match outcome {
        SyncOutcome::Completed { files_synced } => {
            println!("Done: {files_synced} files synced.");
        }
        SyncOutcome::UpToDate => println!("Already up to date."),
        SyncOutcome::NoItems => println!("Nothing matched the project filters."),
        SyncOutcome::Skipped => println!("Skipped: a sync is already running."),
        SyncOutcome::Aborted { reason } => {
            anyhow::bail!("Sync aborted: {reason}");
        }
    }
    Ok(())
}

pub async fn run_all() -> anyhow::Result<()> {
    let (engine, config, paths) = build_engine(Arc::new(StdinPrompt))?;
    let _browser = ensure_browser(&config.browser, &paths).await?;

    let printer = spawn_status_printer(&engine);
    engine.run_auto_sync().await?;
    printer.abort();
    Ok(())
}
