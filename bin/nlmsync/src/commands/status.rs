use std::sync::Arc;

use nlmsync_engine::{AutoSkipPrompt, TierInfo};

use super::build_engine;

pub async fn run() -> anyhow::Result<()> {
    let (engine, _, _) = build_engine(Arc::new(AutoSkipPrompt))?;
    let info = TierInfo::snapshot(&engine).await;

    println!("Tier: {}", info.tier_name);
    match info.max_syncs_per_day {
        Some(max) => println!("Syncs today: {}/{}", info.stats.sync_count, max),
        None => println!("Syncs today: {} (unlimited)", info.stats.sync_count),
    }
    match info.max_files_per_sync {
        Some(max) => println!("Files per sync: up to {max}"),
        None => println!("Files per sync: unlimited"),
    }
    println!(
        "Auto-sync: {}",
        if info.auto_sync_enabled { "available" } else { "Pro only" }
    );

    if let Some(report) = engine.last_dedup_report().await? {
        let blocked = report.blocked_possible_duplicates.len();
        let groups = report.existing_notebook_duplicates.len();
        if blocked > 0 || groups > 0 {
            println!(
                "Last dedup report ({}): {} possible duplicate(s) blocked, {} duplicate group(s) in notebook",
                report.project_name, blocked, groups
            );
        }
    }
    Ok(())
}
