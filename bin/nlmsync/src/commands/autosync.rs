use std::sync::Arc;

use nlmsync_engine::AutoSkipPrompt;

use super::build_engine;

pub async fn show() -> anyhow::Result<()> {
    let (engine, _, _) = build_engine(Arc::new(AutoSkipPrompt))?;
    let tier = engine.tier().await;
    let settings = engine.auto_sync_settings().await?;

    println!("Tier: {} (auto-sync {})", tier.name, if tier.auto_sync_enabled { "available" } else { "locked" });
    println!("Sync on page visit: {}", settings.sync_on_page_visit);
    println!("Interval enabled:   {}", settings.interval_enabled);
    println!(
        "Interval minutes:   {}",
        settings
            .interval_minutes
            .map(|m| m.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    Ok(())
}

pub async fn set(
    on_page_visit: Option<bool>,
    interval_enabled: Option<bool>,
    interval_minutes: Option<u32>,
) -> anyhow::Result<()> {
    let (engine, _, _) = build_engine(Arc::new(AutoSkipPrompt))?;
    let mut settings = engine.auto_sync_settings().await?;

    if let Some(v) = on_page_visit {
        settings.sync_on_page_visit = v;
    }
    if let Some(v) = interval_enabled {
        settings.interval_enabled = v;
    }
    if let Some(v) = interval_minutes {
        settings.interval_minutes = Some(v);
    }

    engine.update_auto_sync_settings(settings).await?;
    println!("Auto-sync settings saved. Restart the daemon or wait for its next cycle.");
    Ok(())
}
