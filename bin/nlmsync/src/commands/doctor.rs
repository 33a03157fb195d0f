use nlmsync_browser::cdp::browser_ws_url;
use nlmsync_browser::launch::find_browser_binary;
use nlmsync_core::{Config, Paths};
use nlmsync_licensing::{EntitlementChecker, HttpEntitlementChecker};
use nlmsync_zotero::ZoteroClient;

pub async fn run() -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load(&paths)?;

    println!("nlmsync doctor");
    println!("==============");

    // Zotero control plane
    let zotero = ZoteroClient::new(&config.zotero.host);
    match zotero.libraries().await {
        Ok(libraries) => {
            println!("[ok] Zotero at {} ({} libraries)", config.zotero.host, libraries.len());
            for lib in libraries {
                let kind = if lib.library_type == "group" { " (Group)" } else { "" };
                println!("     - {} [id {}]{}", lib.name, lib.library_id, kind);
            }
        }
        Err(e) => {
            println!("[!!] Zotero unreachable: {e}");
            println!("     Is Zotero running with the NotebookLM bridge plugin installed?");
        }
    }

    // Browser debug endpoint
    match browser_ws_url(config.browser.debug_port).await {
        Ok(_) => println!("[ok] Browser CDP endpoint on port {}", config.browser.debug_port),
        Err(_) => {
            println!("[!!] No browser listening on port {}", config.browser.debug_port);
            match find_browser_binary() {
                Some(binary) => println!("     Would launch: {binary}"),
                None => println!("     No Chromium-family browser found either."),
            }
        }
    }

    // Entitlement service
    let checker = HttpEntitlementChecker::new(&config.licensing);
    match checker.fetch_user().await {
        Ok(user) => println!("[ok] Entitlement service: paid={}", user.paid),
        Err(e) => println!("[!!] Entitlement check failed (falls back to Free): {e}"),
    }

    Ok(())
}
