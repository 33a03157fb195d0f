//! Attach to a running browser's debug port, or launch one.
//!
//! The daemon prefers a browser the user already runs with
//! `--remote-debugging-port`; when nothing answers on the configured port
//! it spawns a discovered Chromium-family binary with a dedicated profile.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use nlmsync_core::config::BrowserConfig;
use nlmsync_core::{Error, Paths, Result};
use tokio::process::{Child, Command};
use tracing::info;

use crate::cdp::browser_ws_url;

/// Handle to a browser process we spawned. Dropping it kills the process;
/// attached browsers have no handle.
pub struct LaunchedBrowser {
    child: Child,
    pub debug_port: u16,
}

impl Drop for LaunchedBrowser {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
    }
}

/// Make sure a CDP endpoint answers on the configured port.
///
/// Returns `None` when an already-running browser was reused, or the
/// spawned process handle otherwise.
pub async fn ensure_browser(
    config: &BrowserConfig,
    paths: &Paths,
) -> Result<Option<LaunchedBrowser>> {
    if browser_ws_url(config.debug_port).await.is_ok() {
        info!(port = config.debug_port, "Reusing running browser");
        return Ok(None);
    }

    let binary = match &config.binary {
        Some(path) => path.clone(),
        None => find_browser_binary().ok_or_else(|| {
            Error::Config(
                "No Chromium-family browser found. Install Chrome/Chromium/Edge or set browser.binary in config.json.".to_string(),
            )
        })?,
    };

    let profile_dir = paths.browser_profile_dir();
    std::fs::create_dir_all(&profile_dir)?;

    let args = build_browser_args(config.debug_port, &profile_dir);
    info!(binary = %binary, port = config.debug_port, "Launching browser");

    let child = Command::new(&binary)
        .args(&args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::Automation(format!("Failed to launch {binary}: {e}")))?;

    wait_for_cdp_ready(config.debug_port, 15).await?;

    Ok(Some(LaunchedBrowser {
        child,
        debug_port: config.debug_port,
    }))
}

fn build_browser_args(debug_port: u16, user_data_dir: &Path) -> Vec<String> {
    vec![
        format!("--remote-debugging-port={debug_port}"),
        format!("--user-data-dir={}", user_data_dir.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-background-networking".to_string(),
        "--disable-sync".to_string(),
        "--disable-translate".to_string(),
        "--metrics-recording-only".to_string(),
        "--password-store=basic".to_string(),
        "--window-size=1280,720".to_string(),
        "about:blank".to_string(),
    ]
}

/// Find a Chromium-family binary on the system.
pub fn find_browser_binary() -> Option<String> {
    let candidates: Vec<&str> = if cfg!(target_os = "macos") {
        vec![
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
            "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
        ]
    } else if cfg!(target_os = "linux") {
        vec![
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
            "microsoft-edge",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
        ]
    } else {
        vec![
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
        ]
    };

    for candidate in candidates {
        if PathBuf::from(candidate).exists() {
            return Some(candidate.to_string());
        }
        if !candidate.contains('/') && !candidate.contains('\\') && which::which(candidate).is_ok() {
            return Some(candidate.to_string());
        }
    }
    None
}

/// Poll `/json/version` until the freshly spawned browser answers.
async fn wait_for_cdp_ready(port: u16, timeout_secs: u64) -> Result<()> {
    let start = std::time::Instant::now();
    loop {
        if start.elapsed().as_secs() > timeout_secs {
            return Err(Error::Timeout(format!(
                "Browser CDP endpoint not ready after {timeout_secs}s on port {port}"
            )));
        }
        if browser_ws_url(port).await.is_ok() {
            return Ok(());
        }
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_args_include_debug_port_and_profile() {
        let args = build_browser_args(9229, Path::new("/tmp/profile"));
        assert!(args.contains(&"--remote-debugging-port=9229".to_string()));
        assert!(args.iter().any(|a| a.starts_with("--user-data-dir=")));
        assert_eq!(args.last().unwrap(), "about:blank");
    }
}
