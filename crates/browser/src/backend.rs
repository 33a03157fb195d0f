//! Narrow automation capability interface.
//!
//! The orchestration layers only ever see these traits; the DevTools
//! transport below them can be swapped without touching sync logic.

use std::time::Duration;

use async_trait::async_trait;
use nlmsync_core::{Error, Result};
use serde_json::Value;
use tracing::debug;

use crate::cdp::{browser_ws_url, list_page_targets, target_ws_url, CdpClient};

/// One open page in the driven browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabHandle {
    pub target_id: String,
    pub url: String,
    pub title: String,
}

#[async_trait]
pub trait AutomationBackend: Send + Sync {
    async fn list_tabs(&self) -> Result<Vec<TabHandle>>;
    /// Open a new background tab at `url`.
    async fn open_tab(&self, url: &str) -> Result<TabHandle>;
    async fn navigate(&self, tab: &TabHandle, url: &str) -> Result<()>;
    /// Wait for the tab to reach load-complete, then the settle delay.
    /// Returns `Error::Navigation` on timeout.
    async fn wait_for_load(&self, tab: &TabHandle, timeout: Duration) -> Result<()>;
    async fn attach(&self, tab: &TabHandle) -> Result<Box<dyn AutomationSession>>;
}

/// A debugging session attached to one tab.
#[async_trait]
pub trait AutomationSession: Send + Sync {
    /// Evaluate a script in the page and return its value.
    async fn evaluate(&self, expression: &str) -> Result<Value>;
    /// Trusted left click at page coordinates.
    async fn dispatch_click(&self, x: f64, y: f64) -> Result<()>;
    async fn detach(&mut self) -> Result<()>;
}

// ─── CDP implementation ───────────────────────────────────────────────

pub struct CdpBackend {
    debug_port: u16,
    settle_delay: Duration,
}

impl CdpBackend {
    pub fn new(debug_port: u16, settle_delay: Duration) -> Self {
        Self {
            debug_port,
            settle_delay,
        }
    }

    async fn dial(&self, tab: &TabHandle) -> Result<CdpClient> {
        let ws_url = target_ws_url(self.debug_port, &tab.target_id).await?;
        CdpClient::connect(&ws_url).await
    }
}

#[async_trait]
impl AutomationBackend for CdpBackend {
    async fn list_tabs(&self) -> Result<Vec<TabHandle>> {
        let targets = list_page_targets(self.debug_port).await?;
        Ok(targets
            .into_iter()
            .map(|t| TabHandle {
                target_id: t.target_id,
                url: t.url,
                title: t.title,
            })
            .collect())
    }

    async fn open_tab(&self, url: &str) -> Result<TabHandle> {
        // Target.createTarget needs the browser-level connection.
        let ws = browser_ws_url(self.debug_port).await?;
        let browser = CdpClient::connect(&ws).await?;
        let target_id = browser.create_target(url).await?;
        debug!(target = %target_id, url = %url, "Opened background tab");
        Ok(TabHandle {
            target_id,
            url: url.to_string(),
            title: String::new(),
        })
    }

    async fn navigate(&self, tab: &TabHandle, url: &str) -> Result<()> {
        let client = self.dial(tab).await?;
        client.enable_domain("Page").await?;
        client.navigate(url).await
    }

    async fn wait_for_load(&self, tab: &TabHandle, timeout: Duration) -> Result<()> {
        let client = self.dial(tab).await?;
        client.enable_domain("Page").await?;
        client.enable_domain("Runtime").await?;

        // Subscribe before probing readyState so a load finishing between
        // the two cannot be missed.
        let mut load_events = client.subscribe_event("Page.loadEventFired").await;

        let ready = client
            .evaluate("document.readyState")
            .await
            .ok()
            .and_then(|v| v.as_str().map(|s| s == "complete"))
            .unwrap_or(false);

        if !ready {
            match tokio::time::timeout(timeout, load_events.recv()).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    return Err(Error::Navigation(
                        "Tab closed while waiting for it to load".to_string(),
                    ))
                }
                Err(_) => {
                    return Err(Error::Navigation(
                        "Timed out waiting for notebook tab to load".to_string(),
                    ))
                }
            }
        }

        // Load-complete is not interactive; give the client-side framework
        // time to initialize.
        tokio::time::sleep(self.settle_delay).await;
        Ok(())
    }

    async fn attach(&self, tab: &TabHandle) -> Result<Box<dyn AutomationSession>> {
        let client = self.dial(tab).await?;
        client.enable_domain("DOM").await?;
        client.enable_domain("Runtime").await?;
        Ok(Box::new(CdpSession {
            client: Some(client),
        }))
    }
}

pub struct CdpSession {
    client: Option<CdpClient>,
}

impl CdpSession {
    fn client(&self) -> Result<&CdpClient> {
        self.client
            .as_ref()
            .ok_or_else(|| Error::Automation("Session already detached".to_string()))
    }
}

#[async_trait]
impl AutomationSession for CdpSession {
    async fn evaluate(&self, expression: &str) -> Result<Value> {
        self.client()?.evaluate(expression).await
    }

    async fn dispatch_click(&self, x: f64, y: f64) -> Result<()> {
        self.client()?.click_at(x, y).await
    }

    async fn detach(&mut self) -> Result<()> {
        // Dropping the client tears down the WebSocket tasks.
        self.client.take();
        Ok(())
    }
}
