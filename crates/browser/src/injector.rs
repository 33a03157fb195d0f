//! Making files appear as if selected through the notebook app's native
//! upload flow.
//!
//! The app has no public API, so a batch is delivered by getting the
//! upload dialog open, suppressing the native OS file picker, and
//! assigning a synthetic `FileList` directly to the page's file input.
//! Every step is idempotent; the whole protocol is retried (or not) by
//! the orchestrator, never here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nlmsync_core::{Error, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{AutomationBackend, AutomationSession, TabHandle};
use crate::helper::{open_upload_dialog, with_retry};
use crate::locator::{Locator, FILE_INPUT_SELECTORS, UPLOAD_BUTTON};

/// An in-memory file ready for injection.
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub name: String,
    pub mime_type: String,
    /// `data:<mime>;base64,<bytes>`; the page fetches this into a Blob.
    pub data_url: String,
}

impl FilePayload {
    pub fn from_base64(name: &str, mime_type: &str, data_base64: &str) -> Self {
        Self {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            data_url: format!("data:{mime_type};base64,{data_base64}"),
        }
    }
}

#[derive(Serialize)]
struct WireFile<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    mime_type: &'a str,
    base64: &'a str,
}

/// Seam for the orchestrator: tests inject batches without a browser.
#[async_trait]
pub trait Injector: Send + Sync {
    /// Deliver `files` into the notebook shown by `tab`. Returns the
    /// number of files injected; any error means the batch did not land.
    async fn inject_batch(&self, tab: &TabHandle, files: &[FilePayload]) -> Result<usize>;
}

pub struct BatchInjector {
    backend: Arc<dyn AutomationBackend>,
    locator: Locator,
    app_origin: String,
}

impl BatchInjector {
    pub fn new(backend: Arc<dyn AutomationBackend>, app_origin: &str) -> Self {
        Self {
            backend,
            locator: Locator::default(),
            app_origin: app_origin.trim_end_matches('/').to_string(),
        }
    }

    fn validate_tab(&self, tab: &TabHandle) -> Result<()> {
        if tab.url.is_empty() {
            return Err(Error::Automation(
                "Tab no longer exists. Please try again.".to_string(),
            ));
        }
        if tab.url.starts_with("chrome://") || tab.url.starts_with("chrome-extension://") {
            return Err(Error::Automation(
                "Cannot attach to browser-internal pages. Please navigate to NotebookLM and try again."
                    .to_string(),
            ));
        }
        if !tab.url.starts_with(&self.app_origin) {
            return Err(Error::Automation(
                "Tab is not on NotebookLM. Please navigate to NotebookLM and try again.".to_string(),
            ));
        }
        Ok(())
    }

    async fn run_protocol(
        &self,
        session: &dyn AutomationSession,
        files: &[FilePayload],
    ) -> Result<usize> {
        // Get the file-selection UI ready. This is the step most exposed
        // to the app's own rendering, hence the retry loop.
        with_retry("open upload dialog", || {
            open_upload_dialog(session, &self.locator)
        })
        .await?;
        tokio::time::sleep(Duration::from_millis(1500)).await;

        // Synthetic files cannot travel through the OS picker; it must
        // never open.
        session.evaluate(SUPPRESSION_SCRIPT).await?;

        // The trigger that arms the file input.
        let trigger = self
            .locator
            .find(session, &UPLOAD_BUTTON, Duration::from_secs(2))
            .await?;
        debug!(method = %trigger.method, "Clicking upload trigger");
        session.dispatch_click(trigger.x, trigger.y).await?;
        tokio::time::sleep(Duration::from_millis(800)).await;

        let check = session.evaluate(&file_input_check_script()).await?;
        if !check.get("found").and_then(|v| v.as_bool()).unwrap_or(false) {
            return Err(Error::Automation(
                "File input not found. The upload dialog may not have opened correctly.".to_string(),
            ));
        }
        debug!(selector = %check.get("selector").and_then(|v| v.as_str()).unwrap_or("?"),
               "File input present");

        let result = session.evaluate(&injection_script(files)?).await?;
        let success = result
            .get("success")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if !success {
            let error = result
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("File injection failed");
            return Err(Error::Automation(error.to_string()));
        }
        let count = result
            .get("fileCount")
            .and_then(|v| v.as_u64())
            .unwrap_or(files.len() as u64) as usize;
        info!(count, "Injected batch into notebook");
        Ok(count)
    }

    async fn cleanup(&self, session: &mut Box<dyn AutomationSession>) {
        if let Err(e) = session.evaluate(RESTORE_SCRIPT).await {
            debug!(error = %e, "Suppression restore failed (page may have navigated)");
        }
        if let Err(e) = session.detach().await {
            debug!(error = %e, "Detach failed, ignoring");
        }
    }
}

#[async_trait]
impl Injector for BatchInjector {
    async fn inject_batch(&self, tab: &TabHandle, files: &[FilePayload]) -> Result<usize> {
        self.validate_tab(tab)?;

        let mut session = self.backend.attach(tab).await.map_err(|e| {
            Error::Automation(format!(
                "Cannot attach to the NotebookLM tab ({e}). Refresh the page and try again."
            ))
        })?;

        let result = self.run_protocol(session.as_ref(), files).await;
        // Cleanup runs on success and failure alike.
        self.cleanup(&mut session).await;
        if let Err(e) = &result {
            warn!(error = %e, "Batch injection failed");
        }
        result
    }
}

/// Wraps the file-input activation method so the native dialog never
/// opens while an injection is active.
const SUPPRESSION_SCRIPT: &str = r#"
window._nlmSuppressionActive = true;
if (!window._nlmOriginalClick) {
    window._nlmOriginalClick = HTMLInputElement.prototype.click;
    HTMLInputElement.prototype.click = function() {
        if (this.type === 'file' && window._nlmSuppressionActive) {
            return;
        }
        return window._nlmOriginalClick.apply(this, arguments);
    };
}
"#;

const RESTORE_SCRIPT: &str = "window._nlmSuppressionActive = false;";

fn file_input_check_script() -> String {
    let selectors = serde_json::to_string(FILE_INPUT_SELECTORS).unwrap_or_default();
    format!(
        r#"(function() {{
    for (const s of {selectors}) {{
        const input = document.querySelector(s);
        if (input) {{
            return {{ found: true, selector: s, accept: input.accept }};
        }}
    }}
    return {{ found: false }};
}})()"#
    )
}

fn injection_script(files: &[FilePayload]) -> Result<String> {
    let items: Vec<WireFile<'_>> = files
        .iter()
        .map(|f| WireFile {
            name: &f.name,
            mime_type: &f.mime_type,
            base64: &f.data_url,
        })
        .collect();
    let items = serde_json::to_string(&items)?;
    let selectors = serde_json::to_string(FILE_INPUT_SELECTORS)?;

    Ok(format!(
        r#"(async function() {{
    try {{
        let input = null;
        for (const s of {selectors}) {{
            input = document.querySelector(s);
            if (input) break;
        }}
        if (!input) throw new Error('File input not found');

        const dt = new DataTransfer();
        const items = {items};
        for (const item of items) {{
            const response = await fetch(item.base64);
            const blob = await response.blob();
            dt.items.add(new File([blob], item.name, {{ type: item.type }}));
        }}

        input.files = dt.files;
        // Frameworks vary in which event they observe.
        input.dispatchEvent(new Event('change', {{ bubbles: true, composed: true }}));
        input.dispatchEvent(new Event('input', {{ bubbles: true, composed: true }}));
        return {{ success: true, fileCount: items.length }};
    }} catch (e) {{
        return {{ success: false, error: e.message }};
    }} finally {{
        window._nlmSuppressionActive = false;
    }}
}})()"#
    ))
}
