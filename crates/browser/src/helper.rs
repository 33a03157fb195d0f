//! Page-side helper: scripts evaluated in the notebook tab to get the
//! upload dialog into a ready state and to scan the sources already in
//! the notebook.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nlmsync_core::types::DuplicateGroup;
use nlmsync_core::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::{AutomationBackend, AutomationSession, TabHandle};
use crate::locator::{
    Locator, ADD_SOURCE_BUTTON, DROPZONE_SELECTORS, FILE_INPUT_SELECTORS, UPLOAD_BUTTON,
};

const HELPER_RETRIES: u32 = 3;
const HELPER_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Run a helper call with the standard retry loop. Page scripts race the
/// app's own rendering; a transient evaluation failure is retried up to
/// three times with 1s backoff.
pub async fn with_retry<T, F, Fut>(op: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;
    for attempt in 1..=HELPER_RETRIES {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                warn!(op, attempt, error = %e, "Helper call failed, retrying");
                last_err = Some(e);
                if attempt < HELPER_RETRIES {
                    tokio::time::sleep(HELPER_RETRY_BACKOFF).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| Error::Automation(format!("{op} failed"))))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogState {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub has_file_input: bool,
    #[serde(default)]
    pub needs_upload_click: bool,
    #[serde(default)]
    pub has_dropzone: bool,
}

fn dialog_state_script() -> String {
    let file_inputs = serde_json::to_string(FILE_INPUT_SELECTORS).unwrap_or_default();
    let upload_buttons = serde_json::to_string(UPLOAD_BUTTON.selectors).unwrap_or_default();
    let dropzones = serde_json::to_string(DROPZONE_SELECTORS).unwrap_or_default();
    format!(
        r#"(function() {{
    function isVisible(el) {{
        if (!el) return false;
        const style = window.getComputedStyle(el);
        if (style.display === 'none' || style.visibility === 'hidden' || style.opacity === '0') {{
            return false;
        }}
        const rect = el.getBoundingClientRect();
        return rect.width > 0 && rect.height > 0;
    }}
    for (const s of {file_inputs}) {{
        if (document.querySelector(s)) {{
            return {{ ready: true, hasFileInput: true }};
        }}
    }}
    for (const s of {upload_buttons}) {{
        const btn = document.querySelector(s);
        if (btn && isVisible(btn)) {{
            return {{ ready: false, needsUploadClick: true }};
        }}
    }}
    for (const s of {dropzones}) {{
        const dz = document.querySelector(s);
        if (dz && isVisible(dz)) {{
            return {{ ready: true, hasDropzone: true }};
        }}
    }}
    return {{ ready: false }};
}})()"#
    )
}

pub async fn check_dialog_state(session: &dyn AutomationSession) -> Result<DialogState> {
    let value = session.evaluate(&dialog_state_script()).await?;
    let state: DialogState = serde_json::from_value(value).unwrap_or_default();
    Ok(state)
}

/// Walk the notebook UI until the file-selection surface is ready: click
/// "Add source" and then "Upload" as needed, with a settle delay after
/// each click.
pub async fn open_upload_dialog(
    session: &dyn AutomationSession,
    locator: &Locator,
) -> Result<DialogState> {
    let state = check_dialog_state(session).await?;
    debug!(?state, "Initial dialog state");
    if state.ready {
        return Ok(state);
    }

    // The source dialog may already be open with only the upload step left.
    if state.needs_upload_click {
        if let Ok(point) = locator
            .find(session, &UPLOAD_BUTTON, Duration::from_secs(1))
            .await
        {
            session.dispatch_click(point.x, point.y).await?;
            tokio::time::sleep(Duration::from_millis(500)).await;
            let state = check_dialog_state(session).await?;
            if state.ready {
                return Ok(state);
            }
        }
    }

    let add_source = locator
        .find(session, &ADD_SOURCE_BUTTON, Duration::from_secs(2))
        .await?;
    debug!(method = %add_source.method, "Clicking add-source control");
    session.dispatch_click(add_source.x, add_source.y).await?;
    tokio::time::sleep(Duration::from_millis(800)).await;

    let upload = locator
        .find(session, &UPLOAD_BUTTON, Duration::from_secs(3))
        .await?;
    debug!(method = %upload.method, "Clicking upload control");
    session.dispatch_click(upload.x, upload.y).await?;
    tokio::time::sleep(Duration::from_millis(500)).await;

    let state = check_dialog_state(session).await?;
    if !state.ready && !state.has_file_input {
        warn!("Upload dialog may not be fully ready, continuing anyway");
    }
    Ok(state)
}

// ─── Notebook source scan ─────────────────────────────────────────────

const SOURCE_SCAN_SELECTORS: &[&str] = &[
    "[data-testid*=\"source\" i]",
    "[data-test-id*=\"source\" i]",
    "[class*=\"source-chip\" i]",
    "[class*=\"source-item\" i]",
    "[class*=\"source-row\" i]",
    "[aria-label*=\".pdf\" i]",
    "[aria-label*=\".docx\" i]",
    "[aria-label*=\".txt\" i]",
    "[aria-label*=\".md\" i]",
];

static SOURCE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([^\n\r<>]{1,220}\.(?:pdf|txt|md|docx))").expect("source name regex")
});

#[derive(Debug, Clone)]
pub struct ScannedSource {
    pub raw_name: String,
    pub normalized_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct SourceScan {
    pub sources: Vec<ScannedSource>,
    /// Names that appear more than once in the notebook itself.
    pub duplicates: Vec<DuplicateGroup>,
    pub scan_method: String,
}

impl SourceScan {
    pub fn contains(&self, normalized_name: &str) -> bool {
        self.sources.iter().any(|s| s.normalized_name == normalized_name)
    }
}

pub fn normalize_filename(name: &str) -> String {
    let lowered = name.to_lowercase();
    let collapsed: Vec<&str> = lowered.split_whitespace().collect();
    collapsed.join(" ")
}

/// Pull filename-looking strings out of one node text.
fn extract_source_names(text: &str) -> Vec<String> {
    SOURCE_NAME_RE
        .captures_iter(text)
        .map(|c| {
            c[1].trim()
                .trim_start_matches(['`', '"', '\'', '“', '”', '‘', '’'])
                .trim_end_matches(['`', '"', '\'', '“', '”', '‘', '’', ',', '.', ';', ':', '!', '?'])
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|s| !s.is_empty())
        .collect()
}

fn source_scan_script() -> String {
    let selectors = serde_json::to_string(SOURCE_SCAN_SELECTORS).unwrap_or_default();
    format!(
        r#"(function() {{
    function isVisible(el) {{
        if (!el) return false;
        const style = window.getComputedStyle(el);
        if (style.display === 'none' || style.visibility === 'hidden' || style.opacity === '0') {{
            return false;
        }}
        const rect = el.getBoundingClientRect();
        return rect.width > 0 && rect.height > 0;
    }}
    function nodeTexts(node) {{
        return [
            node.getAttribute && node.getAttribute('title'),
            node.getAttribute && node.getAttribute('aria-label'),
            node.textContent
        ].filter(Boolean);
    }}
    const texts = [];
    for (const selector of {selectors}) {{
        for (const node of document.querySelectorAll(selector)) {{
            if (!isVisible(node)) continue;
            texts.push(...nodeTexts(node));
        }}
    }}
    if (texts.length > 0) {{
        return {{ texts: texts, method: 'selector' }};
    }}
    let scanned = 0;
    const fallbackNodes = document.querySelectorAll(
        'button, [role="button"], [role="listitem"], [role="treeitem"], a'
    );
    for (const node of fallbackNodes) {{
        if (scanned >= 1200) break;
        scanned += 1;
        if (!isVisible(node)) continue;
        texts.push(...nodeTexts(node));
    }}
    if (texts.length === 0 && document.body) {{
        texts.push(document.body.innerText);
    }}
    return {{ texts: texts, method: 'text-fallback' }};
}})()"#
    )
}

/// Names of sources already present in the notebook, deduplicated by
/// normalized filename, with per-name occurrence counts.
pub async fn scan_notebook_sources(session: &dyn AutomationSession) -> Result<SourceScan> {
    let value = session.evaluate(&source_scan_script()).await?;
    Ok(build_source_scan(&value))
}

/// Seam for the orchestrator's duplicate guard.
#[async_trait]
pub trait SourceScanner: Send + Sync {
    async fn scan(&self, tab: &TabHandle) -> Result<SourceScan>;
}

pub struct PageSourceScanner {
    backend: Arc<dyn AutomationBackend>,
}

impl PageSourceScanner {
    pub fn new(backend: Arc<dyn AutomationBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl SourceScanner for PageSourceScanner {
    async fn scan(&self, tab: &TabHandle) -> Result<SourceScan> {
        let mut session = self.backend.attach(tab).await?;
        let result = with_retry("scan notebook sources", || {
            scan_notebook_sources(session.as_ref())
        })
        .await;
        let _ = session.detach().await;
        result
    }
}

fn build_source_scan(value: &Value) -> SourceScan {
    let method = value
        .get("method")
        .and_then(|v| v.as_str())
        .unwrap_or("error")
        .to_string();
    let texts: Vec<&str> = value
        .get("texts")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|t| t.as_str()).collect())
        .unwrap_or_default();

    let mut order: Vec<String> = Vec::new();
    let mut counts: std::collections::HashMap<String, (String, u32)> =
        std::collections::HashMap::new();
    for text in texts {
        // One node may repeat the same name in title/label/text; count it
        // once per node.
        let mut per_node: Vec<String> = Vec::new();
        for raw in extract_source_names(text) {
            let normalized = normalize_filename(&raw);
            if per_node.contains(&normalized) {
                continue;
            }
            per_node.push(normalized.clone());
            match counts.get_mut(&normalized) {
                Some((_, count)) => *count += 1,
                None => {
                    counts.insert(normalized.clone(), (raw, 1));
                    order.push(normalized);
                }
            }
        }
    }

    let sources = order
        .iter()
        .map(|normalized| ScannedSource {
            raw_name: counts[normalized].0.clone(),
            normalized_name: normalized.clone(),
        })
        .collect();
    let mut duplicates: Vec<DuplicateGroup> = counts
        .iter()
        .filter(|(_, (_, count))| *count > 1)
        .map(|(normalized, (_, count))| DuplicateGroup {
            normalized_name: normalized.clone(),
            count: *count,
        })
        .collect();
    duplicates.sort_by(|a, b| b.count.cmp(&a.count));

    SourceScan {
        sources,
        duplicates,
        scan_method: method,
    }
}
