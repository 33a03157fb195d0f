//! Locating controls in an externally-owned, versioned web UI.
//!
//! The mapping from "the upload button" to concrete DOM is heuristic and
//! expected to break when NotebookLM ships a redesign. Strategies are
//! ordered and pluggable: CSS selector match first, then case-insensitive
//! text match (the product is localized), then a structural fallback over
//! attribute fragments. Updating the tables below is the whole fix when
//! the UI changes.

use std::time::Duration;

use nlmsync_core::{Error, Result};
use serde_json::Value;
use tracing::debug;

use crate::backend::AutomationSession;

/// A control we need to find, with per-strategy hints.
#[derive(Debug, Clone, Copy)]
pub struct LocatorTarget {
    pub name: &'static str,
    pub selectors: &'static [&'static str],
    /// Lowercased substrings matched against button text.
    /// English + Turkish only; other locales are a known gap.
    pub text_patterns: &'static [&'static str],
    /// Attribute/class fragments for the structural fallback.
    pub structural_hints: &'static [&'static str],
}

pub const ADD_SOURCE_BUTTON: LocatorTarget = LocatorTarget {
    name: "add source button",
    selectors: &[
        ".add-source-button",
        "button.add-source-button",
        "button[jslog*=\"189032\"]",
        "[aria-label*=\"source\" i]",
        "[aria-label*=\"kaynak\" i]",
    ],
    text_patterns: &["add source", "kaynak ekle", "new source"],
    structural_hints: &["source"],
};

pub const UPLOAD_BUTTON: LocatorTarget = LocatorTarget {
    name: "upload button",
    selectors: &[
        "[xapscottyuploadertrigger]",
        ".drop-zone-icon-button",
        "button[xapscottyuploadertrigger]",
        ".xap-uploader-trigger",
    ],
    text_patterns: &[
        "upload", "yükle", "dosya", "browse", "select", "computer", "device", "local",
    ],
    structural_hints: &["upload", "uploader"],
};

pub const FILE_INPUT_SELECTORS: &[&str] =
    &["input[type=\"file\"][name=\"Filedata\"]", "input[type=\"file\"]"];

pub const DROPZONE_SELECTORS: &[&str] =
    &["[xapscottyuploaderdropzone]", ".xap-uploader-dropzone"];

const IS_VISIBLE_JS: &str = r#"
function isVisible(el) {
    if (!el) return false;
    const style = window.getComputedStyle(el);
    if (style.display === 'none' || style.visibility === 'hidden' || style.opacity === '0') {
        return false;
    }
    const rect = el.getBoundingClientRect();
    return rect.width > 0 && rect.height > 0;
}
"#;

/// Page coordinates of a located control, plus which strategy found it.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementPoint {
    pub x: f64,
    pub y: f64,
    pub method: String,
}

pub trait LocatorStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    /// A script returning `{found, x, y, method}`; `None` when the target
    /// carries no hints for this strategy.
    fn probe_script(&self, target: &LocatorTarget) -> Option<String>;
}

pub struct SelectorStrategy;

impl LocatorStrategy for SelectorStrategy {
    fn name(&self) -> &'static str {
        "selector"
    }

    fn probe_script(&self, target: &LocatorTarget) -> Option<String> {
        if target.selectors.is_empty() {
            return None;
        }
        let selectors = serde_json::to_string(target.selectors).ok()?;
        Some(format!(
            r#"(function() {{
    {IS_VISIBLE_JS}
    const selectors = {selectors};
    for (const s of selectors) {{
        const el = document.querySelector(s);
        if (el && isVisible(el)) {{
            const rect = el.getBoundingClientRect();
            return {{
                found: true,
                x: rect.left + rect.width / 2,
                y: rect.top + rect.height / 2,
                method: 'selector:' + s
            }};
        }}
    }}
    return {{ found: false }};
}})()"#
        ))
    }
}

pub struct TextStrategy;

impl LocatorStrategy for TextStrategy {
    fn name(&self) -> &'static str {
        "text"
    }

    fn probe_script(&self, target: &LocatorTarget) -> Option<String> {
        if target.text_patterns.is_empty() {
            return None;
        }
        let patterns = serde_json::to_string(target.text_patterns).ok()?;
        Some(format!(
            r#"(function() {{
    {IS_VISIBLE_JS}
    const patterns = {patterns};
    const buttons = document.querySelectorAll('button, [role="button"], [role="menuitem"]');
    for (const el of buttons) {{
        if (!isVisible(el)) continue;
        const text = (el.innerText || el.textContent || '').toLowerCase();
        for (const pattern of patterns) {{
            if (text.includes(pattern)) {{
                const rect = el.getBoundingClientRect();
                return {{
                    found: true,
                    x: rect.left + rect.width / 2,
                    y: rect.top + rect.height / 2,
                    method: 'text:' + pattern
                }};
            }}
        }}
    }}
    return {{ found: false }};
}})()"#
        ))
    }
}

/// Last resort: match class/test-id fragments anywhere in the page.
pub struct StructuralStrategy;

impl LocatorStrategy for StructuralStrategy {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn probe_script(&self, target: &LocatorTarget) -> Option<String> {
        if target.structural_hints.is_empty() {
            return None;
        }
        let hints = serde_json::to_string(target.structural_hints).ok()?;
        Some(format!(
            r#"(function() {{
    {IS_VISIBLE_JS}
    const hints = {hints};
    for (const hint of hints) {{
        const nodes = document.querySelectorAll(
            '[class*="' + hint + '" i], [data-testid*="' + hint + '" i], [data-test-id*="' + hint + '" i]'
        );
        for (const el of nodes) {{
            if (!isVisible(el)) continue;
            const clickable = el.closest('button, [role="button"]') || el;
            const rect = clickable.getBoundingClientRect();
            if (rect.width === 0) continue;
            return {{
                found: true,
                x: rect.left + rect.width / 2,
                y: rect.top + rect.height / 2,
                method: 'structural:' + hint
            }};
        }}
    }}
    return {{ found: false }};
}})()"#
        ))
    }
}

/// Lists the visible buttons so a locate failure carries something to
/// debug against.
const DIAGNOSTIC_SCRIPT: &str = r#"(function() {
    function isVisible(el) {
        if (!el) return false;
        const style = window.getComputedStyle(el);
        if (style.display === 'none' || style.visibility === 'hidden' || style.opacity === '0') {
            return false;
        }
        const rect = el.getBoundingClientRect();
        return rect.width > 0 && rect.height > 0;
    }
    const out = [];
    document.querySelectorAll('button, [role="button"]').forEach(b => {
        if (isVisible(b)) {
            out.push({
                text: (b.textContent || '').substring(0, 50),
                class: b.className,
                tag: b.tagName
            });
        }
    });
    return out;
})()"#;

pub struct Locator {
    strategies: Vec<Box<dyn LocatorStrategy>>,
}

impl Default for Locator {
    fn default() -> Self {
        Self {
            strategies: vec![
                Box::new(SelectorStrategy),
                Box::new(TextStrategy),
                Box::new(StructuralStrategy),
            ],
        }
    }
}

impl Locator {
    pub fn with_strategies(strategies: Vec<Box<dyn LocatorStrategy>>) -> Self {
        Self { strategies }
    }

    /// Poll the strategy list in order until the target appears or the
    /// search window closes. A miss is a hard failure carrying the visible
    /// button dump.
    pub async fn find(
        &self,
        session: &dyn AutomationSession,
        target: &LocatorTarget,
        window: Duration,
    ) -> Result<ElementPoint> {
        let start = std::time::Instant::now();
        loop {
            for strategy in &self.strategies {
                let Some(script) = strategy.probe_script(target) else {
                    continue;
                };
                let result = session.evaluate(&script).await?;
                if let Some(point) = parse_probe_result(&result) {
                    debug!(target = target.name, method = %point.method, "Located control");
                    return Ok(point);
                }
            }
            if start.elapsed() >= window {
                break;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }

        let buttons = session
            .evaluate(DIAGNOSTIC_SCRIPT)
            .await
            .unwrap_or(Value::Null);
        Err(Error::Automation(format!(
            "Could not find {}. Visible buttons: {}",
            target.name, buttons
        )))
    }
}

fn parse_probe_result(value: &Value) -> Option<ElementPoint> {
    if !value.get("found")?.as_bool()? {
        return None;
    }
    Some(ElementPoint {
        x: value.get("x")?.as_f64()?,
        y: value.get("y")?.as_f64()?,
        method: value.get("method")?.as_str()?.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn test_selector_probe_embeds_escaped_selectors() {
        let script = SelectorStrategy.probe_script(&UPLOAD_BUTTON).unwrap();
        assert!(script.contains("[xapscottyuploadertrigger]"));
        // JSON escaping keeps embedded quotes valid inside the script.
        let script = SelectorStrategy.probe_script(&ADD_SOURCE_BUTTON).unwrap();
        assert!(script.contains(r#"[aria-label*=\"source\" i]"#));
    }

    #[test]
    fn test_text_probe_carries_localized_patterns() {
        let script = TextStrategy.probe_script(&UPLOAD_BUTTON).unwrap();
        assert!(script.contains("yükle"));
        assert!(script.contains("upload"));
    }

    #[test]
    fn test_parse_probe_result() {
        let found = json!({"found": true, "x": 10.0, "y": 20.0, "method": "selector:.a"});
        assert_eq!(
            parse_probe_result(&found).unwrap(),
            ElementPoint {
                x: 10.0,
                y: 20.0,
                method: "selector:.a".to_string()
            }
        );
        assert!(parse_probe_result(&json!({"found": false})).is_none());
        assert!(parse_probe_result(&json!(null)).is_none());
    }

    struct ScriptedSession {
        responses: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl AutomationSession for ScriptedSession {
        async fn evaluate(&self, _expression: &str) -> Result<Value> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(json!({"found": false}))
            } else {
                Ok(responses.remove(0))
            }
        }

        async fn dispatch_click(&self, _x: f64, _y: f64) -> Result<()> {
            Ok(())
        }

        async fn detach(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_falls_through_to_later_strategy() {
        // Selector probe misses, text probe hits.
        let session = ScriptedSession {
            responses: Mutex::new(vec![
                json!({"found": false}),
                json!({"found": true, "x": 5.0, "y": 6.0, "method": "text:upload"}),
            ]),
        };
        let locator = Locator::default();
        let point = locator
            .find(&session, &UPLOAD_BUTTON, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(point.method, "text:upload");
    }

    #[tokio::test]
    async fn test_miss_reports_button_dump() {
        let session = ScriptedSession {
            responses: Mutex::new(Vec::new()),
        };
        let locator = Locator::default();
        let err = locator
            .find(&session, &ADD_SOURCE_BUTTON, Duration::from_millis(10))
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("add source button"), "{msg}");
    }
}
