//! Low-level Chrome DevTools Protocol client over WebSocket.
//!
//! One `CdpClient` speaks to one debugging target (the browser endpoint or
//! a single page). Commands are matched to responses by id; events fan out
//! to subscribed listeners.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nlmsync_core::{Error, Result};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, warn};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

pub struct CdpClient {
    ws_tx: mpsc::Sender<String>,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>,
    next_id: AtomicU64,
    event_listeners: Arc<Mutex<HashMap<String, Vec<mpsc::Sender<Value>>>>>,
    reader_handle: tokio::task::JoinHandle<()>,
    writer_handle: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    pub async fn connect(ws_url: &str) -> Result<Self> {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::connect_async;
        use tokio_tungstenite::tungstenite::Message;

        let (ws_stream, _) = connect_async(ws_url)
            .await
            .map_err(|e| Error::Automation(format!("CDP connect to {ws_url} failed: {e}")))?;

        let (mut ws_sink, mut ws_read) = ws_stream.split();
        let (ws_tx, mut ws_rx) = mpsc::channel::<String>(256);

        let pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let pending_reader = pending.clone();

        let event_listeners: Arc<Mutex<HashMap<String, Vec<mpsc::Sender<Value>>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let listeners_reader = event_listeners.clone();

        let writer_handle = tokio::spawn(async move {
            while let Some(msg) = ws_rx.recv().await {
                if let Err(e) = ws_sink.send(Message::Text(msg)).await {
                    warn!("CDP write error: {}", e);
                    break;
                }
            }
        });

        let reader_handle = tokio::spawn(async move {
            while let Some(msg) = ws_read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        let Ok(val) = serde_json::from_str::<Value>(&text) else {
                            continue;
                        };
                        if let Some(id) = val.get("id").and_then(|v| v.as_u64()) {
                            let mut pending = pending_reader.lock().await;
                            if let Some(tx) = pending.remove(&id) {
                                let _ = tx.send(val);
                            }
                        } else if let Some(method) = val.get("method").and_then(|v| v.as_str()) {
                            let listeners = listeners_reader.lock().await;
                            if let Some(senders) = listeners.get(method) {
                                let params = val.get("params").cloned().unwrap_or(Value::Null);
                                for tx in senders {
                                    let _ = tx.try_send(params.clone());
                                }
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("CDP WebSocket closed by peer");
                        break;
                    }
                    Err(e) => {
                        warn!("CDP read error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        });

        Ok(Self {
            ws_tx,
            pending,
            next_id: AtomicU64::new(1),
            event_listeners,
            reader_handle,
            writer_handle,
        })
    }

    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let msg = json!({ "id": id, "method": method, "params": params });

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id, tx);
        }

        self.ws_tx
            .send(msg.to_string())
            .await
            .map_err(|e| Error::Automation(format!("CDP send failed: {e}")))?;

        match tokio::time::timeout(COMMAND_TIMEOUT, rx).await {
            Ok(Ok(response)) => {
                if let Some(error) = response.get("error") {
                    Err(Error::Automation(format!("CDP {method}: {error}")))
                } else {
                    Ok(response.get("result").cloned().unwrap_or(Value::Null))
                }
            }
            Ok(Err(_)) => Err(Error::Automation("CDP response channel closed".to_string())),
            Err(_) => {
                let mut pending = self.pending.lock().await;
                pending.remove(&id);
                Err(Error::Timeout(format!(
                    "CDP command '{}' timed out after {}s",
                    method,
                    COMMAND_TIMEOUT.as_secs()
                )))
            }
        }
    }

    /// Subscribe to a CDP event (e.g. `Page.loadEventFired`).
    pub async fn subscribe_event(&self, method: &str) -> mpsc::Receiver<Value> {
        let (tx, rx) = mpsc::channel(64);
        let mut listeners = self.event_listeners.lock().await;
        listeners.entry(method.to_string()).or_default().push(tx);
        rx
    }

    pub async fn enable_domain(&self, domain: &str) -> Result<()> {
        self.send_command(&format!("{domain}.enable"), json!({})).await?;
        Ok(())
    }

    /// Evaluate JavaScript in the page, returning the value. Promises are
    /// awaited; a thrown exception becomes an `Automation` error.
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result = self
            .send_command(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            let text = details
                .get("exception")
                .and_then(|e| e.get("description"))
                .and_then(|v| v.as_str())
                .unwrap_or("script threw");
            return Err(Error::Automation(format!("Page script failed: {text}")));
        }
        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.send_command("Page.navigate", json!({ "url": url })).await?;
        Ok(())
    }

    /// Left mouse press + release at page coordinates.
    pub async fn click_at(&self, x: f64, y: f64) -> Result<()> {
        for event_type in ["mousePressed", "mouseReleased"] {
            self.send_command(
                "Input.dispatchMouseEvent",
                json!({
                    "type": event_type,
                    "x": x,
                    "y": y,
                    "button": "left",
                    "clickCount": 1,
                }),
            )
            .await?;
        }
        Ok(())
    }

    // ─── Target management (browser endpoint) ─────────────────────────

    /// Create a page target without focusing it (a background tab).
    pub async fn create_target(&self, url: &str) -> Result<String> {
        let result = self
            .send_command(
                "Target.createTarget",
                json!({ "url": url, "background": true }),
            )
            .await?;
        result
            .get("targetId")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| Error::Automation("No targetId from createTarget".to_string()))
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.reader_handle.abort();
        self.writer_handle.abort();
    }
}

// ─── HTTP endpoint discovery ──────────────────────────────────────────

/// A debuggable target as reported by the browser's `/json/list`.
#[derive(Debug, Clone)]
pub struct TargetInfo {
    pub target_id: String,
    pub target_type: String,
    pub url: String,
    pub title: String,
    pub ws_url: String,
}

/// The browser-level WebSocket URL from `/json/version`, or an error when
/// nothing listens on the port.
pub async fn browser_ws_url(port: u16) -> Result<String> {
    let url = format!("http://127.0.0.1:{port}/json/version");
    let resp = reqwest::get(&url)
        .await
        .map_err(|e| Error::Automation(format!("No CDP endpoint on port {port}: {e}")))?;
    let body: Value = resp
        .json()
        .await
        .map_err(|e| Error::Automation(format!("Bad /json/version response: {e}")))?;
    body.get("webSocketDebuggerUrl")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::Automation("No webSocketDebuggerUrl in /json/version".to_string()))
}

/// All page targets currently open, via `/json/list`.
pub async fn list_page_targets(port: u16) -> Result<Vec<TargetInfo>> {
    let url = format!("http://127.0.0.1:{port}/json/list");
    let resp = reqwest::get(&url)
        .await
        .map_err(|e| Error::Automation(format!("No CDP endpoint on port {port}: {e}")))?;
    let targets: Vec<Value> = resp
        .json()
        .await
        .map_err(|e| Error::Automation(format!("Bad /json/list response: {e}")))?;

    Ok(targets
        .iter()
        .filter_map(|t| {
            Some(TargetInfo {
                target_id: t.get("id")?.as_str()?.to_string(),
                target_type: t.get("type")?.as_str()?.to_string(),
                url: t.get("url").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                title: t.get("title").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                ws_url: t
                    .get("webSocketDebuggerUrl")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .filter(|t| t.target_type == "page")
        .collect())
}

/// Resolve a targetId to its WebSocket URL. Retries briefly since a target
/// created a moment ago may not be listed yet.
pub async fn target_ws_url(port: u16, target_id: &str) -> Result<String> {
    for attempt in 0..10 {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        let targets = match list_page_targets(port).await {
            Ok(t) => t,
            Err(_) => continue,
        };
        if let Some(t) = targets.iter().find(|t| t.target_id == target_id) {
            if !t.ws_url.is_empty() {
                return Ok(t.ws_url.clone());
            }
        }
    }
    Err(Error::Automation(format!(
        "No WebSocket URL for target '{target_id}' after retries"
    )))
}
