//! Finding, reusing, or creating the tab for a target notebook.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nlmsync_core::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::backend::{AutomationBackend, TabHandle};

static NOTEBOOK_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/notebook/([^/?#]+)").expect("notebook id regex"));

/// Notebook id out of a NotebookLM URL, if it points at a notebook page.
pub fn extract_notebook_id(url: &str) -> Option<String> {
    NOTEBOOK_ID_RE
        .captures(url)
        .map(|c| c[1].to_string())
}

pub fn notebook_url(base_url: &str, notebook_id: &str) -> String {
    format!("{}/notebook/{}", base_url.trim_end_matches('/'), notebook_id)
}

/// Resolves notebook ids to ready tabs. Mocked in orchestrator tests.
#[async_trait]
pub trait Navigator: Send + Sync {
    /// A load-complete tab showing the notebook; reused, navigated, or
    /// freshly opened. `Error::Navigation` on timeout.
    async fn ensure_tab(&self, notebook_id: &str) -> Result<TabHandle>;
    /// Any open tab on the notebook app, regardless of which notebook.
    async fn find_app_tab(&self) -> Result<Option<TabHandle>>;
}

pub struct TabNavigator {
    backend: Arc<dyn AutomationBackend>,
    base_url: String,
    load_timeout: Duration,
}

impl TabNavigator {
    pub fn new(backend: Arc<dyn AutomationBackend>, base_url: &str, load_timeout: Duration) -> Self {
        Self {
            backend,
            base_url: base_url.trim_end_matches('/').to_string(),
            load_timeout,
        }
    }

    fn is_app_url(&self, url: &str) -> bool {
        url.starts_with(&self.base_url)
    }
}

#[async_trait]
impl Navigator for TabNavigator {
    async fn ensure_tab(&self, notebook_id: &str) -> Result<TabHandle> {
        let target_url = notebook_url(&self.base_url, notebook_id);
        let tabs = self.backend.list_tabs().await?;

        // 1–2. A tab already on this notebook: reuse it, waiting out any
        // in-progress load (the wait returns quickly when already done).
        if let Some(tab) = tabs
            .iter()
            .find(|t| t.url.contains(&format!("/notebook/{notebook_id}")))
        {
            info!(target = %tab.target_id, notebook = notebook_id, "Reusing existing notebook tab");
            self.backend.wait_for_load(tab, self.load_timeout).await?;
            return Ok(tab.clone());
        }

        // 3. Any tab on the app: point it at the target notebook.
        if let Some(tab) = tabs.iter().find(|t| self.is_app_url(&t.url)) {
            info!(target = %tab.target_id, notebook = notebook_id, "Navigating app tab to notebook");
            self.backend.navigate(tab, &target_url).await?;
            self.backend.wait_for_load(tab, self.load_timeout).await?;
            return Ok(TabHandle {
                url: target_url,
                ..tab.clone()
            });
        }

        // 4. Open a new background tab.
        info!(notebook = notebook_id, "Opening new tab for notebook");
        let tab = self.backend.open_tab(&target_url).await?;
        self.backend.wait_for_load(&tab, self.load_timeout).await?;
        Ok(tab)
    }

    async fn find_app_tab(&self) -> Result<Option<TabHandle>> {
        let tabs = self.backend.list_tabs().await?;
        Ok(tabs.into_iter().find(|t| self.is_app_url(&t.url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::AutomationSession;
    use std::sync::Mutex;

    #[test]
    fn test_extract_notebook_id() {
        assert_eq!(
            extract_notebook_id("https://notebooklm.google.com/notebook/abc-123?x=1"),
            Some("abc-123".to_string())
        );
        assert_eq!(
            extract_notebook_id("https://notebooklm.google.com/notebook/abc#frag"),
            Some("abc".to_string())
        );
        assert_eq!(extract_notebook_id("https://notebooklm.google.com/"), None);
        assert_eq!(extract_notebook_id("chrome://newtab"), None);
    }

    #[test]
    fn test_notebook_url() {
        assert_eq!(
            notebook_url("https://notebooklm.google.com/", "abc"),
            "https://notebooklm.google.com/notebook/abc"
        );
    }

    struct FakeBackend {
        tabs: Mutex<Vec<TabHandle>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn with_tabs(tabs: Vec<TabHandle>) -> Arc<Self> {
            Arc::new(Self {
                tabs: Mutex::new(tabs),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn log(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }
    }

    #[async_trait]
    impl AutomationBackend for FakeBackend {
        async fn list_tabs(&self) -> Result<Vec<TabHandle>> {
            Ok(self.tabs.lock().unwrap().clone())
        }

        async fn open_tab(&self, url: &str) -> Result<TabHandle> {
            self.log(&format!("open:{url}"));
            Ok(TabHandle {
                target_id: "new".to_string(),
                url: url.to_string(),
                title: String::new(),
            })
        }

        async fn navigate(&self, tab: &TabHandle, url: &str) -> Result<()> {
            self.log(&format!("navigate:{}:{}", tab.target_id, url));
            Ok(())
        }

        async fn wait_for_load(&self, tab: &TabHandle, _timeout: Duration) -> Result<()> {
            self.log(&format!("wait:{}", tab.target_id));
            Ok(())
        }

        async fn attach(&self, _tab: &TabHandle) -> Result<Box<dyn AutomationSession>> {
            unimplemented!("not used in navigator tests")
        }
    }

    fn tab(id: &str, url: &str) -> TabHandle {
        TabHandle {
            target_id: id.to_string(),
            url: url.to_string(),
            title: String::new(),
        }
    }

    fn navigator(backend: Arc<FakeBackend>) -> TabNavigator {
        TabNavigator::new(backend, "https://notebooklm.google.com", Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_reuses_exact_notebook_tab() {
        let backend = FakeBackend::with_tabs(vec![
            tab("t1", "https://example.com"),
            tab("t2", "https://notebooklm.google.com/notebook/nb-7"),
        ]);
        let found = navigator(backend.clone()).ensure_tab("nb-7").await.unwrap();
        assert_eq!(found.target_id, "t2");
        let calls = backend.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["wait:t2"]);
    }

    #[tokio::test]
    async fn test_navigates_other_app_tab() {
        let backend = FakeBackend::with_tabs(vec![tab(
            "t1",
            "https://notebooklm.google.com/notebook/other",
        )]);
        let found = navigator(backend.clone()).ensure_tab("nb-7").await.unwrap();
        assert_eq!(found.target_id, "t1");
        assert_eq!(found.url, "https://notebooklm.google.com/notebook/nb-7");
        let calls = backend.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "navigate:t1:https://notebooklm.google.com/notebook/nb-7",
                "wait:t1"
            ]
        );
    }

    #[tokio::test]
    async fn test_opens_new_tab_when_none_match() {
        let backend = FakeBackend::with_tabs(vec![tab("t1", "https://example.com")]);
        let found = navigator(backend.clone()).ensure_tab("nb-7").await.unwrap();
        assert_eq!(found.target_id, "new");
        let calls = backend.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "open:https://notebooklm.google.com/notebook/nb-7",
                "wait:new"
            ]
        );
    }

    #[tokio::test]
    async fn test_find_app_tab() {
        let backend = FakeBackend::with_tabs(vec![
            tab("t1", "https://example.com"),
            tab("t2", "https://notebooklm.google.com/notebook/xyz"),
        ]);
        let found = navigator(backend).find_app_tab().await.unwrap();
        assert_eq!(found.unwrap().target_id, "t2");
    }
}
