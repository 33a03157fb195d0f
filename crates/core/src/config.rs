use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::paths::Paths;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoteroConfig {
    #[serde(default = "default_zotero_host")]
    pub host: String,
}

fn default_zotero_host() -> String {
    "http://localhost:23119".to_string()
}

impl Default for ZoteroConfig {
    fn default() -> Self {
        Self {
            host: default_zotero_host(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookConfig {
    #[serde(default = "default_notebook_base_url")]
    pub base_url: String,
}

fn default_notebook_base_url() -> String {
    "https://notebooklm.google.com".to_string()
}

impl Default for NotebookConfig {
    fn default() -> Self {
        Self {
            base_url: default_notebook_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserConfig {
    /// CDP debug port of the browser we attach to (or launch).
    #[serde(default = "default_debug_port")]
    pub debug_port: u16,
    /// Explicit browser binary; auto-discovered when absent.
    #[serde(default)]
    pub binary: Option<String>,
    /// Wait for a tab to reach load-complete.
    #[serde(default = "default_tab_load_timeout_secs")]
    pub tab_load_timeout_secs: u64,
    /// Delay after load-complete for client-side framework init; "network
    /// idle" does not imply "interactive".
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_debug_port() -> u16 {
    9222
}

fn default_tab_load_timeout_secs() -> u64 {
    30
}

fn default_settle_delay_ms() -> u64 {
    2000
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            debug_port: default_debug_port(),
            binary: None,
            tab_load_timeout_secs: default_tab_load_timeout_secs(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicensingConfig {
    #[serde(default = "default_licensing_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_product_id")]
    pub product_id: String,
}

fn default_licensing_endpoint() -> String {
    "https://extensionpay.com".to_string()
}

fn default_product_id() -> String {
    "notebooklm-sync".to_string()
}

impl Default for LicensingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_licensing_endpoint(),
            product_id: default_product_id(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub zotero: ZoteroConfig,
    #[serde(default)]
    pub notebook: NotebookConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub licensing: LicensingConfig,
}

impl Config {
    /// Load from `config.json`, falling back to defaults when the file is
    /// missing.
    pub fn load(paths: &Paths) -> Result<Self> {
        let path = paths.config_file();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, paths: &Paths) -> Result<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.zotero.host, "http://localhost:23119");
        assert_eq!(config.browser.debug_port, 9222);
        assert_eq!(config.browser.tab_load_timeout_secs, 30);
        assert_eq!(config.browser.settle_delay_ms, 2000);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"browser": {"debugPort": 9333}}"#).unwrap();
        assert_eq!(config.browser.debug_port, 9333);
        assert_eq!(config.browser.settle_delay_ms, 2000);
        assert_eq!(config.zotero.host, "http://localhost:23119");
    }
}
