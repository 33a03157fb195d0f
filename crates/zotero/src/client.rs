//! Client for the Zotero plugin's local HTTP control surface.
//!
//! All endpoints are POST with JSON bodies and require the
//! `Zotero-Allowed-Request: true` header; Zotero rejects cross-origin
//! requests without it.

use nlmsync_core::types::FileCandidate;
use nlmsync_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(rename = "collectionID", skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    #[serde(rename = "libraryID", skip_serializing_if = "Option::is_none")]
    pub library_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    #[serde(rename = "libraryID")]
    pub library_id: i64,
    pub name: String,
    pub library_type: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: i64,
    pub name: String,
    #[serde(rename = "parentID", default)]
    pub parent_id: Option<i64>,
}

/// One attachment's bytes as served by `/notebooklm/file`. The MIME type
/// here is authoritative; the list endpoint's may be missing or stale.
#[derive(Debug, Clone)]
pub struct FetchedFile {
    pub data_base64: String,
    pub mime_type: String,
}

#[derive(Debug, Deserialize)]
struct FileResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: String,
    #[serde(rename = "mimeType", default)]
    mime_type: String,
}

pub struct ZoteroClient {
    http: reqwest::Client,
    host: String,
}

impl ZoteroClient {
    pub fn new(host: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self {
            http,
            host: host.trim_end_matches('/').to_string(),
        }
    }

    async fn post(&self, endpoint: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.host, endpoint);
        debug!(url = %url, "Zotero request");
        let resp = self
            .http
            .post(&url)
            .header("Zotero-Allowed-Request", "true")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Zotero unreachable at {}: {e}", self.host)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Network(format!("Zotero {endpoint}: {status} - {text}")));
        }
        Ok(resp)
    }

    /// Candidate files matching the project filters, in Zotero's order.
    pub async fn list_files(&self, filter: &ListFilter) -> Result<Vec<FileCandidate>> {
        let body = serde_json::to_value(filter)?;
        let resp = self.post("/notebooklm/list", body).await?;
        let files: Vec<FileCandidate> = resp
            .json()
            .await
            .map_err(|e| Error::Network(format!("Bad list response: {e}")))?;
        Ok(files)
    }

    pub async fn fetch_file(&self, id: i64) -> Result<FetchedFile> {
        let resp = self.post("/notebooklm/file", json!({ "id": id })).await?;
        let file: FileResponse = resp
            .json()
            .await
            .map_err(|e| Error::Network(format!("Bad file response: {e}")))?;
        if !file.success {
            return Err(Error::Network(format!("Zotero could not serve file {id}")));
        }
        Ok(FetchedFile {
            data_base64: file.data,
            mime_type: file.mime_type,
        })
    }

    pub async fn libraries(&self) -> Result<Vec<Library>> {
        let resp = self.post("/notebooklm/libraries", json!({})).await?;
        let libs: Vec<Library> = resp
            .json()
            .await
            .map_err(|e| Error::Network(format!("Bad libraries response: {e}")))?;
        Ok(libs)
    }

    pub async fn collections(&self, library_id: Option<i64>) -> Result<Vec<Collection>> {
        let body = match library_id {
            Some(id) => json!({ "libraryID": id }),
            None => json!({}),
        };
        let resp = self.post("/notebooklm/collections", body).await?;
        let cols: Vec<Collection> = resp
            .json()
            .await
            .map_err(|e| Error::Network(format!("Bad collections response: {e}")))?;
        Ok(cols)
    }
}
