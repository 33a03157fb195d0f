//! Entitlement check against the external payment service.
//!
//! The service is a black box; callers only ever see `UserState`. The
//! cache layer treats any fetch error as "unpaid" (fail-closed to Free).

use async_trait::async_trait;
use nlmsync_core::config::LicensingConfig;
use nlmsync_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserState {
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub paid_at: Option<String>,
    #[serde(default)]
    pub installed_at: Option<String>,
}

#[async_trait]
pub trait EntitlementChecker: Send + Sync {
    async fn fetch_user(&self) -> Result<UserState>;
}

pub struct HttpEntitlementChecker {
    http: reqwest::Client,
    endpoint: String,
    product_id: String,
}

impl HttpEntitlementChecker {
    pub fn new(config: &LicensingConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            product_id: config.product_id.clone(),
        }
    }
}

#[async_trait]
impl EntitlementChecker for HttpEntitlementChecker {
    async fn fetch_user(&self) -> Result<UserState> {
        let url = format!("{}/extension/{}/user", self.endpoint, self.product_id);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Licensing(format!("Entitlement request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(Error::Licensing(format!(
                "Entitlement service returned {}",
                resp.status()
            )));
        }

        let user: UserState = resp
            .json()
            .await
            .map_err(|e| Error::Licensing(format!("Bad entitlement response: {e}")))?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_state_parsing() {
        let user: UserState =
            serde_json::from_str(r#"{"paid": true, "paidAt": "2026-01-05T10:00:00Z"}"#).unwrap();
        assert!(user.paid);
        assert!(user.paid_at.is_some());

        let user: UserState = serde_json::from_str(r#"{}"#).unwrap();
        assert!(!user.paid);
    }
}
