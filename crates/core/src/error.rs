use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Daily or project cap reached. User-visible, non-retryable same-day.
    #[error("{0}")]
    PolicyDenied(String),

    /// Control-plane (Zotero) or entitlement endpoint unreachable.
    #[error("Network error: {0}")]
    Network(String),

    /// Target tab not found or did not finish loading in time.
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// Trigger/input not found, injection script failure, CDP failure.
    #[error("Automation error: {0}")]
    Automation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Licensing error: {0}")]
    Licensing(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
