/// Error types shared by the capture/restore pipeline
use thiserror::Error;

use crate::host::TabId;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("session name must not be empty")]
    EmptyName,

    #[error("tab {tab_id} did not finish loading within {timeout_ms} ms")]
    LoadTimeout { tab_id: TabId, timeout_ms: u32 },

    #[error("browser call failed: {0}")]
    Browser(String),

    #[error("debugger error on tab {tab_id}: {message}")]
    Debugger { tab_id: TabId, message: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid session record: {0}")]
    InvalidRecord(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;

impl SessionError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SessionError::NotFound(_))
    }
}
