/// Pipeline configuration, stored as a JSON record in the local storage area
use serde::{Deserialize, Serialize};

use crate::host::StorageArea;

pub const CONFIG_KEY: &str = "pipelineConfig";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Number of background tabs opened at once during capture
    pub batch_size: usize,
    /// Upper bound on waiting for a tab to report load-complete
    pub load_timeout_ms: u32,
    pub debugger_protocol_version: String,
    /// Address of the scratch tab used for cookie replay
    pub placeholder_url: String,
    pub replay_cookies: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            batch_size: 3,
            load_timeout_ms: 30_000,
            debugger_protocol_version: "1.3".to_string(),
            placeholder_url: "about:blank".to_string(),
            replay_cookies: true,
        }
    }
}

impl PipelineConfig {
    pub fn normalized(mut self) -> Self {
        self.batch_size = self.batch_size.max(1);
        if self.debugger_protocol_version.trim().is_empty() {
            self.debugger_protocol_version = PipelineConfig::default().debugger_protocol_version;
        }
        if self.placeholder_url.trim().is_empty() {
            self.placeholder_url = PipelineConfig::default().placeholder_url;
        }
        self
    }
}

/// Read the configuration, falling back to defaults when it is missing or unreadable
pub async fn load<S: StorageArea + ?Sized>(area: &S) -> PipelineConfig {
    match area.get(CONFIG_KEY).await {
        Ok(Some(value)) => match serde_json::from_value::<PipelineConfig>(value) {
            Ok(config) => config.normalized(),
            Err(e) => {
                log::warn!("Ignoring invalid {}: {}", CONFIG_KEY, e);
                PipelineConfig::default()
            }
        },
        Ok(None) => PipelineConfig::default(),
        Err(e) => {
            log::warn!("Failed to read {}: {}", CONFIG_KEY, e);
            PipelineConfig::default()
        }
    }
}
