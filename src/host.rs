/// Host seam: everything the pipeline needs from the browser.
///
/// The capture and restore code is generic over these traits. `crate::chrome`
/// implements them on top of the `chrome.*` extension APIs; the test suite
/// implements them in memory.
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::tab_data::TabInfo;

pub type TabId = i32;

/// Properties for `chrome.tabs.create`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateProperties {
    pub url: String,
    pub active: bool,
}

impl CreateProperties {
    /// A tab that opens without taking focus
    pub fn background(url: &str) -> CreateProperties {
        CreateProperties {
            url: url.to_string(),
            active: false,
        }
    }

    pub fn foreground(url: &str) -> CreateProperties {
        CreateProperties {
            url: url.to_string(),
            active: true,
        }
    }
}

#[async_trait(?Send)]
pub trait TabHost {
    async fn create_tab(&self, props: CreateProperties) -> Result<TabId>;

    async fn remove_tab(&self, tab_id: TabId) -> Result<()>;

    /// Resolves once the tab reports `status == "complete"`. Never times out on
    /// its own; callers bound it with [`Clock::sleep`].
    async fn wait_for_complete(&self, tab_id: TabId) -> Result<()>;

    async fn current_window_tabs(&self) -> Result<Vec<TabInfo>>;
}

#[async_trait(?Send)]
pub trait DebuggerHost {
    async fn attach(&self, tab_id: TabId, protocol_version: &str) -> Result<()>;

    async fn detach(&self, tab_id: TabId) -> Result<()>;

    async fn send_command(&self, tab_id: TabId, method: &str, params: Value) -> Result<Value>;
}

#[async_trait(?Send)]
pub trait Clock {
    async fn sleep(&self, ms: u32);

    /// Milliseconds since the epoch
    fn now_ms(&self) -> f64;

    /// Local wall-clock time formatted like `03:07 PM`
    fn time_label(&self) -> String;
}

/// One `chrome.storage` area (sync or local)
#[async_trait(?Send)]
pub trait StorageArea {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn get_all(&self) -> Result<Map<String, Value>>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}

/// Everything the pipeline drives on the browser side
pub trait Browser: TabHost + DebuggerHost + Clock {}

impl<T: TabHost + DebuggerHost + Clock + ?Sized> Browser for T {}

/// Format an hour/minute pair the way `toLocaleTimeString('en-US')` does
pub fn format_time_label(hours: u32, minutes: u32) -> String {
    let suffix = if hours < 12 { "AM" } else { "PM" };
    let hour12 = match hours % 12 {
        0 => 12,
        h => h,
    };
    format!("{:02}:{:02} {}", hour12, minutes, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time_label() {
        assert_eq!(format_time_label(0, 5), "12:05 AM");
        assert_eq!(format_time_label(9, 30), "09:30 AM");
        assert_eq!(format_time_label(12, 0), "12:00 PM");
        assert_eq!(format_time_label(15, 7), "03:07 PM");
        assert_eq!(format_time_label(23, 59), "11:59 PM");
    }

    #[test]
    fn test_create_properties_serialization() {
        let json = serde_json::to_value(CreateProperties::background("https://a.com")).unwrap();
        assert_eq!(json, serde_json::json!({"url": "https://a.com", "active": false}));
    }
}
