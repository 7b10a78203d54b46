/// Data structures for saved sessions
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// A tab as reported by `chrome.tabs.query`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    #[serde(default)]
    pub id: Option<i32>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub fav_icon_url: Option<String>,
}

/// A saved tab within a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabEntry {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fav_icon_url: Option<String>,
}

impl TabEntry {
    pub fn new(url: &str) -> TabEntry {
        TabEntry {
            url: url.to_string(),
            title: None,
            fav_icon_url: None,
        }
    }
}

/// A cookie as returned by `Network.getAllCookies`.
///
/// Attributes the pipeline does not interpret (size, priority, partition key,
/// ...) are kept in `extra` so a stored record round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub session: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_path() -> String {
    "/".to_string()
}

impl CookieRecord {
    pub fn new(name: &str, domain: &str, value: &str) -> CookieRecord {
        CookieRecord {
            name: name.to_string(),
            value: value.to_string(),
            domain: domain.to_string(),
            path: default_path(),
            expires: None,
            http_only: false,
            secure: false,
            session: true,
            same_site: None,
            extra: Map::new(),
        }
    }

    /// Identity used for deduplication
    pub fn key(&self) -> (&str, &str) {
        (&self.name, &self.domain)
    }

    /// Parameters for `Network.setCookie`
    pub fn set_cookie_params(&self) -> Value {
        let mut params = json!({
            "name": self.name,
            "value": self.value,
            "domain": self.domain,
            "path": self.path,
            "secure": self.secure,
            "httpOnly": self.http_only,
        });

        if let Some(same_site) = &self.same_site {
            params["sameSite"] = json!(same_site);
        }

        // Session cookies report expires = -1; setting that would expire them immediately
        if let Some(expires) = self.expires.filter(|e| !self.session && *e > 0.0) {
            params["expires"] = json!(expires);
        }

        for key in ["priority", "sameParty", "sourceScheme", "sourcePort", "partitionKey"] {
            if let Some(value) = self.extra.get(key) {
                params[key] = value.clone();
            }
        }

        params
    }
}

/// A named snapshot of tabs, tags, notes and cookies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub name: String,
    #[serde(rename = "timestamp")]
    pub created_at: f64,
    pub tabs: Vec<TabEntry>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub cookies: Vec<CookieRecord>,
    /// Display date carried over from records written in the old popup format
    #[serde(rename = "dateTime", default, skip_serializing_if = "Option::is_none")]
    pub legacy_date_time: Option<String>,
}

impl Session {
    pub fn urls(&self) -> Vec<String> {
        self.tabs.iter().map(|tab| tab.url.clone()).collect()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Case-insensitive search over name and notes, plus an any-of tag filter
    pub fn matches(&self, query: &str, tags: &[String]) -> bool {
        let query = query.trim().to_lowercase();
        let matches_query = query.is_empty()
            || self.name.to_lowercase().contains(&query)
            || self.notes.to_lowercase().contains(&query);

        let matches_tags = tags.is_empty() || tags.iter().any(|tag| self.has_tag(tag));

        matches_query && matches_tags
    }
}
