/// Session persistence over the synced and local `chrome.storage` areas
use serde::Deserialize;
use serde_json::Value;

use crate::assembler::{normalize_tags, session_tabs};
use crate::error::{Result, SessionError};
use crate::host::StorageArea;
use crate::tab_data::{CookieRecord, Session, TabEntry};

/// A tab as it may appear in a stored record: `{url, ...}` or a bare URL string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredTab {
    Url(String),
    Entry(TabEntry),
}

/// Either record shape: the capture pipeline's `{name, timestamp, tabs: [{url}], cookies}`
/// or the old popup's `{tags, notes, dateTime, tabs: [url], totalTabs}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    #[serde(default)]
    timestamp: Option<f64>,
    #[serde(default)]
    date_time: Option<String>,
    tabs: Vec<StoredTab>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    cookies: Option<Vec<CookieRecord>>,
    #[serde(default)]
    total_tabs: Option<u64>,
}

/// True for values that look like a session (an object with a `tabs` array)
pub fn is_session_record(value: &Value) -> bool {
    value.get("tabs").is_some_and(Value::is_array)
}

/// Parse a stored record in either shape. `key` is the storage key, which is
/// the session name. The flag reports whether the record was in the old shape.
pub fn normalize_record(key: &str, value: Value) -> Result<(Session, bool)> {
    if !is_session_record(&value) {
        return Err(SessionError::InvalidRecord(format!("{} has no tabs list", key)));
    }
    let record: StoredRecord = serde_json::from_value(value)?;

    // A migrated record keeps `dateTime` for display, so it alone does not mark the old shape
    let legacy = record.timestamp.is_none()
        || record.total_tabs.is_some()
        || record.tabs.iter().any(|tab| matches!(tab, StoredTab::Url(_)));

    let tabs = record
        .tabs
        .into_iter()
        .map(|tab| match tab {
            StoredTab::Url(url) => TabEntry::new(&url),
            StoredTab::Entry(entry) => entry,
        })
        .collect();

    let session = Session {
        name: key.to_string(),
        created_at: record.timestamp.unwrap_or(0.0),
        tabs,
        tags: normalize_tags(&record.tags.unwrap_or_default()),
        notes: record.notes.unwrap_or_default(),
        cookies: record.cookies.unwrap_or_default(),
        legacy_date_time: record.date_time,
    };

    Ok((session, legacy))
}

/// Parse a session handed over in a message rather than read from storage
pub fn session_from_value(value: Value) -> Result<Session> {
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    normalize_record(&name, value).map(|(session, _)| session)
}

/// Changes applied by the edit flow
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEdit {
    pub new_name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

pub struct SessionStore<S, L> {
    synced: S,
    local: L,
}

impl<S: StorageArea, L: StorageArea> SessionStore<S, L> {
    pub fn new(synced: S, local: L) -> Self {
        SessionStore { synced, local }
    }

    pub fn synced(&self) -> &S {
        &self.synced
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    /// Write to the synced area, falling back to the local area on any error.
    ///
    /// After a fallback write the synced key is removed, since reads prefer
    /// the synced area and an older copy there would shadow the new one.
    pub async fn save(&self, session: &Session) -> Result<()> {
        if session.name.trim().is_empty() {
            return Err(SessionError::EmptyName);
        }
        let value = serde_json::to_value(session)?;

        match self.synced.set(&session.name, value.clone()).await {
            Ok(()) => {
                log::debug!("Saved session {} to sync storage", session.name);
                Ok(())
            }
            Err(e) => {
                log::warn!("Sync storage failed for {} ({}), using local storage", session.name, e);
                self.local.set(&session.name, value).await?;
                if let Err(e) = self.synced.remove(&session.name).await {
                    log::warn!("Stale synced copy of {} could not be removed: {}", session.name, e);
                }
                Ok(())
            }
        }
    }

    async fn read_tier<A: StorageArea>(area: &A, name: &str) -> Result<Option<Session>> {
        match area.get(name).await? {
            Some(value) if is_session_record(&value) => {
                normalize_record(name, value).map(|(session, _)| Some(session))
            }
            _ => Ok(None),
        }
    }

    /// Look a session up by name, synced area first
    pub async fn load(&self, name: &str) -> Result<Option<Session>> {
        match Self::read_tier(&self.synced, name).await {
            Ok(Some(session)) => return Ok(Some(session)),
            Ok(None) => {}
            Err(e) => log::warn!("Failed to read {} from sync storage: {}", name, e),
        }
        Self::read_tier(&self.local, name).await
    }

    /// Like [`SessionStore::load`] but absent sessions are an error
    pub async fn require(&self, name: &str) -> Result<Session> {
        self.load(name)
            .await?
            .ok_or_else(|| SessionError::NotFound(name.to_string()))
    }

    /// Remove the key from both areas. Succeeds if either removal does.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let synced = self.synced.remove(name).await;
        let local = self.local.remove(name).await;

        match (synced, local) {
            (Err(e), Err(_)) => Err(e),
            (Err(e), Ok(())) | (Ok(()), Err(e)) => {
                log::warn!("Partial delete of {}: {}", name, e);
                Ok(())
            }
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    /// Every session in either area, newest first. Synced copies shadow local ones.
    pub async fn list(&self) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = Vec::new();

        for (tier, entries) in [("sync", self.synced.get_all().await), ("local", self.local.get_all().await)] {
            let entries = match entries {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!("Failed to list {} storage: {}", tier, e);
                    continue;
                }
            };

            for (key, value) in entries {
                if !is_session_record(&value) || sessions.iter().any(|s| s.name == key) {
                    continue;
                }
                match normalize_record(&key, value) {
                    Ok((session, _)) => sessions.push(session),
                    Err(e) => log::warn!("Skipping unreadable session {}: {}", key, e),
                }
            }
        }

        sessions.sort_by(|a, b| {
            b.created_at
                .total_cmp(&a.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(sessions)
    }

    /// Rename, retag and renote. Renaming writes the new key before removing the old one.
    pub async fn edit(&self, name: &str, edit: SessionEdit) -> Result<Session> {
        let new_name = edit.new_name.trim().to_string();
        if new_name.is_empty() {
            return Err(SessionError::EmptyName);
        }

        let mut session = self.require(name).await?;
        session.name = new_name;
        session.tags = normalize_tags(&edit.tags);
        session.notes = edit.notes.trim().to_string();

        self.save(&session).await?;
        if session.name != name {
            self.delete(name).await?;
        }
        Ok(session)
    }

    /// Replace the stored website list
    pub async fn replace_tabs(&self, name: &str, urls: &[String]) -> Result<Session> {
        let mut session = self.require(name).await?;
        session.tabs = session_tabs(urls);
        self.save(&session).await?;
        Ok(session)
    }

    /// Returns the number of records rewritten. Unreadable or unwritable
    /// records are logged and left as they are.
    async fn migrate_tier<A: StorageArea>(area: &A, tier: &str) -> usize {
        let entries = match area.get_all().await {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Failed to read {} storage for migration: {}", tier, e);
                return 0;
            }
        };

        let mut migrated = 0;
        for (key, value) in entries {
            if !is_session_record(&value) {
                continue;
            }
            let session = match normalize_record(&key, value) {
                Ok((session, true)) => session,
                Ok((_, false)) => continue,
                Err(e) => {
                    log::warn!("Cannot migrate {} in {} storage: {}", key, tier, e);
                    continue;
                }
            };
            let written = match serde_json::to_value(&session) {
                Ok(value) => area.set(&key, value).await,
                Err(e) => Err(e.into()),
            };
            match written {
                Ok(()) => migrated += 1,
                Err(e) => log::warn!("Cannot rewrite {} in {} storage: {}", key, tier, e),
            }
        }
        migrated
    }

    /// Rewrite old-shape records in place, in whichever area holds them
    pub async fn migrate_legacy(&self) -> Result<usize> {
        let migrated = Self::migrate_tier(&self.synced, "sync").await
            + Self::migrate_tier(&self.local, "local").await;
        if migrated > 0 {
            log::info!("Migrated {} session records to the current format", migrated);
        }
        Ok(migrated)
    }
}

/// Filter sessions by a search string and an any-of tag set
pub fn filter_sessions(sessions: Vec<Session>, query: &str, tags: &[String]) -> Vec<Session> {
    sessions
        .into_iter()
        .filter(|session| session.matches(query, tags))
        .collect()
}
