/// Message handling for the background worker
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assembler::assemble;
use crate::capture::capture_all;
use crate::config::{self, PipelineConfig};
use crate::error::{Result, SessionError};
use crate::host::{Browser, StorageArea};
use crate::restore::{self, RestoreReport, restore_session, restore_urls_only};
use crate::stats::{self, TOTAL_SESSIONS_RESTORED, TOTAL_TABS_SAVED};
use crate::storage::{SessionEdit, SessionStore, filter_sessions, session_from_value};
use crate::tab_data::Session;

/// Local-area key naming the session reopened at browser startup
pub const DEFAULT_SESSION_KEY: &str = "defaultGroup";

/// Messages accepted from the popup and options pages
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    Save {
        name: String,
        urls: Vec<String>,
        #[serde(default)]
        tags: Vec<String>,
        #[serde(default)]
        notes: String,
    },
    Restore {
        name: String,
    },
    RestorePartial {
        session: Value,
    },
    SmartGroup,
    List {
        #[serde(default)]
        query: String,
        #[serde(default)]
        tags: Vec<String>,
    },
    Delete {
        name: String,
    },
    #[serde(rename_all = "camelCase")]
    Edit {
        name: String,
        new_name: String,
        #[serde(default)]
        tags: Vec<String>,
        #[serde(default)]
        notes: String,
    },
    UpdateTabs {
        name: String,
        urls: Vec<String>,
    },
    SetDefault {
        #[serde(default)]
        name: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub not_found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions: Option<Vec<Session>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RestoreReport>,
}

impl Response {
    pub fn ok() -> Response {
        Response {
            success: true,
            ..Response::default()
        }
    }

    pub fn failure(error: &SessionError) -> Response {
        Response {
            success: false,
            error: Some(error.to_string()),
            not_found: error.is_not_found(),
            ..Response::default()
        }
    }

    fn with_session(session: Session) -> Response {
        Response {
            session: Some(session),
            ..Response::ok()
        }
    }

    fn with_report(report: RestoreReport) -> Response {
        Response {
            report: Some(report),
            ..Response::ok()
        }
    }
}

/// The background worker: a browser handle plus the two storage areas
pub struct Background<H, S, L> {
    browser: H,
    store: SessionStore<S, L>,
}

impl<H: Browser, S: StorageArea, L: StorageArea> Background<H, S, L> {
    pub fn new(browser: H, synced: S, local: L) -> Self {
        Background {
            browser,
            store: SessionStore::new(synced, local),
        }
    }

    pub fn browser(&self) -> &H {
        &self.browser
    }

    pub fn store(&self) -> &SessionStore<S, L> {
        &self.store
    }

    async fn config(&self) -> PipelineConfig {
        config::load(self.store.local()).await
    }

    /// Serve one request. Errors become a failed response; nothing here is fatal to the worker.
    pub async fn handle(&self, request: Request) -> Response {
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Request failed: {}", e);
                Response::failure(&e)
            }
        }
    }

    async fn dispatch(&self, request: Request) -> Result<Response> {
        match request {
            Request::Save { name, urls, tags, notes } => {
                self.save(&name, &urls, &tags, &notes).await?;
                Ok(Response::ok())
            }
            Request::Restore { name } => self.restore(&name).await.map(Response::with_report),
            Request::RestorePartial { session } => {
                let session = session_from_value(session)?;
                self.restore_partial(&session).await.map(Response::with_report)
            }
            Request::SmartGroup => self.smart_group().await.map(Response::with_session),
            Request::List { query, tags } => {
                let sessions = filter_sessions(self.store.list().await?, &query, &tags);
                Ok(Response {
                    sessions: Some(sessions),
                    ..Response::ok()
                })
            }
            Request::Delete { name } => {
                self.store.delete(&name).await?;
                Ok(Response::ok())
            }
            Request::Edit { name, new_name, tags, notes } => {
                let edit = SessionEdit { new_name, tags, notes };
                self.store.edit(&name, edit).await.map(Response::with_session)
            }
            Request::UpdateTabs { name, urls } => {
                self.store.replace_tabs(&name, &urls).await.map(Response::with_session)
            }
            Request::SetDefault { name } => {
                self.set_default(name.as_deref()).await?;
                Ok(Response::ok())
            }
        }
    }

    /// Capture cookies for `urls`, assemble the session and persist it
    pub async fn save(&self, name: &str, urls: &[String], tags: &[String], notes: &str) -> Result<Session> {
        if name.trim().is_empty() {
            return Err(SessionError::EmptyName);
        }
        let config = self.config().await;

        let cookies = capture_all(&self.browser, urls, &config).await;
        let session = assemble(name, urls, tags, notes, cookies, self.browser.now_ms());
        self.store.save(&session).await?;

        log::info!(
            "Saved session {} ({} tabs, {} cookies)",
            session.name,
            session.tabs.len(),
            session.cookies.len()
        );
        stats::bump(self.store.local(), TOTAL_TABS_SAVED, session.tabs.len() as u64).await;
        Ok(session)
    }

    pub async fn restore(&self, name: &str) -> Result<RestoreReport> {
        let config = self.config().await;
        let report = restore::restore(&self.browser, &self.store, name, &config).await?;
        stats::bump(self.store.local(), TOTAL_SESSIONS_RESTORED, 1).await;
        Ok(report)
    }

    /// Restore a session supplied by the caller without reading storage
    pub async fn restore_partial(&self, session: &Session) -> Result<RestoreReport> {
        let config = self.config().await;
        let report = restore_session(&self.browser, session, &config).await;
        stats::bump(self.store.local(), TOTAL_SESSIONS_RESTORED, 1).await;
        Ok(report)
    }

    /// Save every tab of the current window as `TabGroup_<time>`
    pub async fn smart_group(&self) -> Result<Session> {
        let tabs = self.browser.current_window_tabs().await?;
        let urls: Vec<String> = tabs.into_iter().filter_map(|tab| tab.url).collect();

        let label = self.browser.time_label();
        let name = format!("TabGroup_{}", label);
        let notes = format!("Group created at {}", label);

        self.save(&name, &urls, &["grouped".to_string()], &notes).await
    }

    pub async fn set_default(&self, name: Option<&str>) -> Result<()> {
        match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => {
                self.store.require(name).await?;
                self.store.local().set(DEFAULT_SESSION_KEY, Value::from(name)).await
            }
            None => self.store.local().remove(DEFAULT_SESSION_KEY).await,
        }
    }

    /// Browser startup: migrate old records, then reopen the default session's
    /// tabs without replaying cookies
    pub async fn on_startup(&self) -> Result<Option<RestoreReport>> {
        if let Err(e) = self.store.migrate_legacy().await {
            log::warn!("Session migration failed: {}", e);
        }

        let name = match self.store.local().get(DEFAULT_SESSION_KEY).await? {
            Some(Value::String(name)) if !name.is_empty() => name,
            _ => return Ok(None),
        };

        match self.store.load(&name).await? {
            Some(session) => Ok(Some(restore_urls_only(&self.browser, &session).await)),
            None => {
                log::warn!("Default session {} no longer exists", name);
                Ok(None)
            }
        }
    }
}
