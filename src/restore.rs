/// Session restore: cookie replay in a scratch tab, then reopening the saved tabs
use futures::future::join_all;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::domain::is_internal_url;
use crate::error::Result;
use crate::harvest::detach_quietly;
use crate::hidden_tab::with_background_tab;
use crate::host::{Browser, CreateProperties, DebuggerHost, StorageArea, TabHost, TabId};
use crate::storage::SessionStore;
use crate::tab_data::{CookieRecord, Session, TabEntry};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    pub cookies_set: usize,
    pub cookies_failed: usize,
    pub tabs_opened: usize,
    pub tabs_failed: usize,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ReplayCount {
    set: usize,
    failed: usize,
}

/// Dispatch every `Network.setCookie` at once and wait for all of them to settle
async fn set_all_cookies<H: DebuggerHost + ?Sized>(
    host: &H,
    tab_id: TabId,
    cookies: &[CookieRecord],
) -> ReplayCount {
    let pending = cookies.iter().map(|cookie| async move {
        let result = host
            .send_command(tab_id, "Network.setCookie", cookie.set_cookie_params())
            .await;
        if let Err(e) = &result {
            log::warn!("Failed to set cookie {} for {}: {}", cookie.name, cookie.domain, e);
        }
        result.is_ok()
    });

    join_all(pending)
        .await
        .into_iter()
        .fold(ReplayCount::default(), |mut count, ok| {
            if ok {
                count.set += 1;
            } else {
                count.failed += 1;
            }
            count
        })
}

async fn replay_in_tab<H: DebuggerHost + ?Sized>(
    host: &H,
    tab_id: TabId,
    cookies: &[CookieRecord],
    protocol_version: &str,
) -> Result<ReplayCount> {
    if let Err(e) = host.attach(tab_id, protocol_version).await {
        detach_quietly(host, tab_id).await;
        return Err(e);
    }
    let count = set_all_cookies(host, tab_id, cookies).await;
    detach_quietly(host, tab_id).await;
    Ok(count)
}

/// Replay cookies through a debugger session on a scratch tab that is closed afterwards
async fn replay_cookies<H: Browser + ?Sized>(
    host: &H,
    cookies: &[CookieRecord],
    config: &PipelineConfig,
) -> Result<ReplayCount> {
    let version = config.debugger_protocol_version.as_str();
    with_background_tab(host, &config.placeholder_url, config.load_timeout_ms, |tab_id| {
        replay_in_tab(host, tab_id, cookies, version)
    })
    .await
}

/// Open the saved tabs in order. The first takes focus, the rest open behind it.
pub async fn open_tabs<H: TabHost + ?Sized>(host: &H, tabs: &[TabEntry]) -> RestoreReport {
    let mut report = RestoreReport::default();

    for tab in tabs.iter().filter(|tab| !is_internal_url(&tab.url)) {
        let props = if report.tabs_opened + report.tabs_failed == 0 {
            CreateProperties::foreground(&tab.url)
        } else {
            CreateProperties::background(&tab.url)
        };
        match host.create_tab(props).await {
            Ok(_) => report.tabs_opened += 1,
            Err(e) => {
                log::error!("Failed to open {}: {}", tab.url, e);
                report.tabs_failed += 1;
            }
        }
    }

    report
}

/// Reopen the session's tabs without touching cookies
pub async fn restore_urls_only<H: TabHost + ?Sized>(host: &H, session: &Session) -> RestoreReport {
    let report = open_tabs(host, &session.tabs).await;
    log::info!("Reopened {} tabs from {}", report.tabs_opened, session.name);
    report
}

/// Replay the session's cookies, then reopen its tabs.
///
/// Cookie replay problems never stop the tabs from opening. Sessions without
/// cookies, or with replay disabled, skip the scratch tab entirely.
pub async fn restore_session<H: Browser + ?Sized>(
    host: &H,
    session: &Session,
    config: &PipelineConfig,
) -> RestoreReport {
    if session.cookies.is_empty() || !config.replay_cookies {
        return restore_urls_only(host, session).await;
    }

    let replayed = match replay_cookies(host, &session.cookies, config).await {
        Ok(count) => count,
        Err(e) => {
            log::warn!("Cookie replay for {} failed: {}", session.name, e);
            ReplayCount {
                set: 0,
                failed: session.cookies.len(),
            }
        }
    };

    let mut report = open_tabs(host, &session.tabs).await;
    report.cookies_set = replayed.set;
    report.cookies_failed = replayed.failed;
    log::info!(
        "Restored {}: {} tabs, {}/{} cookies",
        session.name,
        report.tabs_opened,
        report.cookies_set,
        session.cookies.len()
    );
    report
}

/// Load a stored session by name and restore it
pub async fn restore<H, S, L>(
    host: &H,
    store: &SessionStore<S, L>,
    name: &str,
    config: &PipelineConfig,
) -> Result<RestoreReport>
where
    H: Browser + ?Sized,
    S: StorageArea,
    L: StorageArea,
{
    let session = store.require(name).await?;
    Ok(restore_session(host, &session, config).await)
}
