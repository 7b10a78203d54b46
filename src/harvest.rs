/// Cookie harvesting over a `chrome.debugger` session
use serde::Deserialize;
use serde_json::json;

use crate::domain::cookie_matches;
use crate::error::Result;
use crate::host::{DebuggerHost, TabId};
use crate::tab_data::CookieRecord;

#[derive(Debug, Deserialize)]
struct GetAllCookiesResponse {
    #[serde(default)]
    cookies: Vec<CookieRecord>,
}

/// Detach, logging instead of failing. Used on every exit path.
pub(crate) async fn detach_quietly<H: DebuggerHost + ?Sized>(host: &H, tab_id: TabId) {
    if let Err(e) = host.detach(tab_id).await {
        log::warn!("Failed to detach debugger from tab {}: {}", tab_id, e);
    }
}

async fn matching_cookies<H: DebuggerHost + ?Sized>(
    host: &H,
    tab_id: TabId,
    domain: &str,
) -> Result<Vec<CookieRecord>> {
    let response = host
        .send_command(tab_id, "Network.getAllCookies", json!({}))
        .await?;
    let response: GetAllCookiesResponse = serde_json::from_value(response)?;

    Ok(response
        .cookies
        .into_iter()
        .filter(|cookie| cookie_matches(&cookie.domain, domain))
        .collect())
}

/// Cookies visible to `tab_id` whose domain contains `domain`.
///
/// The debugger is detached whether or not attach or the query succeeded;
/// the first error is returned to the caller.
pub async fn harvest_cookies<H: DebuggerHost + ?Sized>(
    host: &H,
    tab_id: TabId,
    domain: &str,
    protocol_version: &str,
) -> Result<Vec<CookieRecord>> {
    let outcome = match host.attach(tab_id, protocol_version).await {
        Ok(()) => matching_cookies(host, tab_id, domain).await,
        Err(e) => Err(e),
    };

    detach_quietly(host, tab_id).await;

    if let Ok(cookies) = &outcome {
        log::debug!("Harvested {} cookies for {} from tab {}", cookies.len(), domain, tab_id);
    }
    outcome
}
