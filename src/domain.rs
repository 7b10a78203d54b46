/// URL classification and cookie-domain matching
use url::Url;

use crate::error::{Result, SessionError};

/// Schemes that belong to the browser itself. Tabs on these addresses cannot be
/// inspected and are never stored in a session.
const INTERNAL_SCHEMES: &[&str] = &[
    "chrome",
    "chrome-extension",
    "chrome-search",
    "chrome-untrusted",
    "devtools",
    "edge",
    "brave",
    "opera",
    "vivaldi",
    "about",
    "view-source",
    "moz-extension",
];

fn scheme_of(url: &str) -> Option<String> {
    let (scheme, _) = url.trim().split_once(':')?;
    if scheme.is_empty() {
        None
    } else {
        Some(scheme.to_ascii_lowercase())
    }
}

/// True for browser-internal addresses such as `chrome://settings`
pub fn is_internal_url(url: &str) -> bool {
    scheme_of(url).is_some_and(|scheme| INTERNAL_SCHEMES.contains(&scheme.as_str()))
}

/// True for URLs whose cookies can be harvested (plain http/https pages)
pub fn is_capturable(url: &str) -> bool {
    matches!(scheme_of(url).as_deref(), Some("http" | "https")) && hostname(url).is_ok()
}

/// Extract the hostname from a URL
///
/// - https://www.google.com/search → www.google.com
/// - http://localhost:3000 → localhost
pub fn hostname(url: &str) -> Result<String> {
    let parsed = Url::parse(url.trim()).map_err(|e| SessionError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(host.to_lowercase()),
        _ => Err(SessionError::InvalidUrl {
            url: url.to_string(),
            reason: "url has no host".to_string(),
        }),
    }
}

/// Substring match of a cookie's domain attribute against a hostname.
///
/// Deliberately loose: `.github.com` and `api.github.com` both match `github.com`.
pub fn cookie_matches(cookie_domain: &str, host: &str) -> bool {
    !host.is_empty() && cookie_domain.to_lowercase().contains(&host.to_lowercase())
}
