/// Session assembly: cookie deduplication, tag and tab normalization
use std::collections::HashMap;

use crate::domain::is_internal_url;
use crate::tab_data::{CookieRecord, Session, TabEntry};

/// Keep one cookie per `(name, domain)`.
///
/// The last record seen wins, and it takes the slot where that key first
/// appeared, so the output order follows first appearance.
pub fn dedup_cookies(cookies: Vec<CookieRecord>) -> Vec<CookieRecord> {
    let mut slots: HashMap<(String, String), usize> = HashMap::new();
    let mut unique: Vec<CookieRecord> = Vec::new();

    for cookie in cookies {
        let (name, domain) = cookie.key();
        let key = (name.to_string(), domain.to_string());
        match slots.get(&key) {
            Some(&index) => unique[index] = cookie,
            None => {
                slots.insert(key, unique.len());
                unique.push(cookie);
            }
        }
    }

    unique
}

/// Trim tags, drop empties and repeats, keep insertion order
pub fn normalize_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.iter()
        .map(|tag| tag.as_ref().trim())
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.to_string()))
        .map(str::to_string)
        .collect()
}

/// Tab entries for every URL that is not a browser-internal address
pub fn session_tabs<S: AsRef<str>>(urls: &[S]) -> Vec<TabEntry> {
    urls.iter()
        .map(|url| url.as_ref().trim())
        .filter(|url| !url.is_empty() && !is_internal_url(url))
        .map(TabEntry::new)
        .collect()
}

/// Build a session record. `created_at` is the caller's current time in epoch milliseconds.
pub fn assemble<S: AsRef<str>, T: AsRef<str>>(
    name: &str,
    urls: &[S],
    tags: &[T],
    notes: &str,
    cookies: Vec<CookieRecord>,
    created_at: f64,
) -> Session {
    Session {
        name: name.trim().to_string(),
        created_at,
        tabs: session_tabs(urls),
        tags: normalize_tags(tags),
        notes: notes.to_string(),
        cookies: dedup_cookies(cookies),
        legacy_date_time: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::cookie;

    #[test]
    fn test_dedup_last_write_wins() {
        let cookies = vec![cookie("a", "x.com", "1"), cookie("a", "x.com", "2")];

        let unique = dedup_cookies(cookies);

        assert_eq!(unique, vec![cookie("a", "x.com", "2")]);
    }

    #[test]
    fn test_dedup_keys_on_name_and_domain() {
        let cookies = vec![
            cookie("a", "x.com", "1"),
            cookie("b", "x.com", "1"),
            cookie("a", "y.com", "1"),
            cookie("a", "x.com", "3"),
        ];

        let unique = dedup_cookies(cookies);

        assert_eq!(unique.len(), 3);
        assert_eq!(unique[0], cookie("a", "x.com", "3"));
        assert_eq!(unique[1].name, "b");
        assert_eq!(unique[2].domain, "y.com");
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let cookies = vec![cookie("a", "x.com", "1"), cookie("a", "x.com", "2"), cookie("c", "x.com", "1")];

        let once = dedup_cookies(cookies);
        let twice = dedup_cookies(once.clone());

        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_tags() {
        let tags = vec![" work ", "", "dev", "work", "  "];

        assert_eq!(normalize_tags(&tags), vec!["work".to_string(), "dev".to_string()]);
    }

    #[test]
    fn test_assemble_excludes_internal_urls() {
        let urls = vec!["https://a.com", "chrome://settings", "https://b.com/page"];

        let session = assemble("S", &urls, &["work"], "note", vec![], 42.0);

        assert_eq!(session.urls(), vec!["https://a.com".to_string(), "https://b.com/page".to_string()]);
        assert_eq!(session.tags, vec!["work".to_string()]);
        assert_eq!(session.notes, "note");
        assert_eq!(session.created_at, 42.0);
    }
}
