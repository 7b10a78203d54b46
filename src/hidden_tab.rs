/// Temporary background tabs with an explicit lifecycle.
///
/// A tab moves `Created → Loaded → Inspected → Disposed`. [`with_background_tab`]
/// is the scoped form: whatever the body returns, the tab is removed before the
/// result is handed back.
use std::future::Future;

use futures::future::{Either, select};

use crate::error::{Result, SessionError};
use crate::host::{Clock, CreateProperties, TabHost, TabId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabState {
    Created,
    Loaded,
    Inspected,
    Disposed,
}

/// Handle to a tab opened by this extension that must be disposed by its owner
#[derive(Debug)]
pub struct BackgroundTab {
    id: TabId,
    state: TabState,
}

impl BackgroundTab {
    pub fn id(&self) -> TabId {
        self.id
    }

    pub fn state(&self) -> TabState {
        self.state
    }

    fn advance(&mut self, next: TabState) {
        log::debug!("tab {}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }

    pub fn mark_inspected(&mut self) {
        self.advance(TabState::Inspected);
    }

    /// Close the tab. Removal errors are logged; the tab is gone either way
    /// from the pipeline's point of view.
    pub async fn dispose<H: TabHost + ?Sized>(mut self, host: &H) -> TabState {
        if let Err(e) = host.remove_tab(self.id).await {
            log::warn!("Failed to close temporary tab {}: {}", self.id, e);
        }
        self.advance(TabState::Disposed);
        self.state
    }
}

/// Wait for load-complete, giving up after `timeout_ms`
pub async fn wait_for_load<H: TabHost + Clock + ?Sized>(
    host: &H,
    tab_id: TabId,
    timeout_ms: u32,
) -> Result<()> {
    let loaded = host.wait_for_complete(tab_id);
    let deadline = host.sleep(timeout_ms);

    match select(loaded, deadline).await {
        Either::Left((result, _)) => result,
        Either::Right(((), _)) => Err(SessionError::LoadTimeout { tab_id, timeout_ms }),
    }
}

/// Open an inactive tab at `url` and resolve once it has finished loading.
///
/// If the tab never loads it is closed before the timeout error is returned.
pub async fn open_background_tab<H: TabHost + Clock + ?Sized>(
    host: &H,
    url: &str,
    timeout_ms: u32,
) -> Result<BackgroundTab> {
    let id = host.create_tab(CreateProperties::background(url)).await?;
    let mut tab = BackgroundTab {
        id,
        state: TabState::Created,
    };
    log::debug!("tab {}: Created at {}", id, url);

    match wait_for_load(host, id, timeout_ms).await {
        Ok(()) => {
            tab.advance(TabState::Loaded);
            Ok(tab)
        }
        Err(e) => {
            tab.dispose(host).await;
            Err(e)
        }
    }
}

/// Run `body` against a freshly loaded background tab and always close the tab afterwards
pub async fn with_background_tab<H, T, F, Fut>(
    host: &H,
    url: &str,
    timeout_ms: u32,
    body: F,
) -> Result<T>
where
    H: TabHost + Clock + ?Sized,
    F: FnOnce(TabId) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut tab = open_background_tab(host, url, timeout_ms).await?;
    let outcome = body(tab.id()).await;
    if outcome.is_ok() {
        tab.mark_inspected();
    }
    tab.dispose(host).await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Event, FakeBrowser};
    use futures::executor::block_on;

    #[test]
    fn test_open_background_tab_waits_for_load() {
        let browser = FakeBrowser::new();
        browser.load_delays.borrow_mut().insert("https://a.com".to_string(), 3);

        let tab = block_on(open_background_tab(&browser, "https://a.com", 1000)).unwrap();

        assert_eq!(tab.state(), TabState::Loaded);
        assert_eq!(
            browser.events(),
            vec![
                Event::TabCreated { id: tab.id(), url: "https://a.com".to_string(), active: false },
                Event::TabLoaded(tab.id()),
            ]
        );

        let state = block_on(tab.dispose(&browser));
        assert_eq!(state, TabState::Disposed);
        assert_eq!(browser.open_tab_count(), 0);
    }

    #[test]
    fn test_timeout_closes_tab() {
        let browser = FakeBrowser::new();
        browser.never_load.borrow_mut().insert("https://stuck.com".to_string());
        browser.timeout_after.set(Some(2));

        let result = block_on(open_background_tab(&browser, "https://stuck.com", 50));

        assert!(matches!(result, Err(SessionError::LoadTimeout { timeout_ms: 50, .. })));
        assert_eq!(browser.open_tab_count(), 0);
    }

    #[test]
    fn test_with_background_tab_disposes_on_error() {
        let browser = FakeBrowser::new();

        let result: Result<()> = block_on(with_background_tab(&browser, "https://a.com", 1000, |id| async move {
            Err(SessionError::Debugger { tab_id: id, message: "boom".to_string() })
        }));

        assert!(result.is_err());
        assert_eq!(browser.open_tab_count(), 0);
        assert!(matches!(browser.events().last(), Some(Event::TabRemoved(_))));
    }

    #[test]
    fn test_with_background_tab_returns_body_value() {
        let browser = FakeBrowser::new();

        let value = block_on(with_background_tab(&browser, "https://a.com", 1000, |id| async move { Ok(id * 2) })).unwrap();

        assert_eq!(value, 200);
        assert_eq!(browser.open_tab_count(), 0);
    }
}
