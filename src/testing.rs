/// In-memory host used by the unit tests
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::error::{Result, SessionError};
use crate::host::{Clock, CreateProperties, DebuggerHost, StorageArea, TabHost, TabId};
use crate::tab_data::{CookieRecord, TabInfo};

/// Yields to the executor once before completing
struct YieldNow(bool);

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            Poll::Ready(())
        } else {
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

pub(crate) async fn yield_times(n: usize) {
    for _ in 0..n {
        YieldNow(false).await;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    TabCreated { id: TabId, url: String, active: bool },
    TabLoaded(TabId),
    TabRemoved(TabId),
    Attached(TabId),
    Detached(TabId),
    CookiesQueried(TabId),
    CookieSet { name: String, ok: bool },
}

pub(crate) struct FakeBrowser {
    next_id: Cell<TabId>,
    open_tabs: RefCell<HashMap<TabId, String>>,
    events: RefCell<Vec<Event>>,
    /// Everything `Network.getAllCookies` reports, regardless of tab
    pub jar: RefCell<Vec<CookieRecord>>,
    /// Per-URL number of scheduler yields before the tab completes (default 1)
    pub load_delays: RefCell<HashMap<String, usize>>,
    pub never_load: RefCell<HashSet<String>>,
    pub fail_attach: RefCell<HashSet<String>>,
    pub fail_query: RefCell<HashSet<String>>,
    pub fail_create: RefCell<HashSet<String>>,
    pub cookie_delays: RefCell<HashMap<String, usize>>,
    pub fail_cookies: RefCell<HashSet<String>>,
    pub window_tabs: RefCell<Vec<TabInfo>>,
    /// When set, `sleep` completes after this many yields; otherwise it never does
    pub timeout_after: Cell<Option<usize>>,
    pub now: Cell<f64>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        FakeBrowser {
            next_id: Cell::new(100),
            open_tabs: RefCell::new(HashMap::new()),
            events: RefCell::new(Vec::new()),
            jar: RefCell::new(Vec::new()),
            load_delays: RefCell::new(HashMap::new()),
            never_load: RefCell::new(HashSet::new()),
            fail_attach: RefCell::new(HashSet::new()),
            fail_query: RefCell::new(HashSet::new()),
            fail_create: RefCell::new(HashSet::new()),
            cookie_delays: RefCell::new(HashMap::new()),
            fail_cookies: RefCell::new(HashSet::new()),
            window_tabs: RefCell::new(Vec::new()),
            timeout_after: Cell::new(None),
            now: Cell::new(1_700_000_000_000.0),
        }
    }

    pub fn with_cookies(cookies: Vec<CookieRecord>) -> Self {
        let browser = FakeBrowser::new();
        *browser.jar.borrow_mut() = cookies;
        browser
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn open_tab_count(&self) -> usize {
        self.open_tabs.borrow().len()
    }

    /// URLs of every tab created, in creation order
    pub fn created_urls(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::TabCreated { url, .. } => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn position(&self, wanted: &Event) -> Option<usize> {
        self.events.borrow().iter().position(|e| e == wanted)
    }

    fn record(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    fn url_of(&self, tab_id: TabId) -> Result<String> {
        self.open_tabs
            .borrow()
            .get(&tab_id)
            .cloned()
            .ok_or_else(|| SessionError::Browser(format!("No tab with id: {}", tab_id)))
    }
}

#[async_trait(?Send)]
impl TabHost for FakeBrowser {
    async fn create_tab(&self, props: CreateProperties) -> Result<TabId> {
        if self.fail_create.borrow().contains(&props.url) {
            return Err(SessionError::Browser(format!("cannot open {}", props.url)));
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.open_tabs.borrow_mut().insert(id, props.url.clone());
        self.record(Event::TabCreated {
            id,
            url: props.url,
            active: props.active,
        });
        Ok(id)
    }

    async fn remove_tab(&self, tab_id: TabId) -> Result<()> {
        self.open_tabs.borrow_mut().remove(&tab_id);
        self.record(Event::TabRemoved(tab_id));
        Ok(())
    }

    async fn wait_for_complete(&self, tab_id: TabId) -> Result<()> {
        let url = self.url_of(tab_id)?;
        if self.never_load.borrow().contains(&url) {
            futures::future::pending::<()>().await;
        }
        let delay = self.load_delays.borrow().get(&url).copied().unwrap_or(1);
        yield_times(delay).await;
        self.record(Event::TabLoaded(tab_id));
        Ok(())
    }

    async fn current_window_tabs(&self) -> Result<Vec<TabInfo>> {
        Ok(self.window_tabs.borrow().clone())
    }
}

#[async_trait(?Send)]
impl DebuggerHost for FakeBrowser {
    async fn attach(&self, tab_id: TabId, _protocol_version: &str) -> Result<()> {
        let url = self.url_of(tab_id)?;
        if self.fail_attach.borrow().contains(&url) {
            return Err(SessionError::Debugger {
                tab_id,
                message: "Cannot access a chrome:// URL".to_string(),
            });
        }
        self.record(Event::Attached(tab_id));
        Ok(())
    }

    async fn detach(&self, tab_id: TabId) -> Result<()> {
        self.record(Event::Detached(tab_id));
        Ok(())
    }

    async fn send_command(&self, tab_id: TabId, method: &str, params: Value) -> Result<Value> {
        match method {
            "Network.getAllCookies" => {
                let url = self.url_of(tab_id)?;
                yield_times(1).await;
                if self.fail_query.borrow().contains(&url) {
                    return Err(SessionError::Debugger {
                        tab_id,
                        message: "Target closed".to_string(),
                    });
                }
                self.record(Event::CookiesQueried(tab_id));
                Ok(json!({ "cookies": serde_json::to_value(&*self.jar.borrow())? }))
            }
            "Network.setCookie" => {
                let name = params["name"].as_str().unwrap_or_default().to_string();
                let delay = self.cookie_delays.borrow().get(&name).copied().unwrap_or(1);
                yield_times(delay).await;
                let ok = !self.fail_cookies.borrow().contains(&name);
                self.record(Event::CookieSet { name: name.clone(), ok });
                if ok {
                    Ok(json!({ "success": true }))
                } else {
                    Err(SessionError::Debugger {
                        tab_id,
                        message: format!("Invalid cookie fields for {}", name),
                    })
                }
            }
            other => Err(SessionError::Debugger {
                tab_id,
                message: format!("unexpected command {}", other),
            }),
        }
    }
}

#[async_trait(?Send)]
impl Clock for FakeBrowser {
    async fn sleep(&self, _ms: u32) {
        match self.timeout_after.get() {
            Some(yields) => yield_times(yields).await,
            None => futures::future::pending::<()>().await,
        }
    }

    fn now_ms(&self) -> f64 {
        self.now.get()
    }

    fn time_label(&self) -> String {
        "03:07 PM".to_string()
    }
}

pub(crate) struct MemoryStorage {
    entries: RefCell<Map<String, Value>>,
    pub fail_writes: Cell<bool>,
    pub fail_reads: Cell<bool>,
    pub fail_removes: Cell<bool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage {
            entries: RefCell::new(Map::new()),
            fail_writes: Cell::new(false),
            fail_reads: Cell::new(false),
            fail_removes: Cell::new(false),
        }
    }

    pub fn with_entries(entries: Vec<(&str, Value)>) -> Self {
        let storage = MemoryStorage::new();
        for (key, value) in entries {
            storage.entries.borrow_mut().insert(key.to_string(), value);
        }
        storage
    }

    pub fn failing_writes() -> Self {
        let storage = MemoryStorage::new();
        storage.fail_writes.set(true);
        storage
    }

    pub fn raw(&self, key: &str) -> Option<Value> {
        self.entries.borrow().get(key).cloned()
    }
}

#[async_trait(?Send)]
impl StorageArea for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        if self.fail_reads.get() {
            return Err(SessionError::Storage("read unavailable".to_string()));
        }
        Ok(self.entries.borrow().get(key).cloned())
    }

    async fn get_all(&self) -> Result<Map<String, Value>> {
        if self.fail_reads.get() {
            return Err(SessionError::Storage("read unavailable".to_string()));
        }
        Ok(self.entries.borrow().clone())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        if self.fail_writes.get() {
            return Err(SessionError::Storage("QUOTA_BYTES_PER_ITEM quota exceeded".to_string()));
        }
        self.entries.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        if self.fail_removes.get() {
            return Err(SessionError::Storage("storage unavailable".to_string()));
        }
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

pub(crate) fn cookie(name: &str, domain: &str, value: &str) -> CookieRecord {
    CookieRecord::new(name, domain, value)
}
