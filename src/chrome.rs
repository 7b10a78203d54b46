/// `chrome.*` extension API bindings implementing the host traits
use async_trait::async_trait;
use futures::channel::oneshot;
use js_sys::{Object, Promise, Reflect};
use serde::Serialize;
use serde_json::{Map, Value};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use crate::error::{Result, SessionError};
use crate::host::{Clock, CreateProperties, DebuggerHost, StorageArea, TabHost, TabId, format_time_label};
use crate::tab_data::TabInfo;

mod ffi {
    use wasm_bindgen::prelude::*;

    #[wasm_bindgen]
    extern "C" {
        #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = create)]
        pub async fn tabs_create(props: JsValue) -> Result<JsValue, JsValue>;

        #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = remove)]
        pub async fn tabs_remove(tab_id: i32) -> Result<JsValue, JsValue>;

        #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = get)]
        pub async fn tabs_get(tab_id: i32) -> Result<JsValue, JsValue>;

        #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = query)]
        pub async fn tabs_query(query: JsValue) -> Result<JsValue, JsValue>;

        #[wasm_bindgen(js_namespace = ["chrome", "tabs", "onUpdated"], js_name = addListener)]
        pub fn add_tab_updated_listener(listener: &Closure<dyn FnMut(i32, JsValue)>);

        #[wasm_bindgen(js_namespace = ["chrome", "tabs", "onUpdated"], js_name = removeListener)]
        pub fn remove_tab_updated_listener(listener: &Closure<dyn FnMut(i32, JsValue)>);

        #[wasm_bindgen(catch, js_namespace = ["chrome", "debugger"], js_name = attach)]
        pub async fn debugger_attach(target: JsValue, version: &str) -> Result<JsValue, JsValue>;

        #[wasm_bindgen(catch, js_namespace = ["chrome", "debugger"], js_name = detach)]
        pub async fn debugger_detach(target: JsValue) -> Result<JsValue, JsValue>;

        #[wasm_bindgen(catch, js_namespace = ["chrome", "debugger"], js_name = sendCommand)]
        pub async fn debugger_send_command(target: JsValue, method: &str, params: JsValue) -> Result<JsValue, JsValue>;

        #[wasm_bindgen(js_name = setTimeout)]
        pub fn set_timeout(handler: &js_sys::Function, ms: i32) -> JsValue;

        /// A `chrome.storage.StorageArea`
        pub type JsStorageArea;

        #[wasm_bindgen(catch, method, js_name = get)]
        pub async fn get_items(this: &JsStorageArea, keys: JsValue) -> Result<JsValue, JsValue>;

        #[wasm_bindgen(catch, method, js_name = set)]
        pub async fn set_items(this: &JsStorageArea, items: JsValue) -> Result<JsValue, JsValue>;

        #[wasm_bindgen(catch, method, js_name = remove)]
        pub async fn remove_items(this: &JsStorageArea, keys: JsValue) -> Result<JsValue, JsValue>;
    }
}

use ffi::*;

/// Best-effort readable text for a rejected promise
pub(crate) fn js_error_text(err: &JsValue) -> String {
    if let Some(text) = err.as_string() {
        return text;
    }
    Reflect::get(err, &JsValue::from_str("message"))
        .ok()
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{:?}", err))
}

fn browser_error(context: &str, err: JsValue) -> SessionError {
    SessionError::Browser(format!("{}: {}", context, js_error_text(&err)))
}

fn debugger_error(tab_id: TabId, err: JsValue) -> SessionError {
    SessionError::Debugger {
        tab_id,
        message: js_error_text(&err),
    }
}

/// Values crossing into JS must be plain objects, not `Map`s
fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| SessionError::InvalidRecord(e.to_string()))
}

fn from_js<T: serde::de::DeserializeOwned>(value: JsValue) -> Result<T> {
    serde_wasm_bindgen::from_value(value).map_err(|e| SessionError::InvalidRecord(e.to_string()))
}

fn debuggee(tab_id: TabId) -> JsValue {
    let target = Object::new();
    // Setting a property on a fresh object cannot fail
    let _ = Reflect::set(&target, &JsValue::from_str("tabId"), &JsValue::from(tab_id));
    target.into()
}

fn tab_status(tab: &JsValue) -> Option<String> {
    Reflect::get(tab, &JsValue::from_str("status"))
        .ok()
        .and_then(|s| s.as_string())
}

/// Keeps a `tabs.onUpdated` listener registered for as long as it lives
struct UpdatedListener {
    closure: Closure<dyn FnMut(i32, JsValue)>,
}

impl UpdatedListener {
    fn register(closure: Closure<dyn FnMut(i32, JsValue)>) -> Self {
        add_tab_updated_listener(&closure);
        UpdatedListener { closure }
    }
}

impl Drop for UpdatedListener {
    fn drop(&mut self) {
        remove_tab_updated_listener(&self.closure);
    }
}

/// The live browser
pub struct ChromeBrowser;

#[async_trait(?Send)]
impl TabHost for ChromeBrowser {
    async fn create_tab(&self, props: CreateProperties) -> Result<TabId> {
        let tab = tabs_create(to_js(&props)?)
            .await
            .map_err(|e| browser_error("tabs.create", e))?;
        let tab: TabInfo = from_js(tab)?;
        tab.id
            .ok_or_else(|| SessionError::Browser(format!("tabs.create returned no id for {}", props.url)))
    }

    async fn remove_tab(&self, tab_id: TabId) -> Result<()> {
        tabs_remove(tab_id)
            .await
            .map(|_| ())
            .map_err(|e| browser_error("tabs.remove", e))
    }

    async fn wait_for_complete(&self, tab_id: TabId) -> Result<()> {
        let (sender, receiver) = oneshot::channel::<()>();
        let mut sender = Some(sender);

        let closure = Closure::<dyn FnMut(i32, JsValue)>::new(move |updated: i32, info: JsValue| {
            if updated == tab_id && tab_status(&info).as_deref() == Some("complete") {
                if let Some(sender) = sender.take() {
                    let _ = sender.send(());
                }
            }
        });
        let _listener = UpdatedListener::register(closure);

        // The tab may have completed before the listener was in place
        let tab = tabs_get(tab_id)
            .await
            .map_err(|e| browser_error("tabs.get", e))?;
        if tab_status(&tab).as_deref() == Some("complete") {
            return Ok(());
        }

        receiver
            .await
            .map_err(|_| SessionError::Browser(format!("update listener for tab {} dropped", tab_id)))
    }

    async fn current_window_tabs(&self) -> Result<Vec<TabInfo>> {
        let query = to_js(&serde_json::json!({ "currentWindow": true }))?;
        let tabs = tabs_query(query)
            .await
            .map_err(|e| browser_error("tabs.query", e))?;
        from_js(tabs)
    }
}

#[async_trait(?Send)]
impl DebuggerHost for ChromeBrowser {
    async fn attach(&self, tab_id: TabId, protocol_version: &str) -> Result<()> {
        debugger_attach(debuggee(tab_id), protocol_version)
            .await
            .map(|_| ())
            .map_err(|e| debugger_error(tab_id, e))
    }

    async fn detach(&self, tab_id: TabId) -> Result<()> {
        debugger_detach(debuggee(tab_id))
            .await
            .map(|_| ())
            .map_err(|e| debugger_error(tab_id, e))
    }

    async fn send_command(&self, tab_id: TabId, method: &str, params: Value) -> Result<Value> {
        let result = debugger_send_command(debuggee(tab_id), method, to_js(&params)?)
            .await
            .map_err(|e| debugger_error(tab_id, e))?;
        if result.is_undefined() || result.is_null() {
            return Ok(Value::Null);
        }
        from_js(result)
    }
}

#[async_trait(?Send)]
impl Clock for ChromeBrowser {
    async fn sleep(&self, ms: u32) {
        let ms = i32::try_from(ms).unwrap_or(i32::MAX);
        let promise = Promise::new(&mut |resolve, _reject| {
            set_timeout(&resolve, ms);
        });
        let _ = JsFuture::from(promise).await;
    }

    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }

    fn time_label(&self) -> String {
        let date = js_sys::Date::new_0();
        format_time_label(date.get_hours(), date.get_minutes())
    }
}

/// `chrome.storage.sync` or `chrome.storage.local`
pub struct ChromeStorage {
    area: JsStorageArea,
    name: &'static str,
}

impl ChromeStorage {
    fn area(name: &'static str) -> Result<ChromeStorage> {
        let lookup = |target: &JsValue, key: &str| {
            Reflect::get(target, &JsValue::from_str(key))
                .ok()
                .filter(|v| !v.is_undefined())
                .ok_or_else(|| SessionError::Storage(format!("chrome.storage.{} is unavailable", name)))
        };
        let global: JsValue = js_sys::global().into();
        let chrome = lookup(&global, "chrome")?;
        let storage = lookup(&chrome, "storage")?;
        let area = lookup(&storage, name)?;
        Ok(ChromeStorage {
            area: area.unchecked_into(),
            name,
        })
    }

    pub fn sync() -> Result<ChromeStorage> {
        ChromeStorage::area("sync")
    }

    pub fn local() -> Result<ChromeStorage> {
        ChromeStorage::area("local")
    }

    fn error(&self, op: &str, err: JsValue) -> SessionError {
        SessionError::Storage(format!("storage.{}.{}: {}", self.name, op, js_error_text(&err)))
    }
}

#[async_trait(?Send)]
impl StorageArea for ChromeStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let items = self
            .area
            .get_items(JsValue::from_str(key))
            .await
            .map_err(|e| self.error("get", e))?;
        let value = Reflect::get(&items, &JsValue::from_str(key)).map_err(|e| self.error("get", e))?;
        if value.is_undefined() {
            Ok(None)
        } else {
            from_js(value).map(Some)
        }
    }

    async fn get_all(&self) -> Result<Map<String, Value>> {
        let items = self
            .area
            .get_items(JsValue::NULL)
            .await
            .map_err(|e| self.error("get", e))?;
        from_js(items)
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut items = Map::new();
        items.insert(key.to_string(), value);
        self.area
            .set_items(to_js(&items)?)
            .await
            .map(|_| ())
            .map_err(|e| self.error("set", e))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.area
            .remove_items(JsValue::from_str(key))
            .await
            .map(|_| ())
            .map_err(|e| self.error("remove", e))
    }
}
