/// Tab Group Saver - Chrome Extension for saving and restoring tab sessions
/// Built with Rust + WASM

mod assembler;
pub mod background;
mod capture;
pub mod chrome;
pub mod config;
mod domain;
pub mod error;
mod harvest;
mod hidden_tab;
pub mod host;
pub mod restore;
mod stats;
pub mod storage;
pub mod tab_data;

#[cfg(test)]
mod testing;

use wasm_bindgen::prelude::*;

use crate::background::{Background, Request, Response};
use crate::chrome::{ChromeBrowser, ChromeStorage};
use crate::error::SessionError;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

type ChromeBackground = Background<ChromeBrowser, ChromeStorage, ChromeStorage>;

fn worker() -> Result<ChromeBackground, JsValue> {
    let synced = ChromeStorage::sync().map_err(|e| JsValue::from_str(&e.to_string()))?;
    let local = ChromeStorage::local().map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(Background::new(ChromeBrowser, synced, local))
}

fn response_to_js(response: &Response) -> Result<JsValue, JsValue> {
    use serde::Serialize;
    response
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

// Entry point for chrome.runtime.onMessage
#[wasm_bindgen]
pub async fn handle_message(message: JsValue) -> Result<JsValue, JsValue> {
    let response = match serde_wasm_bindgen::from_value::<Request>(message) {
        Ok(request) => worker()?.handle(request).await,
        Err(e) => {
            log::error!("Unrecognized message: {}", e);
            Response::failure(&SessionError::InvalidRecord(e.to_string()))
        }
    };
    response_to_js(&response)
}

// Entry point for chrome.runtime.onStartup
#[wasm_bindgen]
pub async fn handle_startup() -> Result<(), JsValue> {
    match worker()?.on_startup().await {
        Ok(Some(report)) => log::info!("Startup restore opened {} tabs", report.tabs_opened),
        Ok(None) => {}
        Err(e) => log::error!("Startup restore failed: {}", e),
    }
    Ok(())
}

// Entry point for chrome.runtime.onInstalled
#[wasm_bindgen]
pub async fn handle_installed() -> Result<(), JsValue> {
    if let Err(e) = worker()?.store().migrate_legacy().await {
        log::error!("Session migration failed: {}", e);
    }
    Ok(())
}
