/// Usage counters persisted in the local storage area
use serde_json::Value;

use crate::error::Result;
use crate::host::StorageArea;

pub const TOTAL_TABS_SAVED: &str = "total_tabs_saved";
pub const TOTAL_SESSIONS_RESTORED: &str = "total_sessions_restored";

/// Current value of a counter. Counters written as strings by older versions are accepted.
pub async fn read<S: StorageArea + ?Sized>(area: &S, key: &str) -> Result<u64> {
    let count = match area.get(key).await? {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    };
    Ok(count)
}

/// Add `by` to a counter and persist it, returning the new total
pub async fn increment<S: StorageArea + ?Sized>(area: &S, key: &str, by: u64) -> Result<u64> {
    let total = read(area, key).await?.saturating_add(by);
    area.set(key, Value::from(total)).await?;
    Ok(total)
}

/// [`increment`], logging failures instead of returning them
pub async fn bump<S: StorageArea + ?Sized>(area: &S, key: &str, by: u64) {
    match increment(area, key, by).await {
        Ok(total) => log::debug!("{} = {}", key, total),
        Err(e) => log::warn!("Failed to update {}: {}", key, e),
    }
}
