//! Canned operations built from the primitives.
//!
//! Small, predictable units of work with fixed latencies. The CLI drives
//! them, and they give the primitives something realistic to coordinate.

use std::time::Duration;

use tracing::debug;

use crate::cancel::CancellationSignal;
use crate::error::{Error, Result};
use crate::fanout;
use crate::time;

/// Look up a user by id. Always succeeds after `delay`.
pub async fn fetch_user(user_id: i64, delay: Duration) -> Result<String> {
    time::delay(delay).await;
    Ok(format!("User{user_id}"))
}

/// Like [`fetch_user`], but rejects negative ids before doing any waiting.
pub async fn fetch_user_validated(user_id: i64, delay: Duration) -> Result<String> {
    if user_id < 0 {
        return Err(Error::failed("no negatives"));
    }
    fetch_user(user_id, delay).await
}

/// Long-running operation that checkpoints on entry, while waiting, and
/// before returning.
pub async fn long_running_operation(signal: &CancellationSignal, delay: Duration) -> Result<String> {
    signal.checkpoint()?;
    time::delay_cancellable(delay, signal).await?;
    signal.checkpoint()?;
    Ok("foo".to_string())
}

/// Fetch a single item by id.
pub async fn fetch_item(item_id: i64, delay: Duration) -> Result<String> {
    time::delay(delay).await;
    debug!(item_id, "item fetched");
    Ok(format!("Item-{item_id}"))
}

/// Fetch every item concurrently. Output order matches `ids`.
pub async fn fetch_items(ids: &[i64], delay: Duration) -> Result<Vec<String>> {
    fanout::when_all(ids.iter().map(|&id| fetch_item(id, delay))).await
}

/// Cache fetcher: wraps `key` in underscores after `delay`.
pub async fn decorate_key(key: String, delay: Duration) -> Result<String> {
    time::delay(delay).await;
    Ok(format!("_{key}_"))
}
