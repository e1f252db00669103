//! Deferred removal of settled entries.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use super::{CacheEntry, CacheStore};

/// Removes `entry` from `store` once `lifespan` has elapsed.
///
/// Call at settlement: the delay is measured from here. Returns `None`
/// without scheduling anything when `lifespan` is absent or zero, in which
/// case the entry stays for the store's lifetime. The job holds the store
/// weakly, so it neither keeps a dropped store alive nor fails when the
/// entry was already removed.
///
/// Must be called from within a Tokio runtime.
pub fn schedule_eviction(
    entry: Arc<CacheEntry>,
    store: Weak<CacheStore>,
    lifespan: Option<Duration>,
) -> Option<JoinHandle<()>> {
    let lifespan = lifespan.filter(|d| !d.is_zero())?;
    let expiry = tokio::time::sleep(lifespan);

    Some(tokio::spawn(async move {
        expiry.await;

        let Some(store) = store.upgrade() else {
            return;
        };
        if store.remove(&entry) {
            debug!(
                url = %entry.input(),
                lifespan_ms = u64::try_from(lifespan.as_millis()).unwrap_or(u64::MAX),
                "evicted cache entry"
            );
        }
    }))
}
