//! Session-start reconciliation of the local cache into the remote cart.

use std::sync::Arc;

use pethub_core::{LineKey, LocalCacheEntry, UserId};
use tracing::{info, instrument, warn};

use super::local::LocalCartStore;
use super::source::RemoteCart;
use crate::error::{CartError, Result};

/// Outcome of a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncReport {
    /// Every cached unit is in the remote cart.
    Clean,
    /// Some items could not be replayed; the rest were.
    PartialFailure(Vec<FailedItem>),
}

impl SyncReport {
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }

    #[must_use]
    pub fn failed(&self) -> &[FailedItem] {
        match self {
            Self::Clean => &[],
            Self::PartialFailure(items) => items,
        }
    }
}

/// A cached item that could not be fully replayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub entry: LocalCacheEntry,
    /// Units replayed before the failure.
    pub applied: u32,
    /// Units that were missing from the remote cart.
    pub missing: u32,
    pub reason: String,
}

/// Replays cached cart contents into the remote cart.
#[derive(Clone)]
pub struct Reconciler {
    remote: RemoteCart,
    local: Arc<dyn LocalCartStore>,
    retain_failed: bool,
}

impl Reconciler {
    #[must_use]
    pub fn new(remote: RemoteCart, local: Arc<dyn LocalCartStore>, retain_failed: bool) -> Self {
        Self {
            remote,
            local,
            retain_failed,
        }
    }

    /// Merge the local cache into the remote cart, then clear the cache.
    ///
    /// Only units the remote is missing (`cached - remote`) are replayed, so
    /// running this twice is the same as running it once. Failing items are
    /// skipped and reported. With `retain_failed` they stay in the cache for
    /// the next session; otherwise the cache is cleared regardless.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated` without a session, or the failure to read
    /// either side. The cache is untouched in both cases.
    #[instrument(skip(self))]
    pub async fn sync(&self) -> Result<SyncReport> {
        let user = self.remote.current_user().await?;
        let entries = merge_duplicates(self.local.snapshot().await?);
        if entries.is_empty() {
            return Ok(SyncReport::Clean);
        }

        let lines = self.remote.lines_or_create(&user).await?;
        let mut failed = Vec::new();
        let mut replayed = 0u32;

        for entry in entries {
            let key = entry.key();
            let remote_qty = lines
                .iter()
                .find(|l| l.key == key)
                .map_or(0, |l| l.quantity);
            let missing = entry.quantity.saturating_sub(remote_qty);
            if missing == 0 {
                continue;
            }

            match self.replay(&user, &key, missing, remote_qty).await {
                Ok(()) => replayed += missing,
                Err((applied, e)) => {
                    warn!(key = %key, applied, missing, error = %e, "Could not sync cached cart item");
                    replayed += applied;
                    failed.push(FailedItem {
                        entry,
                        applied,
                        missing,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if self.retain_failed && !failed.is_empty() {
            let keep: Vec<LocalCacheEntry> = failed.iter().map(|f| f.entry.clone()).collect();
            self.local.persist(&keep).await?;
        } else {
            self.local.clear().await?;
        }

        info!(replayed, failed = failed.len(), "Cart sync finished");
        if failed.is_empty() {
            Ok(SyncReport::Clean)
        } else {
            Ok(SyncReport::PartialFailure(failed))
        }
    }

    async fn replay(
        &self,
        user: &UserId,
        key: &LineKey,
        missing: u32,
        remote_qty: u32,
    ) -> std::result::Result<(), (u32, CartError)> {
        self.remote
            .validator()
            .validate(&key.product_id, &key.size, missing, remote_qty)
            .await
            .map_err(|e| (0, e))?;

        match self.remote.apply_units(user, key, i64::from(missing)).await {
            Ok(_) => Ok(()),
            Err(CartError::PartiallyApplied {
                applied, source, ..
            }) => Err((applied, *source)),
            Err(e) => Err((0, e)),
        }
    }
}

/// Sum cached entries that share a key; the first entry's display fields win.
fn merge_duplicates(entries: Vec<LocalCacheEntry>) -> Vec<LocalCacheEntry> {
    let mut merged: Vec<LocalCacheEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.quantity == 0 {
            continue;
        }
        match merged.iter_mut().find(|m| m.key() == entry.key()) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(entry.quantity),
            None => merged.push(entry),
        }
    }
    merged
}
