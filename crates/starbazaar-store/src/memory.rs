//! In-process store.
//!
//! Backs tests and local sessions. Claims serialize on one table mutex, which
//! is the row-level atomicity the claim protocol relies on.

use crate::error::{Error, Result};
use crate::models::{
    ChangeEvent, ClaimPatch, Star, StarFilter, StarId, StarQuery, UpdateCount,
};
use crate::store::{ChangeFeed, ChangeSubscription, RecordStore};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Star table held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<BTreeMap<StarId, Star>>,
    feed: ChangeFeed,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with a custom per-subscriber buffer.
    pub fn with_feed_capacity(capacity: usize) -> Self {
        Self {
            feed: ChangeFeed::new(capacity),
            ..Self::default()
        }
    }

    /// Bulk-insert stars. Existing ids are overwritten; no events are emitted.
    pub fn seed(&self, stars: impl IntoIterator<Item = Star>) -> Result<usize> {
        let mut rows = self.rows()?;
        let before = rows.len();
        for star in stars {
            rows.insert(star.id, star);
        }
        let added = rows.len() - before;
        info!("Seeded {} stars ({} total)", added, rows.len());
        Ok(added)
    }

    /// Simulate the backend going down (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    /// Re-publish a change exactly as given, as an at-least-once transport may.
    pub fn replay(&self, event: ChangeEvent) {
        self.feed.publish(event);
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    fn check_available(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("memory store is offline".into()));
        }
        Ok(())
    }

    fn rows(&self) -> Result<MutexGuard<'_, BTreeMap<StarId, Star>>> {
        self.rows
            .lock()
            .map_err(|_| Error::Unavailable("star table lock poisoned".into()))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_by_id(&self, id: StarId) -> Result<Option<Star>> {
        self.check_available()?;
        Ok(self.rows()?.get(&id).cloned())
    }

    async fn get_batch(&self, query: &StarQuery) -> Result<Vec<Star>> {
        self.check_available()?;
        let rows = self.rows()?;
        Ok(query.apply(rows.values()))
    }

    async fn count(&self, filter: &StarFilter) -> Result<u64> {
        self.check_available()?;
        let rows = self.rows()?;
        Ok(rows.values().filter(|s| filter.matches(s)).count() as u64)
    }

    async fn conditional_claim(&self, id: StarId, patch: &ClaimPatch) -> Result<UpdateCount> {
        self.check_available()?;
        let mut rows = self.rows()?;

        let Some(row) = rows.get_mut(&id) else {
            debug!("Claim on unknown star {}", id);
            return Ok(UpdateCount::NONE);
        };
        if row.is_claimed {
            debug!("Claim on star {} rejected, already claimed", id);
            return Ok(UpdateCount::NONE);
        }

        let previous = row.clone();
        *row = previous.with_claim(patch);
        let event = ChangeEvent::new(previous, row.clone());

        // Publish before releasing the table so per-row order equals commit order.
        self.feed.publish(event);
        drop(rows);

        info!("Star {} claimed by {}", id, patch.owner_ref);
        Ok(UpdateCount::ONE)
    }

    fn subscribe_changes(&self, filter: StarFilter) -> ChangeSubscription {
        self.feed.subscribe(filter)
    }
}
