//! Persistent star table using RocksDB.

use crate::error::{Error, Result};
use crate::models::{
    ChangeEvent, ClaimPatch, Star, StarFilter, StarId, StarQuery, UpdateCount,
};
use crate::store::{ChangeFeed, ChangeSubscription, RecordStore};
use async_trait::async_trait;
use rocksdb::{Options, WriteBatch, DB};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

const STAR_PREFIX: &[u8] = b"star:";

/// Key for a star row. Zero-padded so prefix iteration runs in id order.
fn star_key(id: StarId) -> String {
    format!("star:{:020}", id.0)
}

/// RocksDB-backed star table.
pub struct RocksStore {
    db: DB,
    /// Serializes read-check-write claim sequences.
    writer: Mutex<()>,
    feed: ChangeFeed,
}

impl RocksStore {
    /// Open or create storage at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self {
            db,
            writer: Mutex::new(()),
            feed: ChangeFeed::default(),
        })
    }

    /// Bulk-insert stars in one write batch. No events are emitted.
    pub fn seed(&self, stars: impl IntoIterator<Item = Star>) -> Result<usize> {
        let mut batch = WriteBatch::default();
        let mut n = 0;
        for star in stars {
            batch.put(star_key(star.id).as_bytes(), serde_json::to_vec(&star)?);
            n += 1;
        }
        self.db.write(batch)?;
        info!("Seeded {} stars", n);
        Ok(n)
    }

    /// Whether the table holds no rows yet.
    pub fn is_empty(&self) -> Result<bool> {
        match self.db.prefix_iterator(STAR_PREFIX).next() {
            Some(item) => {
                let (key, _) = item?;
                Ok(!key.starts_with(STAR_PREFIX))
            }
            None => Ok(true),
        }
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    fn read(&self, id: StarId) -> Result<Option<Star>> {
        match self.db.get(star_key(id).as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Visit every row in id order.
    fn scan(&self) -> Result<Vec<Star>> {
        let mut stars = Vec::new();
        for item in self.db.prefix_iterator(STAR_PREFIX) {
            let (key, value) = item?;
            if !key.starts_with(STAR_PREFIX) {
                break;
            }
            stars.push(serde_json::from_slice(&value)?);
        }
        Ok(stars)
    }
}

#[async_trait]
impl RecordStore for RocksStore {
    async fn get_by_id(&self, id: StarId) -> Result<Option<Star>> {
        self.read(id)
    }

    async fn get_batch(&self, query: &StarQuery) -> Result<Vec<Star>> {
        // Point lookups skip the scan.
        if let Some(id) = query.filter.id {
            let row = self.read(id)?;
            return Ok(query.apply(row.iter()));
        }
        let rows = self.scan()?;
        Ok(query.apply(rows.iter()))
    }

    async fn count(&self, filter: &StarFilter) -> Result<u64> {
        let rows = self.scan()?;
        Ok(rows.iter().filter(|s| filter.matches(s)).count() as u64)
    }

    async fn conditional_claim(&self, id: StarId, patch: &ClaimPatch) -> Result<UpdateCount> {
        let _guard = self
            .writer
            .lock()
            .map_err(|_| Error::Unavailable("claim writer lock poisoned".into()))?;

        let Some(previous) = self.read(id)? else {
            debug!("Claim on unknown star {}", id);
            return Ok(UpdateCount::NONE);
        };
        if previous.is_claimed {
            debug!("Claim on star {} rejected, already claimed", id);
            return Ok(UpdateCount::NONE);
        }

        let current = previous.with_claim(patch);
        self.db
            .put(star_key(id).as_bytes(), serde_json::to_vec(&current)?)?;
        self.feed.publish(ChangeEvent::new(previous, current));

        info!("Star {} claimed by {}", id, patch.owner_ref);
        Ok(UpdateCount::ONE)
    }

    fn subscribe_changes(&self, filter: StarFilter) -> ChangeSubscription {
        self.feed.subscribe(filter)
    }
}
