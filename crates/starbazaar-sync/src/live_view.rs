//! Live view of the universe for one session.
//!
//! Holds two independent sources of truth:
//!
//! - the **projection**: up to `projection_cap` stars, ordered by id, that
//!   the renderer draws and notifications patch in place;
//! - the **aggregates**: total, claimed and today's counts, read with count
//!   queries and only nudged locally between recounts.
//!
//! Notifications about rows outside the projection never touch it; they only
//! move the aggregates.

use crate::error::Result;
use crate::stats::{start_of_local_day, ClaimProgress, DailyTally, DAILY_GOAL};
use chrono::{DateTime, Utc};
use rand::seq::IteratorRandom;
use rand::Rng;
use starbazaar_store::{
    ChangeEvent, Delivery, RecordStore, Star, StarFilter, StarId, StarOrder, StarQuery,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Default bound on the number of stars a session loads.
pub const DEFAULT_PROJECTION_CAP: usize = 3000;

type LoadedCallback = Box<dyn FnMut(&[Star]) + Send>;

/// Live view configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveViewConfig {
    pub projection_cap: usize,
    pub daily_goal: u64,
}

impl Default for LiveViewConfig {
    fn default() -> Self {
        Self {
            projection_cap: DEFAULT_PROJECTION_CAP,
            daily_goal: DAILY_GOAL,
        }
    }
}

/// What applying one notification did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// A projected snapshot was replaced.
    pub projection_changed: bool,
    /// First sighting of this claim; counters were bumped.
    pub fresh_claim: bool,
    /// A claim transition that had already been counted.
    pub duplicate: bool,
}

pub struct LiveView {
    config: LiveViewConfig,
    projection: BTreeMap<StarId, Star>,
    progress: ClaimProgress,
    today: DailyTally,
    /// Last counted `claimed_at` per id, for dedup of claim transitions.
    /// Holds every claim this view has seen, projected or not, and is never
    /// pruned: one entry per claimed star is the price of exact dedup.
    seen_claims: HashMap<StarId, DateTime<Utc>>,
    unconfirmed: HashSet<StarId>,
    recount_requested: bool,
    rehydrate_requested: bool,
    loads: u64,
    loaded_callbacks: Vec<LoadedCallback>,
}

impl LiveView {
    pub fn new(config: LiveViewConfig) -> Self {
        Self {
            config,
            projection: BTreeMap::new(),
            progress: ClaimProgress::default(),
            today: DailyTally::new(start_of_local_day(Utc::now()), config.daily_goal),
            seen_claims: HashMap::new(),
            unconfirmed: HashSet::new(),
            recount_requested: false,
            rehydrate_requested: false,
            loads: 0,
            loaded_callbacks: Vec::new(),
        }
    }

    /// Register a callback fired once per completed bulk load with the full set.
    pub fn on_stars_loaded<F>(&mut self, callback: F)
    where
        F: FnMut(&[Star]) + Send + 'static,
    {
        self.loaded_callbacks.push(Box::new(callback));
    }

    /// Bulk-load the projection and recount aggregates.
    ///
    /// Replaces the projection wholesale and fires the load callbacks as soon
    /// as the batch is in. If the batch read fails the previous projection is
    /// kept and a rehydrate stays requested; if only the recount fails the new
    /// projection stands and a recount stays requested.
    pub async fn hydrate(&mut self, store: &dyn RecordStore, now: DateTime<Utc>) -> Result<()> {
        self.rehydrate_requested = true;

        let query = StarQuery::new(StarFilter::all())
            .order(StarOrder::IdAsc)
            .limit(self.config.projection_cap);
        let stars = store.get_batch(&query).await?;

        self.projection = stars.iter().map(|s| (s.id, s.clone())).collect();
        self.unconfirmed.clear();
        // Merge, never replace: replays for rows outside the projection must
        // still be recognized after a reload.
        for star in stars.iter().filter(|s| s.is_claimed) {
            if let Some(at) = star.claimed_at {
                self.seen_claims.insert(star.id, at);
            }
        }
        self.rehydrate_requested = false;
        self.loads += 1;

        for callback in self.loaded_callbacks.iter_mut() {
            callback(&stars);
        }

        if let Err(e) = self.recount(store, now).await {
            warn!("Loaded {} stars but the recount failed: {}", stars.len(), e);
            return Err(e);
        }

        info!(
            "Loaded {} stars ({} claimed of {} total)",
            stars.len(),
            self.progress.claimed,
            self.progress.total
        );
        Ok(())
    }

    /// Re-read total, claimed and today's counts with independent queries.
    pub async fn recount(
        &mut self,
        store: &dyn RecordStore,
        now: DateTime<Utc>,
    ) -> Result<ClaimProgress> {
        self.recount_requested = true;

        let day_start = start_of_local_day(now);
        let total = store.count(&StarFilter::all()).await?;
        let claimed = store.count(&StarFilter::claimed(true)).await?;
        let today = store
            .count(&StarFilter::claimed(true).claimed_since(day_start))
            .await?;

        self.progress = ClaimProgress::new(total, claimed);
        self.today.reset(day_start, today);
        self.recount_requested = false;
        debug!("Recounted: {}/{} claimed, {} today", claimed, total, today);
        Ok(self.progress)
    }

    /// Merge one subscription delivery.
    pub fn apply_delivery(&mut self, delivery: Delivery) -> ApplyOutcome {
        match delivery {
            Delivery::Change(event) => self.apply(&event),
            Delivery::Lagged(missed) => {
                warn!("Missed {} notifications, rehydrating", missed);
                self.rehydrate_requested = true;
                ApplyOutcome::default()
            }
        }
    }

    /// Merge one change notification.
    pub fn apply(&mut self, event: &ChangeEvent) -> ApplyOutcome {
        let id = event.id();
        let mut outcome = ApplyOutcome::default();

        if let Some(slot) = self.projection.get_mut(&id) {
            if *slot != event.current {
                *slot = event.current.clone();
                outcome.projection_changed = true;
            }
            self.unconfirmed.remove(&id);
        }

        if event.is_claim_transition() {
            match event.current.claimed_at {
                Some(at) if self.register_claim(id, at) => outcome.fresh_claim = true,
                Some(_) => outcome.duplicate = true,
                None => warn!("Star {} claimed without a timestamp", id),
            }
        }

        debug!(
            "Applied change on star {} (changed={}, fresh={}, duplicate={})",
            id, outcome.projection_changed, outcome.fresh_claim, outcome.duplicate
        );
        outcome
    }

    /// Show this session's own successful claim before its notification lands.
    ///
    /// The snapshot stays unconfirmed until the store's notification replaces it.
    pub fn apply_local_claim(&mut self, star: &Star) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();

        if let Some(slot) = self.projection.get_mut(&star.id) {
            if slot.is_claimed {
                // Notification already landed
                return outcome;
            }
            *slot = star.clone();
            self.unconfirmed.insert(star.id);
            outcome.projection_changed = true;
        }

        if let Some(at) = star.claimed_at {
            outcome.fresh_claim = self.register_claim(star.id, at);
            outcome.duplicate = !outcome.fresh_claim;
        }
        outcome
    }

    fn register_claim(&mut self, id: StarId, at: DateTime<Utc>) -> bool {
        if self.seen_claims.get(&id) == Some(&at) {
            return false;
        }
        self.seen_claims.insert(id, at);
        self.progress.bump();
        self.today.observe(at);
        self.recount_requested = true;
        true
    }

    /// Request a recount when the local day has rolled over.
    pub fn check_day_rollover(&mut self, now: DateTime<Utc>) -> bool {
        if self.today.is_stale(now) {
            self.recount_requested = true;
        }
        self.recount_requested
    }

    /// Uniform pick among the free stars currently projected.
    pub fn random_free_star<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Star> {
        self.projection.values().filter(|s| !s.is_claimed).choose(rng)
    }

    pub fn get(&self, id: StarId) -> Option<&Star> {
        self.projection.get(&id)
    }

    /// Projected stars in id order.
    pub fn stars(&self) -> impl Iterator<Item = &Star> {
        self.projection.values()
    }

    pub fn len(&self) -> usize {
        self.projection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projection.is_empty()
    }

    pub fn is_unconfirmed(&self, id: StarId) -> bool {
        self.unconfirmed.contains(&id)
    }

    pub fn progress(&self) -> ClaimProgress {
        self.progress
    }

    pub fn today(&self) -> &DailyTally {
        &self.today
    }

    pub fn needs_recount(&self) -> bool {
        self.recount_requested
    }

    pub fn needs_rehydrate(&self) -> bool {
        self.rehydrate_requested
    }

    /// Completed bulk loads.
    pub fn loads(&self) -> u64 {
        self.loads
    }

    pub fn config(&self) -> &LiveViewConfig {
        &self.config
    }
}

impl Default for LiveView {
    fn default() -> Self {
        Self::new(LiveViewConfig::default())
    }
}
