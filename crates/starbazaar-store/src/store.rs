//! The record store seam and its change feed.
//!
//! Every component receives the store as an injected `Arc<dyn RecordStore>`;
//! there is no process-wide handle.
//!
//! # Change delivery
//!
//! ```text
//! conditional_claim ──commit──► ChangeFeed (broadcast) ──► ChangeSubscription (filter)
//!                                      │                         │
//!                                      └──► other subscribers    └──► try_next() / next()
//! ```
//!
//! Events for one row are published while the writer still holds the row,
//! so they arrive in commit order. Nothing orders events of different rows.
//! Consumers must tolerate replays: delivery is at-least-once.

use crate::error::Result;
use crate::models::{ChangeEvent, ClaimPatch, Star, StarFilter, StarId, StarQuery, UpdateCount};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default buffered events per subscriber before it reports `Lagged`.
pub const DEFAULT_FEED_CAPACITY: usize = 1024;

/// Typed facade over the star table.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Point read. `None` when the id does not exist.
    async fn get_by_id(&self, id: StarId) -> Result<Option<Star>>;

    /// Filtered, ordered, capped read.
    async fn get_batch(&self, query: &StarQuery) -> Result<Vec<Star>>;

    /// Exact number of rows matching the filter.
    async fn count(&self, filter: &StarFilter) -> Result<u64>;

    /// Apply `patch` to row `id` only if it is still unclaimed.
    ///
    /// Returns [`UpdateCount::ONE`] when the row was modified and
    /// [`UpdateCount::NONE`] when the predicate failed or the row does not
    /// exist. Concurrent calls on the same id serialize with one winner.
    async fn conditional_claim(&self, id: StarId, patch: &ClaimPatch) -> Result<UpdateCount>;

    /// Subscribe to committed updates whose new row matches `filter`.
    fn subscribe_changes(&self, filter: StarFilter) -> ChangeSubscription;
}

/// What a subscription yields.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// A committed update.
    Change(ChangeEvent),
    /// The subscriber fell behind and `n` events were dropped; resync needed.
    Lagged(u64),
}

/// Fan-out of committed updates to every live subscription.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        let id = event.id();
        match self.tx.send(event) {
            Ok(receivers) => trace!("Published change for star {} to {} subscribers", id, receivers),
            Err(_) => trace!("Change for star {} dropped, no subscribers", id),
        }
    }

    /// Open a filtered subscription.
    pub fn subscribe(&self, filter: StarFilter) -> ChangeSubscription {
        debug!("Opening change subscription ({} already open)", self.tx.receiver_count());
        ChangeSubscription {
            rx: self.tx.subscribe(),
            filter,
        }
    }

    /// Number of open subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A live, filtered change stream. Dropping it releases the subscription;
/// no event is observed after the drop.
#[derive(Debug)]
pub struct ChangeSubscription {
    rx: broadcast::Receiver<ChangeEvent>,
    filter: StarFilter,
}

impl ChangeSubscription {
    /// Next buffered delivery without waiting. `None` when nothing is pending
    /// or the feed is gone.
    pub fn try_next(&mut self) -> Option<Delivery> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.filter.matches(&event.current) => {
                    return Some(Delivery::Change(event))
                }
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(n)) => return Some(Delivery::Lagged(n)),
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => return None,
            }
        }
    }

    /// Wait for the next delivery. `None` once the feed is closed.
    pub async fn next(&mut self) -> Option<Delivery> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.filter.matches(&event.current) => {
                    return Some(Delivery::Change(event))
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => return Some(Delivery::Lagged(n)),
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Drain everything currently buffered.
    pub fn drain(&mut self) -> Vec<Delivery> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    pub fn filter(&self) -> &StarFilter {
        &self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StarColor;
    use chrono::Utc;

    fn flip(id: u64) -> ChangeEvent {
        let free = Star::unclaimed(StarId(id), 0.0, 0.0, 0.0);
        let claimed = free.with_claim(&ClaimPatch {
            owner_ref: "u".into(),
            owner_name: None,
            message: None,
            color: StarColor::Emerald,
            claimed_at: Utc::now(),
        });
        ChangeEvent::new(free, claimed)
    }

    #[test]
    fn subscription_filters_events() {
        let feed = ChangeFeed::default();
        let mut sub = feed.subscribe(StarFilter::by_id(StarId(2)));

        feed.publish(flip(1));
        feed.publish(flip(2));
        feed.publish(flip(3));

        let got = sub.drain();
        assert_eq!(got.len(), 1);
        assert!(matches!(&got[0], Delivery::Change(e) if e.id() == StarId(2)));
        assert!(sub.try_next().is_none());
    }

    #[test]
    fn drop_releases_subscription() {
        let feed = ChangeFeed::default();
        let sub = feed.subscribe(StarFilter::all());
        assert_eq!(feed.subscriber_count(), 1);
        drop(sub);
        assert_eq!(feed.subscriber_count(), 0);
        feed.publish(flip(1));
    }

    #[test]
    fn slow_subscriber_reports_lag() {
        let feed = ChangeFeed::new(2);
        let mut sub = feed.subscribe(StarFilter::all());
        for id in 1..=5 {
            feed.publish(flip(id));
        }
        assert!(matches!(sub.try_next(), Some(Delivery::Lagged(3))));
        assert!(matches!(sub.try_next(), Some(Delivery::Change(_))));
    }

    #[tokio::test]
    async fn next_waits_for_event() {
        let feed = ChangeFeed::default();
        let mut sub = feed.subscribe(StarFilter::all());
        let publisher = feed.clone();
        tokio::spawn(async move {
            publisher.publish(flip(9));
        });
        let got = sub.next().await;
        assert!(matches!(got, Some(Delivery::Change(e)) if e.id() == StarId(9)));
    }
}
