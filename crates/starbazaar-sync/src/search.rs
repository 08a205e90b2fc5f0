//! Point lookups and discovery queries.

use crate::error::{Error, Result};
use crate::identity::Claimant;
use crate::stats::start_of_local_day;
use chrono::{DateTime, Utc};
use starbazaar_store::{RecordStore, Star, StarFilter, StarId, StarOrder, StarQuery};
use tracing::debug;

/// How many messages the "today" ticker shows.
pub const TOP_MESSAGES_LIMIT: usize = 6;

/// Look a star up by the id the user typed.
pub async fn find_by_id(store: &dyn RecordStore, input: &str) -> Result<Star> {
    let id: StarId = input
        .parse()
        .map_err(|_| Error::PreconditionFailed("Please enter a valid star number.".into()))?;

    match store.get_by_id(id).await? {
        Some(star) => Ok(star),
        None => {
            debug!("No star with id {}", id);
            Err(Error::NotFound(format!("Star #{} does not exist.", id)))
        }
    }
}

/// First star (lowest id) whose message or owner name contains `text`,
/// case-insensitively. Blank input searches nothing.
pub async fn find_by_text(store: &dyn RecordStore, text: &str) -> Result<Option<Star>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    let query = StarQuery::new(StarFilter::all().with_text(text))
        .order(StarOrder::IdAsc)
        .limit(1);
    match store.get_batch(&query).await?.into_iter().next() {
        Some(star) => Ok(Some(star)),
        None => Err(Error::NotFound(format!(
            "No stars match \"{}\" yet.",
            text
        ))),
    }
}

/// Every star owned by `claimant`, by id.
pub async fn stars_owned_by(store: &dyn RecordStore, claimant: &Claimant) -> Result<Vec<Star>> {
    let query = StarQuery::new(StarFilter::claimed(true).with_owner(claimant.id()))
        .order(StarOrder::IdAsc);
    Ok(store.get_batch(&query).await?)
}

/// Newest claimed stars with a message since local midnight.
pub async fn top_messages_today(store: &dyn RecordStore, now: DateTime<Utc>) -> Result<Vec<Star>> {
    let filter = StarFilter::claimed(true)
        .with_message()
        .claimed_since(start_of_local_day(now));
    let query = StarQuery::new(filter)
        .order(StarOrder::ClaimedAtDesc)
        .limit(TOP_MESSAGES_LIMIT);
    Ok(store.get_batch(&query).await?)
}
