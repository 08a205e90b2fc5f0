//! Read filters, ordering and result caps.

use super::star::{Star, StarId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ops::RangeInclusive;

/// Row predicate for reads, counts and change subscriptions.
///
/// Every populated field must match (conjunction). An empty filter matches
/// every row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StarFilter {
    /// Exact id
    pub id: Option<StarId>,
    /// Inclusive id range
    pub id_range: Option<RangeInclusive<u64>>,
    /// Claim state
    pub is_claimed: Option<bool>,
    /// Owner identity
    pub owner_ref: Option<String>,
    /// Case-insensitive substring over message OR owner name
    pub text: Option<String>,
    /// Require a non-empty message
    pub has_message: bool,
    /// Claimed at or after this instant
    pub claimed_since: Option<DateTime<Utc>>,
}

impl StarFilter {
    /// Filter matching every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter for a single id.
    pub fn by_id(id: StarId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Filter on claim state.
    pub fn claimed(is_claimed: bool) -> Self {
        Self {
            is_claimed: Some(is_claimed),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_owner(mut self, owner_ref: impl Into<String>) -> Self {
        self.owner_ref = Some(owner_ref.into());
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_message(mut self) -> Self {
        self.has_message = true;
        self
    }

    #[must_use]
    pub fn claimed_since(mut self, since: DateTime<Utc>) -> Self {
        self.claimed_since = Some(since);
        self
    }

    #[must_use]
    pub fn with_id_range(mut self, range: RangeInclusive<u64>) -> Self {
        self.id_range = Some(range);
        self
    }

    /// Evaluate the filter against a row.
    pub fn matches(&self, star: &Star) -> bool {
        if let Some(id) = self.id {
            if star.id != id {
                return false;
            }
        }
        if let Some(range) = &self.id_range {
            if !range.contains(&star.id.0) {
                return false;
            }
        }
        if let Some(claimed) = self.is_claimed {
            if star.is_claimed != claimed {
                return false;
            }
        }
        if let Some(owner) = &self.owner_ref {
            if star.owner_ref.as_deref() != Some(owner.as_str()) {
                return false;
            }
        }
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            let hit = |field: &Option<String>| {
                field
                    .as_deref()
                    .is_some_and(|v| v.to_lowercase().contains(&needle))
            };
            if !hit(&star.message) && !hit(&star.owner_name) {
                return false;
            }
        }
        if self.has_message && star.message.as_deref().map_or(true, str::is_empty) {
            return false;
        }
        if let Some(since) = self.claimed_since {
            match star.claimed_at {
                Some(at) if at >= since => {}
                _ => return false,
            }
        }
        true
    }
}

/// Result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StarOrder {
    #[default]
    IdAsc,
    /// Newest claims first; unclaimed rows last, by id.
    ClaimedAtDesc,
}

impl StarOrder {
    pub fn compare(&self, a: &Star, b: &Star) -> Ordering {
        match self {
            StarOrder::IdAsc => a.id.cmp(&b.id),
            StarOrder::ClaimedAtDesc => match (a.claimed_at, b.claimed_at) {
                (Some(x), Some(y)) => y.cmp(&x).then(a.id.cmp(&b.id)),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => a.id.cmp(&b.id),
            },
        }
    }
}

/// A filtered, ordered, capped read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StarQuery {
    pub filter: StarFilter,
    pub order: StarOrder,
    pub limit: Option<usize>,
}

impl StarQuery {
    pub fn new(filter: StarFilter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn order(mut self, order: StarOrder) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Run the query over an id-ordered row iterator.
    pub fn apply<'a, I>(&self, rows: I) -> Vec<Star>
    where
        I: IntoIterator<Item = &'a Star>,
    {
        let matching = rows.into_iter().filter(|s| self.filter.matches(s));

        // Rows arrive in id order, so IdAsc can stop at the cap.
        if self.order == StarOrder::IdAsc {
            return match self.limit {
                Some(limit) => matching.take(limit).cloned().collect(),
                None => matching.cloned().collect(),
            };
        }

        let mut out: Vec<Star> = matching.cloned().collect();
        out.sort_by(|a, b| self.order.compare(a, b));
        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::star::{ClaimPatch, StarColor};
    use chrono::Duration;

    fn claimed(id: u64, name: &str, message: Option<&str>, at: DateTime<Utc>) -> Star {
        Star::unclaimed(StarId(id), 0.0, 0.0, 0.0).with_claim(&ClaimPatch {
            owner_ref: format!("u{}", id),
            owner_name: Some(name.into()),
            message: message.map(Into::into),
            color: StarColor::Amber,
            claimed_at: at,
        })
    }

    #[test]
    fn empty_filter_matches_everything() {
        let star = Star::unclaimed(StarId(1), 0.0, 0.0, 0.0);
        assert!(StarFilter::all().matches(&star));
    }

    #[test]
    fn text_search_is_case_insensitive_over_name_and_message() {
        let now = Utc::now();
        let a = claimed(1, "Marko K.", Some("For my MOM"), now);
        let b = claimed(2, "Momo", None, now);
        let c = claimed(3, "Ana", Some("always"), now);

        let f = StarFilter::all().with_text("mom");
        assert!(f.matches(&a));
        assert!(f.matches(&b));
        assert!(!f.matches(&c));
    }

    #[test]
    fn claimed_since_excludes_unclaimed_and_older() {
        let now = Utc::now();
        let f = StarFilter::claimed(true).claimed_since(now - Duration::hours(1));
        assert!(f.matches(&claimed(1, "a", None, now)));
        assert!(!f.matches(&claimed(2, "b", None, now - Duration::hours(2))));
        assert!(!f.matches(&Star::unclaimed(StarId(3), 0.0, 0.0, 0.0)));
    }

    #[test]
    fn has_message_rejects_missing_and_empty() {
        let now = Utc::now();
        let f = StarFilter::all().with_message();
        assert!(f.matches(&claimed(1, "a", Some("hi"), now)));
        assert!(!f.matches(&claimed(2, "b", None, now)));
        assert!(!f.matches(&claimed(3, "c", Some(""), now)));
    }

    #[test]
    fn claimed_at_desc_puts_newest_first() {
        let now = Utc::now();
        let rows = vec![
            claimed(1, "a", None, now - Duration::minutes(10)),
            Star::unclaimed(StarId(2), 0.0, 0.0, 0.0),
            claimed(3, "c", None, now),
        ];
        let out = StarQuery::new(StarFilter::all())
            .order(StarOrder::ClaimedAtDesc)
            .limit(2)
            .apply(&rows);
        let ids: Vec<u64> = out.iter().map(|s| s.id.0).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn id_range_and_limit() {
        let rows: Vec<Star> = (1..=10)
            .map(|i| Star::unclaimed(StarId(i), 0.0, 0.0, 0.0))
            .collect();
        let out = StarQuery::new(StarFilter::all().with_id_range(4..=8))
            .limit(3)
            .apply(&rows);
        let ids: Vec<u64> = out.iter().map(|s| s.id.0).collect();
        assert_eq!(ids, vec![4, 5, 6]);
    }
}
