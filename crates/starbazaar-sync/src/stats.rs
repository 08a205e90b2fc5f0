//! Claim progress and the daily counter.

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Claims per day the community aims for.
pub const DAILY_GOAL: u64 = 500;

/// Start of the local calendar day containing `now`, as UTC.
pub fn start_of_local_day(now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(midnight) = now.with_timezone(&Local).date_naive().and_hms_opt(0, 0, 0) else {
        return now;
    };
    match midnight.and_local_timezone(Local).earliest() {
        Some(local) => local.with_timezone(&Utc),
        // Midnight skipped by a DST jump; fall back to the naive instant.
        None => Utc.from_utc_datetime(&midnight),
    }
}

/// Where the universe stands overall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    FirstExplorers,
    Filling,
    MostlyClaimed,
    LastPockets,
}

impl ProgressPhase {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage < 5.0 {
            ProgressPhase::FirstExplorers
        } else if percentage < 40.0 {
            ProgressPhase::Filling
        } else if percentage < 80.0 {
            ProgressPhase::MostlyClaimed
        } else {
            ProgressPhase::LastPockets
        }
    }

    pub fn headline(&self) -> &'static str {
        match self {
            ProgressPhase::FirstExplorers => "You're among the very first explorers.",
            ProgressPhase::Filling => "The galaxy is slowly filling with stories.",
            ProgressPhase::MostlyClaimed => "Most of the universe is already claimed.",
            ProgressPhase::LastPockets => "Last pockets of free space left in the sky.",
        }
    }
}

/// Aggregate counts from the store. Independent of the loaded projection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimProgress {
    pub total: u64,
    pub claimed: u64,
}

impl ClaimProgress {
    pub fn new(total: u64, claimed: u64) -> Self {
        Self { total, claimed }
    }

    /// Claimed share in percent, clamped to 100. Zero for an empty universe.
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.claimed as f64 / self.total as f64 * 100.0).min(100.0)
    }

    pub fn phase(&self) -> ProgressPhase {
        ProgressPhase::from_percentage(self.percentage())
    }

    pub fn free(&self) -> u64 {
        self.total.saturating_sub(self.claimed)
    }

    /// Count one fresh claim locally until the next recount.
    pub(crate) fn bump(&mut self) {
        self.claimed = self.claimed.saturating_add(1);
    }
}

/// Claims made since the local start of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTally {
    day_start: DateTime<Utc>,
    count: u64,
    goal: u64,
}

impl DailyTally {
    pub fn new(day_start: DateTime<Utc>, goal: u64) -> Self {
        Self {
            day_start,
            count: 0,
            goal,
        }
    }

    /// Replace with an authoritative count for the day starting at `day_start`.
    pub fn reset(&mut self, day_start: DateTime<Utc>, count: u64) {
        self.day_start = day_start;
        self.count = count;
    }

    /// Count a fresh claim if it belongs to the current day.
    pub fn observe(&mut self, claimed_at: DateTime<Utc>) -> bool {
        if claimed_at < self.day_start {
            return false;
        }
        self.count += 1;
        true
    }

    pub fn day_start(&self) -> DateTime<Utc> {
        self.day_start
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn goal(&self) -> u64 {
        self.goal
    }

    /// Fraction of the goal reached, 0.0 to 1.0.
    pub fn progress(&self) -> f64 {
        if self.goal == 0 {
            return 1.0;
        }
        (self.count as f64 / self.goal as f64).min(1.0)
    }

    /// True once `now` falls on a later local day than the tally.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        start_of_local_day(now) > self.day_start
    }
}
