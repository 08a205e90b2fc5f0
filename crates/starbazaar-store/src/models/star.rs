//! Star model - the unit record of the field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest accepted claim message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 280;

/// Display name stored when a claimant leaves the name blank.
pub const ANONYMOUS_OWNER: &str = "Anonymous";

/// Star identifier. Dense, assigned at seed time, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StarId(pub u64);

impl fmt::Display for StarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StarId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(StarId)
    }
}

/// Glow color a claimant picks for their star.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StarColor {
    #[default]
    Cyan,
    Indigo,
    Fuchsia,
    Amber,
    Emerald,
}

impl StarColor {
    /// The full palette, in display order.
    pub const PALETTE: [StarColor; 5] = [
        StarColor::Cyan,
        StarColor::Indigo,
        StarColor::Fuchsia,
        StarColor::Amber,
        StarColor::Emerald,
    ];

    /// Lowercase name as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            StarColor::Cyan => "cyan",
            StarColor::Indigo => "indigo",
            StarColor::Fuchsia => "fuchsia",
            StarColor::Amber => "amber",
            StarColor::Emerald => "emerald",
        }
    }
}

impl fmt::Display for StarColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StarColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StarColor::PALETTE
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown star color: {}", s))
    }
}

/// A star record.
///
/// Coordinates are fixed at seed time. The claim fields (`owner_ref`,
/// `owner_name`, `message`, `color`, `claimed_at`) change together, once,
/// when `is_claimed` flips to true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Star {
    pub id: StarId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub is_claimed: bool,
    pub owner_ref: Option<String>,
    pub owner_name: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub color: StarColor,
    pub claimed_at: Option<DateTime<Utc>>,
}

impl Star {
    /// Create an unclaimed star at the given coordinates.
    pub fn unclaimed(id: StarId, x: f64, y: f64, z: f64) -> Self {
        Self {
            id,
            x,
            y,
            z,
            is_claimed: false,
            owner_ref: None,
            owner_name: None,
            message: None,
            color: StarColor::default(),
            claimed_at: None,
        }
    }

    /// Logical coordinates as an array.
    pub fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Return a copy with the claim patch applied. Coordinates and id are untouched.
    pub fn with_claim(&self, patch: &ClaimPatch) -> Self {
        Self {
            is_claimed: true,
            owner_ref: Some(patch.owner_ref.clone()),
            owner_name: patch.owner_name.clone(),
            message: patch.message.clone(),
            color: patch.color,
            claimed_at: Some(patch.claimed_at),
            ..self.clone()
        }
    }

    /// Check the claim-group invariant: owner and timestamp present iff claimed.
    pub fn is_consistent(&self) -> bool {
        self.is_claimed == self.owner_ref.is_some() && self.is_claimed == self.claimed_at.is_some()
    }
}

/// The claim write applied by a conditional update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimPatch {
    pub owner_ref: String,
    pub owner_name: Option<String>,
    pub message: Option<String>,
    pub color: StarColor,
    pub claimed_at: DateTime<Utc>,
}

/// Rows modified by a conditional update. Always 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCount(u8);

impl UpdateCount {
    pub const NONE: UpdateCount = UpdateCount(0);
    pub const ONE: UpdateCount = UpdateCount(1);

    pub fn get(&self) -> u8 {
        self.0
    }

    pub fn is_applied(&self) -> bool {
        self.0 == 1
    }
}
