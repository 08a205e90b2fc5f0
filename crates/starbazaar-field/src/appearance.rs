//! How a star is drawn: color, size, halo, hover label and fade-in.
//!
//! Everything here derives from claim state only; the renderer owns meshes.

use starbazaar_store::{Star, StarColor};

/// Color of stars nobody has claimed.
pub const FREE_STAR_HEX: &str = "#64748b";

/// Radius of an unclaimed star.
pub const FREE_RADIUS: f32 = 0.08;

/// Radius of a claimed star.
pub const CLAIMED_RADIUS: f32 = 0.12;

/// Hex color for a palette entry.
pub fn palette_hex(color: StarColor) -> &'static str {
    match color {
        StarColor::Cyan => "#22d3ee",
        StarColor::Indigo => "#6366f1",
        StarColor::Fuchsia => "#e879f9",
        StarColor::Amber => "#fbbf24",
        StarColor::Emerald => "#34d399",
    }
}

/// Render attributes of one star.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StarAppearance {
    pub hex: &'static str,
    pub radius: f32,
    /// Claimed stars carry a pulsing halo ring
    pub halo: bool,
}

impl StarAppearance {
    pub fn of(star: &Star) -> Self {
        if star.is_claimed {
            Self {
                hex: palette_hex(star.color),
                radius: CLAIMED_RADIUS,
                halo: true,
            }
        } else {
            Self {
                hex: FREE_STAR_HEX,
                radius: FREE_RADIUS,
                halo: false,
            }
        }
    }
}

/// Tooltip text shown while hovering a star.
pub fn hover_label(star: &Star) -> String {
    if !star.is_claimed {
        return "Unclaimed star · click to claim".to_string();
    }
    let owner = star
        .owner_name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or("Someone");
    match star.message.as_deref().filter(|m| !m.is_empty()) {
        Some(message) => format!("{} “{}”", owner, message),
        None => owner.to_string(),
    }
}

/// Global fade-in of the field after every (re)load.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FadeIn {
    level: f32,
}

impl FadeIn {
    /// Level gained per second.
    pub const RATE: f32 = 0.7;
    /// Opacity at level zero.
    pub const FLOOR: f32 = 0.15;

    pub fn new() -> Self {
        Self::default()
    }

    /// Start over from transparent.
    pub fn reset(&mut self) {
        self.level = 0.0;
    }

    pub fn tick(&mut self, dt: f32) {
        if self.level < 1.0 {
            self.level = (self.level + dt.max(0.0) * Self::RATE).min(1.0);
        }
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn opacity(&self) -> f32 {
        Self::FLOOR + self.level * (1.0 - Self::FLOOR)
    }

    pub fn is_complete(&self) -> bool {
        self.level >= 1.0
    }
}
