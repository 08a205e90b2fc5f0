//! Change notifications emitted by a store after each committed update.

use super::star::{Star, StarId};
use serde::{Deserialize, Serialize};

/// A committed row update: the row before and after the write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub previous: Star,
    pub current: Star,
}

impl ChangeEvent {
    pub fn new(previous: Star, current: Star) -> Self {
        Self { previous, current }
    }

    /// Row this event belongs to.
    pub fn id(&self) -> StarId {
        self.current.id
    }

    /// True when this update flipped the row from free to claimed.
    pub fn is_claim_transition(&self) -> bool {
        !self.previous.is_claimed && self.current.is_claimed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::star::{ClaimPatch, StarColor};
    use chrono::Utc;

    #[test]
    fn detects_claim_transition() {
        let free = Star::unclaimed(StarId(5), 1.0, 1.0, 1.0);
        let claimed = free.with_claim(&ClaimPatch {
            owner_ref: "u".into(),
            owner_name: None,
            message: None,
            color: StarColor::Cyan,
            claimed_at: Utc::now(),
        });

        let flip = ChangeEvent::new(free.clone(), claimed.clone());
        assert!(flip.is_claim_transition());
        assert_eq!(flip.id(), StarId(5));

        let replay = ChangeEvent::new(claimed.clone(), claimed);
        assert!(!replay.is_claim_transition());
    }
}
