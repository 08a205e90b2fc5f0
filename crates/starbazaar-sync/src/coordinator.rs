//! Claim coordination.
//!
//! A claim is one conditional update against the store. The store decides the
//! race; the coordinator only translates the row count into an outcome.

use crate::error::{Error, Result};
use crate::identity::{Claimant, Clock, SystemClock};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use starbazaar_store::{
    ClaimPatch, RecordStore, Star, StarColor, ANONYMOUS_OWNER, MAX_MESSAGE_CHARS,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the user typed into the claim panel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub color: StarColor,
}

impl ClaimForm {
    pub fn new(name: impl Into<String>, message: impl Into<String>, color: StarColor) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            color,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let chars = self.message.trim().chars().count();
        if chars > MAX_MESSAGE_CHARS {
            return Err(Error::PreconditionFailed(format!(
                "Messages are limited to {} characters ({} given).",
                MAX_MESSAGE_CHARS, chars
            )));
        }
        Ok(())
    }

    /// Build the claim write for `claimant` at `claimed_at`.
    ///
    /// A blank name becomes "Anonymous"; a blank message is stored as absent.
    pub fn to_patch(&self, claimant: &Claimant, claimed_at: DateTime<Utc>) -> Result<ClaimPatch> {
        self.validate()?;

        let name = match self.name.trim() {
            "" => ANONYMOUS_OWNER,
            name => name,
        };
        let message = self.message.trim();
        Ok(ClaimPatch {
            owner_ref: claimant.id().to_string(),
            owner_name: Some(name.to_string()),
            message: (!message.is_empty()).then(|| message.to_string()),
            color: self.color,
            claimed_at,
        })
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Outcome of one claim attempt. Always definite once the store answered.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimResult {
    /// The write applied; carries the claimed snapshot.
    Claimed(Star),
    /// No free row matched: lost a race or the selection was stale.
    AlreadyClaimed,
    /// The store call failed. Safe to retry.
    StoreUnavailable(String),
}

impl ClaimResult {
    pub fn is_claimed(&self) -> bool {
        matches!(self, ClaimResult::Claimed(_))
    }

    /// Collapse into the session error taxonomy.
    pub fn into_result(self) -> Result<Star> {
        match self {
            ClaimResult::Claimed(star) => Ok(star),
            ClaimResult::AlreadyClaimed => Err(Error::AlreadyClaimed),
            ClaimResult::StoreUnavailable(reason) => Err(Error::StoreUnavailable(reason)),
        }
    }
}

/// Issues conditional claims against an injected store.
#[derive(Clone)]
pub struct ClaimCoordinator {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
}

impl ClaimCoordinator {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Try to claim `star` for `claimant`.
    ///
    /// `star` is the selected snapshot; only its id reaches the store, and
    /// the returned snapshot is built from it and the patch. Invalid input is
    /// an `Err` raised before any store call.
    pub async fn claim(
        &self,
        star: &Star,
        claimant: &Claimant,
        form: &ClaimForm,
    ) -> Result<ClaimResult> {
        let patch = form.to_patch(claimant, self.clock.now())?;
        debug!("Claiming star {} for {}", star.id, claimant.id());

        match self.store.conditional_claim(star.id, &patch).await {
            Ok(count) if count.is_applied() => {
                info!("Star {} claimed by {}", star.id, claimant.id());
                Ok(ClaimResult::Claimed(star.with_claim(&patch)))
            }
            Ok(_) => {
                debug!("Star {} was already claimed", star.id);
                Ok(ClaimResult::AlreadyClaimed)
            }
            Err(e) => {
                warn!("Claim on star {} failed: {}", star.id, e);
                Ok(ClaimResult::StoreUnavailable(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use starbazaar_store::{MemoryStore, StarId};

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn field(n: u64) -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        store
            .seed((1..=n).map(|i| Star::unclaimed(StarId(i), i as f64, 0.0, 0.0)))
            .unwrap();
        Arc::new(store)
    }

    fn claimant(id: &str) -> Claimant {
        Claimant::new(id, None).unwrap()
    }

    #[tokio::test]
    async fn claim_builds_snapshot_from_patch() {
        let store = field(3);
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let coordinator = ClaimCoordinator::with_clock(store.clone(), Arc::new(FixedClock(at)));
        let star = store.get_by_id(StarId(2)).await.unwrap().unwrap();

        let form = ClaimForm::new("  ", "  hello  ", StarColor::Amber);
        let result = coordinator.claim(&star, &claimant("u1"), &form).await.unwrap();

        let ClaimResult::Claimed(claimed) = result else {
            panic!("expected a claim");
        };
        assert_eq!(claimed.owner_name.as_deref(), Some(ANONYMOUS_OWNER));
        assert_eq!(claimed.message.as_deref(), Some("hello"));
        assert_eq!(claimed.claimed_at, Some(at));
        assert_eq!(claimed.coords(), star.coords());
        assert_eq!(store.get_by_id(StarId(2)).await.unwrap(), Some(claimed));
    }

    #[tokio::test]
    async fn second_claim_is_already_claimed() {
        let store = field(1);
        let coordinator = ClaimCoordinator::new(store.clone());
        let star = store.get_by_id(StarId(1)).await.unwrap().unwrap();

        let first = coordinator.claim(&star, &claimant("a"), &ClaimForm::default()).await;
        assert!(first.unwrap().is_claimed());

        // stale snapshot still shows the star as free
        let second = coordinator.claim(&star, &claimant("b"), &ClaimForm::default()).await;
        assert_eq!(second.unwrap(), ClaimResult::AlreadyClaimed);

        let row = store.get_by_id(StarId(1)).await.unwrap().unwrap();
        assert_eq!(row.owner_ref.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn long_message_never_reaches_store() {
        let store = field(1);
        let coordinator = ClaimCoordinator::new(store.clone());
        let star = store.get_by_id(StarId(1)).await.unwrap().unwrap();

        let form = ClaimForm::new("x", "m".repeat(MAX_MESSAGE_CHARS + 1), StarColor::Cyan);
        let err = coordinator.claim(&star, &claimant("a"), &form).await.unwrap_err();
        assert!(matches!(err, Error::PreconditionFailed(_)));
        assert!(!store.get_by_id(StarId(1)).await.unwrap().unwrap().is_claimed);
    }

    #[tokio::test]
    async fn offline_store_is_retryable_outcome() {
        let store = field(1);
        let coordinator = ClaimCoordinator::new(store.clone());
        let star = store.get_by_id(StarId(1)).await.unwrap().unwrap();
        store.set_available(false);

        let result = coordinator
            .claim(&star, &claimant("a"), &ClaimForm::default())
            .await
            .unwrap();
        let err = result.into_result().unwrap_err();
        assert!(err.is_retryable());

        store.set_available(true);
        let retry = coordinator.claim(&star, &claimant("a"), &ClaimForm::default()).await;
        assert!(retry.unwrap().is_claimed());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_resolve_to_one_winner() {
        let store = field(1);
        let coordinator = ClaimCoordinator::new(store.clone());
        let star = store.get_by_id(StarId(1)).await.unwrap().unwrap();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let coordinator = coordinator.clone();
                let star = star.clone();
                tokio::spawn(async move {
                    let who = claimant(&format!("user-{}", i));
                    coordinator.claim(&star, &who, &ClaimForm::default()).await
                })
            })
            .collect();

        let mut won = 0;
        let mut lost = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                ClaimResult::Claimed(_) => won += 1,
                ClaimResult::AlreadyClaimed => lost += 1,
                ClaimResult::StoreUnavailable(e) => panic!("unexpected failure: {}", e),
            }
        }
        assert_eq!(won, 1);
        assert_eq!(lost, 15);
    }
}
