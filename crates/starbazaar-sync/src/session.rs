//! One client's explorer session.
//!
//! Cooperative and single-threaded: `tick` runs every frame and never awaits;
//! store calls happen in the async methods between ticks. Notifications are
//! buffered by the subscription and merged at the start of a tick, so a frame
//! never sees a half-applied projection.

use crate::coordinator::{ClaimCoordinator, ClaimForm, ClaimResult};
use crate::error::{Error, Result};
use crate::identity::{Claimant, Clock, SystemClock};
use crate::live_view::{LiveView, LiveViewConfig, DEFAULT_PROJECTION_CAP};
use crate::search;
use crate::stats::{ClaimProgress, DailyTally, DAILY_GOAL};
use rand::Rng;
use starbazaar_field::{hover_label, CameraRig, FadeIn, Pose, WarpConfig};
use starbazaar_store::{ChangeSubscription, RecordStore, Star, StarFilter, StarId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Session settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExplorerConfig {
    pub projection_cap: usize,
    pub warp: WarpConfig,
    pub daily_goal: u64,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            projection_cap: DEFAULT_PROJECTION_CAP,
            warp: WarpConfig::default(),
            daily_goal: DAILY_GOAL,
        }
    }
}

impl ExplorerConfig {
    #[must_use]
    pub fn with_projection_cap(mut self, cap: usize) -> Self {
        self.projection_cap = cap;
        self
    }

    #[must_use]
    pub fn with_warp(mut self, warp: WarpConfig) -> Self {
        self.warp = warp;
        self
    }

    #[must_use]
    pub fn with_daily_goal(mut self, goal: u64) -> Self {
        self.daily_goal = goal;
        self
    }
}

pub struct Explorer {
    store: Arc<dyn RecordStore>,
    coordinator: ClaimCoordinator,
    clock: Arc<dyn Clock>,
    view: LiveView,
    rig: CameraRig,
    fade: FadeIn,
    subscription: Option<ChangeSubscription>,
    selection: Option<Star>,
    hovered: Option<StarId>,
    claimant: Option<Claimant>,
    form: ClaimForm,
    claim_panel_open: bool,
    loads_seen: u64,
}

impl Explorer {
    /// Open the subscription, then load the projection and counts.
    pub async fn mount(store: Arc<dyn RecordStore>, config: ExplorerConfig) -> Result<Self> {
        Self::mount_with_clock(store, config, Arc::new(SystemClock)).await
    }

    pub async fn mount_with_clock(
        store: Arc<dyn RecordStore>,
        config: ExplorerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        // Subscribe first so nothing committed during the load is missed.
        let subscription = store.subscribe_changes(StarFilter::all());

        let mut view = LiveView::new(LiveViewConfig {
            projection_cap: config.projection_cap,
            daily_goal: config.daily_goal,
        });
        view.hydrate(store.as_ref(), clock.now()).await?;
        info!("Explorer mounted with {} stars", view.len());

        Ok(Self {
            coordinator: ClaimCoordinator::with_clock(store.clone(), clock.clone()),
            store,
            clock,
            view,
            rig: CameraRig::new(config.warp),
            fade: FadeIn::new(),
            subscription: Some(subscription),
            selection: None,
            hovered: None,
            claimant: None,
            form: ClaimForm::default(),
            claim_panel_open: false,
            loads_seen: 1,
        })
    }

    /// Release the change subscription. Further ticks only animate.
    pub fn unmount(&mut self) {
        if self.subscription.take().is_some() {
            info!("Explorer unmounted");
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn sign_in(&mut self, claimant: Claimant) {
        debug!("Signed in as {}", claimant.id());
        self.claimant = Some(claimant);
    }

    pub fn sign_out(&mut self) {
        self.claimant = None;
    }

    /// Click on a rendered star: claimed stars are only selected, free stars
    /// also open the claim panel.
    pub fn on_star_click(&mut self, star: &Star) {
        self.select(star.clone());
        if !star.is_claimed {
            self.claim_panel_open = true;
        }
    }

    pub fn on_star_hover(&mut self, id: Option<StarId>) {
        self.hovered = id;
    }

    /// Tooltip for the hovered star, when it is projected.
    pub fn hover_text(&self) -> Option<String> {
        self.hovered
            .and_then(|id| self.view.get(id))
            .map(hover_label)
    }

    /// Fly to a star picked from a list, e.g. the user's own stars.
    pub fn jump_to_star(&mut self, star: &Star) {
        self.select(star.clone());
    }

    /// Select and fly to a uniformly chosen free star of the loaded set.
    pub fn select_random_free_star<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Star> {
        let star = self.view.random_free_star(rng).cloned()?;
        self.select(star.clone());
        Some(star)
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
        self.rig.navigate(None);
    }

    pub fn open_claim_panel(&mut self) {
        self.claim_panel_open = true;
    }

    /// Close the panel; typed input is discarded.
    pub fn close_claim_panel(&mut self) {
        self.claim_panel_open = false;
        self.form.reset();
    }

    fn select(&mut self, star: Star) {
        self.rig.navigate(Some(&star));
        self.selection = Some(star);
    }

    /// Advance one frame.
    pub fn tick(&mut self, dt: f32) -> Pose {
        self.pump();
        if self.view.loads() != self.loads_seen {
            self.loads_seen = self.view.loads();
            self.fade.reset();
        }
        self.fade.tick(dt);
        self.rig.tick(dt).pose
    }

    /// Merge every buffered notification. Returns how many were applied.
    fn pump(&mut self) -> usize {
        let Some(subscription) = self.subscription.as_mut() else {
            return 0;
        };
        let deliveries = subscription.drain();
        let applied = deliveries.len();

        for delivery in deliveries {
            if let starbazaar_store::Delivery::Change(event) = &delivery {
                if let Some(selected) = self.selection.as_mut() {
                    if selected.id == event.id() {
                        *selected = event.current.clone();
                    }
                }
            }
            self.view.apply_delivery(delivery);
        }
        applied
    }

    /// Run recounts and rehydrates requested since the last call.
    pub async fn reconcile(&mut self) -> Result<()> {
        let now = self.clock.now();
        if self.view.needs_rehydrate() {
            self.view.hydrate(self.store.as_ref(), now).await?;
        } else if self.view.check_day_rollover(now) {
            self.view.recount(self.store.as_ref(), now).await?;
        }
        Ok(())
    }

    /// Claim the selected star with the typed form.
    ///
    /// The form is kept on every failure and reset on success.
    pub async fn submit_claim(&mut self) -> Result<Star> {
        let star = self.selection.clone().ok_or_else(|| {
            Error::PreconditionFailed("First click on a free star in the sky.".into())
        })?;
        let claimant = self.claimant.clone().ok_or_else(|| {
            Error::PreconditionFailed("You need to log in before claiming a star.".into())
        })?;

        match self.coordinator.claim(&star, &claimant, &self.form).await? {
            ClaimResult::Claimed(claimed) => {
                self.view.apply_local_claim(&claimed);
                self.selection = Some(claimed.clone());
                self.close_claim_panel();
                Ok(claimed)
            }
            ClaimResult::AlreadyClaimed => {
                debug!("Star {} was taken before us", star.id);
                Err(Error::AlreadyClaimed)
            }
            ClaimResult::StoreUnavailable(reason) => {
                warn!("Claim failed, form kept: {}", reason);
                Err(Error::StoreUnavailable(reason))
            }
        }
    }

    /// Find a star by typed id; a hit is selected and flown to.
    pub async fn search_by_id(&mut self, input: &str) -> Result<Star> {
        let star = search::find_by_id(self.store.as_ref(), input).await?;
        self.select(star.clone());
        Ok(star)
    }

    /// Find the first star by message or owner text. Blank input does nothing.
    pub async fn search_by_text(&mut self, input: &str) -> Result<Option<Star>> {
        let found = search::find_by_text(self.store.as_ref(), input).await?;
        if let Some(star) = &found {
            self.select(star.clone());
        }
        Ok(found)
    }

    /// Stars owned by the signed-in claimant.
    pub async fn my_stars(&self) -> Result<Vec<Star>> {
        let claimant = self.claimant.as_ref().ok_or_else(|| {
            Error::PreconditionFailed("Log in to see your stars.".into())
        })?;
        search::stars_owned_by(self.store.as_ref(), claimant).await
    }

    pub async fn top_messages_today(&self) -> Result<Vec<Star>> {
        search::top_messages_today(self.store.as_ref(), self.clock.now()).await
    }

    /// Forward a user camera gesture. Ignored during a warp.
    pub fn apply_user_pose(&mut self, pose: Pose) -> bool {
        self.rig.apply_user_pose(pose)
    }

    pub fn view(&self) -> &LiveView {
        &self.view
    }

    pub fn camera(&self) -> &CameraRig {
        &self.rig
    }

    pub fn selection(&self) -> Option<&Star> {
        self.selection.as_ref()
    }

    pub fn claimant(&self) -> Option<&Claimant> {
        self.claimant.as_ref()
    }

    pub fn form(&self) -> &ClaimForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut ClaimForm {
        &mut self.form
    }

    pub fn is_claim_panel_open(&self) -> bool {
        self.claim_panel_open
    }

    pub fn progress(&self) -> ClaimProgress {
        self.view.progress()
    }

    pub fn today(&self) -> &DailyTally {
        self.view.today()
    }

    /// Global star opacity for this frame.
    pub fn opacity(&self) -> f32 {
        self.fade.opacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use starbazaar_field::{render_position, WarpPhase};
    use starbazaar_store::{ChangeEvent, ClaimPatch, MemoryStore, StarColor};
    use chrono::Utc;

    fn field(n: u64) -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        store
            .seed((1..=n).map(|i| Star::unclaimed(StarId(i), i as f64, 1.0, 0.0)))
            .unwrap();
        Arc::new(store)
    }

    async fn mount(store: &Arc<MemoryStore>, cap: usize) -> Explorer {
        let config = ExplorerConfig::default().with_projection_cap(cap);
        Explorer::mount(store.clone(), config).await.unwrap()
    }

    fn patch(owner: &str) -> ClaimPatch {
        ClaimPatch {
            owner_ref: owner.into(),
            owner_name: Some(owner.into()),
            message: Some("from elsewhere".into()),
            color: StarColor::Amber,
            claimed_at: Utc::now(),
        }
    }

    fn settle(explorer: &mut Explorer) -> Pose {
        let mut pose = explorer.tick(0.0);
        for _ in 0..200 {
            pose = explorer.tick(1.0 / 60.0);
        }
        pose
    }

    #[tokio::test]
    async fn claim_end_to_end() {
        let store = field(5);
        let mut explorer = mount(&store, 3).await;
        explorer.sign_in(Claimant::new("me", None).unwrap());

        let star = explorer.view().get(StarId(2)).cloned().unwrap();
        explorer.on_star_click(&star);
        assert!(explorer.is_claim_panel_open());
        *explorer.form_mut() = ClaimForm::new("Ana", "hi", StarColor::Emerald);

        let claimed = explorer.submit_claim().await.unwrap();
        assert_eq!(claimed.owner_ref.as_deref(), Some("me"));
        assert!(!explorer.is_claim_panel_open());
        assert_eq!(explorer.form(), &ClaimForm::default());
        assert!(explorer.view().is_unconfirmed(StarId(2)));
        assert_eq!(explorer.progress().claimed, 1);

        // Own notification confirms without double counting
        explorer.tick(0.016);
        assert!(!explorer.view().is_unconfirmed(StarId(2)));
        assert_eq!(explorer.progress().claimed, 1);
        assert_eq!(explorer.view().get(StarId(2)), Some(&claimed));
    }

    #[tokio::test]
    async fn lost_race_keeps_form() {
        let store = field(3);
        let mut explorer = mount(&store, 3).await;
        explorer.sign_in(Claimant::new("me", None).unwrap());

        let star = explorer.view().get(StarId(1)).cloned().unwrap();
        explorer.on_star_click(&star);
        *explorer.form_mut() = ClaimForm::new("Ana", "mine", StarColor::Cyan);

        store.conditional_claim(StarId(1), &patch("other")).await.unwrap();
        let err = explorer.submit_claim().await.unwrap_err();
        assert_eq!(err, Error::AlreadyClaimed);
        assert_eq!(explorer.form().message, "mine");
        assert!(explorer.is_claim_panel_open());

        // The winner's notification shows the star as taken
        explorer.tick(0.016);
        let shown = explorer.view().get(StarId(1)).unwrap();
        assert_eq!(shown.owner_ref.as_deref(), Some("other"));
        assert_eq!(explorer.selection().unwrap().owner_ref.as_deref(), Some("other"));
    }

    #[tokio::test]
    async fn claim_preconditions() {
        let store = field(2);
        let mut explorer = mount(&store, 2).await;

        explorer.sign_in(Claimant::new("me", None).unwrap());
        assert!(matches!(
            explorer.submit_claim().await,
            Err(Error::PreconditionFailed(_))
        ));

        explorer.sign_out();
        let star = explorer.view().get(StarId(1)).cloned().unwrap();
        explorer.on_star_click(&star);
        explorer.form_mut().message = "kept".into();
        assert!(matches!(
            explorer.submit_claim().await,
            Err(Error::PreconditionFailed(_))
        ));
        assert_eq!(explorer.form().message, "kept");
        assert!(!store.get_by_id(StarId(1)).await.unwrap().unwrap().is_claimed);
    }

    #[tokio::test]
    async fn offline_claim_is_retryable_and_keeps_form() {
        let store = field(2);
        let mut explorer = mount(&store, 2).await;
        explorer.sign_in(Claimant::new("me", None).unwrap());
        let star = explorer.view().get(StarId(2)).cloned().unwrap();
        explorer.on_star_click(&star);
        explorer.form_mut().name = "Ana".into();

        store.set_available(false);
        let err = explorer.submit_claim().await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(explorer.form().name, "Ana");

        store.set_available(true);
        assert!(explorer.submit_claim().await.is_ok());
    }

    #[tokio::test]
    async fn clicking_claimed_star_only_selects() {
        let store = field(2);
        store.conditional_claim(StarId(1), &patch("x")).await.unwrap();
        let mut explorer = mount(&store, 2).await;

        let star = explorer.view().get(StarId(1)).cloned().unwrap();
        explorer.on_star_click(&star);
        assert!(!explorer.is_claim_panel_open());
        assert_eq!(explorer.selection().map(|s| s.id), Some(StarId(1)));
        assert_eq!(explorer.camera().phase(), WarpPhase::WarpOut);
    }

    #[tokio::test]
    async fn outside_projection_claim_moves_only_aggregates() {
        let store = field(5);
        let mut explorer = mount(&store, 3).await;

        store.conditional_claim(StarId(5), &patch("b")).await.unwrap();
        explorer.tick(0.016);
        assert!(explorer.view().get(StarId(5)).is_none());
        assert_eq!(explorer.progress().claimed, 1);
        assert!(explorer.view().needs_recount());

        explorer.reconcile().await.unwrap();
        assert!(!explorer.view().needs_recount());
        assert_eq!(explorer.progress(), ClaimProgress::new(5, 1));
    }

    #[tokio::test]
    async fn replayed_notification_is_idempotent() {
        let store = field(3);
        let mut explorer = mount(&store, 3).await;

        store.conditional_claim(StarId(3), &patch("b")).await.unwrap();
        explorer.tick(0.016);
        let current = store.get_by_id(StarId(3)).await.unwrap().unwrap();
        let previous = Star::unclaimed(StarId(3), 3.0, 1.0, 0.0);
        store.replay(ChangeEvent::new(previous, current.clone()));
        explorer.tick(0.016);

        assert_eq!(explorer.progress().claimed, 1);
        assert_eq!(explorer.today().count(), 1);
        assert_eq!(explorer.view().get(StarId(3)), Some(&current));
    }

    #[tokio::test]
    async fn two_explorers_race_for_star_three() {
        let store = field(5);
        let mut first = mount(&store, 5).await;
        let mut second = mount(&store, 5).await;
        first.sign_in(Claimant::new("U1", None).unwrap());
        second.sign_in(Claimant::new("U2", None).unwrap());

        // Both pick star 3 while it is still free
        let star = first.view().get(StarId(3)).cloned().unwrap();
        first.on_star_click(&star);
        second.on_star_click(&star);
        *first.form_mut() = ClaimForm::new("One", "hi", StarColor::Cyan);
        *second.form_mut() = ClaimForm::new("Two", "mine", StarColor::Amber);

        let claimed = first.submit_claim().await.unwrap();
        assert_eq!(claimed.owner_ref.as_deref(), Some("U1"));
        assert_eq!(claimed.color, StarColor::Cyan);
        assert_eq!(claimed.message.as_deref(), Some("hi"));

        assert_eq!(second.submit_claim().await.unwrap_err(), Error::AlreadyClaimed);

        for explorer in [&mut first, &mut second] {
            explorer.tick(0.016);
            explorer.reconcile().await.unwrap();
            assert_eq!(explorer.progress(), ClaimProgress::new(5, 1));
        }

        let found = second.search_by_id("3").await.unwrap();
        assert_eq!(found.owner_ref.as_deref(), Some("U1"));
        assert!(matches!(
            second.search_by_id("99").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn id_search_flies_to_hit() {
        let store = field(100);
        let mut explorer = mount(&store, 10).await;

        let star = explorer.search_by_id("42").await.unwrap();
        assert_eq!(explorer.selection().map(|s| s.id), Some(StarId(42)));
        let pose = settle(&mut explorer);
        assert_eq!(explorer.camera().phase(), WarpPhase::Idle);
        assert!(pose.target.abs_diff_eq(render_position(&star), 1e-4));

        assert!(matches!(
            explorer.search_by_id("abc").await,
            Err(Error::PreconditionFailed(_))
        ));
        assert!(matches!(
            explorer.search_by_id("99999").await,
            Err(Error::NotFound(_))
        ));
        assert_eq!(explorer.selection().map(|s| s.id), Some(StarId(42)));
    }

    #[tokio::test]
    async fn blank_text_search_is_noop() {
        let store = field(3);
        let mut explorer = mount(&store, 3).await;
        assert_eq!(explorer.search_by_text("  ").await.unwrap(), None);
        assert!(explorer.selection().is_none());
        assert_eq!(explorer.camera().phase(), WarpPhase::Idle);
    }

    #[tokio::test]
    async fn random_free_star_is_free_and_selected() {
        let store = field(4);
        store.conditional_claim(StarId(1), &patch("x")).await.unwrap();
        let mut explorer = mount(&store, 4).await;

        let mut rng = StdRng::seed_from_u64(11);
        let star = explorer.select_random_free_star(&mut rng).unwrap();
        assert!(!star.is_claimed);
        assert_eq!(explorer.selection(), Some(&star));
    }

    #[tokio::test]
    async fn my_stars_requires_identity() {
        let store = field(4);
        store.conditional_claim(StarId(3), &patch("me")).await.unwrap();
        let mut explorer = mount(&store, 4).await;

        assert!(explorer.my_stars().await.is_err());
        explorer.sign_in(Claimant::new("me", None).unwrap());
        let mine = explorer.my_stars().await.unwrap();
        assert_eq!(mine.iter().map(|s| s.id).collect::<Vec<_>>(), vec![StarId(3)]);

        explorer.jump_to_star(&mine[0]);
        assert_eq!(explorer.camera().target(), Some(StarId(3)));
        assert_eq!(explorer.top_messages_today().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn user_pose_only_applies_when_idle() {
        let store = field(2);
        let mut explorer = mount(&store, 2).await;
        let moved = Pose::new(Vec3::new(3.0, 0.0, 9.0), Vec3::ZERO);

        assert!(explorer.apply_user_pose(moved));
        assert_eq!(explorer.tick(0.016), moved);

        let star = explorer.view().get(StarId(2)).cloned().unwrap();
        explorer.jump_to_star(&star);
        assert!(!explorer.apply_user_pose(Pose::default()));
    }

    #[tokio::test]
    async fn lag_rehydrates_and_restarts_fade() {
        let store = Arc::new(MemoryStore::with_feed_capacity(2));
        store
            .seed((1..=6).map(|i| Star::unclaimed(StarId(i), i as f64, 0.0, 0.0)))
            .unwrap();
        let mut explorer = mount(&store, 6).await;
        settle(&mut explorer);
        assert!((explorer.opacity() - 1.0).abs() < 1e-6);

        for id in 1..=5 {
            store.conditional_claim(StarId(id), &patch("flood")).await.unwrap();
        }
        explorer.tick(0.016);
        assert!(explorer.view().needs_rehydrate());

        explorer.reconcile().await.unwrap();
        assert_eq!(explorer.progress(), ClaimProgress::new(6, 5));
        assert_eq!(explorer.view().stars().filter(|s| s.is_claimed).count(), 5);

        explorer.tick(0.0);
        assert!(explorer.opacity() < 0.2);
    }

    #[tokio::test]
    async fn unmount_releases_subscription() {
        let store = field(2);
        let mut explorer = mount(&store, 2).await;
        assert_eq!(store.feed().subscriber_count(), 1);

        explorer.unmount();
        assert!(!explorer.is_mounted());
        assert_eq!(store.feed().subscriber_count(), 0);

        store.conditional_claim(StarId(1), &patch("x")).await.unwrap();
        explorer.tick(0.016);
        assert!(!explorer.view().get(StarId(1)).unwrap().is_claimed);
    }
}
