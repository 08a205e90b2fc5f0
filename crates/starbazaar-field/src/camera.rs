//! Warp camera for navigating to a star.
//!
//! The rig owns the viewpoint only while a warp is running. A warp has two
//! phases:
//!
//! ```text
//!   Idle ──navigate──► WarpOut ──t≥1──► WarpIn ──t≥1──► Idle
//!                        ▲   │            │
//!                        └───┴─navigate───┘   (restart from the current pose)
//! ```
//!
//! `WarpOut` pulls back away from the destination while the gaze turns
//! halfway toward it; `WarpIn` dives to a fixed distance in front of the
//! star while the gaze completes the turn. In `Idle` the pose belongs to the
//! user (orbit controls); the rig never recenters on its own.

use crate::scale::render_position;
use glam::Vec3;
use starbazaar_store::{Star, StarId};
use tracing::debug;

/// Camera position plus the point it looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub target: Vec3,
}

impl Pose {
    pub fn new(position: Vec3, target: Vec3) -> Self {
        Self { position, target }
    }

    /// Component-wise approximate equality.
    pub fn abs_diff_eq(&self, other: &Pose, max_abs_diff: f32) -> bool {
        self.position.abs_diff_eq(other.position, max_abs_diff)
            && self.target.abs_diff_eq(other.target, max_abs_diff)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 12.0),
            target: Vec3::ZERO,
        }
    }
}

/// Warp timing and geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarpConfig {
    /// Distance from the star to the final camera position
    pub approach_distance: f32,
    /// How far the pull-back moves away from the destination
    pub overshoot: f32,
    /// Seconds spent in `WarpOut`
    pub out_duration: f32,
    /// Seconds spent in `WarpIn`
    pub in_duration: f32,
    /// Fraction of the gaze turn completed during `WarpOut`
    pub gaze_lead: f32,
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            approach_distance: 4.0,
            overshoot: 6.0,
            out_duration: 0.35,
            in_duration: 0.55,
            gaze_lead: 0.5,
        }
    }
}

/// Observable phase of the rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarpPhase {
    Idle,
    WarpOut,
    WarpIn,
}

/// Geometry of one warp, fixed when it starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Warp {
    /// Seconds elapsed in the current phase
    pub elapsed: f32,
    pub from: Pose,
    pub mid_position: Vec3,
    pub final_pose: Pose,
}

impl Warp {
    /// Plan a warp from `from` to a star whose render position is `final_target`.
    pub fn plan(from: Pose, final_target: Vec3, config: &WarpConfig) -> Self {
        let outward = final_target.try_normalize().unwrap_or(Vec3::Z);
        let final_position = final_target + outward * config.approach_distance;
        let away = (from.position - final_position).normalize_or_zero();
        Self {
            elapsed: 0.0,
            from,
            mid_position: from.position + away * config.overshoot,
            final_pose: Pose::new(final_position, final_target),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum RigState {
    Idle,
    WarpOut(Warp),
    WarpIn(Warp),
}

/// A phase change reported by the rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: WarpPhase,
    pub to: WarpPhase,
}

/// Result of one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub pose: Pose,
    pub transition: Option<Transition>,
}

/// Two-phase warp state machine.
#[derive(Debug, Clone)]
pub struct CameraRig {
    config: WarpConfig,
    state: RigState,
    pose: Pose,
    last_target: Option<StarId>,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self::new(WarpConfig::default())
    }
}

impl CameraRig {
    pub fn new(config: WarpConfig) -> Self {
        Self::with_pose(config, Pose::default())
    }

    pub fn with_pose(config: WarpConfig, pose: Pose) -> Self {
        Self {
            config,
            state: RigState::Idle,
            pose,
            last_target: None,
        }
    }

    pub fn phase(&self) -> WarpPhase {
        match self.state {
            RigState::Idle => WarpPhase::Idle,
            RigState::WarpOut(_) => WarpPhase::WarpOut,
            RigState::WarpIn(_) => WarpPhase::WarpIn,
        }
    }

    /// Current pose.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Star the rig last navigated to.
    pub fn target(&self) -> Option<StarId> {
        self.last_target
    }

    /// The running warp, if any.
    pub fn warp(&self) -> Option<&Warp> {
        match &self.state {
            RigState::Idle => None,
            RigState::WarpOut(w) | RigState::WarpIn(w) => Some(w),
        }
    }

    pub fn config(&self) -> &WarpConfig {
        &self.config
    }

    /// Point the rig at a star, or release it with `None`.
    ///
    /// The same star as last time is a no-op. Any other star restarts
    /// `WarpOut` from the current pose, dropping an unfinished warp.
    /// `None` stops in place and hands the pose back to the user.
    pub fn navigate(&mut self, star: Option<&Star>) -> Option<Transition> {
        let before = self.phase();
        match star {
            None => {
                self.last_target = None;
                self.state = RigState::Idle;
            }
            Some(star) if self.last_target == Some(star.id) => return None,
            Some(star) => {
                let warp = Warp::plan(self.pose, render_position(star), &self.config);
                debug!(
                    "Warp to star {} from {:?} ({:?})",
                    star.id, self.pose.position, before
                );
                self.last_target = Some(star.id);
                self.state = RigState::WarpOut(warp);
            }
        }
        let after = self.phase();
        (before != after).then_some(Transition { from: before, to: after })
    }

    /// Apply a user-driven pose. Ignored while a warp owns the camera.
    pub fn apply_user_pose(&mut self, pose: Pose) -> bool {
        if matches!(self.state, RigState::Idle) {
            self.pose = pose;
            true
        } else {
            false
        }
    }

    /// Advance by `dt` seconds. At most one phase change per call.
    pub fn tick(&mut self, dt: f32) -> Frame {
        let dt = dt.max(0.0);
        let (next, transition) = match self.state {
            RigState::Idle => (RigState::Idle, None),
            RigState::WarpOut(mut warp) => {
                warp.elapsed += dt;
                let t = progress(warp.elapsed, self.config.out_duration);
                self.pose = Pose::new(
                    warp.from.position.lerp(warp.mid_position, t),
                    warp.from
                        .target
                        .lerp(warp.final_pose.target, t * self.config.gaze_lead),
                );
                if t >= 1.0 {
                    warp.elapsed = 0.0;
                    (
                        RigState::WarpIn(warp),
                        Some(Transition { from: WarpPhase::WarpOut, to: WarpPhase::WarpIn }),
                    )
                } else {
                    (RigState::WarpOut(warp), None)
                }
            }
            RigState::WarpIn(mut warp) => {
                warp.elapsed += dt;
                let t = progress(warp.elapsed, self.config.in_duration);
                self.pose = Pose::new(
                    warp.mid_position.lerp(warp.final_pose.position, t),
                    warp.from.target.lerp(warp.final_pose.target, t),
                );
                if t >= 1.0 {
                    (
                        RigState::Idle,
                        Some(Transition { from: WarpPhase::WarpIn, to: WarpPhase::Idle }),
                    )
                } else {
                    (RigState::WarpIn(warp), None)
                }
            }
        };
        self.state = next;
        Frame {
            pose: self.pose,
            transition,
        }
    }
}

fn progress(elapsed: f32, duration: f32) -> f32 {
    if duration <= 0.0 {
        1.0
    } else {
        (elapsed / duration).min(1.0)
    }
}
