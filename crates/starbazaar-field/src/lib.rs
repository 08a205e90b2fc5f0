//! StarBazaar Field
//!
//! Everything spatial about the universe of stars.
//!
//! # Architecture
//!
//! - **Scale**: [`render_position`], the single mapping from stored
//!   coordinates to render space (`coords * SCALE`)
//! - **Camera**: [`CameraRig`], the two-phase warp state machine that flies
//!   the viewpoint to a selected star
//! - **Appearance**: palette colors, sizes, hover labels, fade-in
//! - **Seed**: deterministic generation of the initial population
//!
//! # Usage
//!
//! ```ignore
//! let mut rig = CameraRig::default();
//! rig.navigate(Some(&star));
//! loop {
//!     let frame = rig.tick(dt);
//!     renderer.set_camera(frame.pose.position, frame.pose.target);
//! }
//! ```

mod appearance;
mod camera;
mod scale;
mod seed;

pub use appearance::{
    hover_label, palette_hex, FadeIn, StarAppearance, CLAIMED_RADIUS, FREE_RADIUS, FREE_STAR_HEX,
};
pub use camera::{CameraRig, Frame, Pose, Transition, Warp, WarpConfig, WarpPhase};
pub use scale::{render_position, to_render_space, SCALE};
pub use seed::{generate, FieldSpec};
