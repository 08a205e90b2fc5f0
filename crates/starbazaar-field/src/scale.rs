//! Logical coordinates to render space.

use glam::Vec3;
use starbazaar_store::Star;

/// Visual scale applied to every stored coordinate. Star placement and
/// camera targets both go through [`render_position`]; nothing else may
/// scale coordinates.
pub const SCALE: f64 = 0.6;

/// Render-space position of a star.
pub fn render_position(star: &Star) -> Vec3 {
    to_render_space(star.coords())
}

/// Render-space position of raw logical coordinates.
pub fn to_render_space([x, y, z]: [f64; 3]) -> Vec3 {
    Vec3::new((x * SCALE) as f32, (y * SCALE) as f32, (z * SCALE) as f32)
}
