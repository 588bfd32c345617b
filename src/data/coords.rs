/// Coordinate normalization between region-relative pixel positions and the
/// unit square the network is trained against.
///
/// The vertical axis is flipped: `v = 1` is the top edge of the region.
/// Positions must already be expressed relative to the region origin (the
/// datastore's convention); nothing here subtracts `(x0, y0)`.
use crate::config::Region;

/// Pixel position → `(u, v)` in `[0,1]²`.
pub fn normalize(region: &Region, px: f32, py: f32) -> (f32, f32) {
    let u = px / region.width() as f32;
    let v = 1.0 - py / region.height() as f32;
    (u, v)
}

/// Exact inverse of [`normalize`] up to floating-point rounding.
pub fn denormalize(region: &Region, u: f32, v: f32) -> (f32, f32) {
    let px = u * region.width() as f32;
    let py = (1.0 - v) * region.height() as f32;
    (px, py)
}

/// Map a batch of network outputs back to region-relative pixels.
///
/// Returns a new vector; the predictions slice is never mutated, so callers
/// may keep a reference to the raw model output.
pub fn denormalize_batch(region: &Region, predictions: &[[f32; 2]]) -> Vec<(f32, f32)> {
    predictions
        .iter()
        .map(|p| denormalize(region, p[0], p[1]))
        .collect()
}
