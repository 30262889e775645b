//! Quadratic ease-in-out used by every scroll animation
//!
//! Both the primary animation and the settlement corrections sample the same
//! curve, so a correction never looks different from the scroll before it.

/// Position at `elapsed` ms of an animation from `start` covering `distance`
/// px in `duration` ms.
///
/// Accelerates over the first half and decelerates over the second:
/// `t = elapsed / (duration / 2)`; for `t < 1` the position is
/// `start + distance / 2 * t²`, otherwise with `t' = t - 1` it is
/// `start - distance / 2 * (t' * (t' - 2) - 1)`.
///
/// Callers handle `duration == 0` themselves; see
/// [`AnimationRun::step`](super::animation::AnimationRun::step).
#[inline]
pub fn ease_in_out_quad(elapsed: f64, start: f64, distance: f64, duration: f64) -> f64 {
    let t = elapsed / (duration / 2.0);
    if t < 1.0 {
        return distance / 2.0 * t * t + start;
    }
    let t = t - 1.0;
    -distance / 2.0 * (t * (t - 2.0) - 1.0) + start
}

/// Normalized form of [`ease_in_out_quad`]: maps progress in [0, 1] to [0, 1]
#[inline]
pub fn quad_in_out(progress: f64) -> f64 {
    ease_in_out_quad(progress.clamp(0.0, 1.0), 0.0, 1.0, 1.0)
}
