//! Immediate micro-adjust after an animation
//!
//! Between measuring the destination and the last frame, the layout may have
//! moved by rounding or by content loading above the destination. The
//! corrector measures again and runs a short animation if the viewport is
//! off by more than the threshold.

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::host::Page;
use crate::scroll::ScrollAnimator;

/// What a correction pass did
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Correction {
    /// Destination could not be measured; nothing was done
    Skipped,
    /// Viewport was already close enough
    WithinThreshold { drift: f64 },
    /// A corrective animation moved the viewport
    Adjusted { from: f64, to: f64, drift: f64 },
}

impl Correction {
    pub fn adjusted(&self) -> bool {
        matches!(self, Correction::Adjusted { .. })
    }
}

/// Re-measure the destination and animate to it over `duration` when the
/// viewport drifted more than `threshold` pixels away.
///
/// The target is clamped to the scrollable range, so a destination below the
/// last possible offset does not trigger endless corrections.
pub async fn correct<P, F>(
    animator: &ScrollAnimator<P>,
    measure_target: F,
    threshold: f64,
    duration: Duration,
) -> Correction
where
    P: Page,
    F: Fn() -> Option<f64>,
{
    let Some(target) = measure_target() else {
        debug!("Destination gone, skipping correction");
        return Correction::Skipped;
    };

    let page = animator.page();
    let target = target.clamp(0.0, page.max_scroll_y().max(0.0));
    let current = page.scroll_y();
    let drift = target - current;

    if drift.abs() <= threshold {
        return Correction::WithinThreshold { drift };
    }

    debug!(current, target, drift, "Correcting scroll drift");
    animator.animate(current, target, duration).await;

    Correction::Adjusted {
        from: current,
        to: target,
        drift,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessPage;
    use crate::scroll::ScriptedFrames;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn animator() -> (Arc<HeadlessPage>, ScrollAnimator<HeadlessPage>) {
        let page = Arc::new(HeadlessPage::new(600.0).with_sections([("a", 1000.0), ("b", 1000.0)]));
        let frames = Arc::new(ScriptedFrames::new([], 16.0));
        let animator = ScrollAnimator::new(page.clone(), frames);
        (page, animator)
    }

    #[tokio::test]
    async fn test_drift_above_threshold_is_corrected() {
        let (page, animator) = animator();
        page.set_scroll_y(990.0);

        let result = correct(&animator, || Some(1000.0), 2.0, Duration::from_millis(150)).await;

        assert_eq!(
            result,
            Correction::Adjusted {
                from: 990.0,
                to: 1000.0,
                drift: 10.0
            }
        );
        assert_eq!(page.scroll_y(), 1000.0);
    }

    #[tokio::test]
    async fn test_second_pass_is_a_no_op() {
        let (page, animator) = animator();
        page.set_scroll_y(900.0);

        let first = correct(&animator, || Some(1000.0), 2.0, Duration::from_millis(150)).await;
        assert!(first.adjusted());
        page.clear_trace();

        let second = correct(&animator, || Some(1000.0), 2.0, Duration::from_millis(150)).await;
        assert_eq!(second, Correction::WithinThreshold { drift: 0.0 });
        assert!(page.scroll_trace().is_empty());
    }

    #[tokio::test]
    async fn test_small_drift_is_left_alone() {
        let (page, animator) = animator();
        page.set_scroll_y(999.0);
        page.clear_trace();

        let result = correct(&animator, || Some(1000.5), 2.0, Duration::from_millis(150)).await;

        assert_eq!(result, Correction::WithinThreshold { drift: 1.5 });
        assert!(page.scroll_trace().is_empty());
    }

    #[tokio::test]
    async fn test_target_is_clamped_to_scroll_range() {
        let (page, animator) = animator();
        page.set_scroll_y(1400.0);

        // max scroll is 2000 - 600
        let result = correct(&animator, || Some(1900.0), 2.0, Duration::from_millis(150)).await;
        assert_eq!(result, Correction::WithinThreshold { drift: 0.0 });

        let result = correct(&animator, || Some(-50.0), 2.0, Duration::ZERO).await;
        assert_eq!(
            result,
            Correction::Adjusted {
                from: 1400.0,
                to: 0.0,
                drift: -1400.0
            }
        );
    }

    #[tokio::test]
    async fn test_missing_destination_is_skipped() {
        let (page, animator) = animator();
        page.set_scroll_y(300.0);
        let calls = AtomicUsize::new(0);

        let result = correct(
            &animator,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                None
            },
            2.0,
            Duration::from_millis(150),
        )
        .await;

        assert_eq!(result, Correction::Skipped);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(page.scroll_y(), 300.0);
    }
}
