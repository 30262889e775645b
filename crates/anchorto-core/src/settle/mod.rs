//! Settlement correction after the primary scroll animation
//!
//! - `corrector` - immediate micro-adjust against a fresh measurement
//! - `monitor` - post-settle layout monitor and its one-at-a-time slot

pub mod corrector;
pub mod monitor;

pub use corrector::{correct, Correction};
pub use monitor::{watch_layout, MonitorOutcome, MonitorSlot, SettleReason, SettlementWindow};

use serde::Serialize;
use tokio::sync::watch;

use crate::config::SettleConfig;
use crate::host::Page;
use crate::scroll::ScrollAnimator;

/// Result of a post-settle pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SettleReport {
    pub outcome: MonitorOutcome,
    /// Final correction; `None` when the monitor was cancelled
    pub correction: Option<Correction>,
}

/// Monitor the layout, then run one final micro-adjust against the
/// re-measured destination
pub async fn settle_after<P, F>(
    animator: &ScrollAnimator<P>,
    config: &SettleConfig,
    measure_target: F,
    mut cancel: watch::Receiver<bool>,
) -> SettleReport
where
    P: Page,
    F: Fn() -> Option<f64>,
{
    let outcome = watch_layout(animator.page().as_ref(), config, &mut cancel).await;

    let correction = match outcome {
        MonitorOutcome::Cancelled => None,
        MonitorOutcome::Settled { .. } => Some(
            correct(
                animator,
                measure_target,
                config.micro_adjust_threshold,
                config.micro_adjust_duration(),
            )
            .await,
        ),
    };

    SettleReport {
        outcome,
        correction,
    }
}
