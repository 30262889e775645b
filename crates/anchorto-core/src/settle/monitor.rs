//! Post-settle layout monitor
//!
//! After scrolling, images and embeds above the destination may still be
//! loading. The monitor watches the layout until it has been quiet for a
//! while (or a hard limit passes) so a final correction can land on the
//! settled position.

use std::future::pending;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::debug;

use crate::config::SettleConfig;
use crate::host::Page;
use crate::scroll::timing::has_elapsed;

/// Why a monitoring window closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettleReason {
    /// No layout change for the whole quiet window
    Quiet,
    /// The window reached its maximum length
    MaxWait,
}

/// Timing state of one monitoring window
#[derive(Debug, Clone)]
pub struct SettlementWindow {
    start_time: Instant,
    last_change_time: Instant,
    max_wait: Duration,
    quiet_window: Duration,
    changes: u32,
}

impl SettlementWindow {
    pub fn new(now: Instant, max_wait: Duration, quiet_window: Duration) -> Self {
        Self {
            start_time: now,
            last_change_time: now,
            max_wait,
            quiet_window,
            changes: 0,
        }
    }

    pub fn record_change(&mut self, now: Instant) {
        self.last_change_time = now;
        self.changes += 1;
    }

    /// `Some` once the window should close
    pub fn verdict(&self, now: Instant) -> Option<SettleReason> {
        if has_elapsed(self.start_time, now, self.max_wait) {
            Some(SettleReason::MaxWait)
        } else if has_elapsed(self.last_change_time, now, self.quiet_window) {
            Some(SettleReason::Quiet)
        } else {
            None
        }
    }

    pub fn changes(&self) -> u32 {
        self.changes
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.start_time)
    }
}

/// How a monitor run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MonitorOutcome {
    Settled {
        reason: SettleReason,
        /// Layout changes observed while the window was open
        changes: u32,
        elapsed_ms: u64,
    },
    /// Superseded by a newer monitor
    Cancelled,
}

/// Watch the page's layout until it settles
///
/// Waits `initial_delay` first, then records every change reported by the
/// page's layout channel. Without a channel the content height is polled on
/// each check tick instead. The window closes on the first check tick where
/// `max_wait` or `quiet_window` has passed, or as soon as `cancel` turns
/// `true`.
pub async fn watch_layout<P: Page>(
    page: &P,
    config: &SettleConfig,
    cancel: &mut watch::Receiver<bool>,
) -> MonitorOutcome {
    tokio::select! {
        _ = sleep(config.initial_delay()) => {}
        _ = cancelled(cancel) => return MonitorOutcome::Cancelled,
    }

    let mut window = SettlementWindow::new(Instant::now(), config.max_wait(), config.quiet_window());
    let mut observer = page.layout_changes();
    let mut last_height = page.content_height();

    let mut ticks = interval(config.check_interval());
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Skip the first tick (fires immediately)
    ticks.tick().await;

    debug!(
        observer = observer.is_some(),
        max_wait_ms = config.post_settle_max_wait_ms,
        quiet_window_ms = config.post_settle_quiet_window_ms,
        "Post-settle monitor started"
    );

    loop {
        tokio::select! {
            _ = cancelled(cancel) => {
                debug!("Post-settle monitor superseded");
                return MonitorOutcome::Cancelled;
            }

            changed = next_change(&mut observer) => {
                match changed {
                    Ok(()) => window.record_change(Instant::now()),
                    Err(_) => {
                        debug!("Layout observer closed, falling back to polling");
                        observer = None;
                    }
                }
            }

            _ = ticks.tick() => {
                let now = Instant::now();
                if observer.is_none() {
                    let height = page.content_height();
                    if height != last_height {
                        last_height = height;
                        window.record_change(now);
                    }
                }

                if let Some(reason) = window.verdict(now) {
                    let elapsed_ms = window.elapsed(now).as_millis() as u64;
                    debug!(?reason, changes = window.changes(), elapsed_ms, "Layout settled");
                    return MonitorOutcome::Settled {
                        reason,
                        changes: window.changes(),
                        elapsed_ms,
                    };
                }
            }
        }
    }
}

async fn next_change(
    observer: &mut Option<watch::Receiver<u64>>,
) -> Result<(), watch::error::RecvError> {
    match observer {
        Some(rx) => rx.changed().await,
        None => pending().await,
    }
}

/// Resolves once `cancel` holds `true`; never if the sender is gone
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            pending::<()>().await;
        }
    }
}

/// Keeps at most one live monitor: claiming a new slot cancels the previous
/// holder.
#[derive(Debug, Default)]
pub struct MonitorSlot {
    current: Mutex<Option<watch::Sender<bool>>>,
}

impl MonitorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the running monitor, if any, and hand out the cancel signal of
    /// the next one.
    pub fn claim(&self) -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(tx);
        if let Some(previous) = previous {
            // Err only means that monitor already finished
            let _ = previous.send(true);
        }
        rx
    }

    /// Cancel the running monitor without starting another
    pub fn cancel(&self) {
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(previous) = previous {
            let _ = previous.send(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessPage;
    use std::sync::Arc;

    fn config(max_wait: u64, quiet: u64) -> SettleConfig {
        SettleConfig {
            post_settle_adjust: true,
            post_settle_max_wait_ms: max_wait,
            post_settle_quiet_window_ms: quiet,
            post_settle_initial_delay_ms: 100,
            post_settle_check_interval_ms: 100,
            ..Default::default()
        }
    }

    fn page() -> HeadlessPage {
        HeadlessPage::new(600.0).with_sections([("hero", 800.0), ("gallery", 400.0), ("contact", 900.0)])
    }

    #[test]
    fn test_window_verdict() {
        let start = Instant::now();
        let mut window =
            SettlementWindow::new(start, Duration::from_millis(1000), Duration::from_millis(300));
        assert_eq!(window.verdict(start + Duration::from_millis(200)), None);

        window.record_change(start + Duration::from_millis(200));
        assert_eq!(window.verdict(start + Duration::from_millis(400)), None);
        assert_eq!(
            window.verdict(start + Duration::from_millis(500)),
            Some(SettleReason::Quiet)
        );
        assert_eq!(
            window.verdict(start + Duration::from_millis(1000)),
            Some(SettleReason::MaxWait)
        );
        assert_eq!(window.changes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_page_stops_at_max_wait() {
        let page = page();
        let (_tx, mut rx) = watch::channel(false);
        let started = Instant::now();

        let outcome = watch_layout(&page, &config(1000, 5000), &mut rx).await;

        match outcome {
            MonitorOutcome::Settled { reason, changes, elapsed_ms } => {
                assert_eq!(reason, SettleReason::MaxWait);
                assert_eq!(changes, 0);
                assert!((1000..1100).contains(&elapsed_ms), "elapsed {}", elapsed_ms);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        // initial delay + max wait
        let total = started.elapsed();
        assert!(total >= Duration::from_millis(1100) && total < Duration::from_millis(1200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_fallback_sees_height_changes() {
        let page = Arc::new(page());
        let (_tx, mut rx) = watch::channel(false);

        let loader = page.clone();
        tokio::spawn(async move {
            for height in [500.0, 650.0, 700.0] {
                tokio::time::sleep(Duration::from_millis(250)).await;
                loader.resize_section("gallery", height);
            }
        });

        let outcome = watch_layout(page.as_ref(), &config(3000, 400), &mut rx).await;

        match outcome {
            MonitorOutcome::Settled { reason, changes, elapsed_ms } => {
                assert_eq!(reason, SettleReason::Quiet);
                assert_eq!(changes, 3);
                // last resize at 750ms, seen on the 800ms tick, quiet by 1200ms
                assert!((1000..=1200).contains(&elapsed_ms), "elapsed {}", elapsed_ms);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_changes_reset_quiet_window() {
        let page = Arc::new(page().with_layout_observer());
        let (_tx, mut rx) = watch::channel(false);

        let loader = page.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(350)).await;
            loader.resize_section("hero", 1200.0);
        });

        let outcome = watch_layout(page.as_ref(), &config(3000, 400), &mut rx).await;

        match outcome {
            MonitorOutcome::Settled { reason, changes, .. } => {
                assert_eq!(reason, SettleReason::Quiet);
                assert_eq!(changes, 1);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_claiming_slot_cancels_previous_monitor() {
        let page = Arc::new(page());
        let slot = MonitorSlot::new();

        let mut first_rx = slot.claim();
        let first_page = page.clone();
        let first = tokio::spawn(async move {
            watch_layout(first_page.as_ref(), &config(3000, 5000), &mut first_rx).await
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        let mut second_rx = slot.claim();

        assert_eq!(first.await.unwrap(), MonitorOutcome::Cancelled);
        let second = watch_layout(page.as_ref(), &config(1000, 5000), &mut second_rx).await;
        assert!(matches!(second, MonitorOutcome::Settled { reason: SettleReason::MaxWait, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_initial_delay() {
        let page = page();
        let slot = MonitorSlot::new();
        let mut rx = slot.claim();
        slot.cancel();

        assert_eq!(
            watch_layout(&page, &config(1000, 400), &mut rx).await,
            MonitorOutcome::Cancelled
        );
    }
}
