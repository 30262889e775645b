//! Scroll animation controller
//!
//! [`AnimationRun`] is the per-call animation state, stepped with frame
//! timestamps. [`ScrollAnimator`] drives runs against a [`Page`] using a
//! [`FrameScheduler`].

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::trace;

use super::easing::ease_in_out_quad;
use super::timing::{millis, FrameScheduler};
use crate::host::{Page, ScrollBehavior};

/// Result of feeding one frame timestamp into an [`AnimationRun`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Intermediate position, another frame is needed
    Frame(f64),
    /// Exact target position, the run is over
    Done(f64),
}

impl Step {
    pub fn position(self) -> f64 {
        match self {
            Step::Frame(y) | Step::Done(y) => y,
        }
    }
}

/// State of one animation from a start to a target offset
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationRun {
    start_position: f64,
    target_position: f64,
    distance: f64,
    duration_ms: f64,
    start_timestamp: Option<f64>,
}

impl AnimationRun {
    pub fn new(start_position: f64, target_position: f64, duration: Duration) -> Self {
        Self {
            start_position,
            target_position,
            distance: target_position - start_position,
            duration_ms: millis(duration),
            start_timestamp: None,
        }
    }

    pub fn start_position(&self) -> f64 {
        self.start_position
    }

    pub fn target_position(&self) -> f64 {
        self.target_position
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Advance to the frame at `timestamp` (ms)
    ///
    /// The first timestamp seen becomes the start of the run. Once the
    /// duration has elapsed the exact target is returned instead of an eased
    /// value, so rounding never leaves the viewport short of the target. A
    /// zero duration finishes on the first frame.
    pub fn step(&mut self, timestamp: f64) -> Step {
        let started = *self.start_timestamp.get_or_insert(timestamp);
        let elapsed = timestamp - started;

        if elapsed < self.duration_ms {
            Step::Frame(ease_in_out_quad(
                elapsed,
                self.start_position,
                self.distance,
                self.duration_ms,
            ))
        } else {
            Step::Done(self.target_position)
        }
    }
}

/// Summary of a finished animation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationReport {
    /// Number of frames written, including the final snap
    pub frames: usize,
    /// Position written by the last frame
    pub position: f64,
}

/// Shared hold on the `auto` scroll behavior
///
/// Overlapping runs on one page share a lock: the first holder captures the
/// page's behavior, the last one to leave restores it.
#[derive(Debug, Default)]
pub struct BehaviorLock {
    state: Mutex<BehaviorHold>,
}

#[derive(Debug, Default)]
struct BehaviorHold {
    holders: usize,
    prior: ScrollBehavior,
}

impl BehaviorLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of runs currently holding the page at `auto`
    pub fn holders(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).holders
    }

    fn acquire<P: Page>(&self, page: &P) {
        let mut hold = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if hold.holders == 0 {
            hold.prior = page.scroll_behavior();
            page.set_scroll_behavior(ScrollBehavior::Auto);
        }
        hold.holders += 1;
    }

    fn release<P: Page>(&self, page: &P) {
        let mut hold = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        hold.holders = hold.holders.saturating_sub(1);
        if hold.holders == 0 {
            page.set_scroll_behavior(hold.prior);
        }
    }
}

/// Drives [`AnimationRun`]s against a page, one frame at a time
pub struct ScrollAnimator<P: Page> {
    page: Arc<P>,
    frames: Arc<dyn FrameScheduler>,
    suppress_smooth_scroll: bool,
    behavior: Arc<BehaviorLock>,
}

impl<P: Page> Clone for ScrollAnimator<P> {
    fn clone(&self) -> Self {
        Self {
            page: self.page.clone(),
            frames: self.frames.clone(),
            suppress_smooth_scroll: self.suppress_smooth_scroll,
            behavior: self.behavior.clone(),
        }
    }
}

impl<P: Page> ScrollAnimator<P> {
    pub fn new(page: Arc<P>, frames: Arc<dyn FrameScheduler>) -> Self {
        Self {
            page,
            frames,
            suppress_smooth_scroll: false,
            behavior: Arc::new(BehaviorLock::new()),
        }
    }

    /// Force `auto` scroll behavior on the page while a run is in flight
    pub fn with_smooth_suppression(mut self, enabled: bool) -> Self {
        self.suppress_smooth_scroll = enabled;
        self
    }

    /// Share the behavior hold with other animators driving the same page
    pub fn with_behavior_lock(mut self, lock: Arc<BehaviorLock>) -> Self {
        self.behavior = lock;
        self
    }

    pub fn page(&self) -> &Arc<P> {
        &self.page
    }

    /// Animate the page's scroll offset from `from` to `to`
    pub async fn animate(&self, from: f64, to: f64, duration: Duration) -> AnimationReport {
        let page = self.page.clone();
        self.animate_with(from, to, duration, move |y| page.set_scroll_y(y))
            .await
    }

    /// Run an animation, handing every position to `on_frame`
    ///
    /// Resolves once, right after the exact target was handed over.
    pub async fn animate_with<F>(
        &self,
        from: f64,
        to: f64,
        duration: Duration,
        mut on_frame: F,
    ) -> AnimationReport
    where
        F: FnMut(f64) + Send,
    {
        let _behavior = self
            .suppress_smooth_scroll
            .then(|| BehaviorGuard::suspend(self.page.as_ref(), &self.behavior));

        let mut run = AnimationRun::new(from, to, duration);
        let mut frames = 0;
        trace!(from, to, duration_ms = duration.as_millis() as u64, "Animation started");

        loop {
            let timestamp = self.frames.next_frame().await;
            let step = run.step(timestamp);
            on_frame(step.position());
            frames += 1;

            if let Step::Done(position) = step {
                trace!(position, frames, "Animation finished");
                return AnimationReport { frames, position };
            }
        }
    }
}

/// Keeps one hold on the [`BehaviorLock`] for the lifetime of a run
struct BehaviorGuard<'a, P: Page> {
    page: &'a P,
    lock: &'a BehaviorLock,
}

impl<'a, P: Page> BehaviorGuard<'a, P> {
    fn suspend(page: &'a P, lock: &'a BehaviorLock) -> Self {
        lock.acquire(page);
        Self { page, lock }
    }
}

impl<P: Page> Drop for BehaviorGuard<'_, P> {
    fn drop(&mut self) {
        self.lock.release(self.page);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessPage;
    use crate::scroll::timing::{IntervalFrames, ScriptedFrames};

    fn layout() -> HeadlessPage {
        HeadlessPage::new(800.0).with_sections([
            ("intro", 1000.0),
            ("features", 1000.0),
            ("pricing", 1000.0),
        ])
    }

    fn page() -> Arc<HeadlessPage> {
        Arc::new(layout())
    }

    fn smooth_page() -> Arc<HeadlessPage> {
        Arc::new(layout().with_scroll_behavior(ScrollBehavior::Smooth))
    }

    #[test]
    fn test_sampled_positions() {
        let mut run = AnimationRun::new(100.0, 600.0, Duration::from_millis(300));
        assert_eq!(run.distance(), 500.0);
        assert_eq!(run.step(1000.0), Step::Frame(100.0));
        assert_eq!(run.step(1150.0), Step::Frame(350.0));
        assert_eq!(run.step(1300.0), Step::Done(600.0));
    }

    #[test]
    fn test_overshooting_frame_snaps_to_target() {
        let mut run = AnimationRun::new(0.0, 333.3, Duration::from_millis(100));
        run.step(0.0);
        assert_eq!(run.step(117.0), Step::Done(333.3));
    }

    #[test]
    fn test_zero_duration_snaps_on_first_frame() {
        let mut run = AnimationRun::new(40.0, 900.0, Duration::ZERO);
        assert_eq!(run.step(5.0), Step::Done(900.0));
    }

    #[tokio::test]
    async fn test_animate_with_scripted_frames() {
        let page = page();
        let frames = Arc::new(ScriptedFrames::new([0.0, 150.0, 300.0], 16.0));
        let animator = ScrollAnimator::new(page.clone(), frames);

        let mut seen = Vec::new();
        let report = animator
            .animate_with(0.0, 500.0, Duration::from_millis(300), |y| seen.push(y))
            .await;

        assert_eq!(seen, vec![0.0, 250.0, 500.0]);
        assert_eq!(report, AnimationReport { frames: 3, position: 500.0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_animate_writes_page_and_lands_exactly() {
        let page = page();
        let frames = Arc::new(IntervalFrames::new(Duration::from_millis(16)));
        let animator = ScrollAnimator::new(page.clone(), frames);

        let report = animator.animate(0.0, 1234.5, Duration::from_millis(200)).await;

        assert_eq!(page.scroll_y(), 1234.5);
        assert_eq!(report.position, 1234.5);
        assert!(report.frames > 1);
        let trace = page.scroll_trace();
        assert_eq!(trace.len(), report.frames);
        assert_eq!(trace.first().copied(), Some(0.0));
    }

    #[tokio::test]
    async fn test_zero_duration_completes_once() {
        let page = page();
        let frames = Arc::new(ScriptedFrames::new([], 16.0));
        let animator = ScrollAnimator::new(page.clone(), frames);

        let report = animator.animate(0.0, 700.0, Duration::ZERO).await;
        assert_eq!(report.frames, 1);
        assert_eq!(page.scroll_y(), 700.0);
    }

    #[tokio::test]
    async fn test_smooth_behavior_restored_after_run() {
        let page = smooth_page();
        let frames = Arc::new(ScriptedFrames::new([0.0, 50.0], 50.0));
        let animator = ScrollAnimator::new(page.clone(), frames).with_smooth_suppression(true);

        let observed = page.clone();
        let mut during = Vec::new();
        animator
            .animate_with(0.0, 100.0, Duration::from_millis(100), |_| {
                during.push(observed.scroll_behavior())
            })
            .await;

        assert!(during.iter().all(|b| *b == ScrollBehavior::Auto));
        assert_eq!(page.scroll_behavior(), ScrollBehavior::Smooth);
        assert_eq!(page.behavior_writes(), 2);
    }

    #[tokio::test]
    async fn test_smooth_behavior_restored_when_dropped() {
        let page = smooth_page();
        let frames = Arc::new(ScriptedFrames::new([0.0], 10.0));
        let animator = ScrollAnimator::new(page.clone(), frames).with_smooth_suppression(true);

        {
            let run = animator.animate(0.0, 100.0, Duration::from_secs(10_000));
            tokio::pin!(run);
            // let a few frames through, then abandon the run
            let _ = tokio::time::timeout(Duration::from_millis(5), &mut run).await;
        }

        assert_eq!(page.scroll_behavior(), ScrollBehavior::Smooth);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_runs_restore_behavior_once() {
        let page = smooth_page();
        let frames = Arc::new(IntervalFrames::new(Duration::from_millis(16)));
        let first = ScrollAnimator::new(page.clone(), frames.clone()).with_smooth_suppression(true);
        let lock = Arc::new(BehaviorLock::new());
        let first = first.with_behavior_lock(lock.clone());
        let second = ScrollAnimator::new(page.clone(), frames)
            .with_smooth_suppression(true)
            .with_behavior_lock(lock.clone());

        let observed = page.clone();
        tokio::join!(first.animate(0.0, 1000.0, Duration::from_millis(300)), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            second
                .animate_with(500.0, 2000.0, Duration::from_millis(400), |y| {
                    // the first run finishing must not release the page early
                    assert_eq!(observed.scroll_behavior(), ScrollBehavior::Auto);
                    observed.set_scroll_y(y);
                })
                .await;
        });

        assert_eq!(lock.holders(), 0);
        assert_eq!(page.scroll_behavior(), ScrollBehavior::Smooth);
        assert_eq!(page.behavior_writes(), 2);
        assert_eq!(page.scroll_y(), 2000.0);
    }
}
