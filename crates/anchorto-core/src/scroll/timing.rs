//! Frame scheduling and time helpers for scroll animations

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Source of animation frames (`requestAnimationFrame` in a browser)
#[async_trait::async_trait]
pub trait FrameScheduler: Send + Sync {
    /// Wait for the next frame and return its timestamp in milliseconds
    async fn next_frame(&self) -> f64;
}

/// Frame scheduler backed by a tokio timer at a fixed rate
#[derive(Debug, Clone)]
pub struct IntervalFrames {
    origin: Instant,
    interval: Duration,
}

impl IntervalFrames {
    pub fn new(interval: Duration) -> Self {
        Self {
            origin: Instant::now(),
            interval,
        }
    }
}

#[async_trait::async_trait]
impl FrameScheduler for IntervalFrames {
    async fn next_frame(&self) -> f64 {
        tokio::time::sleep(self.interval).await;
        millis(self.origin.elapsed())
    }
}

/// Frame scheduler replaying a fixed list of timestamps
///
/// Once the list is exhausted the last timestamp is pushed `tail_step` ms
/// further on every call, so an animation always terminates.
#[derive(Debug)]
pub struct ScriptedFrames {
    state: Mutex<ScriptState>,
    tail_step: f64,
}

#[derive(Debug)]
struct ScriptState {
    pending: VecDeque<f64>,
    last: f64,
}

impl ScriptedFrames {
    pub fn new(timestamps: impl IntoIterator<Item = f64>, tail_step: f64) -> Self {
        Self {
            state: Mutex::new(ScriptState {
                pending: timestamps.into_iter().collect(),
                last: 0.0,
            }),
            tail_step,
        }
    }
}

#[async_trait::async_trait]
impl FrameScheduler for ScriptedFrames {
    async fn next_frame(&self) -> f64 {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let ts = match state.pending.pop_front() {
            Some(ts) => ts,
            None => state.last + self.tail_step,
        };
        state.last = ts;
        ts
    }
}

/// Duration as fractional milliseconds, exact for whole microseconds
#[inline]
pub fn millis(duration: Duration) -> f64 {
    duration.as_micros() as f64 / 1000.0
}

/// Whether a window that opened at `since` has been open for `limit`
#[inline]
pub fn has_elapsed(since: Instant, now: Instant, limit: Duration) -> bool {
    now.saturating_duration_since(since) >= limit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis() {
        assert_eq!(millis(Duration::from_millis(16)), 16.0);
        assert_eq!(millis(Duration::from_micros(1500)), 1.5);
        assert_eq!(millis(Duration::ZERO), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_frames_advance_by_interval() {
        let frames = IntervalFrames::new(Duration::from_millis(16));
        let first = frames.next_frame().await;
        let second = frames.next_frame().await;
        assert!((first - 16.0).abs() < 1.0, "first frame at {}", first);
        assert!((second - first - 16.0).abs() < 1.0, "second frame at {}", second);
    }

    #[tokio::test]
    async fn test_scripted_frames_replay_then_extend() {
        let frames = ScriptedFrames::new([0.0, 150.0], 50.0);
        assert_eq!(frames.next_frame().await, 0.0);
        assert_eq!(frames.next_frame().await, 150.0);
        assert_eq!(frames.next_frame().await, 200.0);
        assert_eq!(frames.next_frame().await, 250.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_has_elapsed() {
        let start = Instant::now();
        tokio::time::advance(Duration::from_millis(400)).await;
        assert!(has_elapsed(start, Instant::now(), Duration::from_millis(400)));
        assert!(!has_elapsed(start, Instant::now(), Duration::from_millis(401)));
    }
}
