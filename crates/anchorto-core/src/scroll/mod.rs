//! Smooth scrolling engine
//!
//! - `easing` - quadratic ease-in-out curve
//! - `timing` - frame schedulers and time helpers
//! - `animation` - per-run state machine and the async animator
//!
//! # Usage
//!
//! ```ignore
//! use anchorto_core::scroll::{IntervalFrames, ScrollAnimator};
//!
//! let frames = Arc::new(IntervalFrames::new(Duration::from_millis(16)));
//! let animator = ScrollAnimator::new(page, frames).with_smooth_suppression(true);
//!
//! // Resolves once the page sits exactly at the target
//! animator.animate(page.scroll_y(), 1200.0, Duration::from_millis(300)).await;
//! ```

pub mod easing;
pub mod timing;

pub mod animation;

pub use animation::{AnimationReport, AnimationRun, BehaviorLock, ScrollAnimator, Step};
pub use easing::{ease_in_out_quad, quad_in_out};
pub use timing::{FrameScheduler, IntervalFrames, ScriptedFrames};
