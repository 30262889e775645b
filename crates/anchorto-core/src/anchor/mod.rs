//! Scroll-to-section controller
//!
//! An [`AnchorTo`] ties a trigger to a destination. `scroll_to` runs the whole
//! sequence: readiness wait, primary animation, immediate micro-adjust and,
//! for destinations given as selectors, the post-settle monitor. Once bound
//! to a stream of [`TriggerEvent`]s it also keeps the URL in sync and follows
//! back/forward navigation.
//!
//! # Usage
//!
//! ```ignore
//! let anchor = Arc::new(
//!     AnchorTo::new(page, config)
//!         .with_trigger(nav_link)
//!         .with_destination(Destination::Selector("#pricing".into()))
//!         .with_history(history)
//!         .with_event_sender(events_tx),
//! );
//! anchor.bind(trigger_rx);
//! ```

mod events;
pub mod url;

pub use events::{ScrollEvent, ScrollEventKind, TriggerEvent};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use self::url::{section_from_url, url_for_section, FALLBACK_ID};
use crate::config::{AnchorConfig, UrlMode};
use crate::host::{target_position, Destination, History, LibraryManager, Offset, Page};
use crate::readiness::{wait_until_ready, Readiness};
use crate::scroll::{BehaviorLock, FrameScheduler, IntervalFrames, ScrollAnimator};
use crate::settle::{correct, settle_after, Correction, MonitorSlot};

type Measure = Arc<dyn Fn() -> Option<f64> + Send + Sync>;

/// What a call to [`AnchorTo::scroll_to`] did
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScrollOutcome {
    /// The destination did not resolve; nothing moved
    NoDestination,
    Completed {
        session: u64,
        readiness: Readiness,
        from: f64,
        target: f64,
        frames: usize,
        /// Immediate micro-adjust, when enabled
        correction: Option<Correction>,
        /// Whether a post-settle monitor was started
        monitoring: bool,
    },
}

/// Smooth scroll from a trigger to a destination
pub struct AnchorTo<P: Page> {
    page: Arc<P>,
    config: AnchorConfig,
    trigger: Option<P::Element>,
    destination: Option<Destination<P::Element>>,
    offset: Offset<P::Element>,
    frames: Arc<dyn FrameScheduler>,
    history: Option<Arc<dyn History>>,
    manager: Option<Arc<dyn LibraryManager>>,
    event_tx: Option<mpsc::UnboundedSender<ScrollEvent<P::Element>>>,
    on_complete: Option<Arc<dyn Fn() + Send + Sync>>,
    monitor: MonitorSlot,
    behavior: Arc<BehaviorLock>,
    bindings: Mutex<Option<watch::Sender<bool>>>,
    sessions: AtomicU64,
}

impl<P: Page> AnchorTo<P> {
    pub fn new(page: Arc<P>, config: AnchorConfig) -> Self {
        let frames = Arc::new(IntervalFrames::new(config.scroll.frame_interval()));
        let offset = Offset::Fixed(config.scroll.offset);
        if config.navigation.debug {
            info!(
                offset = config.scroll.offset,
                speed_ms = config.scroll.speed_ms,
                url = ?config.navigation.url,
                emit_events = config.navigation.emit_events,
                popstate = config.navigation.popstate,
                "AnchorTo initialized"
            );
        }
        Self {
            page,
            config,
            trigger: None,
            destination: None,
            offset,
            frames,
            history: None,
            manager: None,
            event_tx: None,
            on_complete: None,
            monitor: MonitorSlot::new(),
            behavior: Arc::new(BehaviorLock::new()),
            bindings: Mutex::new(None),
            sessions: AtomicU64::new(0),
        }
    }

    /// Element whose clicks start the scroll; also passed to offset functions
    pub fn with_trigger(mut self, trigger: P::Element) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Destination used for clicks on the trigger
    pub fn with_destination(mut self, destination: Destination<P::Element>) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = Offset::Fixed(offset);
        self
    }

    /// Compute the offset from `(destination, trigger)` on every measurement
    pub fn with_offset_fn<F>(mut self, offset: F) -> Self
    where
        F: Fn(&P::Element, Option<&P::Element>) -> f64 + Send + Sync + 'static,
    {
        self.offset = Offset::Dynamic(Arc::new(offset));
        self
    }

    /// Replace the built-in timer-driven frame scheduler
    pub fn with_frames(mut self, frames: Arc<dyn FrameScheduler>) -> Self {
        self.frames = frames;
        self
    }

    pub fn with_history(mut self, history: Arc<dyn History>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_manager(mut self, manager: Arc<dyn LibraryManager>) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Set the sender for start/end notifications
    pub fn with_event_sender(mut self, tx: mpsc::UnboundedSender<ScrollEvent<P::Element>>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Callback run once the primary animation has finished
    pub fn with_on_complete<F>(mut self, on_complete: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_complete = Some(Arc::new(on_complete));
        self
    }

    pub fn config(&self) -> &AnchorConfig {
        &self.config
    }

    pub fn page(&self) -> &Arc<P> {
        &self.page
    }

    fn animator(&self) -> ScrollAnimator<P> {
        ScrollAnimator::new(self.page.clone(), self.frames.clone())
            .with_smooth_suppression(self.config.scroll.disable_ambient_smooth_scroll)
            .with_behavior_lock(self.behavior.clone())
    }

    /// Closure measuring the scroll offset of `destination` against the
    /// current layout
    fn measurer(&self, destination: Destination<P::Element>) -> Measure {
        let page = self.page.clone();
        let offset = self.offset.clone();
        let trigger = self.trigger.clone();
        Arc::new(move || {
            let element = destination.resolve(page.as_ref())?;
            target_position(page.as_ref(), &element, &offset, trigger.as_ref())
        })
    }

    /// Scroll to `destination`
    ///
    /// Waits for height-modifying libraries, animates, then corrects for any
    /// drift. A destination that does not resolve, before or after the
    /// readiness wait, leaves the page untouched.
    ///
    /// A new session cancels the post-settle monitor of the previous one.
    pub async fn scroll_to(&self, destination: &Destination<P::Element>) -> ScrollOutcome {
        let session = self.sessions.fetch_add(1, Ordering::Relaxed) + 1;
        let diagnostics = self.config.navigation.debug;
        self.monitor.cancel();

        if destination.resolve(self.page.as_ref()).is_none() {
            if diagnostics {
                info!(session, ?destination, "Destination not found, not scrolling");
            }
            return ScrollOutcome::NoDestination;
        }

        let readiness = wait_until_ready(
            &self.config.readiness.height_modifying_libraries,
            self.manager.as_deref(),
            &self.config.readiness,
        )
        .await;
        if diagnostics && matches!(readiness, Readiness::TimedOut { .. }) {
            info!(session, ?readiness, "Libraries not ready, scrolling anyway");
        }

        let measure = self.measurer(destination.clone());
        let Some(target) = measure() else {
            if diagnostics {
                info!(session, ?destination, "Destination detached while waiting");
            }
            return ScrollOutcome::NoDestination;
        };

        let from = self.page.scroll_y();
        if diagnostics {
            info!(session, from, target, speed_ms = self.config.scroll.speed_ms, "Scroll started");
        }

        if self.config.navigation.emit_events {
            self.emit_event(ScrollEventKind::Start);
        }

        let animator = self.animator();
        let report = animator.animate(from, target, self.config.scroll.speed()).await;

        if self.config.navigation.emit_events {
            self.emit_event(ScrollEventKind::End);
        }
        if let Some(on_complete) = &self.on_complete {
            on_complete();
        }

        let settle = &self.config.settle;
        let correction = if settle.micro_adjust {
            Some(
                correct(
                    &animator,
                    || measure(),
                    settle.micro_adjust_threshold,
                    settle.micro_adjust_duration(),
                )
                .await,
            )
        } else {
            None
        };

        let monitoring = settle.post_settle_adjust && destination.is_relookupable();
        if monitoring {
            self.start_monitor(session, animator, measure);
        }

        if diagnostics {
            info!(session, frames = report.frames, ?correction, monitoring, "Scroll finished");
        }

        ScrollOutcome::Completed {
            session,
            readiness,
            from,
            target,
            frames: report.frames,
            correction,
            monitoring,
        }
    }

    /// Spawn the post-settle monitor, superseding the previous one
    fn start_monitor(&self, session: u64, animator: ScrollAnimator<P>, measure: Measure) {
        let cancel = self.monitor.claim();
        let config = self.config.settle.clone();
        tokio::spawn(async move {
            let report = settle_after(&animator, &config, move || measure(), cancel).await;
            debug!(session, ?report, "Post-settle pass finished");
        });
    }

    /// Send a lifecycle notification scoped to the trigger
    pub fn emit_event(&self, kind: ScrollEventKind) {
        if let Some(ref tx) = self.event_tx {
            let event = ScrollEvent {
                kind,
                trigger: self.trigger.clone(),
            };
            if tx.send(event).is_err() {
                warn!(event = %kind, "Failed to send scroll event: receiver dropped");
            }
        }
    }

    /// Push the URL of `destination` according to the configured mode
    ///
    /// Falls back to `section` when the destination has no id.
    pub fn sync_url(&self, destination: &Destination<P::Element>) {
        let Some(history) = &self.history else {
            return;
        };
        if self.config.navigation.url == UrlMode::None {
            return;
        }

        let id = destination
            .resolve(self.page.as_ref())
            .and_then(|element| self.page.element_id(&element))
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| FALLBACK_ID.to_string());

        if let Some(url) = url_for_section(&history.location(), self.config.navigation.url, &id) {
            debug!(%url, "Pushing section URL");
            history.push_state(url);
        }
    }

    /// Destination named by the current URL, for back/forward navigation
    fn destination_from_history(&self) -> Option<Destination<P::Element>> {
        let history = self.history.as_ref()?;
        let id = section_from_url(&history.location(), self.config.navigation.url)?;
        Some(Destination::Selector(format!("#{id}")))
    }
}

impl<P: Page> AnchorTo<P> {
    /// React to one trigger event
    ///
    /// Scrolls run as their own tasks, so [`AnchorTo::destroy`] never stops
    /// one that already started.
    pub fn handle_event(self: &Arc<Self>, event: TriggerEvent) {
        let destination = match event {
            TriggerEvent::Click => {
                let Some(destination) = self.destination.clone() else {
                    debug!("Click without a destination ignored");
                    return;
                };
                self.sync_url(&destination);
                destination
            }
            TriggerEvent::Change { value } => {
                let destination = Destination::Selector(value);
                self.sync_url(&destination);
                destination
            }
            TriggerEvent::PopState => {
                if !self.config.navigation.popstate {
                    return;
                }
                match self.destination_from_history() {
                    Some(destination) => destination,
                    None => return,
                }
            }
        };

        let anchor = Arc::clone(self);
        tokio::spawn(async move {
            anchor.scroll_to(&destination).await;
        });
    }

    /// Listen to trigger events until [`AnchorTo::destroy`] is called, the
    /// event stream ends, or the anchor is dropped
    pub fn bind(self: &Arc<Self>, mut events: mpsc::UnboundedReceiver<TriggerEvent>) {
        let (shutdown_tx, mut shutdown) = watch::channel(false);
        let previous = self
            .bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(shutdown_tx);
        if let Some(previous) = previous {
            let _ = previous.send(true);
        }

        let anchor: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    result = shutdown.changed() => {
                        if result.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }

                    event = events.recv() => {
                        let (Some(event), Some(anchor)) = (event, anchor.upgrade()) else {
                            break;
                        };
                        anchor.handle_event(event);
                    }
                }
            }
            debug!("Trigger bindings detached");
        });
    }

    /// Detach the event bindings owned by this anchor
    ///
    /// Animations and monitors already running are left alone.
    pub fn destroy(&self) {
        let bindings = self
            .bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(shutdown) = bindings {
            let _ = shutdown.send(true);
        }
    }
}
