//! Host collaborators the engine drives
//!
//! The engine never touches a real document. Hosts (a wasm binding, a native
//! toolkit, or [`crate::headless`]) implement these traits.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use url::Url;

/// Scroll behavior of the scrolling container (`scroll-behavior` in CSS terms)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScrollBehavior {
    #[default]
    Auto,
    Smooth,
}

/// Viewport and document geometry of one page
pub trait Page: Send + Sync + 'static {
    /// Handle to an element of the page
    type Element: Clone + fmt::Debug + Send + Sync + 'static;

    /// Current vertical scroll offset
    fn scroll_y(&self) -> f64;

    /// Write the vertical scroll offset
    fn set_scroll_y(&self, y: f64);

    /// Largest offset the viewport can scroll to
    fn max_scroll_y(&self) -> f64;

    fn scroll_behavior(&self) -> ScrollBehavior;

    fn set_scroll_behavior(&self, behavior: ScrollBehavior);

    /// Top edge of `element` relative to the viewport, `None` once detached
    fn element_top(&self, element: &Self::Element) -> Option<f64>;

    /// Look an element up again, e.g. by `#id`
    fn query(&self, selector: &str) -> Option<Self::Element>;

    fn element_id(&self, element: &Self::Element) -> Option<String>;

    /// Total scrollable height, used by the polling fallback of the monitor
    fn content_height(&self) -> f64;

    /// Layout-change notifications, if the host has a resize observer
    ///
    /// The value is a generation counter bumped on every observed change.
    fn layout_changes(&self) -> Option<watch::Receiver<u64>> {
        None
    }
}

/// Browser-history surface used for URL synchronization
pub trait History: Send + Sync {
    fn location(&self) -> Url;

    fn push_state(&self, url: Url);
}

/// Readiness registry of third-party libraries that change page height
pub trait LibraryManager: Send + Sync {
    /// Whether `library` was registered with the manager at all
    fn is_registered(&self, library: &str) -> bool;

    /// Number of live instances of `library`
    fn instance_count(&self, library: &str) -> usize;
}

/// Where to scroll to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination<E> {
    /// An element handed over once; cannot be looked up again
    Element(E),
    /// A selector that is re-resolved on every measurement
    Selector(String),
}

impl<E: Clone> Destination<E> {
    pub fn resolve<P>(&self, page: &P) -> Option<E>
    where
        P: Page<Element = E>,
    {
        match self {
            Destination::Element(element) => Some(element.clone()),
            Destination::Selector(selector) => page.query(selector),
        }
    }

    /// Whether the destination can be found again after layout changes
    pub fn is_relookupable(&self) -> bool {
        matches!(self, Destination::Selector(_))
    }
}

/// Function form of the offset: `(destination, trigger) -> pixels`
pub type OffsetFn<E> = Arc<dyn Fn(&E, Option<&E>) -> f64 + Send + Sync>;

/// Distance kept between the viewport top and the destination
#[derive(Clone)]
pub enum Offset<E> {
    Fixed(f64),
    Dynamic(OffsetFn<E>),
}

impl<E> Offset<E> {
    pub fn resolve(&self, destination: &E, trigger: Option<&E>) -> f64 {
        match self {
            Offset::Fixed(px) => *px,
            Offset::Dynamic(f) => f(destination, trigger),
        }
    }
}

impl<E> fmt::Debug for Offset<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Offset::Fixed(px) => f.debug_tuple("Fixed").field(px).finish(),
            Offset::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Scroll offset that brings `element` to the viewport top, clamped to the
/// scrollable range. `None` when the element is no longer in the page.
pub fn target_position<P: Page>(
    page: &P,
    element: &P::Element,
    offset: &Offset<P::Element>,
    trigger: Option<&P::Element>,
) -> Option<f64> {
    let top = page.element_top(element)?;
    let raw = top + page.scroll_y() - offset.resolve(element, trigger);
    Some(raw.clamp(0.0, page.max_scroll_y().max(0.0)))
}
