//! In-memory host used by the CLI simulator and the tests
//!
//! [`HeadlessPage`] stacks named sections vertically inside a fixed-height
//! viewport, [`HeadlessHistory`] keeps a list of URLs and
//! [`StaticLibraryManager`] answers readiness queries from a table.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::watch;
use url::Url;

use crate::host::{History, LibraryManager, Page, ScrollBehavior};

/// Handle to a section of a [`HeadlessPage`], by id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SectionRef(pub String);

#[derive(Debug, Clone)]
struct Section {
    id: String,
    height: f64,
}

#[derive(Debug)]
struct PageState {
    viewport_height: f64,
    sections: Vec<Section>,
    scroll_y: f64,
    behavior: ScrollBehavior,
    behavior_writes: usize,
    trace: Vec<f64>,
}

/// Page made of stacked sections
#[derive(Debug)]
pub struct HeadlessPage {
    state: Mutex<PageState>,
    layout_tx: Option<watch::Sender<u64>>,
}

impl HeadlessPage {
    pub fn new(viewport_height: f64) -> Self {
        Self {
            state: Mutex::new(PageState {
                viewport_height,
                sections: Vec::new(),
                scroll_y: 0.0,
                behavior: ScrollBehavior::Auto,
                behavior_writes: 0,
                trace: Vec::new(),
            }),
            layout_tx: None,
        }
    }

    pub fn with_sections<I, S>(self, sections: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        self.lock().sections.extend(sections.into_iter().map(|(id, height)| Section {
            id: id.into(),
            height,
        }));
        self
    }

    pub fn with_scroll_behavior(self, behavior: ScrollBehavior) -> Self {
        self.lock().behavior = behavior;
        self
    }

    /// Report layout changes through a channel instead of leaving the
    /// monitor to poll the content height
    pub fn with_layout_observer(mut self) -> Self {
        let (tx, _rx) = watch::channel(0);
        self.layout_tx = Some(tx);
        self
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn element(&self, id: &str) -> Option<SectionRef> {
        self.lock()
            .sections
            .iter()
            .any(|s| s.id == id)
            .then(|| SectionRef(id.to_string()))
    }

    /// Document offset of the section's top edge
    pub fn section_top(&self, id: &str) -> Option<f64> {
        let state = self.lock();
        let mut top = 0.0;
        for section in &state.sections {
            if section.id == id {
                return Some(top);
            }
            top += section.height;
        }
        None
    }

    /// Change the height of a section, as late-loading content would
    pub fn resize_section(&self, id: &str, height: f64) -> bool {
        let changed = {
            let mut state = self.lock();
            match state.sections.iter_mut().find(|s| s.id == id) {
                Some(section) => {
                    section.height = height;
                    true
                }
                None => false,
            }
        };
        if changed {
            self.notify_layout();
        }
        changed
    }

    pub fn remove_section(&self, id: &str) -> bool {
        let removed = {
            let mut state = self.lock();
            let before = state.sections.len();
            state.sections.retain(|s| s.id != id);
            state.sections.len() != before
        };
        if removed {
            self.notify_layout();
        }
        removed
    }

    fn notify_layout(&self) {
        if let Some(tx) = &self.layout_tx {
            tx.send_modify(|generation| *generation += 1);
        }
    }

    /// Every offset written through [`Page::set_scroll_y`]
    pub fn scroll_trace(&self) -> Vec<f64> {
        self.lock().trace.clone()
    }

    pub fn clear_trace(&self) {
        self.lock().trace.clear();
    }

    /// Number of writes to the scroll behavior
    pub fn behavior_writes(&self) -> usize {
        self.lock().behavior_writes
    }

    pub fn section_ids(&self) -> Vec<String> {
        self.lock().sections.iter().map(|s| s.id.clone()).collect()
    }
}

impl Page for HeadlessPage {
    type Element = SectionRef;

    fn scroll_y(&self) -> f64 {
        self.lock().scroll_y
    }

    fn set_scroll_y(&self, y: f64) {
        let max = self.max_scroll_y();
        let mut state = self.lock();
        state.scroll_y = y.clamp(0.0, max);
        state.trace.push(y);
    }

    fn max_scroll_y(&self) -> f64 {
        let state = self.lock();
        let content: f64 = state.sections.iter().map(|s| s.height).sum();
        (content - state.viewport_height).max(0.0)
    }

    fn scroll_behavior(&self) -> ScrollBehavior {
        self.lock().behavior
    }

    fn set_scroll_behavior(&self, behavior: ScrollBehavior) {
        let mut state = self.lock();
        state.behavior = behavior;
        state.behavior_writes += 1;
    }

    fn element_top(&self, element: &SectionRef) -> Option<f64> {
        let top = self.section_top(&element.0)?;
        Some(top - self.scroll_y())
    }

    fn query(&self, selector: &str) -> Option<SectionRef> {
        self.element(selector.strip_prefix('#')?)
    }

    fn element_id(&self, element: &SectionRef) -> Option<String> {
        Some(element.0.clone())
    }

    fn content_height(&self) -> f64 {
        self.lock().sections.iter().map(|s| s.height).sum()
    }

    fn layout_changes(&self) -> Option<watch::Receiver<u64>> {
        self.layout_tx.as_ref().map(|tx| tx.subscribe())
    }
}

/// History stack of URLs
#[derive(Debug)]
pub struct HeadlessHistory {
    entries: Mutex<Vec<Url>>,
}

impl HeadlessHistory {
    pub fn new(initial: Url) -> Self {
        Self {
            entries: Mutex::new(vec![initial]),
        }
    }

    /// Start a history at `initial`
    pub fn parse(initial: &str) -> crate::Result<Self> {
        Ok(Self::new(Url::parse(initial)?))
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Url>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn entries(&self) -> Vec<Url> {
        self.lock().clone()
    }

    /// Drop the current entry, as the browser's back button does
    ///
    /// Returns the new location, or `None` if already at the first entry.
    pub fn back(&self) -> Option<Url> {
        let mut entries = self.lock();
        if entries.len() < 2 {
            return None;
        }
        entries.pop();
        entries.last().cloned()
    }
}

impl History for HeadlessHistory {
    fn location(&self) -> Url {
        let entries = self.lock();
        // `new` seeds one entry and `back` never pops the last one
        entries[entries.len() - 1].clone()
    }

    fn push_state(&self, url: Url) {
        self.lock().push(url);
    }
}

/// Library registry backed by a table of instance counts
#[derive(Debug, Default)]
pub struct StaticLibraryManager {
    libraries: Mutex<HashMap<String, usize>>,
    instance_queries: AtomicUsize,
}

impl StaticLibraryManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, library: &str) {
        self.lock().entry(library.to_string()).or_insert(0);
    }

    pub fn add_instance(&self, library: &str) {
        *self.lock().entry(library.to_string()).or_insert(0) += 1;
    }

    /// How many times an instance count was asked for
    pub fn instance_queries(&self) -> usize {
        self.instance_queries.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, usize>> {
        self.libraries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LibraryManager for StaticLibraryManager {
    fn is_registered(&self, library: &str) -> bool {
        self.lock().contains_key(library)
    }

    fn instance_count(&self, library: &str) -> usize {
        self.instance_queries.fetch_add(1, Ordering::SeqCst);
        self.lock().get(library).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> HeadlessPage {
        HeadlessPage::new(500.0).with_sections([("a", 400.0), ("b", 600.0), ("c", 300.0)])
    }

    #[test]
    fn test_geometry() {
        let page = page();
        assert_eq!(page.content_height(), 1300.0);
        assert_eq!(page.max_scroll_y(), 800.0);
        assert_eq!(page.section_top("b"), Some(400.0));

        page.set_scroll_y(100.0);
        let b = page.query("#b").unwrap();
        assert_eq!(page.element_top(&b), Some(300.0));
        assert_eq!(page.query("b"), None);
    }

    #[test]
    fn test_scroll_is_clamped_but_traced_raw() {
        let page = page();
        page.set_scroll_y(5000.0);
        assert_eq!(page.scroll_y(), 800.0);
        assert_eq!(page.scroll_trace(), vec![5000.0]);
    }

    #[test]
    fn test_removed_section_is_detached() {
        let page = page();
        let c = page.element("c").unwrap();
        assert!(page.remove_section("c"));
        assert_eq!(page.element_top(&c), None);
        assert!(!page.remove_section("c"));
    }

    #[test]
    fn test_layout_observer_counts_changes() {
        let page = page().with_layout_observer();
        let rx = page.layout_changes().unwrap();
        page.resize_section("a", 900.0);
        page.resize_section("b", 100.0);
        assert_eq!(*rx.borrow(), 2);
        assert!(HeadlessPage::new(10.0).layout_changes().is_none());
    }

    #[test]
    fn test_history_back() {
        let history = HeadlessHistory::new(Url::parse("https://example.com/").unwrap());
        history.push_state(Url::parse("https://example.com/#b").unwrap());
        assert_eq!(history.location().fragment(), Some("b"));
        assert_eq!(history.back().unwrap().fragment(), None);
        assert_eq!(history.back(), None);
    }

    #[test]
    fn test_history_rejects_relative_url() {
        assert!(matches!(HeadlessHistory::parse("/landing"), Err(crate::Error::UrlParse(_))));
        assert!(HeadlessHistory::parse("https://example.com/landing").is_ok());
    }

    #[test]
    fn test_library_manager() {
        let manager = StaticLibraryManager::new();
        manager.register("slider");
        assert!(manager.is_registered("slider"));
        assert!(!manager.is_registered("map"));
        assert_eq!(manager.instance_count("slider"), 0);
        manager.add_instance("slider");
        assert_eq!(manager.instance_count("slider"), 1);
        assert_eq!(manager.instance_queries(), 2);
    }
}
