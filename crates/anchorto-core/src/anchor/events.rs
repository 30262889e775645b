use std::fmt;

use serde::Serialize;

/// Lifecycle notifications sent by an anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollEventKind {
    Start,
    End,
}

impl ScrollEventKind {
    /// Event name as seen by page scripts
    pub fn name(self) -> &'static str {
        match self {
            ScrollEventKind::Start => "anchorToStart",
            ScrollEventKind::End => "anchorToEnd",
        }
    }
}

impl fmt::Display for ScrollEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A lifecycle notification, carrying the trigger that caused the scroll
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollEvent<E> {
    pub kind: ScrollEventKind,
    pub trigger: Option<E>,
}

/// Input events an anchor listens to once bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
    /// The trigger was clicked
    Click,
    /// A navigation select changed; `value` is the destination selector
    Change { value: String },
    /// Back/forward navigation
    PopState,
}
