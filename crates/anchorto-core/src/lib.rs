pub mod anchor;
pub mod config;
pub mod error;
pub mod headless;
pub mod host;
pub mod readiness;
pub mod scroll;
pub mod settle;

pub use anchor::{AnchorTo, ScrollEvent, ScrollEventKind, ScrollOutcome, TriggerEvent};
pub use config::{AnchorConfig, NavigationConfig, ReadinessConfig, ScrollConfig, SettleConfig, UrlMode};
pub use error::{Error, Result};
pub use host::{Destination, History, LibraryManager, Offset, Page, ScrollBehavior};
