//! Pre-scroll readiness wait
//!
//! Libraries such as sliders or masonry grids change the page height when
//! they instantiate. Scrolling before they did lands on a stale position, so
//! the anchor waits (bounded) until every registered library has at least
//! one instance.

use serde::Serialize;
use tokio::time::sleep;
use tracing::debug;

use crate::config::ReadinessConfig;
use crate::host::LibraryManager;

/// How a readiness wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Readiness {
    /// Nothing to wait for: no libraries, no manager, or none registered
    Immediate,
    /// Every registered library reported an instance after `polls` polls
    Ready { polls: u32 },
    /// Gave up after `polls` polls
    TimedOut { polls: u32 },
}

/// Wait until the height-modifying libraries the manager knows about have
/// instantiated, or until `config.max_polls` polls have been made.
pub async fn wait_until_ready(
    libraries: &[String],
    manager: Option<&dyn LibraryManager>,
    config: &ReadinessConfig,
) -> Readiness {
    let Some(manager) = manager else {
        return Readiness::Immediate;
    };

    let registered: Vec<&str> = libraries
        .iter()
        .map(String::as_str)
        .filter(|name| manager.is_registered(name))
        .collect();

    if registered.is_empty() {
        return Readiness::Immediate;
    }

    let max_polls = config.max_polls.max(1);
    let mut polls = 0;

    loop {
        polls += 1;
        let pending: Vec<&str> = registered
            .iter()
            .copied()
            .filter(|name| manager.instance_count(name) == 0)
            .collect();

        if pending.is_empty() {
            debug!(polls, "Height-modifying libraries ready");
            return Readiness::Ready { polls };
        }

        if polls >= max_polls {
            debug!(polls, ?pending, "Readiness wait timed out, scrolling anyway");
            return Readiness::TimedOut { polls };
        }

        sleep(config.poll_interval()).await;
    }
}
