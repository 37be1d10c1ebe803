//! Navigation barrier
//!
//! Eliminates the race between "action issued" and "new page ready to
//! query". The barrier is armed *before* the triggering action: arming
//! subscribes to CDP page lifecycle events, so a navigation that commits and
//! settles faster than the caller can re-enter a wait is still observed.
//! Stability point: a `networkIdle` lifecycle event for the newly committed
//! document on the main frame.

use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, FrameId, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::page::Page;
use futures::stream::{Stream, StreamExt};
use tracing::debug;

use crate::error::{WorkflowError, WorkflowResult};

type LifecycleStream = Pin<Box<dyn Stream<Item = Arc<EventLifecycleEvent>> + Send>>;

/// An armed wait for the next page transition to settle.
///
/// Obtained from [`NavigationBarrier::arm`] before the action that triggers
/// the navigation; consumed by [`NavigationBarrier::wait`] afterwards.
pub struct NavigationBarrier {
    events: LifecycleStream,
    main_frame: Option<FrameId>,
    timeout: Duration,
    armed_at: Instant,
}

impl NavigationBarrier {
    /// Subscribe to lifecycle events. Must happen before the triggering
    /// action is issued.
    pub async fn arm(page: &Page, timeout: Duration) -> WorkflowResult<Self> {
        page.execute(SetLifecycleEventsEnabledParams::new(true))
            .await?;
        let events = page.event_listener::<EventLifecycleEvent>().await?.boxed();
        let main_frame = page.mainframe().await?;
        Ok(Self {
            events,
            main_frame,
            timeout,
            armed_at: Instant::now(),
        })
    }

    /// Block until the transition triggered after arming reaches network
    /// idle, or fail with the elapsed time and last observed URL.
    pub async fn wait(mut self, page: &Page) -> WorkflowResult<()> {
        let mut committed = false;
        let settled = tokio::time::timeout(self.timeout, async {
            while let Some(event) = self.events.next().await {
                if let Some(main) = &self.main_frame {
                    if &event.frame_id != main {
                        continue;
                    }
                }
                debug!(name = %event.name, "lifecycle event");
                if stability_reached(&mut committed, &event.name) {
                    return true;
                }
            }
            // Stream closed: the CDP handler is gone
            false
        })
        .await;

        match settled {
            Ok(true) => Ok(()),
            Ok(false) => Err(WorkflowError::Session(
                "lifecycle event stream closed before navigation settled".to_string(),
            )),
            Err(_) => Err(WorkflowError::NavigationTimeout {
                elapsed_ms: self.armed_at.elapsed().as_millis() as u64,
                last_url: page
                    .url()
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_else(|| "unknown".to_string()),
            }),
        }
    }
}

/// A `networkIdle` only counts once a new document has committed; an idle
/// event from the pre-navigation document must not release the barrier.
fn stability_reached(committed: &mut bool, event: &str) -> bool {
    match event {
        "commit" => {
            *committed = true;
            false
        }
        "networkIdle" => *committed,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle_index(events: &[&str]) -> Option<usize> {
        let mut committed = false;
        events
            .iter()
            .position(|name| stability_reached(&mut committed, name))
    }

    #[test]
    fn test_idle_after_commit_settles() {
        let events = ["init", "commit", "DOMContentLoaded", "load", "networkIdle"];
        assert_eq!(settle_index(&events), Some(4));
    }

    #[test]
    fn test_stale_idle_is_ignored() {
        // Idle from the previous document arrives before the click lands
        let events = ["networkIdle", "init", "commit", "networkIdle"];
        assert_eq!(settle_index(&events), Some(3));
    }

    #[test]
    fn test_no_commit_never_settles() {
        let events = ["networkIdle", "networkAlmostIdle", "networkIdle"];
        assert_eq!(settle_index(&events), None);
    }
}
