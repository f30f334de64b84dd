//! Metadata poller
//!
//! Refreshes the "now playing" label while the stream is playing. The
//! station exposes no metadata endpoint, so every cycle shows a fetching
//! label and resolves to a fixed placeholder one second later; the cycle
//! repeats every ten seconds. Deadlines are plain `Instant` fields polled
//! by the component, so tests drive the cadence with a synthetic clock.

use std::time::{Duration, Instant};

use crate::config::metadata::{
    FETCHING_LABEL, NOW_PLAYING_PLACEHOLDER, REFRESH_INTERVAL_SECS, RESOLVE_DELAY_SECS,
};

/// Repeating timer that refreshes the displayed track label
#[derive(Debug, Default)]
pub struct MetadataPoller {
    active: bool,
    /// When the current cycle's fetching label resolves to the placeholder
    resolve_at: Option<Instant>,
    /// When the next refresh cycle begins
    next_cycle_at: Option<Instant>,
}

impl MetadataPoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the poller is currently running
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Start polling. Returns the label to display immediately.
    pub fn start(&mut self, now: Instant) -> &'static str {
        self.active = true;
        self.resolve_at = Some(now + Duration::from_secs(RESOLVE_DELAY_SECS));
        self.next_cycle_at = Some(now + Duration::from_secs(REFRESH_INTERVAL_SECS));
        FETCHING_LABEL
    }

    /// Cancel polling. The last displayed label is left as-is.
    pub fn stop(&mut self) {
        self.active = false;
        self.resolve_at = None;
        self.next_cycle_at = None;
    }

    /// Advance the poller to `now`. Returns a label update when one is due.
    ///
    /// At most one update is returned per call; an overdue resolve takes
    /// precedence over the next cycle so the sequence stays
    /// fetching → placeholder even under slow polling.
    pub fn poll(&mut self, now: Instant) -> Option<&'static str> {
        if !self.active {
            return None;
        }

        if let Some(at) = self.resolve_at {
            if now >= at {
                self.resolve_at = None;
                return Some(NOW_PLAYING_PLACEHOLDER);
            }
        }

        if let Some(at) = self.next_cycle_at {
            if now >= at {
                self.resolve_at = Some(now + Duration::from_secs(RESOLVE_DELAY_SECS));
                self.next_cycle_at = Some(now + Duration::from_secs(REFRESH_INTERVAL_SECS));
                return Some(FETCHING_LABEL);
            }
        }

        None
    }
}
