//! Convergence Scroll Driver.
//!
//! Forces the host to load more content by scrolling forward on a fixed
//! cadence. Hidden items shrink the page, so a flat page height alone
//! does not mean the feed is exhausted: the driver also watches the
//! processed-item count and only stops once both have been flat for
//! `stable_ticks` consecutive ticks, or after `max_ticks`.
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::host::FeedHost;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScrollOptions {
    #[serde(with = "millis", rename = "tick_ms")]
    pub tick: Duration,
    pub step_px: i64,
    pub max_ticks: u32,
    pub stable_ticks: u32,
}

impl Default for ScrollOptions {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(200),
            step_px: 1000,
            max_ticks: 500,
            stable_ticks: 15,
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Neither height nor processed count moved for the stability window.
    Converged,
    TickCap,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScrollSummary {
    pub ticks: u32,
    pub reason: StopReason,
}

#[derive(Debug)]
pub struct ConvergenceDriver {
    options: ScrollOptions,
    origin: i64,
    last_processed: usize,
    last_height: i64,
    stable: u32,
    ticks: u32,
    cancel: CancellationToken,
}

impl ConvergenceDriver {
    /// Records the current scroll position; it is restored however the run ends.
    pub fn start<H: FeedHost + ?Sized>(
        host: &H,
        processed: usize,
        options: ScrollOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            options,
            origin: host.scroll_offset(),
            last_processed: processed,
            last_height: host.page_height(),
            stable: 0,
            ticks: 0,
            cancel,
        }
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Feeds one tick's observations. `Some` means stop now.
    pub fn observe(&mut self, processed: usize, height: i64) -> Option<StopReason> {
        if self.cancel.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        self.ticks += 1;

        let grew = processed != self.last_processed || height != self.last_height;
        self.last_processed = processed;
        self.last_height = height;
        self.stable = if grew { 0 } else { self.stable + 1 };

        if self.stable >= self.options.stable_ticks {
            Some(StopReason::Converged)
        } else if self.ticks >= self.options.max_ticks {
            Some(StopReason::TickCap)
        } else {
            None
        }
    }

    /// Observes the host, then either scrolls one step or finishes.
    pub fn tick<H: FeedHost + ?Sized>(
        &mut self,
        host: &mut H,
        processed: usize,
    ) -> Option<ScrollSummary> {
        match self.observe(processed, host.page_height()) {
            Some(reason) => Some(self.finish(host, reason)),
            None => {
                host.scroll_by(self.options.step_px);
                None
            }
        }
    }

    /// Restores the initial scroll position.
    pub fn finish<H: FeedHost + ?Sized>(&mut self, host: &mut H, reason: StopReason) -> ScrollSummary {
        self.cancel.cancel();
        host.scroll_to(self.origin);
        tracing::debug!(ticks = self.ticks, ?reason, "Scroll driver stopped");
        ScrollSummary {
            ticks: self.ticks,
            reason,
        }
    }
}
