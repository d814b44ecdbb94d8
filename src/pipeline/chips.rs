//! Exploration mode: steering the chip bar above a feed.
//!
//! The catch-all chips ("All", "For you") are hidden and the chip that
//! narrows the feed to unseen material is selected: "Not watched" on the
//! search page, "Related" everywhere else.
use std::collections::HashSet;

use super::host::{FeedHost, ItemHandle};
use crate::extract::ChipStrategy;
use crate::node::FeedNode;

/// Counts from one steering pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SteerCounts {
    pub hidden: u32,
    pub activated: u32,
}

/// Chips hidden and clicked in the current exploration session.
#[derive(Debug, Default)]
pub(crate) struct ChipSteering {
    hidden: HashSet<ItemHandle>,
    clicked: HashSet<ItemHandle>,
}

impl ChipSteering {
    pub fn steer<H: FeedHost + ?Sized>(
        &mut self,
        host: &mut H,
        strategy: &ChipStrategy,
    ) -> SteerCounts {
        let mut counts = SteerCounts::default();
        let wanted = if host.location_path().starts_with(strategy.search_path) {
            strategy.on_search
        } else {
            strategy.elsewhere
        };

        for bar in host.select_all(&strategy.bar, None) {
            let mut target = None;
            for chip in host.select_all(&strategy.chip, Some(bar)) {
                let Some(item) = host.item(chip) else {
                    continue;
                };
                let label = item.node.text_content().to_lowercase();
                if strategy.hide.contains(&label.as_str()) {
                    if self.hidden.insert(chip) {
                        host.set_hidden(chip, true);
                        counts.hidden += 1;
                    }
                } else if target.is_none() && wanted.iter().any(|w| label.contains(w)) {
                    target = Some((chip, item.node));
                }
            }

            let Some((chip, node)) = target else {
                continue;
            };
            if is_selected(&node) || !self.clicked.insert(chip) {
                continue;
            }
            let button = host
                .select_all(&strategy.button, Some(chip))
                .into_iter()
                .next()
                .unwrap_or(chip);
            tracing::debug!(chip, label = %node.text_content(), "Selecting exploration chip");
            host.activate(button);
            counts.activated += 1;
        }
        counts
    }

    /// Shows the hidden chips again and forgets what was clicked.
    pub fn restore<H: FeedHost + ?Sized>(&mut self, host: &mut H) {
        for chip in self.hidden.drain() {
            host.set_hidden(chip, false);
        }
        self.clicked.clear();
    }
}

fn is_selected(chip: &FeedNode) -> bool {
    let flagged = |node: &FeedNode| {
        node.attr("aria-selected") == Some("true") || node.attr("selected").is_some()
    };
    flagged(chip) || chip.descendants().into_iter().any(flagged)
}
