//! Incremental Processing Controller.
//!
//! Owns the set of processed item handles for one context. Each item is
//! extracted and classified once; a configuration change clears the set
//! and starts over. Items whose year has to be looked up remotely are
//! classified with the year rule off first, then again when the lookup
//! answers, unless the configuration changed in between.
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::chips::ChipSteering;
use super::discover::item_roots;
use super::host::{closest, FeedHost, HostEvent, HostItem, ItemHandle};
use super::scroll::{ConvergenceDriver, ScrollOptions, ScrollSummary, StopReason};
use crate::extract::{Extractor, ItemRecord};
use crate::filter::{evaluate, Decision, FilterConfig};
use crate::resolve::{Resolution, YearLookup};

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Fallback full rescan for insertions the event channel missed.
    pub rescan_interval: Duration,
    pub scroll: ScrollOptions,
    pub show_verified_year: bool,
    /// A disabled source leaves the page untouched.
    pub source_enabled: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            rescan_interval: Duration::from_millis(2000),
            scroll: ScrollOptions::default(),
            show_verified_year: true,
            source_enabled: true,
        }
    }
}

/// What happened to one item in the latest pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemOutcome {
    pub handle: ItemHandle,
    /// `None` when the extractor abstained.
    pub record: Option<ItemRecord>,
    pub decision: Option<Decision>,
    /// A remote year lookup had not answered when this was recorded.
    pub awaiting_year: bool,
}

impl ItemOutcome {
    pub fn hidden(&self) -> bool {
        self.decision.as_ref().is_some_and(Decision::hidden)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    /// Latest outcome per item, in handle order.
    pub outcomes: BTreeMap<ItemHandle, ItemOutcome>,
    /// Full passes started (initial pass plus one per configuration change).
    pub passes: u32,
    pub scroll_runs: Vec<ScrollSummary>,
    /// Lookups whose answer arrived after a configuration change.
    pub stale_resolutions: u32,
    /// Catch-all chips hidden by exploration mode.
    pub chips_hidden: u32,
    /// Chips selected by exploration mode.
    pub chips_activated: u32,
}

impl PassReport {
    pub fn hidden_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.hidden()).count()
    }

    pub fn abstained_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.record.is_none()).count()
    }
}

struct Resolved {
    generation: u64,
    handle: ItemHandle,
    record: ItemRecord,
    resolution: Resolution,
}

pub struct Controller<H> {
    host: H,
    extractor: Extractor,
    lookup: Arc<dyn YearLookup>,
    config: FilterConfig,
    options: ControllerOptions,
    processed: HashSet<ItemHandle>,
    generation: u64,
    pending: usize,
    driver: Option<ConvergenceDriver>,
    chips: ChipSteering,
    report: PassReport,
}

impl<H: FeedHost> Controller<H> {
    pub fn new(
        host: H,
        extractor: Extractor,
        lookup: Arc<dyn YearLookup>,
        config: FilterConfig,
        options: ControllerOptions,
    ) -> Self {
        Self {
            host,
            extractor,
            lookup,
            config,
            options,
            processed: HashSet::new(),
            generation: 0,
            pending: 0,
            driver: None,
            chips: ChipSteering::default(),
            report: PassReport::default(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn report(&self) -> &PassReport {
        &self.report
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    /// Runs until the event channel is closed and all work has drained,
    /// the context is destroyed, or `shutdown` is cancelled.
    ///
    /// Scroll position is restored on every exit path.
    pub async fn run(
        &mut self,
        mut events: mpsc::Receiver<HostEvent>,
        shutdown: CancellationToken,
    ) -> &PassReport {
        if !self.options.source_enabled {
            tracing::debug!(source = %self.extractor.source(), "Source disabled, leaving page untouched");
            return &self.report;
        }

        let (resolved_tx, mut resolved_rx) = mpsc::channel::<Resolved>(64);
        self.full_pass(&resolved_tx);
        self.start_driver(&shutdown);

        let mut rescan = tokio::time::interval_at(
            tokio::time::Instant::now() + self.options.rescan_interval,
            self.options.rescan_interval,
        );
        rescan.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut scroll_tick = tokio::time::interval(self.options.scroll.tick);
        scroll_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of an interval fires immediately; skip it.
        scroll_tick.tick().await;

        let mut events_open = true;
        loop {
            if !events_open && self.pending == 0 && self.driver.is_none() {
                break;
            }

            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    tracing::debug!("Controller shut down");
                    self.stop_driver(StopReason::Cancelled);
                    break;
                }

                event = events.recv(), if events_open => match event {
                    None => events_open = false,
                    Some(HostEvent::ContextDestroyed) => {
                        tracing::debug!("Context destroyed, stopping");
                        self.stop_driver(StopReason::Cancelled);
                        break;
                    }
                    Some(HostEvent::SubtreeInserted(scope)) => self.scan(Some(scope), &resolved_tx),
                    Some(HostEvent::ConfigChanged(config)) => {
                        self.reload(config, &resolved_tx, &shutdown);
                    }
                },

                Some(resolved) = resolved_rx.recv() => self.on_resolved(resolved),

                _ = scroll_tick.tick(), if self.driver.is_some() => {
                    self.scan(None, &resolved_tx);
                    self.drive_scroll();
                }

                _ = rescan.tick() => {
                    self.scan(None, &resolved_tx);
                    self.explore();
                }
            }
        }

        &self.report
    }

    fn full_pass(&mut self, resolved_tx: &mpsc::Sender<Resolved>) {
        self.report.passes += 1;
        self.scan(None, resolved_tx);
        self.explore();
        tracing::debug!(
            pass = self.report.passes,
            processed = self.processed.len(),
            hidden = self.report.hidden_count(),
            "Full pass complete"
        );
    }

    /// Processes every unseen item in `scope` (whole page when `None`).
    fn scan(&mut self, scope: Option<ItemHandle>, resolved_tx: &mpsc::Sender<Resolved>) {
        let items = item_roots(&self.host, &self.extractor, scope);
        for item in items {
            self.process(item, resolved_tx);
        }
    }

    fn process(&mut self, item: HostItem, resolved_tx: &mpsc::Sender<Resolved>) {
        let HostItem { handle, node } = item;
        if !self.processed.insert(handle) {
            return;
        }

        let Some(record) = self.extractor.extract(&node) else {
            self.report.outcomes.insert(
                handle,
                ItemOutcome {
                    handle,
                    record: None,
                    decision: None,
                    awaiting_year: false,
                },
            );
            return;
        };

        let year_rule_active = self.config.enabled && self.config.rules.year.enabled;
        if year_rule_active && self.extractor.wants_remote_year(&record) {
            let interim = evaluate(&record, &self.config.without_year_rule());
            let hidden = interim.hidden();
            self.apply(handle, &record, &interim);
            // Already hidden by another rule: the year cannot change that.
            if !hidden {
                self.spawn_lookup(handle, record.clone(), resolved_tx);
            }
            self.report.outcomes.insert(
                handle,
                ItemOutcome {
                    handle,
                    record: Some(record),
                    decision: Some(interim),
                    awaiting_year: !hidden,
                },
            );
        } else {
            let decision = evaluate(&record, &self.config);
            self.apply(handle, &record, &decision);
            self.report.outcomes.insert(
                handle,
                ItemOutcome {
                    handle,
                    record: Some(record),
                    decision: Some(decision),
                    awaiting_year: false,
                },
            );
        }
    }

    fn apply(&mut self, handle: ItemHandle, record: &ItemRecord, decision: &Decision) {
        let hidden = decision.hidden();
        let target = self
            .extractor
            .removable()
            .and_then(|removable| closest(&self.host, handle, removable))
            .unwrap_or(handle);
        self.host.set_hidden(target, hidden);
        if let Some(rule) = decision.hidden_by {
            tracing::debug!(item = %record.id, %rule, "Hiding item");
        }
        if !hidden && self.options.show_verified_year {
            if let Some(year) = record.year {
                self.host.annotate_year(handle, year);
            }
        }
    }

    /// Steers the chip bar while exploration mode is on; undoes it when off.
    fn explore(&mut self) {
        let Some(strategy) = self.extractor.chips() else {
            return;
        };
        if !(self.config.enabled && self.config.exploration.enabled) {
            self.chips.restore(&mut self.host);
            return;
        }
        let counts = self.chips.steer(&mut self.host, strategy);
        self.report.chips_hidden += counts.hidden;
        self.report.chips_activated += counts.activated;
    }

    fn spawn_lookup(
        &mut self,
        handle: ItemHandle,
        record: ItemRecord,
        resolved_tx: &mpsc::Sender<Resolved>,
    ) {
        self.pending += 1;
        let generation = self.generation;
        let lookup = Arc::clone(&self.lookup);
        let tx = resolved_tx.clone();
        tokio::spawn(async move {
            let resolution = lookup.resolve_year(record.id.as_str().to_string()).await;
            let message = Resolved {
                generation,
                handle,
                record,
                resolution,
            };
            if tx.send(message).await.is_err() {
                tracing::debug!(handle, "Controller gone before lookup finished");
            }
        });
    }

    fn on_resolved(&mut self, resolved: Resolved) {
        self.pending = self.pending.saturating_sub(1);
        if resolved.generation != self.generation {
            // The cache still holds the answer; only this decision is dropped.
            self.report.stale_resolutions += 1;
            tracing::debug!(handle = resolved.handle, "Discarding decision from an earlier pass");
            return;
        }

        let record = resolved.record.with_year(resolved.resolution.year);
        let decision = evaluate(&record, &self.config);
        self.apply(resolved.handle, &record, &decision);
        self.report.outcomes.insert(
            resolved.handle,
            ItemOutcome {
                handle: resolved.handle,
                record: Some(record),
                decision: Some(decision),
                awaiting_year: false,
            },
        );
    }

    fn reload(
        &mut self,
        config: FilterConfig,
        resolved_tx: &mpsc::Sender<Resolved>,
        shutdown: &CancellationToken,
    ) {
        tracing::debug!(generation = self.generation + 1, "Configuration changed, restarting pass");
        self.stop_driver(StopReason::Cancelled);
        self.config = config;
        self.processed.clear();
        self.generation += 1;
        self.full_pass(resolved_tx);
        self.start_driver(shutdown);
    }

    fn start_driver(&mut self, shutdown: &CancellationToken) {
        if !self.config.has_active_rule() {
            return;
        }
        self.driver = Some(ConvergenceDriver::start(
            &self.host,
            self.processed.len(),
            self.options.scroll,
            shutdown.child_token(),
        ));
    }

    fn drive_scroll(&mut self) {
        let Some(driver) = self.driver.as_mut() else {
            return;
        };
        if let Some(summary) = driver.tick(&mut self.host, self.processed.len()) {
            self.report.scroll_runs.push(summary);
            self.driver = None;
        }
    }

    fn stop_driver(&mut self, reason: StopReason) {
        if let Some(mut driver) = self.driver.take() {
            let summary = driver.finish(&mut self.host, reason);
            self.report.scroll_runs.push(summary);
        }
    }
}
