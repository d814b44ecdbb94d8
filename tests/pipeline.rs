//! Incremental processing controller over in-memory hosts.

use chrono::NaiveDate;
use futures::future::{BoxFuture, FutureExt};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use metagroove::extract::{Extractor, Source};
use metagroove::filter::{merge, FilterConfig, PartialFilterConfig, Rule};
use metagroove::node::FeedNode;
use metagroove::pipeline::{
    Controller, ControllerOptions, FeedHost, HostEvent, HostItem, ItemHandle, ScrollOptions,
    SnapshotHost, StopReason,
};
use metagroove::resolve::{Resolution, YearLookup};
use metagroove::selector::Selector;

/// Handle of `div#contents` in every page built by [`page`].
const CONTENTS: ItemHandle = 1;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

fn extractor() -> Extractor {
    Extractor::new(Source::Youtube, today())
}

fn video(id: &str, title: &str, duration: Option<&str>, date: Option<&str>) -> FeedNode {
    let mut thumbnail = FeedNode::new("a")
        .with_attr("id", "thumbnail")
        .with_attr("href", format!("/watch?v={id}"));
    if let Some(duration) = duration {
        thumbnail = thumbnail.with_child(
            FeedNode::new("ytd-thumbnail-overlay-time-status-renderer")
                .with_child(FeedNode::new("span").with_text(duration)),
        );
    }
    let mut item = FeedNode::new("ytd-rich-item-renderer")
        .with_child(thumbnail)
        .with_child(
            FeedNode::new("a")
                .with_attr("id", "video-title-link")
                .with_text(title),
        )
        .with_child(
            FeedNode::new("ytd-channel-name").with_child(FeedNode::new("a").with_text("Channel")),
        );
    if let Some(date) = date {
        item = item.with_child(FeedNode::new("time").with_attr("datetime", date));
    }
    item
}

fn page(items: Vec<FeedNode>) -> FeedNode {
    let contents = items
        .into_iter()
        .fold(FeedNode::new("div").with_attr("id", "contents"), |p, item| {
            p.with_child(item)
        });
    FeedNode::new("ytd-browse").with_child(contents)
}

fn config(value: serde_json::Value) -> FilterConfig {
    let partial: PartialFilterConfig = serde_json::from_value(value).unwrap();
    merge(&FilterConfig::default(), &partial)
}

fn options(stable_ticks: u32) -> ControllerOptions {
    ControllerOptions {
        rescan_interval: Duration::from_millis(500),
        scroll: ScrollOptions {
            tick: Duration::from_millis(50),
            step_px: 100,
            max_ticks: 200,
            stable_ticks,
        },
        show_verified_year: true,
        source_enabled: true,
    }
}

/// Answers from a fixed table after a delay.
#[derive(Default)]
struct TableLookup {
    years: HashMap<String, i32>,
    delay: Duration,
    calls: AtomicUsize,
}

impl TableLookup {
    fn new(years: &[(&str, i32)], delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            years: years.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            delay,
            calls: AtomicUsize::new(0),
        })
    }
}

impl YearLookup for TableLookup {
    fn resolve_year(&self, item_id: String) -> BoxFuture<'static, Resolution> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let year = self.years.get(&item_id).copied();
        let delay = self.delay;
        async move {
            tokio::time::sleep(delay).await;
            Resolution {
                year,
                was_cached: false,
            }
        }
        .boxed()
    }
}

fn no_lookup() -> Arc<TableLookup> {
    TableLookup::new(&[], Duration::ZERO)
}

/// Loads one more item per forward scroll while `loads_left` lasts.
struct GrowingHost {
    inner: SnapshotHost,
    loads_left: u32,
    loaded: u32,
}

impl FeedHost for GrowingHost {
    fn items(&self, selector: &Selector, scope: Option<ItemHandle>) -> Vec<HostItem> {
        self.inner.items(selector, scope)
    }

    fn set_hidden(&mut self, item: ItemHandle, hidden: bool) {
        self.inner.set_hidden(item, hidden);
    }

    fn annotate_year(&mut self, item: ItemHandle, year: i32) {
        self.inner.annotate_year(item, year);
    }

    fn scroll_offset(&self) -> i64 {
        self.inner.scroll_offset()
    }

    fn scroll_to(&mut self, offset: i64) {
        self.inner.scroll_to(offset);
    }

    fn scroll_by(&mut self, delta: i64) {
        self.inner.scroll_by(delta);
        if self.loads_left > 0 {
            self.loads_left -= 1;
            self.loaded += 1;
            let id = format!("grown{:06}", self.loaded);
            self.inner
                .append(CONTENTS, video(&id, "Loaded later", Some("3:00"), Some("2018-01-01")));
        }
    }

    fn page_height(&self) -> i64 {
        self.inner.page_height()
    }
}

/// Host shared with the test body so it can insert while the controller runs.
#[derive(Clone)]
struct SharedHost(Arc<Mutex<SnapshotHost>>);

impl FeedHost for SharedHost {
    fn items(&self, selector: &Selector, scope: Option<ItemHandle>) -> Vec<HostItem> {
        self.0.lock().unwrap().items(selector, scope)
    }

    fn set_hidden(&mut self, item: ItemHandle, hidden: bool) {
        self.0.lock().unwrap().set_hidden(item, hidden);
    }

    fn annotate_year(&mut self, item: ItemHandle, year: i32) {
        self.0.lock().unwrap().annotate_year(item, year);
    }

    fn scroll_offset(&self) -> i64 {
        self.0.lock().unwrap().scroll_offset()
    }

    fn scroll_to(&mut self, offset: i64) {
        self.0.lock().unwrap().scroll_to(offset);
    }

    fn page_height(&self) -> i64 {
        self.0.lock().unwrap().page_height()
    }
}

fn closed_channel() -> mpsc::Receiver<HostEvent> {
    let (_tx, rx) = mpsc::channel(1);
    rx
}

#[tokio::test(start_paused = true)]
async fn test_long_set_hidden_by_duration() {
    let host = SnapshotHost::new(page(vec![
        video("festival01", "festival set 2015", Some("1:02:03"), None),
        video("shortone01", "radio edit", Some("3:30"), None),
    ]));
    let mut controller = Controller::new(
        host,
        extractor(),
        no_lookup(),
        config(json!({"duration": {"enabled": true, "min": 0, "max": 1800}})),
        options(3),
    );

    let report = controller
        .run(closed_channel(), CancellationToken::new())
        .await
        .clone();

    let outcomes: Vec<_> = report.outcomes.values().collect();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].record.as_ref().unwrap().duration_seconds, Some(3723));
    assert_eq!(
        outcomes[0].decision.as_ref().unwrap().hidden_by,
        Some(Rule::Duration)
    );
    assert!(!outcomes[1].hidden());
    assert!(controller.host().is_hidden(outcomes[0].handle));
    assert!(!controller.host().is_hidden(outcomes[1].handle));
}

#[tokio::test(start_paused = true)]
async fn test_known_year_inside_range_is_shown() {
    let host = SnapshotHost::new(page(vec![video(
        "year201901",
        "Live session",
        Some("4:00"),
        Some("2019-06-01"),
    )]));
    let lookup = no_lookup();
    let mut controller = Controller::new(
        host,
        extractor(),
        lookup.clone(),
        config(json!({"year": {"enabled": true, "min": 2010, "max": 2020, "showUnknown": false}})),
        options(3),
    );

    let report = controller
        .run(closed_channel(), CancellationToken::new())
        .await
        .clone();

    let outcome = report.outcomes.values().next().unwrap();
    assert_eq!(outcome.record.as_ref().unwrap().year, Some(2019));
    assert!(!outcome.hidden());
    assert_eq!(controller.host().year_annotation(outcome.handle), Some(2019));
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_missing_years_are_resolved_asynchronously() {
    let host = SnapshotHost::new(page(vec![
        video("remote0001", "Found later", Some("4:00"), None),
        video("remote0002", "Never found", Some("4:00"), None),
        video("local00001", "Too old", Some("4:00"), Some("2005-01-01")),
        FeedNode::new("ytd-rich-item-renderer").with_child(FeedNode::new("span").with_text("ad")),
    ]));
    let lookup = TableLookup::new(&[("remote0001", 2012)], Duration::from_millis(300));
    let mut controller = Controller::new(
        host,
        extractor(),
        lookup.clone(),
        config(json!({"year": {"enabled": true, "min": 2010, "max": 2020, "showUnknown": false}})),
        options(3),
    );

    let report = controller
        .run(closed_channel(), CancellationToken::new())
        .await
        .clone();

    assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
    let by_title: HashMap<_, _> = report
        .outcomes
        .values()
        .filter_map(|o| o.record.as_ref().map(|r| (r.title.clone(), o)))
        .collect();

    let found = by_title["Found later"];
    assert_eq!(found.record.as_ref().unwrap().year, Some(2012));
    assert!(!found.hidden());
    assert!(!found.awaiting_year);
    assert_eq!(controller.host().year_annotation(found.handle), Some(2012));

    let missing = by_title["Never found"];
    assert_eq!(missing.decision.as_ref().unwrap().hidden_by, Some(Rule::Year));
    assert!(controller.host().is_hidden(missing.handle));

    assert_eq!(
        by_title["Too old"].decision.as_ref().unwrap().hidden_by,
        Some(Rule::Year)
    );
    assert_eq!(report.abstained_count(), 1);
    assert_eq!(report.hidden_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_scroll_driver_converges_and_restores_position() {
    const STABLE: u32 = 4;
    let mut inner = SnapshotHost::new(page(vec![video(
        "seed000001",
        "First",
        Some("3:00"),
        Some("2018-01-01"),
    )]));
    inner.scroll_to(300);
    let host = GrowingHost {
        inner,
        loads_left: 4,
        loaded: 0,
    };
    let mut controller = Controller::new(
        host,
        extractor(),
        no_lookup(),
        config(json!({"blacklist": {"enabled": true, "terms": "nightcore"}})),
        options(STABLE),
    );

    let report = controller
        .run(closed_channel(), CancellationToken::new())
        .await
        .clone();

    assert_eq!(report.scroll_runs.len(), 1);
    let run = report.scroll_runs[0];
    assert_eq!(run.reason, StopReason::Converged);
    assert!(run.ticks <= 5 + STABLE, "ran {} ticks", run.ticks);
    assert_eq!(controller.host().scroll_offset(), 300);
    assert_eq!(controller.processed_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_no_active_rule_means_no_scrolling() {
    let host = GrowingHost {
        inner: SnapshotHost::new(page(vec![video("seed000001", "First", None, None)])),
        loads_left: 10,
        loaded: 0,
    };
    let mut controller = Controller::new(
        host,
        extractor(),
        no_lookup(),
        FilterConfig::default(),
        options(3),
    );

    let report = controller
        .run(closed_channel(), CancellationToken::new())
        .await
        .clone();

    assert!(report.scroll_runs.is_empty());
    assert_eq!(controller.processed_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_config_change_cancels_scroll_and_reprocesses() {
    let host = GrowingHost {
        inner: SnapshotHost::new(page(vec![video(
            "remix00001",
            "Song (Remix)",
            Some("3:00"),
            None,
        )])),
        loads_left: u32::MAX,
        loaded: 0,
    };
    let mut controller = Controller::new(
        host,
        extractor(),
        no_lookup(),
        config(json!({"blacklist": {"enabled": true, "terms": "remix"}})),
        options(3),
    );
    let (tx, rx) = mpsc::channel(4);

    let driver = async {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        tx.send(HostEvent::ConfigChanged(config(json!({"enabled": false}))))
            .await
            .unwrap();
        drop(tx);
    };
    let (report, ()) = tokio::join!(controller.run(rx, CancellationToken::new()), driver);
    let report = report.clone();

    assert_eq!(report.passes, 2);
    assert_eq!(report.scroll_runs.len(), 1);
    assert_eq!(report.scroll_runs[0].reason, StopReason::Cancelled);
    assert_eq!(controller.host().scroll_offset(), 0);
    assert_eq!(report.hidden_count(), 0);
    assert_eq!(controller.host().inner.hidden_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stale_resolution_is_discarded() {
    let host = SnapshotHost::new(page(vec![video("slow000001", "Slow", Some("3:00"), None)]));
    let lookup = TableLookup::new(&[("slow000001", 1999)], Duration::from_secs(5));
    let mut controller = Controller::new(
        host,
        extractor(),
        lookup.clone(),
        config(json!({"year": {"enabled": true, "min": 2010, "max": 2020}})),
        options(3),
    );
    let (tx, rx) = mpsc::channel(4);

    let driver = async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(HostEvent::ConfigChanged(config(json!({"duration": {"enabled": true}}))))
            .await
            .unwrap();
        drop(tx);
    };
    let (report, ()) = tokio::join!(controller.run(rx, CancellationToken::new()), driver);
    let report = report.clone();

    assert_eq!(report.stale_resolutions, 1);
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    let outcome = report.outcomes.values().next().unwrap();
    // 1999 would be out of range, but that answer belonged to the old pass.
    assert!(!outcome.hidden());
    assert_eq!(outcome.record.as_ref().unwrap().year, None);
}

#[tokio::test(start_paused = true)]
async fn test_inserted_subtrees_are_processed() {
    let shared = SharedHost(Arc::new(Mutex::new(SnapshotHost::new(page(vec![video(
        "first00001",
        "Original",
        Some("3:00"),
        None,
    )])))));
    let mut controller = Controller::new(
        shared.clone(),
        extractor(),
        no_lookup(),
        config(json!({"blacklist": {"enabled": true, "terms": ["remix"]}})),
        options(2),
    );
    let (tx, rx) = mpsc::channel(4);

    let inserter = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let announced = shared
            .0
            .lock()
            .unwrap()
            .append(CONTENTS, video("remix00001", "A Remix", None, None))
            .unwrap();
        tx.send(HostEvent::SubtreeInserted(announced)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        // Not announced: only the periodic rescan finds it.
        let silent = shared
            .0
            .lock()
            .unwrap()
            .append(CONTENTS, video("remix00002", "B Remix", None, None))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        drop(tx);
        (announced, silent)
    };
    let (report, (announced, silent)) =
        tokio::join!(controller.run(rx, CancellationToken::new()), inserter);
    let report = report.clone();

    assert_eq!(report.outcomes.len(), 3);
    let host = shared.0.lock().unwrap();
    assert!(host.is_hidden(announced));
    assert!(host.is_hidden(silent));
    assert_eq!(report.hidden_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_context_destroyed_stops_and_restores() {
    let mut inner = SnapshotHost::new(page(vec![video("first00001", "One", None, None)]));
    inner.scroll_to(40);
    let host = GrowingHost {
        inner,
        loads_left: u32::MAX,
        loaded: 0,
    };
    let mut controller = Controller::new(
        host,
        extractor(),
        no_lookup(),
        config(json!({"tags": {"enabled": true, "values": "lofi"}})),
        options(3),
    );
    let (tx, rx) = mpsc::channel(4);

    let destroyer = async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        tx.send(HostEvent::ContextDestroyed).await.unwrap();
    };
    let (report, ()) = tokio::join!(controller.run(rx, CancellationToken::new()), destroyer);

    assert_eq!(report.scroll_runs[0].reason, StopReason::Cancelled);
    assert_eq!(controller.host().scroll_offset(), 40);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_source_leaves_page_alone() {
    let host = SnapshotHost::new(page(vec![video("remix00001", "Remix", None, None)]));
    let mut controller = Controller::new(
        host,
        extractor(),
        no_lookup(),
        config(json!({"blacklist": {"enabled": true, "terms": "remix"}})),
        ControllerOptions {
            source_enabled: false,
            ..options(3)
        },
    );

    let report = controller
        .run(closed_channel(), CancellationToken::new())
        .await
        .clone();

    assert!(report.outcomes.is_empty());
    assert_eq!(controller.host().hidden_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_token_stops_controller() {
    let host = GrowingHost {
        inner: SnapshotHost::new(page(vec![video("first00001", "One", None, None)])),
        loads_left: u32::MAX,
        loaded: 0,
    };
    let mut controller = Controller::new(
        host,
        extractor(),
        no_lookup(),
        config(json!({"duration": {"enabled": true}})),
        options(3),
    );
    let (_tx, rx) = mpsc::channel(4);
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();

    let stopper = async {
        tokio::time::sleep(Duration::from_millis(700)).await;
        trigger.cancel();
    };
    let (report, ()) = tokio::join!(controller.run(rx, shutdown), stopper);

    assert_eq!(report.scroll_runs.len(), 1);
    assert_eq!(report.scroll_runs[0].reason, StopReason::Cancelled);
    assert_eq!(controller.host().scroll_offset(), 0);
}

fn chip(label: &str) -> FeedNode {
    FeedNode::new("yt-chip-cloud-chip-renderer")
        .with_child(FeedNode::new("button").with_child(FeedNode::new("span").with_text(label)))
}

fn chip_page() -> FeedNode {
    FeedNode::new("ytd-app")
        .with_child(
            FeedNode::new("ytd-feed-filter-chip-bar-renderer")
                .with_child(chip("All"))
                .with_child(chip("For you"))
                .with_child(chip("Not watched"))
                .with_child(chip("Related")),
        )
        .with_child(page(vec![video("explore001", "Deep cut", Some("4:00"), None)]))
}

/// Label of the chip whose button was clicked.
fn activated_labels(host: &SnapshotHost) -> Vec<String> {
    host.activated()
        .iter()
        .filter_map(|&button| host.parent(button))
        .filter_map(|chip| host.item(chip))
        .map(|chip| chip.node.text_content())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_exploration_selects_not_watched_on_search_page() {
    let host = SnapshotHost::new(chip_page()).with_location("/results");
    let mut controller = Controller::new(
        host,
        extractor(),
        no_lookup(),
        config(json!({"exploration": {"enabled": true}})),
        options(3),
    );

    let report = controller
        .run(closed_channel(), CancellationToken::new())
        .await
        .clone();

    assert_eq!(report.chips_hidden, 2);
    assert_eq!(report.chips_activated, 1);
    assert_eq!(activated_labels(controller.host()), vec!["Not watched"]);
    // Hiding chips does not touch the feed itself.
    assert_eq!(report.hidden_count(), 0);
    assert_eq!(controller.host().hidden_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_exploration_selects_related_elsewhere_and_undoes_when_disabled() {
    let host = SnapshotHost::new(chip_page()).with_location("/watch");
    let mut controller = Controller::new(
        host,
        extractor(),
        no_lookup(),
        config(json!({"exploration": {"enabled": true}})),
        options(3),
    );
    let (tx, rx) = mpsc::channel(4);

    let driver = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(HostEvent::ConfigChanged(config(json!({"exploration": {"enabled": false}}))))
            .await
            .unwrap();
        drop(tx);
    };
    let (report, ()) = tokio::join!(controller.run(rx, CancellationToken::new()), driver);
    let report = report.clone();

    assert_eq!(report.passes, 2);
    assert_eq!(report.chips_activated, 1);
    assert_eq!(activated_labels(controller.host()), vec!["Related"]);
    assert_eq!(controller.host().hidden_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_exploration_off_by_default() {
    let host = SnapshotHost::new(chip_page()).with_location("/results");
    let mut controller = Controller::new(
        host,
        extractor(),
        no_lookup(),
        FilterConfig::default(),
        options(3),
    );

    let report = controller
        .run(closed_channel(), CancellationToken::new())
        .await
        .clone();

    assert_eq!(report.chips_hidden, 0);
    assert!(controller.host().activated().is_empty());
}

fn sc_track(path: &str, title: &str) -> FeedNode {
    FeedNode::new("div").with_child(
        FeedNode::new("a")
            .with_class("soundTitle__title")
            .with_attr("href", path)
            .with_child(FeedNode::new("span").with_text(title)),
    )
}

/// A profile page: a spotlight section, a regular stream list, and a
/// card the item selector does not know about.
fn soundcloud_profile() -> FeedNode {
    FeedNode::new("main")
        .with_child(
            FeedNode::new("div")
                .with_class("userMain")
                .with_child(FeedNode::new("h3").with_text("Spotlight"))
                .with_child(
                    FeedNode::new("div")
                        .with_class("spotlightTracks")
                        .with_child(FeedNode::new("div").with_child(sc_track(
                            "/artist/bootleg-one",
                            "Bootleg one",
                        )))
                        .with_child(FeedNode::new("div").with_child(sc_track(
                            "/artist/original-two",
                            "Original two",
                        ))),
                ),
        )
        .with_child(
            FeedNode::new("ul").with_class("soundList").with_child(
                FeedNode::new("li")
                    .with_class("soundList__item")
                    .with_child(sc_track("/artist/listed-three", "Listed three")),
            ),
        )
        .with_child(
            FeedNode::new("article").with_class("feedCard").with_child(
                FeedNode::new("div")
                    .with_class("cardBody")
                    .with_child(sc_track("/artist/bootleg-four", "Bootleg four"))
                    .with_child(
                        FeedNode::new("span")
                            .with_class("sc-at-date")
                            .with_text("2 years ago"),
                    ),
            ),
        )
}

#[tokio::test(start_paused = true)]
async fn test_soundcloud_spotlight_and_dated_cards_are_discovered() {
    let host = SnapshotHost::new(soundcloud_profile());
    let mut controller = Controller::new(
        host,
        Extractor::new(Source::Soundcloud, today()),
        no_lookup(),
        config(json!({"blacklist": {"enabled": true, "terms": "bootleg"}})),
        options(3),
    );
    let (_tx, rx) = mpsc::channel(4);
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    let stopper = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    };
    let (report, ()) = tokio::join!(controller.run(rx, shutdown), stopper);
    let report = report.clone();

    let mut titles: Vec<_> = report
        .outcomes
        .values()
        .filter_map(|o| o.record.as_ref())
        .map(|r| r.title.clone())
        .collect();
    titles.sort();
    assert_eq!(
        titles,
        vec!["Bootleg four", "Bootleg one", "Listed three", "Original two"]
    );
    assert_eq!(report.hidden_count(), 2);

    let host = controller.host();
    let article = host
        .select_all(&Selector::parse("article").unwrap(), None)
        .into_iter()
        .next()
        .unwrap();
    let card_body = host
        .select_all(&Selector::parse(".cardBody").unwrap(), None)
        .into_iter()
        .next()
        .unwrap();
    // The card is hidden as a whole, not just the discovered body.
    assert!(host.is_hidden(article));
    assert!(!host.is_hidden(card_body));

    let spotlight_first = host
        .select_all(&Selector::parse(".spotlightTracks > div").unwrap(), None)
        .into_iter()
        .next()
        .unwrap();
    assert!(host.is_hidden(spotlight_first));
    assert_eq!(host.hidden_count(), 2);
}
