//! Tier 1: read the publish year from the item's public watch page.
//!
//! Order: `<meta itemprop="uploadDate">`, `<meta itemprop="datePublished">`,
//! then the `dateText` of the embedded initial-data blob.

use chrono::{NaiveDate, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use regex::Regex;
use secrecy::SecretString;
use std::sync::OnceLock;
use std::time::Duration;

use super::http::fetch_body;
use super::{LookupError, YearSource};
use crate::text::{parse_absolute_year, parse_machine_date};
use crate::util::validate_base_url;

/// Watch pages run to a few hundred kilobytes; anything far larger is not one.
const WATCH_PAGE_LIMIT: usize = 4 * 1024 * 1024;
const INITIAL_DATA_MARKER: &str = "var ytInitialData = ";
const DATE_TEXT_POINTER: &str = "/contents/twoColumnWatchNextResults/results/results/contents/0/videoPrimaryInfoRenderer/dateText/simpleText";

pub struct PageScraper {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl PageScraper {
    /// `base_url` is the site root (`https://www.youtube.com`); HTTPS is
    /// required except for localhost.
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, LookupError> {
        let base = validate_base_url(base_url)?;
        Ok(Self {
            client,
            base_url: base.as_str().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    async fn fetch_year(&self, item_id: &str) -> Result<i32, LookupError> {
        let request = self
            .client
            .get(format!("{}/watch", self.base_url))
            .query(&[("v", item_id)])
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.8");
        let html = fetch_body(request, self.timeout, WATCH_PAGE_LIMIT).await?;
        year_from_watch_page(&html, Utc::now().date_naive()).ok_or(LookupError::NotFound)
    }
}

impl YearSource for PageScraper {
    fn name(&self) -> &'static str {
        "page"
    }

    fn lookup<'a>(
        &'a self,
        item_id: &'a str,
        _credential: Option<&'a SecretString>,
    ) -> BoxFuture<'a, Result<i32, LookupError>> {
        self.fetch_year(item_id).boxed()
    }
}

pub(crate) fn year_from_watch_page(html: &str, today: NaiveDate) -> Option<i32> {
    ["uploadDate", "datePublished"]
        .into_iter()
        .find_map(|prop| {
            meta_itemprop_content(html, prop).and_then(|content| parse_machine_date(content, today))
        })
        .or_else(|| initial_data_date_text(html).and_then(|t| parse_absolute_year(&t, today)))
}

fn meta_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<meta\b[^>]*>").expect("meta tag pattern compiles"))
}

/// `name="value"`, `name='value'` or `name=value`.
fn tag_attr() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
            .expect("tag attribute pattern compiles")
    })
}

/// `content` of the first `<meta>` whose `itemprop` equals `itemprop`, ignoring case.
fn meta_itemprop_content<'a>(html: &'a str, itemprop: &str) -> Option<&'a str> {
    meta_tag().find_iter(html).find_map(|tag| {
        let mut prop = None;
        let mut content = None;
        for caps in tag_attr().captures_iter(tag.as_str()) {
            let Some(value) = caps.get(2).or_else(|| caps.get(3)).or_else(|| caps.get(4)) else {
                continue;
            };
            if caps[1].eq_ignore_ascii_case("itemprop") {
                prop = Some(value.as_str());
            } else if caps[1].eq_ignore_ascii_case("content") {
                content = Some(value.as_str());
            }
        }
        prop.filter(|p| p.eq_ignore_ascii_case(itemprop)).and(content)
    })
}

fn initial_data_date_text(html: &str) -> Option<String> {
    let start = html.find(INITIAL_DATA_MARKER)? + INITIAL_DATA_MARKER.len();
    // Parse exactly one JSON value; the script continues after it.
    let mut values = serde_json::Deserializer::from_str(&html[start..]).into_iter::<serde_json::Value>();
    let data = values.next()?.ok()?;
    data.pointer(DATE_TEXT_POINTER)?
        .as_str()
        .map(str::to_string)
}
