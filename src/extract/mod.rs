//! Attribute Extractor.
//!
//! Turns one feed item's subtree into an [`ItemRecord`] by running the
//! source's strategy lists (see [`profiles`]) field by field. The first
//! strategy producing a usable value wins. Missing title means the
//! extractor abstains; every other field is nullable.

mod profiles;

pub use profiles::Source;
pub(crate) use profiles::{ChipStrategy, Discovery};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

use crate::node::FeedNode;
use crate::selector::Selector;
use crate::text::{
    parse_absolute_year, parse_duration, parse_machine_date, parse_relative_or_absolute_year,
    parse_relative_year, parse_release_year, parse_tags,
};
use crate::util::{normalize_whitespace, strip_control_chars};
use profiles::{profile, IdStrategy, SourceProfile, TextStrategy, YearStrategy};

/// Relative links are resolved against this before their path or query is read.
const LINK_BASE: &str = "https://feed.invalid/";

/// Identity of an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ItemId {
    /// Taken from the item's markup (video id, track path).
    Canonical(String),
    /// SHA-256 of `title|author`, used when the markup carries no id.
    Derived(String),
}

impl ItemId {
    pub fn derive(title: &str, author: &str) -> Self {
        let hash = Sha256::digest(format!("{title}|{author}").as_bytes());
        ItemId::Derived(format!("{:x}", hash))
    }

    pub fn as_str(&self) -> &str {
        match self {
            ItemId::Canonical(id) | ItemId::Derived(id) => id,
        }
    }

    pub fn is_canonical(&self) -> bool {
        matches!(self, ItemId::Canonical(_))
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: ItemId,
    pub title: String,
    pub author: String,
    pub duration_seconds: Option<u32>,
    pub year: Option<i32>,
    pub tags: Vec<String>,
}

impl ItemRecord {
    /// Copy of this record with the year filled in by a later resolution.
    pub fn with_year(&self, year: Option<i32>) -> Self {
        Self {
            year,
            ..self.clone()
        }
    }
}

/// Extractor bound to one source and one notion of "today".
///
/// `today` anchors relative phrases; keeping it fixed for the extractor's
/// lifetime makes extraction of an unchanged subtree deterministic.
#[derive(Clone, Copy)]
pub struct Extractor {
    source: Source,
    profile: &'static SourceProfile,
    today: NaiveDate,
}

impl fmt::Debug for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extractor")
            .field("source", &self.source)
            .field("today", &self.today)
            .finish()
    }
}

impl Extractor {
    pub fn new(source: Source, today: NaiveDate) -> Self {
        Self {
            source,
            profile: profile(source),
            today,
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    /// Selector for the item roots of this source.
    pub fn item_selector(&self) -> &'static Selector {
        &self.profile.item
    }

    /// Fallbacks for item roots the item selector misses.
    pub(crate) fn discovery(&self) -> &'static [Discovery] {
        &self.profile.discovery
    }

    /// Ancestor to hide in place of an item root, when the source has one.
    pub(crate) fn removable(&self) -> Option<&'static Selector> {
        self.profile.removable.as_ref()
    }

    pub(crate) fn chips(&self) -> Option<&'static ChipStrategy> {
        self.profile.chips.as_ref()
    }

    /// Whether a missing year may be looked up remotely for this record.
    pub fn wants_remote_year(&self, record: &ItemRecord) -> bool {
        self.profile.remote_year && record.year.is_none() && record.id.is_canonical()
    }

    /// Extracts a record, or `None` when no title strategy matched.
    pub fn extract(&self, item: &FeedNode) -> Option<ItemRecord> {
        let p = self.profile;
        let Some(title) = first_text(&p.title, item) else {
            tracing::debug!(source = %self.source, tag = %item.tag, "No title found, abstaining");
            return None;
        };
        let author = first_text(&p.author, item).unwrap_or_default();

        let id = extract_id(&p.id, item)
            .map(ItemId::Canonical)
            .unwrap_or_else(|| ItemId::derive(&title, &author));

        let duration_seconds = p.duration.iter().find_map(|selector| {
            selector
                .select(item)
                .into_iter()
                .find_map(|el| parse_duration(&el.text_content()))
        });

        let year = p.year.iter().find_map(|s| self.extract_year(s, item));

        let hrefs: Vec<&str> = p
            .tag_links
            .select(item)
            .into_iter()
            .filter_map(|el| el.attr("href"))
            .collect();
        let tags = parse_tags(hrefs, &item.text_content());

        Some(ItemRecord {
            id,
            title,
            author,
            duration_seconds,
            year,
            tags,
        })
    }

    fn extract_year(&self, strategy: &YearStrategy, item: &FeedNode) -> Option<i32> {
        let today = self.today;
        match strategy {
            YearStrategy::Datetime(selector) => selector
                .select(item)
                .into_iter()
                .filter_map(|el| el.attr("datetime"))
                .find_map(|dt| parse_machine_date(dt, today)),
            YearStrategy::Phrase(selector) => selector
                .select(item)
                .into_iter()
                .find_map(|el| parse_relative_or_absolute_year(&el.text_content(), None, today)),
            YearStrategy::Relative(selector) => selector
                .select(item)
                .into_iter()
                .find_map(|el| parse_relative_year(&el.text_content(), today)),
            YearStrategy::ReleaseLabel(selector) => selector
                .select(item)
                .into_iter()
                .find_map(|el| parse_release_year(&el.text_content(), today)),
            YearStrategy::Absolute {
                selector,
                include_aria,
            } => selector.select(item).into_iter().find_map(|el| {
                parse_absolute_year(&el.text_content(), today).or_else(|| {
                    include_aria
                        .then(|| el.attr("aria-label"))
                        .flatten()
                        .and_then(|label| parse_absolute_year(label, today))
                })
            }),
            YearStrategy::ItemText => parse_absolute_year(&item.text_content(), today),
        }
    }
}

/// Cleans a candidate title/author: control characters stripped, whitespace
/// collapsed. Bare numbers and clock values are not names.
fn usable_text(raw: &str) -> Option<String> {
    let text = normalize_whitespace(&strip_control_chars(raw));
    if text.is_empty() {
        return None;
    }
    let numeric = text
        .split(':')
        .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()));
    (!numeric).then_some(text)
}

fn first_text(strategies: &[TextStrategy], item: &FeedNode) -> Option<String> {
    strategies.iter().find_map(|strategy| match strategy {
        TextStrategy::First(selector) => selector
            .select_first(item)
            .and_then(|el| usable_text(&el.text_content())),
        TextStrategy::AttrCapture {
            selector,
            attr,
            pattern,
        } => {
            let value = selector.select_first(item)?.attr(attr)?;
            usable_text(pattern.captures(value)?.get(1)?.as_str())
        }
        TextStrategy::LinkMatching {
            href,
            exclude_class,
        } => item
            .descendants()
            .into_iter()
            .filter(|el| el.tag == "a" && !el.has_class(exclude_class))
            .filter(|el| el.attr("href").is_some_and(|h| href.is_match(h)))
            .find_map(|el| usable_text(&el.text_content())),
        TextStrategy::Nth { selector, index } => selector
            .select(item)
            .get(*index)
            .and_then(|el| usable_text(&el.text_content())),
    })
}

fn resolve_link(href: &str) -> Option<Url> {
    Url::parse(LINK_BASE).ok()?.join(href.trim()).ok()
}

fn extract_id(strategies: &[IdStrategy], item: &FeedNode) -> Option<String> {
    strategies.iter().find_map(|strategy| {
        let id = match strategy {
            IdStrategy::Attr { selector, attr } => {
                selector.select_first(item)?.attr(attr)?.trim().to_string()
            }
            IdStrategy::LinkParam { selector, param } => {
                let url = resolve_link(selector.select_first(item)?.attr("href")?)?;
                url.query_pairs()
                    .find(|(k, _)| k == param)
                    .map(|(_, v)| v.into_owned())?
            }
            IdStrategy::LinkPath { selector, pattern } => {
                let url = resolve_link(selector.select_first(item)?.attr("href")?)?;
                pattern.captures(url.path())?.get(1)?.as_str().to_string()
            }
        };
        (!id.is_empty()).then_some(id)
    })
}
