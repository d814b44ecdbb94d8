//! Per-source strategy tables.
//!
//! Every list is in priority order: specific structural markers first,
//! generic link traversal and positional heuristics last. Markup on the
//! host sites changes without notice, so these tables are the part of the
//! crate expected to need revision.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::selector::Selector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    Youtube,
    YoutubeMusic,
    Soundcloud,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Youtube, Source::YoutubeMusic, Source::Soundcloud];

    pub fn as_str(self) -> &'static str {
        match self {
            Source::Youtube => "youtube",
            Source::YoutubeMusic => "youtube-music",
            Source::Soundcloud => "soundcloud",
        }
    }

    /// Whether the source is switched on when no preference was ever stored.
    pub fn enabled_by_default(self) -> bool {
        !matches!(self, Source::YoutubeMusic)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "youtube" | "yt" => Ok(Source::Youtube),
            "youtube-music" | "ytm" => Ok(Source::YoutubeMusic),
            "soundcloud" | "sc" => Ok(Source::Soundcloud),
            other => Err(format!("unknown source: {other}")),
        }
    }
}

/// Ways to find the canonical item id.
pub(crate) enum IdStrategy {
    /// Value of an attribute on the first matching element.
    Attr { selector: Selector, attr: &'static str },
    /// A query parameter of the first matching link's `href`.
    LinkParam { selector: Selector, param: &'static str },
    /// Capture group 1 of `pattern` applied to the path of the first matching link.
    LinkPath { selector: Selector, pattern: Regex },
}

/// Ways to find a title or author string.
pub(crate) enum TextStrategy {
    /// Text of the first matching element.
    First(Selector),
    /// Capture group 1 of `pattern` applied to an attribute of the first matching element.
    AttrCapture {
        selector: Selector,
        attr: &'static str,
        pattern: Regex,
    },
    /// First `a[href]` whose href matches `href`, skipping elements with `exclude_class`.
    LinkMatching {
        href: Regex,
        exclude_class: &'static str,
    },
    /// Positional: the `index`-th match of `selector`.
    Nth { selector: Selector, index: usize },
}

pub(crate) enum YearStrategy {
    /// `datetime` attribute of matching elements.
    Datetime(Selector),
    /// Per element: relative phrase, then absolute token.
    Phrase(Selector),
    /// Relative phrases only.
    Relative(Selector),
    /// `Album • 2015` style labels.
    ReleaseLabel(Selector),
    /// Absolute tokens in element text, and `aria-label` when `include_aria`.
    Absolute { selector: Selector, include_aria: bool },
    /// Absolute token anywhere in the item's text.
    ItemText,
}

/// Fallback ways to find item roots the `item` selector misses.
pub(crate) enum Discovery {
    /// Date elements climbed to the element that holds the whole track.
    DateAnchor {
        anchors: Selector,
        /// Text an anchor must match unless it is a `<time>` element.
        relative: Regex,
        /// Tried in order; the nearest ancestor matching the first hit wins.
        containers: Vec<Selector>,
        /// Without a container, the first ancestor holding one of these is used.
        marker: Selector,
        max_ascent: usize,
        /// Ascent stops at an element with this tag.
        stop_tag: &'static str,
    },
    /// Blocks following a section header whose own text contains a keyword.
    Section {
        headers: Selector,
        keywords: &'static [&'static str],
        candidates: Selector,
        /// A candidate is an item when it holds exactly one marker.
        marker: Selector,
    },
}

/// The chip bar above a feed and which chips to hide or select.
pub(crate) struct ChipStrategy {
    pub bar: Selector,
    pub chip: Selector,
    /// Clicked instead of the chip when the chip has one.
    pub button: Selector,
    /// Chips whose whole label is one of these are hidden.
    pub hide: &'static [&'static str],
    pub search_path: &'static str,
    /// Selected on the search page when the label contains one of these.
    pub on_search: &'static [&'static str],
    /// Selected everywhere else.
    pub elsewhere: &'static [&'static str],
}

pub(crate) struct SourceProfile {
    pub item: Selector,
    pub discovery: Vec<Discovery>,
    /// Ancestor hidden in place of the item root when one matches.
    pub removable: Option<Selector>,
    pub chips: Option<ChipStrategy>,
    pub id: Vec<IdStrategy>,
    pub title: Vec<TextStrategy>,
    pub author: Vec<TextStrategy>,
    /// Each matching element's text is tried as a duration, in document order.
    pub duration: Vec<Selector>,
    pub year: Vec<YearStrategy>,
    pub tag_links: Selector,
    /// Canonical ids on this source can be looked up remotely.
    pub remote_year: bool,
}

fn sel(source: &str) -> Selector {
    Selector::parse(source).expect("built-in selector parses")
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in pattern compiles")
}

pub(crate) fn profile(source: Source) -> &'static SourceProfile {
    static YOUTUBE: OnceLock<SourceProfile> = OnceLock::new();
    static YOUTUBE_MUSIC: OnceLock<SourceProfile> = OnceLock::new();
    static SOUNDCLOUD: OnceLock<SourceProfile> = OnceLock::new();
    match source {
        Source::Youtube => YOUTUBE.get_or_init(youtube),
        Source::YoutubeMusic => YOUTUBE_MUSIC.get_or_init(youtube_music),
        Source::Soundcloud => SOUNDCLOUD.get_or_init(soundcloud),
    }
}

fn youtube() -> SourceProfile {
    SourceProfile {
        item: sel(
            "ytd-rich-item-renderer, ytd-video-renderer, ytd-grid-video-renderer, ytd-compact-video-renderer",
        ),
        id: vec![
            IdStrategy::LinkParam {
                selector: sel("a#thumbnail[href], a.ytd-thumbnail[href]"),
                param: "v",
            },
            IdStrategy::LinkPath {
                selector: sel("a#thumbnail[href], a.ytd-thumbnail[href]"),
                pattern: re(r"^/shorts/([\w-]{6,})"),
            },
            IdStrategy::Attr {
                selector: sel("[data-video-id]"),
                attr: "data-video-id",
            },
        ],
        title: vec![TextStrategy::First(sel("#video-title, h3 a, #video-title-link"))],
        author: vec![
            TextStrategy::First(sel("ytd-channel-name a")),
            TextStrategy::First(sel("#channel-name a")),
            TextStrategy::First(sel("#text.ytd-channel-name")),
            TextStrategy::First(sel(".ytd-channel-name #text")),
        ],
        duration: vec![
            sel("ytd-thumbnail-overlay-time-status-renderer span"),
            sel("ytd-thumbnail-overlay-time-status-renderer #text"),
        ],
        year: vec![
            YearStrategy::Datetime(sel("time[datetime]")),
            YearStrategy::Phrase(sel(
                "#metadata-line span, .ytd-video-meta-block span, #info span, #date-text yt-formatted-string",
            )),
        ],
        tag_links: sel(r#"a[href*="/hashtag/"]"#),
        remote_year: true,
        discovery: Vec::new(),
        removable: None,
        chips: Some(ChipStrategy {
            bar: sel("ytd-feed-filter-chip-bar-renderer, yt-related-chip-cloud-renderer"),
            chip: sel("yt-chip-cloud-chip-renderer"),
            button: sel("button"),
            hide: &[
                "tutti", "all", "alle", "todos", "tout", "per te", "for you", "für dich",
                "para ti", "pour vous",
            ],
            search_path: "/results",
            on_search: &[
                "non guardati", "not watched", "unwatched", "nicht angesehen", "no vistos",
                "non visionnés",
            ],
            elsewhere: &[
                "video correlati", "related", "ähnliche", "relacionados", "associés",
            ],
        }),
    }
}

fn youtube_music() -> SourceProfile {
    let anything = "yt-formatted-string, span, div, a";
    SourceProfile {
        item: sel("ytmusic-responsive-list-item-renderer, ytmusic-two-row-item-renderer"),
        id: vec![
            IdStrategy::Attr {
                selector: sel("ytmusic-play-button-renderer[video-id]"),
                attr: "video-id",
            },
            IdStrategy::LinkParam {
                selector: sel(r#"a.yt-simple-endpoint[href*="watch?"]"#),
                param: "v",
            },
        ],
        title: vec![
            TextStrategy::First(sel(
                ".flex-columns .title-column yt-formatted-string a, .flex-columns yt-formatted-string.title a",
            )),
            TextStrategy::AttrCapture {
                selector: sel("ytmusic-play-button-renderer[aria-label]"),
                attr: "aria-label",
                pattern: re(
                    r"(?i)(?:riproduci|play|reproducir|abspielen|lire)\s+(.+?)\s+(?:di|by|de|von)\s+",
                ),
            },
            TextStrategy::AttrCapture {
                selector: sel("ytmusic-play-button-renderer[aria-label]"),
                attr: "aria-label",
                pattern: re(r"(?i)(?:riproduci|play|reproducir|abspielen|lire)\s+(.+)"),
            },
            TextStrategy::First(sel(r#"a.yt-simple-endpoint[href*="watch?"]"#)),
        ],
        author: vec![
            TextStrategy::First(sel(r#"a.yt-simple-endpoint[href*="/channel/"]"#)),
            TextStrategy::First(sel(
                ".secondary-flex-columns yt-formatted-string a, .flex-columns .secondary-flex-columns a",
            )),
            TextStrategy::Nth {
                selector: sel("a.yt-simple-endpoint"),
                index: 1,
            },
        ],
        duration: vec![
            sel(".fixed-columns yt-formatted-string, .fixed-columns span"),
            sel(r#"[class*="fixed"] yt-formatted-string, [class*="fixed"] span"#),
            sel(anything),
        ],
        year: vec![
            YearStrategy::ReleaseLabel(sel(anything)),
            YearStrategy::Absolute {
                selector: sel(anything),
                include_aria: true,
            },
        ],
        tag_links: sel(r#"a[href*="/hashtag/"]"#),
        remote_year: true,
        discovery: Vec::new(),
        removable: None,
        chips: None,
    }
}

fn soundcloud() -> SourceProfile {
    SourceProfile {
        item: sel(concat!(
            "li.soundList__item, div.soundList__item, li.compactTrackList__item, ",
            "li.lazyLoadingList__listItem, li.trackList__item, li.searchList__item, ",
            "li.userStream__item, div.soundBadge, .trackItem, div.visualSound, ",
            r#"li.relatedTracks__item, .audibleTile, li.visualList__item, [class*="visualList__item"]"#,
        )),
        id: vec![IdStrategy::LinkPath {
            selector: sel(
                "a.soundTitle__title[href], a.trackItem__trackTitle[href], a.soundBadge__title[href]",
            ),
            pattern: re(r"^/([^/?#]+/(?:sets/)?[^/?#]+)/?$"),
        }],
        title: vec![
            TextStrategy::First(sel(
                ".trackItem__trackTitle, .soundTitle__title > span, .soundTitle__title, .soundBadge__title, .compactTrackListItem__content",
            )),
            TextStrategy::LinkMatching {
                href: re(r"/(?:tracks|sets)/"),
                exclude_class: "soundTitle__username",
            },
        ],
        author: vec![TextStrategy::First(sel(
            ".trackItem__username, .soundTitle__username, .soundBadge__username, .compactTrackListItem__user",
        ))],
        duration: vec![sel(concat!(
            ".trackItem__duration span, .soundBadge time, time, ",
            r#"span[aria-label*="Duration"], .playbackTimeline__duration span:not(.sc-visuallyhidden)"#,
        ))],
        year: vec![
            YearStrategy::Datetime(sel("time[datetime]")),
            YearStrategy::Relative(sel("time, span, div, a")),
            YearStrategy::ItemText,
        ],
        tag_links: sel(r#"a[href*="/tags/"]"#),
        remote_year: false,
        discovery: vec![
            Discovery::DateAnchor {
                anchors: sel(r#"time, span[class*="at-"], .relativeTime"#),
                relative: re(r"(?i)\d+\s+(?:an|year|mes|mon|gior|day|week|sett|ore|hour|min|sec)"),
                containers: vec![
                    sel("li"),
                    sel(".visualSound"),
                    sel(".audibleTile"),
                    sel(".soundList__item"),
                    sel(r#"[role="listitem"]"#),
                ],
                marker: sel(".soundTitle__title"),
                max_ascent: 7,
                stop_tag: "ul",
            },
            Discovery::Section {
                headers: sel("h1, h2, h3, h4, div, span"),
                keywords: &["spotlight", "in evidenza"],
                candidates: sel("li, div"),
                marker: sel(".soundTitle__title"),
            },
        ],
        removable: Some(sel(concat!(
            "li.soundList__item, div.soundList__item, li.compactTrackList__item, ",
            "li.lazyLoadingList__listItem, li.trackList__item, li.searchList__item, ",
            "li.userStream__item, div.soundBadge, article, .visualSound",
        ))),
        chips: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_profiles_build() {
        for source in Source::ALL {
            let p = profile(source);
            assert!(!p.title.is_empty(), "{source} has no title strategy");
            assert!(!p.id.is_empty(), "{source} has no id strategy");
        }
    }

    #[test]
    fn test_source_names_roundtrip() {
        for source in Source::ALL {
            assert_eq!(source.as_str().parse::<Source>(), Ok(source));
        }
        assert_eq!("YouTube_Music".parse::<Source>(), Ok(Source::YoutubeMusic));
        assert!("vimeo".parse::<Source>().is_err());
    }

    #[test]
    fn test_default_toggles() {
        assert!(Source::Youtube.enabled_by_default());
        assert!(Source::Soundcloud.enabled_by_default());
        assert!(!Source::YoutubeMusic.enabled_by_default());
    }
}
