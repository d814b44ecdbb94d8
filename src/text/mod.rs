//! Locale-aware parsing of the loose text found in feed items.
//!
//! Feed markup carries its metadata as display strings: "3 anni fa",
//! "Album • 2015", "1:02:03", "#deephouse". The functions here turn those
//! strings into typed values and return `None` whenever the text is not
//! recognised. Callers must treat `None` as "unknown", never as zero.
//!
//! - [`year`] - machine-readable dates, relative phrases, release labels,
//!   absolute year tokens
//! - [`duration`] - clock-style duration tokens
//! - [`tags`] - tag links, `#hashtag` scanning, comma-separated term lists

pub mod duration;
pub mod tags;
pub mod year;

pub use duration::{parse_duration, MAX_DURATION_SECS, MIN_DURATION_SECS};
pub use tags::{
    normalize_tag, normalize_tags, normalize_term, normalize_terms, parse_tag_list, parse_tags,
    parse_tags_from_text, parse_term_list, tag_from_href,
};
pub use year::{
    parse_absolute_year, parse_machine_date, parse_relative_or_absolute_year, parse_relative_year,
    parse_release_year, MIN_YEAR,
};
