use chrono::{Datelike, Days, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

/// Oldest year accepted from an absolute token or a machine-readable date.
pub const MIN_YEAR: i32 = 1950;

/// How far past the current year an absolute token may point (pre-release dates).
const FUTURE_SLACK_YEARS: i32 = 5;

/// A relative-time unit with the day offset one unit stands for.
struct RelativeUnit {
    pattern: Regex,
    days: u64,
}

/// Relative-phrase patterns, most significant unit first.
///
/// Each pattern captures the magnitude in group 1. Units are matched in
/// English, Italian, Spanish, German and French. Sub-day units resolve to
/// today.
fn relative_units() -> &'static [RelativeUnit] {
    static UNITS: OnceLock<Vec<RelativeUnit>> = OnceLock::new();
    UNITS.get_or_init(|| {
        let table: [(&str, u64); 5] = [
            (r"years?|ann[oi]|años?|jahr(?:e|en)?|ans?|godin[ae]?", 365),
            (r"months?|mes(?:e|i|es)?|monat(?:e|en)?|mois", 30),
            (r"weeks?|settiman[ae]|semanas?|wochen?|semaines?", 7),
            (r"days?|giorn[oi]|d[ií]as?|tag(?:e|en)?|jours?", 1),
            (
                r"hours?|or[ae]|horas?|stunden?|heures?|minutes?|minut[oi]|minutos?|minuten?|seconds?|second[oi]|segundos?|sekunden?|secondes?",
                0,
            ),
        ];
        table
            .iter()
            .map(|(units, days)| RelativeUnit {
                pattern: Regex::new(&format!(r"(?i)(\d{{1,4}})\s+(?:{units})\b"))
                    .expect("relative unit pattern compiles"),
                days: *days,
            })
            .collect()
    })
}

fn release_label() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:album|ep|single|singolo|álbum|sencillo)\s*[•·]\s*(\d{4})\b")
            .expect("release label pattern compiles")
    })
}

fn digit_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("digit run pattern compiles"))
}

/// A count noun right after a number ("2015 views", "1984 Aufrufe").
fn count_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(?:views?|plays?|likes?|listens?|streams?|comments?|followers?|subscribers?|reposts?|visualizzazioni|riproduzioni|ascolti|visualizaciones|reproducciones|vistas|aufrufe|wiedergaben|vues|écoutes|lectures)\b",
        )
        .expect("count suffix pattern compiles")
    })
}

fn year_bounds(today: NaiveDate) -> (i32, i32) {
    (MIN_YEAR, today.year() + FUTURE_SLACK_YEARS)
}

fn in_bounds(year: i32, today: NaiveDate) -> Option<i32> {
    let (min, max) = year_bounds(today);
    (min..=max).contains(&year).then_some(year)
}

/// Parses the year from a machine-readable date attribute (`2015-06-01T10:00:00Z`).
pub fn parse_machine_date(value: &str, today: NaiveDate) -> Option<i32> {
    let head = value.trim().get(..4)?;
    if !head.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    in_bounds(head.parse().ok()?, today)
}

/// Parses a relative phrase ("3 years ago", "2 mesi fa", "vor 5 Tagen").
///
/// The magnitude times the unit's day offset is subtracted from `today`;
/// the year of the resulting date is returned.
pub fn parse_relative_year(text: &str, today: NaiveDate) -> Option<i32> {
    for unit in relative_units() {
        let Some(caps) = unit.pattern.captures(text) else {
            continue;
        };
        let magnitude: u64 = caps.get(1)?.as_str().parse().ok()?;
        let offset = magnitude.checked_mul(unit.days)?;
        return today
            .checked_sub_days(Days::new(offset))
            .and_then(|d| in_bounds(d.year(), today));
    }
    None
}

/// Parses a release label such as `Album • 2015` or `Single · 2019`.
pub fn parse_release_year(text: &str, today: NaiveDate) -> Option<i32> {
    let caps = release_label().captures(text)?;
    in_bounds(caps.get(1)?.as_str().parse().ok()?, today)
}

/// Finds a standalone 4-digit year in `[1950, current year + 5]`.
///
/// The token must be delimited by whitespace, punctuation or the string
/// edges. Digit groups inside larger numbers (`1,2015`, `12019`), clock
/// values (`20:15`), alphanumeric words (`v2015`) and counts (`2015 views`)
/// are skipped.
pub fn parse_absolute_year(text: &str, today: NaiveDate) -> Option<i32> {
    for m in digit_run().find_iter(text) {
        if m.as_str().len() != 4 {
            continue;
        }
        let before = &text[..m.start()];
        let after = &text[m.end()..];
        if !is_token_edge(before.chars().rev()) || !is_token_edge(after.chars()) {
            continue;
        }
        if count_suffix().is_match(after) {
            continue;
        }
        if let Some(year) = m.as_str().parse().ok().and_then(|y| in_bounds(y, today)) {
            return Some(year);
        }
    }
    None
}

/// True when the characters walking away from a digit run do not continue a word or number.
fn is_token_edge(mut chars: impl Iterator<Item = char>) -> bool {
    match chars.next() {
        None => true,
        Some(c) if c.is_alphanumeric() || c == ':' || c == '_' => false,
        Some('.') | Some(',') => !chars.next().is_some_and(|c| c.is_ascii_digit()),
        Some(_) => true,
    }
}

/// Year parsing in strategy order: machine-readable attribute, relative
/// phrase, absolute token. The first strategy that yields a value wins.
pub fn parse_relative_or_absolute_year(
    text: &str,
    datetime: Option<&str>,
    today: NaiveDate,
) -> Option<i32> {
    datetime
        .and_then(|dt| parse_machine_date(dt, today))
        .or_else(|| parse_relative_year(text, today))
        .or_else(|| parse_absolute_year(text, today))
}
