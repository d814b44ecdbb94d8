use regex::Regex;
use std::sync::OnceLock;

fn hashtag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|[^\w&])#(\w+)").expect("hashtag pattern compiles"))
}

fn tag_path() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/(?:tags|hashtag)/([^/?#]+)").expect("tag path pattern compiles"))
}

/// Normalizes one tag: trimmed, leading `#` removed, lower-cased.
///
/// Returns `None` for input that is empty after normalization.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let tag = raw.trim().trim_start_matches('#').trim().to_lowercase();
    (!tag.is_empty()).then_some(tag)
}

/// Normalizes one keyword: trimmed and lower-cased. A `#` is kept.
pub fn normalize_term(raw: &str) -> Option<String> {
    let term = raw.trim().to_lowercase();
    (!term.is_empty()).then_some(term)
}

/// Extracts the tag name from a canonical tag link (`/tags/deephouse`, `/hashtag/lofi`).
pub fn tag_from_href(href: &str) -> Option<String> {
    let caps = tag_path().captures(href)?;
    normalize_tag(caps.get(1)?.as_str())
}

/// Scans free text for `#token` hashtags.
///
/// Purely numeric tokens (`#1`) are ignored. Results are lower-cased and
/// de-duplicated in first-seen order.
pub fn parse_tags_from_text(text: &str) -> Vec<String> {
    let mut tags = Vec::new();
    for caps in hashtag().captures_iter(text) {
        let Some(token) = caps.get(1) else { continue };
        if token.as_str().chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if let Some(tag) = normalize_tag(token.as_str()) {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    }
    tags
}

/// Tag extraction: canonical tag links first, `#token` text scan only when
/// no link produced a tag.
pub fn parse_tags<'a>(hrefs: impl IntoIterator<Item = &'a str>, text: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in hrefs.into_iter().filter_map(tag_from_href) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    if tags.is_empty() {
        tags = parse_tags_from_text(text);
    }
    tags
}

fn dedup_list<'a>(
    items: impl IntoIterator<Item = &'a str>,
    normalize: fn(&str) -> Option<String>,
) -> Vec<String> {
    let mut out = Vec::new();
    for value in items.into_iter().filter_map(normalize) {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

/// Splits comma-separated keyword input ("Rock, jazz ,") into normalized terms.
pub fn parse_term_list(raw: &str) -> Vec<String> {
    dedup_list(raw.split(','), normalize_term)
}

/// Splits comma-separated tag input ("#Jazz, lofi") into normalized tags.
pub fn parse_tag_list(raw: &str) -> Vec<String> {
    dedup_list(raw.split(','), normalize_tag)
}

/// Normalizes an already split keyword list.
pub fn normalize_terms<'a>(items: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    dedup_list(items, normalize_term)
}

/// Normalizes an already split tag list.
pub fn normalize_tags<'a>(items: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    dedup_list(items, normalize_tag)
}
