use regex::Regex;
use std::sync::OnceLock;

/// Shortest value accepted as a duration, in seconds.
pub const MIN_DURATION_SECS: u32 = 1;
/// Longest value accepted as a duration (3 hours). Larger numbers are
/// almost always view counts or ids rather than running times.
pub const MAX_DURATION_SECS: u32 = 10_800;

/// A whole-string duration token: `S`, `M:SS` or `H:MM:SS`.
fn whole_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,5})(?::(\d{2}))?(?::(\d{2}))?$").expect("duration token pattern compiles")
    })
}

/// A clock token embedded in longer text. Bare seconds are not accepted here.
fn embedded_clock() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:^|[^\d:])(\d{1,2}):(\d{2})(?::(\d{2}))?(?:$|[^\d:])")
            .expect("embedded clock pattern compiles")
    })
}

/// Parses a duration string into seconds.
///
/// Accepts `H:MM:SS`, `M:SS` or a bare `S` when the trimmed text is exactly
/// the token, and `H:MM:SS` / `M:SS` when embedded in longer text
/// ("Duration: 5:37"). Minutes and seconds after the leading component must
/// be below 60. Values outside `[1, 10800]` are rejected as not-a-duration.
pub fn parse_duration(text: &str) -> Option<u32> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(caps) = whole_token().captures(trimmed) {
        let parts: Vec<u32> = caps
            .iter()
            .skip(1)
            .flatten()
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
        return to_seconds(&parts);
    }

    let caps = embedded_clock().captures(trimmed)?;
    let parts: Vec<u32> = caps
        .iter()
        .skip(1)
        .flatten()
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    to_seconds(&parts)
}

fn to_seconds(parts: &[u32]) -> Option<u32> {
    let total = match *parts {
        [s] => s,
        [m, s] if s < 60 => m.checked_mul(60)?.checked_add(s)?,
        [h, m, s] if m < 60 && s < 60 => h
            .checked_mul(3600)?
            .checked_add(m * 60)?
            .checked_add(s)?,
        _ => return None,
    };
    (MIN_DURATION_SECS..=MAX_DURATION_SECS)
        .contains(&total)
        .then_some(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_clock_formats() {
        assert_eq!(parse_duration("5:37"), Some(337));
        assert_eq!(parse_duration("1:02:03"), Some(3723));
        assert_eq!(parse_duration("0:45"), Some(45));
        assert_eq!(parse_duration(" 12:00 "), Some(720));
        assert_eq!(parse_duration("42"), Some(42));
    }

    #[test]
    fn test_embedded_clock() {
        assert_eq!(parse_duration("Duration: 5:37"), Some(337));
        assert_eq!(parse_duration("1:02:03 • Now playing"), Some(3723));
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert_eq!(parse_duration("0"), None);
        assert_eq!(parse_duration("0:00"), None);
        assert_eq!(parse_duration("3:00:01"), None);
        assert_eq!(parse_duration("99999"), None);
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("LIVE"), None);
        assert_eq!(parse_duration("5:7"), None);
        assert_eq!(parse_duration("1:75"), None);
        assert_eq!(parse_duration("1:61:00"), None);
        assert_eq!(parse_duration("1.2M views"), None);
        // Bare numbers inside text are not durations
        assert_eq!(parse_duration("42 tracks"), None);
    }

    proptest! {
        #[test]
        fn prop_parsed_duration_always_in_range(s in "\\PC{0,24}") {
            if let Some(secs) = parse_duration(&s) {
                prop_assert!((MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&secs));
            }
        }

        #[test]
        fn prop_minute_second_roundtrip(m in 0u32..180, s in 0u32..60) {
            let expected = m * 60 + s;
            let parsed = parse_duration(&format!("{m}:{s:02}"));
            if (MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&expected) {
                prop_assert_eq!(parsed, Some(expected));
            } else {
                prop_assert_eq!(parsed, None);
            }
        }
    }
}
