//! Filter Evaluator and its configuration schema.
//!
//! [`evaluate`] runs every rule on every record so diagnostics can show the
//! full picture; the first rule (in rule order) that says "hide" is the
//! deciding one. Rules never mutate anything.

mod config;

pub use config::{
    merge, ConfigInvalid, DurationRule, ExplorationMode, FilterConfig, FilterRules,
    PartialDurationRule, PartialExploration, PartialFilterConfig, PartialRules, PartialTagRule,
    PartialTermRule, PartialYearRule, TagMode, TagRule, TermRule, TermsInput, YearRule,
};

use serde::Serialize;
use std::fmt;

use crate::extract::ItemRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Rule {
    Year,
    Duration,
    Allowlist,
    Blacklist,
    Tags,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rule::Year => "year",
            Rule::Duration => "duration",
            Rule::Allowlist => "allowlist",
            Rule::Blacklist => "blacklist",
            Rule::Tags => "tags",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Rule disabled or without constraints.
    Inactive,
    Pass,
    Hide,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// First rule, in evaluation order, that hides the item.
    pub hidden_by: Option<Rule>,
    pub verdicts: Vec<(Rule, Verdict)>,
}

impl Decision {
    pub fn hidden(&self) -> bool {
        self.hidden_by.is_some()
    }
}

fn verdict(active: bool, hide: impl FnOnce() -> bool) -> Verdict {
    if !active {
        Verdict::Inactive
    } else if hide() {
        Verdict::Hide
    } else {
        Verdict::Pass
    }
}

fn year_verdict(rule: &YearRule, year: Option<i32>) -> Verdict {
    verdict(rule.enabled, || match year {
        None => !rule.show_unknown,
        Some(y) => y < rule.min || y > rule.max,
    })
}

fn duration_verdict(rule: &DurationRule, duration: Option<u32>) -> Verdict {
    // Unknown duration never hides on its own
    verdict(rule.enabled && duration.is_some(), || {
        duration.is_some_and(|d| d < rule.min || d > rule.max)
    })
}

fn term_matches(haystack: &str, terms: &[String]) -> bool {
    terms
        .iter()
        .any(|t| !t.is_empty() && haystack.contains(&t.to_lowercase()))
}

fn tags_verdict(rule: &TagRule, tags: &[String]) -> Verdict {
    verdict(rule.enabled && !rule.values.is_empty(), || {
        let has = |required: &String| {
            let required = required.to_lowercase();
            tags.iter().any(|t| t.to_lowercase() == required)
        };
        match rule.mode {
            TagMode::Any => !rule.values.iter().any(has),
            TagMode::All => !rule.values.iter().all(has),
        }
    })
}

/// Evaluates every rule against `record`.
pub fn evaluate(record: &ItemRecord, config: &FilterConfig) -> Decision {
    let r = &config.rules;
    if !config.enabled {
        return Decision {
            hidden_by: None,
            verdicts: [Rule::Year, Rule::Duration, Rule::Allowlist, Rule::Blacklist, Rule::Tags]
                .into_iter()
                .map(|rule| (rule, Verdict::Inactive))
                .collect(),
        };
    }

    let haystack = format!("{} {}", record.title, record.author).to_lowercase();
    let verdicts = vec![
        (Rule::Year, year_verdict(&r.year, record.year)),
        (
            Rule::Duration,
            duration_verdict(&r.duration, record.duration_seconds),
        ),
        (
            Rule::Allowlist,
            verdict(r.allowlist.enabled && !r.allowlist.terms.is_empty(), || {
                !term_matches(&haystack, &r.allowlist.terms)
            }),
        ),
        (
            Rule::Blacklist,
            verdict(r.blacklist.enabled && !r.blacklist.terms.is_empty(), || {
                term_matches(&haystack, &r.blacklist.terms)
            }),
        ),
        (Rule::Tags, tags_verdict(&r.tags, &record.tags)),
    ];

    let hidden_by = verdicts
        .iter()
        .find(|(_, v)| *v == Verdict::Hide)
        .map(|(rule, _)| *rule);
    Decision {
        hidden_by,
        verdicts,
    }
}

/// True when any active rule hides `record`.
pub fn should_hide(record: &ItemRecord, config: &FilterConfig) -> bool {
    evaluate(record, config).hidden()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ItemId;
    use proptest::prelude::*;

    fn record() -> ItemRecord {
        ItemRecord {
            id: ItemId::Canonical("abc".to_string()),
            title: "x".to_string(),
            author: "y".to_string(),
            duration_seconds: None,
            year: None,
            tags: Vec::new(),
        }
    }

    fn partial(json: &str) -> FilterConfig {
        let partial: PartialFilterConfig = serde_json::from_str(json).unwrap();
        merge(&FilterConfig::default(), &partial)
    }

    #[test]
    fn test_defaults_hide_nothing() {
        assert!(!should_hide(&record(), &FilterConfig::default()));
    }

    #[test]
    fn test_unknown_year_policy() {
        let hide = partial(r#"{"year":{"enabled":true,"show_unknown":false}}"#);
        let show = partial(r#"{"year":{"enabled":true,"show_unknown":true}}"#);
        assert!(should_hide(&record(), &hide));
        assert!(!should_hide(&record(), &show));
    }

    #[test]
    fn test_year_range() {
        let config = partial(r#"{"year":{"enabled":true,"min":2010,"max":2020,"showUnknown":false}}"#);
        let mut r = record();
        r.year = Some(2019);
        assert!(!should_hide(&r, &config));
        r.year = Some(2021);
        assert_eq!(evaluate(&r, &config).hidden_by, Some(Rule::Year));
        r.year = Some(2010);
        assert!(!should_hide(&r, &config));
    }

    #[test]
    fn test_allowlist_defaults_to_hide() {
        let config = partial(r#"{"genre":{"enabled":true,"value":"rock"}}"#);
        let mut r = record();
        assert!(should_hide(&r, &config));
        r.author = "Classic ROCK Radio".to_string();
        assert!(!should_hide(&r, &config));
    }

    #[test]
    fn test_blacklisted_hashtag_term_matches_literally() {
        let config = partial(r##"{"blacklist":{"enabled":true,"terms":["#live"]}}"##);
        let mut r = record();
        r.title = "Live at Wembley".to_string();
        assert!(!should_hide(&r, &config));
        r.title = "Festival set #LIVE".to_string();
        assert_eq!(evaluate(&r, &config).hidden_by, Some(Rule::Blacklist));
    }

    #[test]
    fn test_blacklist_any_term() {
        let config = partial(r#"{"blacklist":{"enabled":true,"terms":"remix, nightcore"}}"#);
        let mut r = record();
        assert!(!should_hide(&r, &config));
        r.title = "Song (Nightcore Edit)".to_string();
        assert_eq!(evaluate(&r, &config).hidden_by, Some(Rule::Blacklist));
    }

    #[test]
    fn test_duration_unknown_never_hides() {
        let config = partial(r#"{"duration":{"enabled":true,"min":0,"max":1800}}"#);
        let mut r = record();
        assert!(!should_hide(&r, &config));
        r.duration_seconds = Some(3723);
        assert_eq!(evaluate(&r, &config).hidden_by, Some(Rule::Duration));
    }

    #[test]
    fn test_festival_set_hidden_by_duration() {
        let config = partial(r#"{"duration":{"enabled":true,"min":0,"max":1800}}"#);
        let mut r = record();
        r.title = "festival set 2015".to_string();
        r.duration_seconds = Some(3723);
        assert!(should_hide(&r, &config));
    }

    #[test]
    fn test_tag_modes() {
        let any = partial(r#"{"tags":{"enabled":true,"values":["house","techno"]}}"#);
        let all = partial(r#"{"tags":{"enabled":true,"values":["house","techno"],"mode":"all"}}"#);
        let mut r = record();
        r.tags = vec!["house".to_string()];
        assert!(!should_hide(&r, &any));
        assert!(should_hide(&r, &all));
        r.tags.push("techno".to_string());
        assert!(!should_hide(&r, &all));
        r.tags.clear();
        assert!(should_hide(&r, &any));
    }

    #[test]
    fn test_first_hiding_rule_reported_but_all_evaluated() {
        let config = partial(
            r#"{"year":{"enabled":true,"showUnknown":false},
                "blacklist":{"enabled":true,"terms":["x"]}}"#,
        );
        let decision = evaluate(&record(), &config);
        assert_eq!(decision.hidden_by, Some(Rule::Year));
        assert_eq!(decision.verdicts.len(), 5);
        assert_eq!(decision.verdicts[3], (Rule::Blacklist, Verdict::Hide));
        assert_eq!(decision.verdicts[1], (Rule::Duration, Verdict::Inactive));
    }

    #[test]
    fn test_master_switch_off_hides_nothing() {
        let config = partial(r#"{"enabled":false,"blacklist":{"enabled":true,"terms":["x"]}}"#);
        assert!(!should_hide(&record(), &config));
    }

    proptest! {
        #[test]
        fn prop_no_enabled_rules_never_hides(
            title in ".{0,20}",
            author in ".{0,20}",
            year in proptest::option::of(1900i32..2100),
            duration in proptest::option::of(0u32..20_000),
            tags in proptest::collection::vec("[a-z]{1,8}", 0..4),
            terms in proptest::collection::vec("[a-z]{1,8}", 0..4),
        ) {
            let mut config = FilterConfig::default();
            config.rules.allowlist.terms = terms.clone();
            config.rules.blacklist.terms = terms.clone();
            config.rules.tags.values = terms;
            let r = ItemRecord {
                id: ItemId::derive(&title, &author),
                title,
                author,
                duration_seconds: duration,
                year,
                tags,
            };
            prop_assert!(!should_hide(&r, &config));
        }
    }
}
