use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::text::{normalize_tags, normalize_terms, parse_tag_list, parse_term_list};

/// A configuration that violates a range invariant. Rejected where
/// configuration enters the system, so the evaluator never sees one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigInvalid {
    #[error("year range is inverted: min {min} > max {max}")]
    YearRange { min: i32, max: i32 },
    #[error("duration range is inverted: min {min}s > max {max}s")]
    DurationRange { min: u32, max: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Master switch. When off nothing is hidden and no scrolling is driven.
    pub enabled: bool,
    pub rules: FilterRules,
    #[serde(default)]
    pub exploration: ExplorationMode,
}

/// Steers the feed's chip bar toward unseen material. Hides nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorationMode {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRules {
    pub year: YearRule,
    pub duration: DurationRule,
    pub allowlist: TermRule,
    pub blacklist: TermRule,
    pub tags: TagRule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRule {
    pub enabled: bool,
    pub min: i32,
    pub max: i32,
    pub show_unknown: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationRule {
    pub enabled: bool,
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermRule {
    pub enabled: bool,
    pub terms: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRule {
    pub enabled: bool,
    pub values: Vec<String>,
    pub mode: TagMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagMode {
    /// Hide unless at least one required tag is present.
    #[default]
    Any,
    /// Hide unless every required tag is present.
    All,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rules: FilterRules {
                year: YearRule {
                    enabled: false,
                    min: 2010,
                    max: 2030,
                    show_unknown: true,
                },
                duration: DurationRule {
                    enabled: false,
                    min: 0,
                    max: 1800,
                },
                allowlist: TermRule::default(),
                blacklist: TermRule::default(),
                tags: TagRule::default(),
            },
            exploration: ExplorationMode::default(),
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<(), ConfigInvalid> {
        let year = &self.rules.year;
        if year.min > year.max {
            return Err(ConfigInvalid::YearRange {
                min: year.min,
                max: year.max,
            });
        }
        let duration = &self.rules.duration;
        if duration.min > duration.max {
            return Err(ConfigInvalid::DurationRange {
                min: duration.min,
                max: duration.max,
            });
        }
        Ok(())
    }

    /// True when the master switch is on and at least one rule can hide something.
    pub fn has_active_rule(&self) -> bool {
        let r = &self.rules;
        self.enabled
            && (r.year.enabled
                || r.duration.enabled
                || (r.allowlist.enabled && !r.allowlist.terms.is_empty())
                || (r.blacklist.enabled && !r.blacklist.terms.is_empty())
                || (r.tags.enabled && !r.tags.values.is_empty()))
    }

    /// Copy with the year rule switched off, for items whose year is still pending.
    pub fn without_year_rule(&self) -> Self {
        let mut copy = self.clone();
        copy.rules.year.enabled = false;
        copy
    }
}

// ============================================================================
// Partial (stored / user supplied) configuration
// ============================================================================

/// A term list as supplied: either a JSON list or one comma-separated string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TermsInput {
    List(Vec<String>),
    Text(String),
}

impl TermsInput {
    /// Keyword list: trimmed, lower-cased, de-duplicated.
    pub fn into_terms(self) -> Vec<String> {
        match self {
            TermsInput::Text(text) => parse_term_list(&text),
            TermsInput::List(items) => normalize_terms(items.iter().map(String::as_str)),
        }
    }

    /// Tag list: as keywords, with a leading `#` dropped.
    pub fn into_tags(self) -> Vec<String> {
        match self {
            TermsInput::Text(text) => parse_tag_list(&text),
            TermsInput::List(items) => normalize_tags(items.iter().map(String::as_str)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialYearRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i32>,
    #[serde(
        alias = "showUnknown",
        alias = "showUnknownYear",
        skip_serializing_if = "Option::is_none"
    )]
    pub show_unknown: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialDurationRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialTermRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(alias = "value", alias = "keywords", skip_serializing_if = "Option::is_none")]
    pub terms: Option<TermsInput>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialTagRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(alias = "tags", skip_serializing_if = "Option::is_none")]
    pub values: Option<TermsInput>,
    #[serde(alias = "matchMode", skip_serializing_if = "Option::is_none")]
    pub mode: Option<TagMode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialExploration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialRules {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<PartialYearRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<PartialDurationRule>,
    #[serde(alias = "genre", skip_serializing_if = "Option::is_none")]
    pub allowlist: Option<PartialTermRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blacklist: Option<PartialTermRule>,
    #[serde(alias = "hashtags", skip_serializing_if = "Option::is_none")]
    pub tags: Option<PartialTagRule>,
    /// Stored next to the rules, as older snapshots did (`explorationMode`).
    #[serde(alias = "explorationMode", skip_serializing_if = "Option::is_none")]
    pub exploration: Option<PartialExploration>,
}

/// Configuration as stored or supplied: every field optional.
///
/// Rules may sit under `rules` (or the older `filters`) or directly at the
/// top level; the nested form wins where both are given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialFilterConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(alias = "filters", skip_serializing_if = "Option::is_none")]
    pub rules: Option<PartialRules>,
    #[serde(flatten)]
    pub top_level: PartialRules,
}

impl From<&FilterConfig> for PartialFilterConfig {
    fn from(config: &FilterConfig) -> Self {
        let r = &config.rules;
        Self {
            enabled: Some(config.enabled),
            rules: Some(PartialRules {
                year: Some(PartialYearRule {
                    enabled: Some(r.year.enabled),
                    min: Some(r.year.min),
                    max: Some(r.year.max),
                    show_unknown: Some(r.year.show_unknown),
                }),
                duration: Some(PartialDurationRule {
                    enabled: Some(r.duration.enabled),
                    min: Some(r.duration.min),
                    max: Some(r.duration.max),
                }),
                allowlist: Some(PartialTermRule {
                    enabled: Some(r.allowlist.enabled),
                    terms: Some(TermsInput::List(r.allowlist.terms.clone())),
                }),
                blacklist: Some(PartialTermRule {
                    enabled: Some(r.blacklist.enabled),
                    terms: Some(TermsInput::List(r.blacklist.terms.clone())),
                }),
                tags: Some(PartialTagRule {
                    enabled: Some(r.tags.enabled),
                    values: Some(TermsInput::List(r.tags.values.clone())),
                    mode: Some(r.tags.mode),
                }),
                exploration: Some(PartialExploration {
                    enabled: Some(config.exploration.enabled),
                }),
            }),
            top_level: PartialRules::default(),
        }
    }
}

fn merge_terms(base: &TermRule, partial: Option<&PartialTermRule>) -> TermRule {
    let Some(p) = partial else {
        return base.clone();
    };
    TermRule {
        enabled: p.enabled.unwrap_or(base.enabled),
        terms: p
            .terms
            .clone()
            .map(TermsInput::into_terms)
            .unwrap_or_else(|| base.terms.clone()),
    }
}

fn merge_rules(base: &FilterRules, partial: &PartialRules) -> FilterRules {
    let year = match &partial.year {
        Some(p) => YearRule {
            enabled: p.enabled.unwrap_or(base.year.enabled),
            min: p.min.unwrap_or(base.year.min),
            max: p.max.unwrap_or(base.year.max),
            show_unknown: p.show_unknown.unwrap_or(base.year.show_unknown),
        },
        None => base.year.clone(),
    };
    let duration = match &partial.duration {
        Some(p) => DurationRule {
            enabled: p.enabled.unwrap_or(base.duration.enabled),
            min: p.min.unwrap_or(base.duration.min),
            max: p.max.unwrap_or(base.duration.max),
        },
        None => base.duration.clone(),
    };
    let tags = match &partial.tags {
        Some(p) => TagRule {
            enabled: p.enabled.unwrap_or(base.tags.enabled),
            values: p
                .values
                .clone()
                .map(TermsInput::into_tags)
                .unwrap_or_else(|| base.tags.values.clone()),
            mode: p.mode.unwrap_or(base.tags.mode),
        },
        None => base.tags.clone(),
    };
    FilterRules {
        year,
        duration,
        allowlist: merge_terms(&base.allowlist, partial.allowlist.as_ref()),
        blacklist: merge_terms(&base.blacklist, partial.blacklist.as_ref()),
        tags,
    }
}

/// Deep merge: every field present in `partial` wins, every absent field
/// falls back to `defaults`. Total; never fails.
pub fn merge(defaults: &FilterConfig, partial: &PartialFilterConfig) -> FilterConfig {
    let mut rules = merge_rules(&defaults.rules, &partial.top_level);
    let mut exploration = merge_exploration(&defaults.exploration, &partial.top_level);
    if let Some(nested) = &partial.rules {
        rules = merge_rules(&rules, nested);
        exploration = merge_exploration(&exploration, nested);
    }
    FilterConfig {
        enabled: partial.enabled.unwrap_or(defaults.enabled),
        rules,
        exploration,
    }
}

fn merge_exploration(base: &ExplorationMode, partial: &PartialRules) -> ExplorationMode {
    ExplorationMode {
        enabled: partial
            .exploration
            .as_ref()
            .and_then(|p| p.enabled)
            .unwrap_or(base.enabled),
    }
}
