//! Context-Scoped Configuration Store and global preferences.
//!
//! Stored snapshots are partial: every read merges them over the process
//! default so fields added later are always present. Writes are validated
//! here and nowhere else.
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

use crate::extract::Source;
use crate::filter::{merge, ConfigInvalid, FilterConfig, PartialFilterConfig};
use crate::storage::Database;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ConfigInvalid),
    #[error("settings could not be saved: {0}")]
    StorageUnavailable(String),
}

fn storage_unavailable(err: anyhow::Error) -> SettingsError {
    SettingsError::StorageUnavailable(format!("{err:#}"))
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
    db: Database,
    defaults: FilterConfig,
}

impl SettingsStore {
    pub fn new(db: Database) -> Self {
        Self::with_defaults(db, FilterConfig::default())
    }

    pub fn with_defaults(db: Database, defaults: FilterConfig) -> Self {
        Self { db, defaults }
    }

    pub fn defaults(&self) -> &FilterConfig {
        &self.defaults
    }

    /// Effective configuration for `context_id`.
    ///
    /// Never fails: an unreadable store yields the defaults.
    pub async fn get(&self, context_id: i64) -> FilterConfig {
        match self.db.get_tab_settings(context_id).await {
            Ok(Some(stored)) => merge(&self.defaults, &stored),
            Ok(None) => self.defaults.clone(),
            Err(e) => {
                tracing::warn!(context_id, error = %e, "Settings read failed, using defaults");
                self.defaults.clone()
            }
        }
    }

    pub async fn set(&self, context_id: i64, config: &FilterConfig) -> Result<(), SettingsError> {
        config.validate()?;
        self.db
            .set_tab_settings(context_id, config)
            .await
            .map_err(storage_unavailable)?;
        tracing::debug!(context_id, "Stored context settings");
        Ok(())
    }

    /// Fills `partial` from the defaults, validates and stores the result.
    pub async fn set_partial(
        &self,
        context_id: i64,
        partial: &PartialFilterConfig,
    ) -> Result<FilterConfig, SettingsError> {
        let config = merge(&self.defaults, partial);
        self.set(context_id, &config).await?;
        Ok(config)
    }

    pub async fn delete(&self, context_id: i64) -> Result<bool, SettingsError> {
        self.db
            .delete_tab_settings(context_id)
            .await
            .map_err(storage_unavailable)
    }

    /// Copies the parent's effective configuration into `child`.
    pub async fn inherit(&self, child: i64, parent: i64) -> Result<FilterConfig, SettingsError> {
        let config = self.get(parent).await;
        self.set(child, &config).await?;
        tracing::debug!(child, parent, "Inherited context settings");
        Ok(config)
    }

    pub async fn contexts(&self) -> Result<Vec<i64>, SettingsError> {
        self.db
            .list_tab_contexts()
            .await
            .map_err(storage_unavailable)
    }
}

// ============================================================================
// Global preferences
// ============================================================================

const SOURCE_PREFIX: &str = "sources.";
const SHOW_VERIFIED_YEAR: &str = "display.show_verified_year";

fn source_key(source: Source) -> String {
    format!("{SOURCE_PREFIX}{}", source.as_str())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" => Some(true),
        "false" | "0" | "off" => Some(false),
        _ => None,
    }
}

/// Per-source toggles and display options shared by every context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalSettings {
    pub sources: HashMap<Source, bool>,
    pub show_verified_year: bool,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            sources: Source::ALL
                .into_iter()
                .map(|s| (s, s.enabled_by_default()))
                .collect(),
            show_verified_year: true,
        }
    }
}

impl GlobalSettings {
    /// Defaults overlaid with stored values. Unreadable storage yields defaults.
    pub async fn load(db: &Database) -> Self {
        let mut settings = Self::default();

        match db.get_preferences_by_prefix(SOURCE_PREFIX).await {
            Ok(rows) => {
                for (key, value) in rows {
                    let name = &key[SOURCE_PREFIX.len()..];
                    match (name.parse::<Source>(), parse_flag(&value)) {
                        (Ok(source), Some(on)) => {
                            settings.sources.insert(source, on);
                        }
                        _ => tracing::warn!(key = %key, value = %value, "Ignoring malformed source toggle"),
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "Source toggles unreadable, using defaults"),
        }

        match db.get_preference(SHOW_VERIFIED_YEAR).await {
            Ok(Some(value)) => {
                if let Some(on) = parse_flag(&value) {
                    settings.show_verified_year = on;
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Display options unreadable, using defaults"),
        }

        settings
    }

    pub fn source_enabled(&self, source: Source) -> bool {
        self.sources
            .get(&source)
            .copied()
            .unwrap_or_else(|| source.enabled_by_default())
    }

    pub async fn set_source_enabled(
        db: &Database,
        source: Source,
        enabled: bool,
    ) -> Result<(), SettingsError> {
        db.set_preference(&source_key(source), &enabled.to_string())
            .await
            .map_err(storage_unavailable)
    }

    pub async fn set_show_verified_year(db: &Database, enabled: bool) -> Result<(), SettingsError> {
        db.set_preference(SHOW_VERIFIED_YEAR, &enabled.to_string())
            .await
            .map_err(storage_unavailable)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn store() -> SettingsStore {
        SettingsStore::new(Database::open(":memory:").await.unwrap())
    }

    #[tokio::test]
    async fn test_get_unknown_context_is_default() {
        let store = store().await;
        assert_eq!(store.get(7).await, FilterConfig::default());
    }

    #[tokio::test]
    async fn test_partial_snapshot_is_filled_from_defaults() {
        let store = store().await;
        let partial: PartialFilterConfig =
            serde_json::from_str(r#"{"year":{"min":2000}}"#).unwrap();
        store.db.set_partial_tab_settings(3, &partial).await.unwrap();

        let config = store.get(3).await;
        assert_eq!(config.rules.year.min, 2000);
        assert_eq!(config.rules.year.max, 2030);
        assert_eq!(config.rules.duration, FilterConfig::default().rules.duration);
        assert_eq!(config.rules.allowlist, FilterConfig::default().rules.allowlist);
        assert_eq!(config.rules.blacklist, FilterConfig::default().rules.blacklist);
        assert_eq!(config.rules.tags, FilterConfig::default().rules.tags);
    }

    #[tokio::test]
    async fn test_set_rejects_inverted_range() {
        let store = store().await;
        let mut config = FilterConfig::default();
        config.rules.year.min = 2020;
        config.rules.year.max = 2010;

        let err = store.set(1, &config).await.unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Invalid(ConfigInvalid::YearRange { .. })
        ));
        assert_eq!(store.contexts().await.unwrap(), Vec::<i64>::new());
    }

    #[tokio::test]
    async fn test_set_then_get_roundtrip() {
        let store = store().await;
        let mut config = FilterConfig::default();
        config.rules.blacklist.enabled = true;
        config.rules.blacklist.terms = vec!["remix".to_string()];

        store.set(1, &config).await.unwrap();
        assert_eq!(store.get(1).await, config);
    }

    #[tokio::test]
    async fn test_inherit_copies_effective_parent() {
        let store = store().await;
        let partial: PartialFilterConfig =
            serde_json::from_str(r#"{"duration":{"enabled":true,"max":600}}"#).unwrap();
        store.set_partial(1, &partial).await.unwrap();

        let inherited = store.inherit(2, 1).await.unwrap();
        assert_eq!(inherited, store.get(1).await);
        assert_eq!(store.get(2).await.rules.duration.max, 600);
        assert!(store.get(2).await.rules.duration.enabled);
    }

    #[tokio::test]
    async fn test_delete_context() {
        let store = store().await;
        store.set(5, &FilterConfig::default()).await.unwrap();
        assert!(store.delete(5).await.unwrap());
        assert!(!store.delete(5).await.unwrap());
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces_on_write_and_defaults_on_read() {
        let db = Database::open(":memory:").await.unwrap();
        let store = SettingsStore::new(db.clone());
        db.pool.close().await;

        assert_eq!(store.get(1).await, FilterConfig::default());
        let err = store.set(1, &FilterConfig::default()).await.unwrap_err();
        assert!(matches!(err, SettingsError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn test_global_settings_defaults() {
        let db = Database::open(":memory:").await.unwrap();
        let global = GlobalSettings::load(&db).await;
        assert!(global.source_enabled(Source::Youtube));
        assert!(global.source_enabled(Source::Soundcloud));
        assert!(!global.source_enabled(Source::YoutubeMusic));
        assert!(global.show_verified_year);
    }

    #[tokio::test]
    async fn test_global_settings_toggle() {
        let db = Database::open(":memory:").await.unwrap();
        GlobalSettings::set_source_enabled(&db, Source::YoutubeMusic, true)
            .await
            .unwrap();
        GlobalSettings::set_source_enabled(&db, Source::Youtube, false)
            .await
            .unwrap();
        GlobalSettings::set_show_verified_year(&db, false).await.unwrap();
        db.set_preference("sources.bogus", "true").await.unwrap();

        let global = GlobalSettings::load(&db).await;
        assert!(global.source_enabled(Source::YoutubeMusic));
        assert!(!global.source_enabled(Source::Youtube));
        assert!(!global.show_verified_year);
    }
}
