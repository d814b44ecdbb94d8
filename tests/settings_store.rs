//! Context-scoped configuration store: default merge, inheritance,
//! persistence and the reload signal.

use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;

use metagroove::filter::{FilterConfig, PartialFilterConfig, TagMode};
use metagroove::pipeline::{spawn_context_bridge, HostEvent};
use metagroove::resolve::{ResolverOptions, YearResolver};
use metagroove::service::Service;
use metagroove::settings::SettingsStore;
use metagroove::storage::Database;

mod common {
    use futures::future::{BoxFuture, FutureExt};
    use metagroove::resolve::{LookupError, YearSource};
    use secrecy::SecretString;

    pub struct NoTier;

    impl YearSource for NoTier {
        fn name(&self) -> &'static str {
            "none"
        }

        fn lookup<'a>(
            &'a self,
            _item_id: &'a str,
            _credential: Option<&'a SecretString>,
        ) -> BoxFuture<'a, Result<i32, LookupError>> {
            async { Err(LookupError::NotFound) }.boxed()
        }
    }
}

fn partial(value: serde_json::Value) -> PartialFilterConfig {
    serde_json::from_value(value).unwrap()
}

async fn service(db: Database) -> Service {
    let resolver = YearResolver::new(
        db.clone(),
        Box::new(common::NoTier),
        Box::new(common::NoTier),
        ResolverOptions::default(),
    );
    Service::new(SettingsStore::new(db), resolver)
}

#[tokio::test]
async fn test_partial_snapshot_gets_every_rule_from_defaults() {
    let db = Database::open(":memory:").await.unwrap();
    db.set_partial_tab_settings(9, &partial(json!({"year": {"min": 2000}})))
        .await
        .unwrap();
    let store = SettingsStore::new(db);

    let config = store.get(9).await;
    let defaults = FilterConfig::default();

    assert_eq!(config.rules.year.min, 2000);
    assert_eq!(config.rules.year.max, defaults.rules.year.max);
    assert_eq!(config.rules.duration, defaults.rules.duration);
    assert_eq!(config.rules.allowlist, defaults.rules.allowlist);
    assert_eq!(config.rules.blacklist, defaults.rules.blacklist);
    assert_eq!(config.rules.tags, defaults.rules.tags);
}

#[tokio::test]
async fn test_legacy_snapshot_keys_are_understood() {
    let db = Database::open(":memory:").await.unwrap();
    db.set_partial_tab_settings(
        1,
        &partial(json!({
            "enabled": true,
            "filters": {
                "genre": {"enabled": true, "value": "Rock"},
                "hashtags": {"enabled": true, "tags": ["#Jazz"], "matchMode": "all"}
            }
        })),
    )
    .await
    .unwrap();

    let config = SettingsStore::new(db).get(1).await;

    assert!(config.rules.allowlist.enabled);
    assert_eq!(config.rules.allowlist.terms, vec!["rock".to_string()]);
    assert_eq!(config.rules.tags.values, vec!["jazz".to_string()]);
    assert_eq!(config.rules.tags.mode, TagMode::All);
}

#[tokio::test]
async fn test_settings_survive_reopen() {
    let dir = std::env::temp_dir().join(format!("metagroove_settings_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("settings.db");
    let path_str = path.to_str().unwrap();

    {
        let store = SettingsStore::new(Database::open(path_str).await.unwrap());
        store
            .set_partial(4, &partial(json!({"duration": {"enabled": true, "max": 900}})))
            .await
            .unwrap();
    }

    let store = SettingsStore::new(Database::open(path_str).await.unwrap());
    let config = store.get(4).await;
    assert!(config.rules.duration.enabled);
    assert_eq!(config.rules.duration.max, 900);

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_child_context_inherits_then_diverges() {
    let db = Database::open(":memory:").await.unwrap();
    let service = service(db).await;
    service
        .settings()
        .set_partial(1, &partial(json!({"blacklist": {"enabled": true, "terms": "live"}})))
        .await
        .unwrap();

    service.context_created(2, Some(1)).await;
    service
        .settings()
        .set_partial(2, &partial(json!({"blacklist": {"enabled": false}})))
        .await
        .unwrap();

    assert!(service.settings().get(1).await.rules.blacklist.enabled);
    let child = service.settings().get(2).await;
    assert!(!child.rules.blacklist.enabled);
    // set_partial fills from defaults, not from the previous snapshot
    assert!(child.rules.blacklist.terms.is_empty());
}

#[tokio::test]
async fn test_set_config_reaches_controller_channel() {
    let db = Database::open(":memory:").await.unwrap();
    let service = service(db).await;
    let (tx, mut rx) = mpsc::channel(8);
    let bridge = spawn_context_bridge(&service, 5, tx);

    // Another context's change is not forwarded.
    let other = service
        .handle_json(r#"{"action":"setConfig","contextId":6,"config":{"enabled":false}}"#)
        .await;
    assert_eq!(other, r#"{"success":true}"#);
    let reply = service
        .handle_json(
            r#"{"action":"setConfig","contextId":5,"config":{"tags":{"enabled":true,"values":"lofi"}}}"#,
        )
        .await;
    assert_eq!(reply, r#"{"success":true}"#);

    let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    match event {
        HostEvent::ConfigChanged(config) => {
            assert!(config.rules.tags.enabled);
            assert_eq!(config.rules.tags.values, vec!["lofi".to_string()]);
        }
        other => panic!("unexpected event {other:?}"),
    }

    service.context_removed(5).await;
    let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event, HostEvent::ContextDestroyed);
    tokio::time::timeout(Duration::from_secs(2), bridge)
        .await
        .unwrap()
        .unwrap();
}
