//! Request/response boundary between pipelines, popups and the stores.
//!
//! Every request gets a response with a `success` flag; failures carry an
//! `error` string instead of being raised to the caller. The wire form is
//! one JSON object per message:
//!
//! ```json
//! {"action":"resolveYear","itemId":"dQw4w9WgXcQ"}
//! {"success":true,"year":2009,"wasCached":false}
//! ```
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::filter::{FilterConfig, PartialFilterConfig};
use crate::resolve::YearResolver;
use crate::settings::{SettingsError, SettingsStore};
use crate::storage::{Database, DATA_API_KEY};

/// Capacity of the context event channel. Lagging receivers only lose
/// reloads, and the next reload re-reads the full configuration anyway.
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    GetConfig {
        #[serde(rename = "contextId")]
        context_id: i64,
    },
    SetConfig {
        #[serde(rename = "contextId")]
        context_id: i64,
        config: PartialFilterConfig,
    },
    ResolveYear {
        #[serde(rename = "itemId")]
        item_id: String,
    },
    SetCredential {
        value: String,
    },
    GetCredential,
    ClearMetadataCache,
    GetCacheStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub success: bool,
    #[serde(flatten)]
    pub body: ResponseBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Config {
        config: FilterConfig,
    },
    #[serde(rename_all = "camelCase")]
    Year {
        year: Option<i32>,
        was_cached: bool,
    },
    Credential {
        value: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    CacheStats {
        count: i64,
        approx_size_bytes: i64,
    },
    Error {
        error: String,
    },
    Ack {},
}

impl Response {
    fn ok(body: ResponseBody) -> Self {
        Self {
            success: true,
            body,
        }
    }

    fn ack() -> Self {
        Self::ok(ResponseBody::Ack {})
    }

    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            body: ResponseBody::Error {
                error: error.into(),
            },
        }
    }
}

/// Broadcast to every controller; each reacts only to its own context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextEvent {
    /// Configuration changed: drop processed markers and start over.
    Reload(i64),
    Removed(i64),
}

#[derive(Debug, Clone)]
pub struct Service {
    settings: SettingsStore,
    resolver: YearResolver,
    events: broadcast::Sender<ContextEvent>,
}

impl Service {
    pub fn new(settings: SettingsStore, resolver: YearResolver) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            settings,
            resolver,
            events,
        }
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn resolver(&self) -> &YearResolver {
        &self.resolver
    }

    fn db(&self) -> &Database {
        self.resolver.database()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ContextEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: ContextEvent) {
        // No receivers is fine: nothing is rendering that context.
        if self.events.send(event).is_err() {
            tracing::debug!(?event, "No listeners for context event");
        }
    }

    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::GetConfig { context_id } => Response::ok(ResponseBody::Config {
                config: self.settings.get(context_id).await,
            }),
            Request::SetConfig { context_id, config } => {
                match self.settings.set_partial(context_id, &config).await {
                    Ok(_) => {
                        self.publish(ContextEvent::Reload(context_id));
                        Response::ack()
                    }
                    Err(e) => {
                        if let SettingsError::StorageUnavailable(_) = e {
                            tracing::warn!(context_id, error = %e, "Saving settings failed");
                        }
                        Response::failure(e.to_string())
                    }
                }
            }
            Request::ResolveYear { item_id } => {
                let resolution = self.resolver.resolve(&item_id).await;
                Response::ok(ResponseBody::Year {
                    year: resolution.year,
                    was_cached: resolution.was_cached,
                })
            }
            Request::SetCredential { value } => {
                match self
                    .db()
                    .set_credential(DATA_API_KEY, &SecretString::from(value))
                    .await
                {
                    Ok(()) => Response::ack(),
                    Err(e) => {
                        tracing::warn!(error = %e, "Storing credential failed");
                        Response::failure(format!("credential could not be saved: {e}"))
                    }
                }
            }
            Request::GetCredential => match self.db().get_credential(DATA_API_KEY).await {
                Ok(value) => Response::ok(ResponseBody::Credential {
                    value: value.map(|v| v.expose_secret().to_string()),
                }),
                Err(e) => {
                    tracing::warn!(error = %e, "Reading credential failed");
                    Response::ok(ResponseBody::Credential { value: None })
                }
            },
            Request::ClearMetadataCache => match self.db().clear_year_cache().await {
                Ok(removed) => {
                    tracing::info!(removed, "Cleared year cache");
                    Response::ack()
                }
                Err(e) => Response::failure(format!("cache could not be cleared: {e}")),
            },
            Request::GetCacheStats => match self.db().year_cache_stats().await {
                Ok(stats) => Response::ok(ResponseBody::CacheStats {
                    count: stats.count,
                    approx_size_bytes: stats.approx_size_bytes,
                }),
                Err(e) => {
                    tracing::warn!(error = %e, "Reading cache stats failed");
                    Response::ok(ResponseBody::CacheStats {
                        count: 0,
                        approx_size_bytes: 0,
                    })
                }
            },
        }
    }

    /// Handles one JSON-encoded request and returns the JSON response.
    pub async fn handle_json(&self, line: &str) -> String {
        let response = match serde_json::from_str::<Request>(line) {
            Ok(request) => self.handle(request).await,
            Err(e) => Response::failure(format!("invalid request: {e}")),
        };
        serde_json::to_string(&response).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to encode response");
            r#"{"success":false,"error":"response encoding failed"}"#.to_string()
        })
    }

    /// A context was opened. When spawned from `opener`, it starts with
    /// the opener's effective configuration.
    pub async fn context_created(&self, context_id: i64, opener: Option<i64>) {
        let Some(parent) = opener else {
            return;
        };
        if let Err(e) = self.settings.inherit(context_id, parent).await {
            tracing::warn!(context_id, parent, error = %e, "Inheriting settings failed");
        }
    }

    pub async fn context_removed(&self, context_id: i64) {
        match self.settings.delete(context_id).await {
            Ok(existed) => tracing::debug!(context_id, existed, "Context settings removed"),
            Err(e) => tracing::warn!(context_id, error = %e, "Removing settings failed"),
        }
        self.publish(ContextEvent::Removed(context_id));
    }
}
