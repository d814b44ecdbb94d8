//! Metadata Resolution Cache.
//!
//! [`YearResolver::resolve`] answers "what year was this item published"
//! from a TTL-bounded SQLite cache, falling back to two remote tiers:
//! a page scrape ([`PageScraper`]) and, when a credential is configured,
//! the data API ([`DataApiClient`]). Concurrent requests for the same id
//! share one pending lookup. Failures are never cached.

mod api;
mod http;
mod scrape;

pub use api::DataApiClient;
pub use http::build_client;
pub use scrape::PageScraper;

use futures::future::{BoxFuture, FutureExt, Shared};
use secrecy::SecretString;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::storage::{Database, DATA_API_KEY};
use crate::util::BaseUrlError;

/// Entries older than this are treated as absent.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// A failed tier. Never cached: the next pass may retry.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Request timed out")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid UTF-8 in response")]
    InvalidUtf8,
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("No publish date in response")]
    NotFound,
    #[error("No credential configured")]
    MissingCredential,
    #[error(transparent)]
    BaseUrl(#[from] BaseUrlError),
}

impl LookupError {
    /// True when the same request might succeed later.
    pub fn is_transient(&self) -> bool {
        match self {
            LookupError::Timeout | LookupError::Network(_) => true,
            LookupError::HttpStatus(status) => *status == 429 || *status >= 500,
            LookupError::ResponseTooLarge(_)
            | LookupError::InvalidUtf8
            | LookupError::Malformed(_)
            | LookupError::NotFound
            | LookupError::MissingCredential
            | LookupError::BaseUrl(_) => false,
        }
    }
}

/// One remote tier.
pub trait YearSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn lookup<'a>(
        &'a self,
        item_id: &'a str,
        credential: Option<&'a SecretString>,
    ) -> BoxFuture<'a, Result<i32, LookupError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub year: Option<i32>,
    pub was_cached: bool,
}

/// What the processing controller needs from a resolver.
pub trait YearLookup: Send + Sync + 'static {
    fn resolve_year(&self, item_id: String) -> BoxFuture<'static, Resolution>;
}

pub struct ResolverOptions {
    pub ttl: Duration,
    /// Used when no credential is stored in the database.
    pub fallback_credential: Option<SecretString>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            fallback_credential: None,
        }
    }
}

type PendingLookup = Shared<BoxFuture<'static, Resolution>>;

struct Inner {
    db: Database,
    tier1: Box<dyn YearSource>,
    tier2: Box<dyn YearSource>,
    options: ResolverOptions,
    in_flight: Mutex<HashMap<String, PendingLookup>>,
}

#[derive(Clone)]
pub struct YearResolver {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for YearResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YearResolver")
            .field("tier1", &self.inner.tier1.name())
            .field("tier2", &self.inner.tier2.name())
            .field("ttl", &self.inner.options.ttl)
            .finish()
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Video ids are short URL-safe tokens; anything else is never sent out.
fn is_lookup_key(item_id: &str) -> bool {
    (1..=64).contains(&item_id.len())
        && item_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

impl YearResolver {
    pub fn new(
        db: Database,
        tier1: Box<dyn YearSource>,
        tier2: Box<dyn YearSource>,
        options: ResolverOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                db,
                tier1,
                tier2,
                options,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Resolver with the real page scraper and data API client.
    pub fn from_config(db: Database, config: &Config) -> Result<Self, LookupError> {
        let timeout = config.request_timeout();
        let client = build_client(timeout)?;
        let tier1 = PageScraper::new(client.clone(), &config.scrape_base_url, timeout)?;
        let tier2 = DataApiClient::new(client, &config.api_base_url, timeout)?;
        Ok(Self::new(
            db,
            Box::new(tier1),
            Box::new(tier2),
            ResolverOptions {
                ttl: config.cache_ttl(),
                fallback_credential: config.data_api_key(),
            },
        ))
    }

    pub fn database(&self) -> &Database {
        &self.inner.db
    }

    pub fn ttl_ms(&self) -> i64 {
        i64::try_from(self.inner.options.ttl.as_millis()).unwrap_or(i64::MAX)
    }

    /// Resolves the publish year of `item_id`.
    ///
    /// A fresh cache entry is returned without I/O. Otherwise the caller
    /// joins the pending lookup for this id, starting one if none exists.
    pub async fn resolve(&self, item_id: &str) -> Resolution {
        if !is_lookup_key(item_id) {
            tracing::debug!(item = %item_id, "Not a remote lookup key");
            return Resolution {
                year: None,
                was_cached: false,
            };
        }

        if let Some(year) = self.cached_year(item_id).await {
            return Resolution {
                year: Some(year),
                was_cached: true,
            };
        }

        self.pending_lookup(item_id).await
    }

    async fn cached_year(&self, item_id: &str) -> Option<i32> {
        match self
            .inner
            .db
            .get_fresh_year(item_id, now_ms(), self.ttl_ms())
            .await
        {
            Ok(entry) => entry.map(|e| e.year),
            Err(e) => {
                tracing::warn!(item = %item_id, error = %e, "Year cache read failed, treating as miss");
                None
            }
        }
    }

    fn pending_lookup(&self, item_id: &str) -> PendingLookup {
        let mut in_flight = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(pending) = in_flight.get(item_id) {
            tracing::debug!(item = %item_id, "Joining in-flight lookup");
            return pending.clone();
        }

        let this = self.clone();
        let id = item_id.to_string();
        let pending = async move {
            // A lookup for this id may have finished after the caller's cache read.
            let resolution = match this.cached_year(&id).await {
                Some(year) => Resolution {
                    year: Some(year),
                    was_cached: true,
                },
                None => Resolution {
                    year: this.run_tiers(&id).await,
                    was_cached: false,
                },
            };
            this.inner
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
            resolution
        }
        .boxed()
        .shared();
        in_flight.insert(item_id.to_string(), pending.clone());
        pending
    }

    /// Number of ids with a lookup in progress.
    pub fn in_flight_count(&self) -> usize {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    async fn credential(&self) -> Option<SecretString> {
        match self.inner.db.get_credential(DATA_API_KEY).await {
            Ok(Some(stored)) => Some(stored),
            Ok(None) => self.inner.options.fallback_credential.clone(),
            Err(e) => {
                tracing::warn!(error = %e, "Credential read failed, using configured key if any");
                self.inner.options.fallback_credential.clone()
            }
        }
    }

    async fn run_tiers(&self, item_id: &str) -> Option<i32> {
        let tier1 = &self.inner.tier1;
        let mut year = match tier1.lookup(item_id, None).await {
            Ok(year) => Some(year),
            Err(e) => {
                tracing::debug!(item = %item_id, tier = tier1.name(), error = %e, transient = e.is_transient(), "Tier 1 lookup failed");
                None
            }
        };

        if year.is_none() {
            if let Some(key) = self.credential().await {
                let tier2 = &self.inner.tier2;
                year = match tier2.lookup(item_id, Some(&key)).await {
                    Ok(year) => Some(year),
                    Err(e) => {
                        tracing::debug!(item = %item_id, tier = tier2.name(), error = %e, transient = e.is_transient(), "Tier 2 lookup failed");
                        None
                    }
                };
            }
        }

        match year {
            Some(y) => {
                if let Err(e) = self.inner.db.put_year(item_id, y, now_ms()).await {
                    tracing::warn!(item = %item_id, error = %e, "Failed to cache resolved year");
                }
            }
            None => tracing::debug!(item = %item_id, "Year unresolvable this pass"),
        }
        year
    }
}

impl YearLookup for YearResolver {
    fn resolve_year(&self, item_id: String) -> BoxFuture<'static, Resolution> {
        let this = self.clone();
        async move { this.resolve(&item_id).await }.boxed()
    }
}
