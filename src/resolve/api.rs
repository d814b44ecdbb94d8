//! Tier 2: the credentialed video data API (`videos?part=snippet`).

use chrono::{NaiveDate, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::http::fetch_body;
use super::{LookupError, YearSource};
use crate::text::parse_machine_date;
use crate::util::validate_base_url;

/// A one-item `videos.list` reply with `part=snippet` is a few kilobytes.
const API_RESPONSE_LIMIT: usize = 256 * 1024;

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoResource>,
}

#[derive(Debug, Deserialize)]
struct VideoResource {
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    published_at: Option<String>,
}

pub struct DataApiClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl DataApiClient {
    /// `base_url` is the API root (`https://www.googleapis.com/youtube/v3`).
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, LookupError> {
        let base = validate_base_url(base_url)?;
        Ok(Self {
            client,
            base_url: base.as_str().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    async fn fetch_year(&self, item_id: &str, key: &SecretString) -> Result<i32, LookupError> {
        let request = self
            .client
            .get(format!("{}/videos", self.base_url))
            .query(&[
                ("id", item_id),
                ("part", "snippet"),
                ("key", key.expose_secret()),
            ]);
        let body = fetch_body(request, self.timeout, API_RESPONSE_LIMIT).await?;
        year_from_response(&body, Utc::now().date_naive())
    }
}

impl YearSource for DataApiClient {
    fn name(&self) -> &'static str {
        "api"
    }

    fn lookup<'a>(
        &'a self,
        item_id: &'a str,
        credential: Option<&'a SecretString>,
    ) -> BoxFuture<'a, Result<i32, LookupError>> {
        async move {
            let key = credential.ok_or(LookupError::MissingCredential)?;
            self.fetch_year(item_id, key).await
        }
        .boxed()
    }
}

fn year_from_response(body: &str, today: NaiveDate) -> Result<i32, LookupError> {
    let response: VideoListResponse =
        serde_json::from_str(body).map_err(|e| LookupError::Malformed(e.to_string()))?;
    response
        .items
        .into_iter()
        .next()
        .and_then(|item| item.snippet)
        .and_then(|snippet| snippet.published_at)
        .and_then(|published| parse_machine_date(&published, today))
        .ok_or(LookupError::NotFound)
}
