//! Fetch orchestration against the search API
//!
//! One `fetch_page` call issues a search request with a key from the pool
//! and rotates keys on quota exhaustion. Rotation is an explicit bounded
//! loop: each pass either returns or parks one previously-eligible key, so
//! the loop runs at most pool-size times. Running out of keys — at the
//! start or mid-rotation — degrades to an empty page instead of an error;
//! every other failure is fatal for this page and left to the scheduler's
//! next tick.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, warn};

use youtube_keys::redact;
use youtube_pool::{Error as PoolError, KeyPool, is_quota_exceeded};

use crate::error::FetchError;
use crate::metrics;
use crate::model::{PUBLISHED_AT_FORMAT, SearchItem, SearchResponse};

/// Search fetcher holding the HTTP client and request parameters.
pub struct VideoFetcher {
    pool: KeyPool,
    client: reqwest::Client,
    search_url: String,
    page_size: u32,
    lookback_hours: u64,
}

impl VideoFetcher {
    /// Create a fetcher. The client is built by the caller so the request
    /// timeout is configured in one place.
    pub fn new(
        pool: KeyPool,
        client: reqwest::Client,
        search_url: String,
        page_size: u32,
        lookback_hours: u64,
    ) -> Self {
        Self {
            pool,
            client,
            search_url,
            page_size,
            lookback_hours,
        }
    }

    /// Fetch one page of search results published after `published_after`.
    ///
    /// When no lower bound is given, the window defaults to now minus the
    /// configured lookback. Quota-exhausted keys are parked and the request
    /// retried with the next key; when none remain the call returns an
    /// empty page. Non-quota failures are returned as errors and never park
    /// a key.
    pub async fn fetch_page(
        &self,
        query: &str,
        published_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<SearchItem>, FetchError> {
        let after = published_after
            .unwrap_or_else(|| Utc::now() - Duration::hours(self.lookback_hours as i64));
        let after_param = after.format(PUBLISHED_AT_FORMAT).to_string();
        let page_size = self.page_size.to_string();

        loop {
            let key = match self.pool.select().await {
                Ok(key) => key,
                Err(PoolError::NoKeysAvailable) => {
                    error!("no usable api keys available, skipping fetch");
                    return Ok(Vec::new());
                }
                Err(e) => return Err(e.into()),
            };

            let response = self
                .client
                .get(&self.search_url)
                .query(&[
                    ("part", "snippet"),
                    ("q", query),
                    ("type", "video"),
                    ("order", "date"),
                    ("publishedAfter", after_param.as_str()),
                    ("key", key.token.as_str()),
                    ("maxResults", page_size.as_str()),
                ])
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                let page: SearchResponse = response.json().await?;
                debug!(items = page.items.len(), "search page fetched");
                return Ok(page.items);
            }

            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));

            if is_quota_exceeded(status.as_u16(), &body) {
                warn!(key = %redact(&key.token), "quota exceeded, rotating to next key");
                self.pool.mark_exhausted(&key.token).await?;
                metrics::record_key_exhausted();
                if self.pool.has_eligible().await {
                    continue;
                }
                error!("every api key is quota exhausted, returning empty page");
                return Ok(Vec::new());
            }

            return Err(FetchError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }
    }
}
