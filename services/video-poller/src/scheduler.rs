//! Periodic poll task
//!
//! Spawns an interval task that runs one fetch-and-ingest cycle per tick.
//! The first tick fires immediately so a fresh deploy populates the store
//! without waiting a full interval. Fetch failures are logged and absorbed
//! here — the next tick is the retry policy.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::fetch::VideoFetcher;
use crate::ingest::ingest_page;
use crate::metrics;
use crate::store::VideoStore;

/// Safety buffer subtracted from the newest stored publish time, so a video
/// published in the same second as the previous fetch isn't missed.
const SAFETY_BUFFER_SECS: i64 = 60;

/// Lower bound for the next search window: the newest stored publish time
/// minus the safety buffer. `None` when the store is empty — the fetcher
/// then falls back to its lookback default.
pub fn resume_point(latest: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    latest.map(|t| t - chrono::Duration::seconds(SAFETY_BUFFER_SECS))
}

/// Spawn the background poll task.
///
/// Returns a `JoinHandle` for the spawned task.
pub fn spawn_poll_task(
    fetcher: Arc<VideoFetcher>,
    videos: Arc<VideoStore>,
    query: String,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            poll_cycle(&fetcher, &videos, &query).await;
        }
    })
}

/// Run one poll cycle: derive the cursor, fetch a page, ingest it.
async fn poll_cycle(fetcher: &VideoFetcher, videos: &VideoStore, query: &str) {
    let after = resume_point(videos.latest_published_at().await);
    let started = std::time::Instant::now();

    let items = match fetcher.fetch_page(query, after).await {
        Ok(items) => {
            metrics::record_fetch("ok", started.elapsed().as_secs_f64());
            items
        }
        Err(e) => {
            metrics::record_fetch("error", started.elapsed().as_secs_f64());
            error!(error = %e, "fetch failed, will retry next tick");
            return;
        }
    };

    match ingest_page(videos, items).await {
        Ok(summary) => {
            metrics::record_videos_ingested(summary.stored as u64);
            info!(
                stored = summary.stored,
                skipped = summary.skipped,
                "poll cycle complete"
            );
        }
        Err(e) => {
            error!(error = %e, "failed to persist fetched videos");
        }
    }
}
