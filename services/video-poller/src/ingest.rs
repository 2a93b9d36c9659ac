//! Upsert step for fetched search items
//!
//! Malformed-item policy: an item missing its video id or carrying an
//! unparseable publish time is skipped with a warning and the rest of the
//! page is kept, so one bad item never costs a whole fetch window.

use chrono::NaiveDateTime;
use tracing::warn;

use crate::error::StoreError;
use crate::model::{PUBLISHED_AT_FORMAT, SearchItem, VideoRecord};
use crate::store::VideoStore;

/// Counts from one ingested page.
#[derive(Debug, Default, PartialEq)]
pub struct IngestSummary {
    pub stored: usize,
    pub skipped: usize,
}

/// Upsert every parseable item of a fetched page into the store.
pub async fn ingest_page(
    store: &VideoStore,
    items: Vec<SearchItem>,
) -> Result<IngestSummary, StoreError> {
    let mut summary = IngestSummary::default();
    for item in items {
        match parse_item(item) {
            Some(record) => {
                store.upsert(record).await?;
                summary.stored += 1;
            }
            None => summary.skipped += 1,
        }
    }
    Ok(summary)
}

/// Turn a wire item into a stored record, or reject it.
fn parse_item(item: SearchItem) -> Option<VideoRecord> {
    let Some(video_id) = item.id.video_id else {
        warn!("search item without videoId, skipping");
        return None;
    };

    let Some(raw_published) = item.snippet.published_at else {
        warn!(video_id, "search item without publishedAt, skipping");
        return None;
    };

    let published_at = match NaiveDateTime::parse_from_str(&raw_published, PUBLISHED_AT_FORMAT) {
        Ok(naive) => naive.and_utc(),
        Err(e) => {
            warn!(video_id, raw = %raw_published, error = %e, "unparseable publishedAt, skipping");
            return None;
        }
    };

    Some(VideoRecord {
        video_id,
        title: item.snippet.title,
        description: item.snippet.description,
        thumbnail_url: item.snippet.thumbnails.high.url,
        published_at,
        channel_id: item.snippet.channel_id,
        channel_title: item.snippet.channel_title,
    })
}
