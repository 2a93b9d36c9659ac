//! Persistent video store
//!
//! Same file discipline as the key store: one JSON file mapping video ids to
//! records, atomic temp-file + rename writes, a tokio Mutex serializing all
//! access. Upsert is idempotent — re-ingesting an item any number of times
//! leaves the same stored state as ingesting it once.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::model::VideoRecord;

/// Thread-safe video file manager.
pub struct VideoStore {
    path: PathBuf,
    state: Mutex<BTreeMap<String, VideoRecord>>,
}

impl VideoStore {
    /// Load videos from the given file path, creating an empty file when
    /// none exists yet.
    pub async fn load(path: PathBuf) -> Result<Self, StoreError> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| StoreError::Io(format!("reading video file: {e}")))?;
            let videos: BTreeMap<String, VideoRecord> = serde_json::from_str(&contents)
                .map_err(|e| StoreError::Parse(format!("parsing video file: {e}")))?;
            info!(path = %path.display(), videos = videos.len(), "loaded video store");
            videos
        } else {
            info!(path = %path.display(), "video file not found, starting with empty store");
            let videos = BTreeMap::new();
            write_atomic(&path, &videos).await?;
            videos
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Insert a new record, or update the display fields of an existing one.
    ///
    /// On update only `title`, `description`, `thumbnail_url` and
    /// `channel_title` are overwritten; `published_at` and `channel_id` keep
    /// their stored values. Returns true when the record was newly created.
    pub async fn upsert(&self, record: VideoRecord) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let created = match state.entry(record.video_id.clone()) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                existing.title = record.title;
                existing.description = record.description;
                existing.thumbnail_url = record.thumbnail_url;
                existing.channel_title = record.channel_title;
                false
            }
            Entry::Vacant(entry) => {
                debug!(video_id = %record.video_id, "storing new video");
                entry.insert(record);
                true
            }
        };
        write_atomic(&self.path, &state).await?;
        Ok(created)
    }

    /// Get a clone of a specific record.
    pub async fn get(&self, video_id: &str) -> Option<VideoRecord> {
        let state = self.state.lock().await;
        state.get(video_id).cloned()
    }

    /// Records ordered by publish time, newest first, capped at `limit`.
    pub async fn list(&self, limit: usize) -> Vec<VideoRecord> {
        let state = self.state.lock().await;
        let mut records: Vec<VideoRecord> = state.values().cloned().collect();
        records.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        records.truncate(limit);
        records
    }

    /// Publish time of the newest stored record; the scheduler derives its
    /// resume cursor from this.
    pub async fn latest_published_at(&self) -> Option<DateTime<Utc>> {
        let state = self.state.lock().await;
        state.values().map(|record| record.published_at).max()
    }

    /// Number of stored videos.
    pub async fn len(&self) -> usize {
        let state = self.state.lock().await;
        state.len()
    }

    /// Whether the store holds no videos.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Write the video map to a file atomically (temp file + rename).
async fn write_atomic(path: &Path, data: &BTreeMap<String, VideoRecord>) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| StoreError::Parse(format!("serializing videos: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| StoreError::Io("video file path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".videos.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| StoreError::Io(format!("writing temp video file: {e}")))?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| StoreError::Io(format!("renaming temp video file: {e}")))?;

    Ok(())
}
