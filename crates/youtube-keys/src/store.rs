//! Persistent API key store
//!
//! Manages a JSON file mapping key tokens to usage state. All writes use
//! atomic temp-file + rename to prevent corruption on crash. A tokio Mutex
//! serializes every read-modify-write, so selection and flag updates from
//! overlapping poll ticks cannot interleave.
//!
//! The key file is the single source of truth for key state. Selection is
//! performed inside the store (`select_least_recently_used`) so that picking
//! a key and stamping its `last_used` happen under one lock acquisition.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Usage state for a single API key. The token itself is the map key in the
/// store file, so the record carries only flags and the usage timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Whether the key may be selected at all
    #[serde(default = "default_active")]
    pub active: bool,
    /// Set when the search API reports quota exhaustion for this key
    #[serde(default)]
    pub quota_exceeded: bool,
    /// Time of the most recent selection; `None` until first use
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl KeyRecord {
    /// A freshly armed record: active, quota clear, never used.
    pub fn armed() -> Self {
        Self {
            active: true,
            quota_exceeded: false,
            last_used: None,
        }
    }

    /// A key is eligible for selection iff active and not quota-exceeded.
    pub fn eligible(&self) -> bool {
        self.active && !self.quota_exceeded
    }
}

/// Redacted display form of a key token, safe for logs and API responses.
///
/// Shows the first and last five characters (`AIzaS...h8Qkw`); tokens too
/// short to redact meaningfully are masked entirely.
pub fn redact(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 10 {
        return "*****".to_string();
    }
    let head: String = chars[..5].iter().collect();
    let tail: String = chars[chars.len() - 5..].iter().collect();
    format!("{head}...{tail}")
}

/// Thread-safe key file manager.
///
/// The Mutex serializes all access. A `BTreeMap` keeps tokens ordered, which
/// makes the LRU tie-break deterministic.
pub struct KeyStore {
    path: PathBuf,
    state: Mutex<BTreeMap<String, KeyRecord>>,
}

impl KeyStore {
    /// Load keys from the given file path.
    ///
    /// If the file doesn't exist, creates it as `{}` (cold start with zero
    /// keys). The pool reports `unhealthy` until keys are added via the
    /// admin API or the startup env import.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading key file: {e}")))?;
            let keys: BTreeMap<String, KeyRecord> = serde_json::from_str(&contents)
                .map_err(|e| Error::Parse(format!("parsing key file: {e}")))?;
            info!(path = %path.display(), keys = keys.len(), "loaded api keys");
            keys
        } else {
            info!(path = %path.display(), "key file not found, starting with empty store");
            let keys = BTreeMap::new();
            write_atomic(&path, &keys).await?;
            keys
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Get a clone of a specific key's record.
    pub async fn get(&self, token: &str) -> Option<KeyRecord> {
        let state = self.state.lock().await;
        state.get(token).cloned()
    }

    /// Add a key, or re-arm it if already present (active on, quota flag
    /// cleared). Returns true when the key was newly created.
    pub async fn upsert(&self, token: String) -> Result<bool> {
        let mut state = self.state.lock().await;
        let created = match state.entry(token.clone()) {
            Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                record.active = true;
                record.quota_exceeded = false;
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(KeyRecord::armed());
                true
            }
        };
        debug!(key = %redact(&token), created, "upserted api key");
        write_atomic(&self.path, &state).await?;
        Ok(created)
    }

    /// Select the eligible key with the oldest `last_used` (never-used keys
    /// first, token order breaking ties) and stamp its `last_used` with
    /// `now` before returning — one atomic read-modify-write, so sequential
    /// or concurrent callers do not re-select the key just handed out.
    ///
    /// Returns `None` when no key is both active and quota-clear.
    pub async fn select_least_recently_used(&self, now: DateTime<Utc>) -> Result<Option<String>> {
        let mut state = self.state.lock().await;
        let token = state
            .iter()
            .filter(|(_, record)| record.eligible())
            .min_by_key(|(token, record)| (record.last_used, (*token).clone()))
            .map(|(token, _)| token.clone());

        let Some(token) = token else {
            return Ok(None);
        };

        if let Some(record) = state.get_mut(&token) {
            record.last_used = Some(now);
        }
        write_atomic(&self.path, &state).await?;
        Ok(Some(token))
    }

    /// Set or clear the quota-exceeded flag on a key.
    ///
    /// Returns true when the flag actually changed; setting an already-set
    /// flag skips the disk write entirely.
    pub async fn set_quota_exceeded(&self, token: &str, exceeded: bool) -> Result<bool> {
        let mut state = self.state.lock().await;
        let record = state
            .get_mut(token)
            .ok_or_else(|| Error::NotFound(redact(token)))?;
        if record.quota_exceeded == exceeded {
            return Ok(false);
        }
        record.quota_exceeded = exceeded;
        write_atomic(&self.path, &state).await?;
        Ok(true)
    }

    /// Clear the quota-exceeded flag on all active keys.
    ///
    /// Returns the number of keys whose flag was cleared. Inactive keys are
    /// left untouched so a deactivated key stays fully parked.
    pub async fn reset_quota(&self) -> Result<usize> {
        let mut state = self.state.lock().await;
        let mut cleared = 0usize;
        for record in state.values_mut() {
            if record.active && record.quota_exceeded {
                record.quota_exceeded = false;
                cleared += 1;
            }
        }
        if cleared > 0 {
            write_atomic(&self.path, &state).await?;
        }
        Ok(cleared)
    }

    /// Whether at least one key is active and quota-clear.
    pub async fn has_eligible(&self) -> bool {
        let state = self.state.lock().await;
        state.values().any(|record| record.eligible())
    }

    /// Delete every key. Returns the number removed.
    pub async fn remove_all(&self) -> Result<usize> {
        let mut state = self.state.lock().await;
        let removed = state.len();
        state.clear();
        write_atomic(&self.path, &state).await?;
        Ok(removed)
    }

    /// Snapshot of all keys and their records, in token order.
    pub async fn records(&self) -> Vec<(String, KeyRecord)> {
        let state = self.state.lock().await;
        state
            .iter()
            .map(|(token, record)| (token.clone(), record.clone()))
            .collect()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        let state = self.state.lock().await;
        state.len()
    }

    /// Whether the store holds no keys.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Write the key map to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target, so a crash mid-write cannot corrupt the file. Permissions are
/// set to 0600 since the file contains live API tokens.
async fn write_atomic(path: &Path, data: &BTreeMap<String, KeyRecord>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Parse(format!("serializing keys: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("key file path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".api_keys.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp key file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting key file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp key file: {e}")))?;

    debug!(path = %path.display(), "persisted api keys");
    Ok(())
}
