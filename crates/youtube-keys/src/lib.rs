//! API key storage for the YouTube search poller
//!
//! Persists per-key usage state (active flag, quota-exceeded flag, last-used
//! timestamp) in a JSON file and exposes the atomic select-and-touch
//! operation the pool builds its rotation policy on. This crate is a
//! standalone library with no dependency on the poller binary.
//!
//! Key lifecycle:
//! 1. Admin adds a key (or the startup import reads `YOUTUBE_API_KEYS`) →
//!    key stored armed: active, quota clear, never used
//! 2. The pool selects the least-recently-used eligible key → `last_used`
//!    stamped under the store lock
//! 3. The search API reports quota exhaustion → `quota_exceeded` set
//! 4. Admin reset clears `quota_exceeded` on active keys

pub mod error;
pub mod store;

pub use error::{Error, Result};
pub use store::{KeyRecord, KeyStore, redact};
