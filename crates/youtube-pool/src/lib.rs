//! Credential pool for YouTube API keys
//!
//! Manages rotation across multiple API keys with least-recently-used
//! selection, quota-exhaustion marking, and an administrative reset. The
//! pool is a policy layer over `KeyStore` (single source of truth); the
//! store's lock makes select-and-touch atomic, so overlapping poll ticks
//! never hand out the same just-used key.
//!
//! Key lifecycle through the pool:
//! 1. Key armed in the store (admin add or startup env import)
//! 2. Pool selects the LRU eligible key and stamps `last_used`
//! 3. Search API returns a quota 403 → `mark_exhausted` parks the key
//! 4. Admin reset clears quota flags → key selectable again
//!
//! LRU spreads traffic evenly across keys instead of draining one key to
//! exhaustion before touching the next, which keeps the window in which the
//! whole pool is exhausted as small as possible.

pub mod error;
pub mod pool;
pub mod quota;

pub use error::{Error, Result};
pub use pool::{KeyPool, SelectedKey};
pub use quota::is_quota_exceeded;
