//! Shortened-URL expansion cache
//!
//! Maps a short URL to the URL it expanded to. Writes are upserts, so the last
//! writer wins and no locking is needed beyond what the backing store does.
//! Failed expansions are cached too (the short URL maps to itself), which
//! keeps dead shorteners from being fetched again.
//!
//! Entries never expire.
//!
//! - [`SqliteUrlCache`] - single-file SQLite table, the persistent backend
//! - [`MemoryUrlCache`] - process-local map for tests and one-off runs

mod memory_cache;
mod sqlite_cache;

pub use memory_cache::MemoryUrlCache;
pub use sqlite_cache::SqliteUrlCache;

use anyhow::Result;
use async_trait::async_trait;

/// Key-value store injected into the link resolver
///
/// Errors are storage failures and must reach the caller; a missing entry is
/// `Ok(None)`.
#[async_trait]
pub trait UrlCache: Send + Sync {
    /// Looks up the expansion previously stored for `short_url`
    async fn get_cached_url(&self, short_url: &str) -> Result<Option<String>>;

    /// Inserts or replaces the expansion for `short_url`
    async fn cache_url(&self, short_url: &str, expanded_url: &str) -> Result<()>;

    /// Number of cached entries
    async fn len(&self) -> Result<usize>;
}
