use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{debug, trace};

use super::UrlCache;
use crate::utils::sqlite::{open_file_pool, open_memory_pool};

/// SQLite-backed cache with one `url_cache` table
#[derive(Debug, Clone)]
pub struct SqliteUrlCache {
    pool: SqlitePool,
}

impl SqliteUrlCache {
    /// Opens the cache file, creating the file and table if absent
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let pool = open_file_pool(path.as_ref()).await?;
        Self::with_pool(pool).await
    }

    /// Cache that lives only as long as the process
    pub async fn in_memory() -> Result<Self> {
        let pool = open_memory_pool().await?;
        Self::with_pool(pool).await
    }

    /// Wraps an existing pool and creates the table if needed
    pub async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS url_cache (
                short_url TEXT PRIMARY KEY,
                expanded_url TEXT
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("Failed to create url_cache table")?;

        debug!("url_cache table ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl UrlCache for SqliteUrlCache {
    async fn get_cached_url(&self, short_url: &str) -> Result<Option<String>> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT expanded_url FROM url_cache WHERE short_url = ?")
                .bind(short_url)
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("Failed to read cache entry for {}", short_url))?;

        match &row {
            Some(_) => trace!("Cache HIT: {}", short_url),
            None => trace!("Cache MISS: {}", short_url),
        }
        Ok(row.and_then(|(expanded,)| expanded))
    }

    async fn cache_url(&self, short_url: &str, expanded_url: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO url_cache (short_url, expanded_url) VALUES (?, ?)")
            .bind(short_url)
            .bind(expanded_url)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to write cache entry for {}", short_url))?;

        trace!("Cached {} -> {}", short_url, expanded_url);
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM url_cache")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count cache entries")?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_then_read() {
        let cache = SqliteUrlCache::in_memory().await.unwrap();
        cache.cache_url("https://bit.ly/abc", "https://example.com/landing").await.unwrap();

        let cached = cache.get_cached_url("https://bit.ly/abc").await.unwrap();
        assert_eq!(cached.as_deref(), Some("https://example.com/landing"));
        assert_eq!(cache.get_cached_url("https://bit.ly/other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let cache = SqliteUrlCache::in_memory().await.unwrap();
        cache.cache_url("https://t.co/x", "https://first.example").await.unwrap();
        cache.cache_url("https://t.co/x", "https://second.example").await.unwrap();

        let cached = cache.get_cached_url("https://t.co/x").await.unwrap();
        assert_eq!(cached.as_deref(), Some("https://second.example"));
        assert_eq!(cache.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_file_cache_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("url_cache.db");

        {
            let cache = SqliteUrlCache::open(&path).await.unwrap();
            cache.cache_url("https://goo.gl/q", "https://docs.example.org").await.unwrap();
        }

        let reopened = SqliteUrlCache::open(&path).await.unwrap();
        let cached = reopened.get_cached_url("https://goo.gl/q").await.unwrap();
        assert_eq!(cached.as_deref(), Some("https://docs.example.org"));
    }
}
