use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::trace;

use super::UrlCache;

/// Process-local cache; nothing is persisted
#[derive(Debug, Clone, Default)]
pub struct MemoryUrlCache {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryUrlCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UrlCache for MemoryUrlCache {
    async fn get_cached_url(&self, short_url: &str) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries.get(short_url).cloned())
    }

    async fn cache_url(&self, short_url: &str, expanded_url: &str) -> Result<()> {
        trace!("Caching {} -> {} in memory", short_url, expanded_url);
        let mut entries = self.entries.write().await;
        entries.insert(short_url.to_string(), expanded_url.to_string());
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_semantics() {
        tokio_test::block_on(async {
            let cache = MemoryUrlCache::new();
            assert_eq!(cache.get_cached_url("a").await.unwrap(), None);

            cache.cache_url("a", "b").await.unwrap();
            assert_eq!(cache.get_cached_url("a").await.unwrap().as_deref(), Some("b"));

            cache.cache_url("a", "c").await.unwrap();
            assert_eq!(cache.get_cached_url("a").await.unwrap().as_deref(), Some("c"));
            assert_eq!(cache.len().await.unwrap(), 1);
        });
    }
}
