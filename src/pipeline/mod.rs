//! Canonicalize, resolve, canonicalize again, extract
//!
//! [`Pipeline`] is the single place that sequences the URL stages, so the
//! inference path and dataset preparation cannot drift apart.

pub mod extraction;
pub mod preparation;
pub mod training;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::cache::SqliteUrlCache;
use crate::config::Settings;
use crate::features::{FeatureExtractor, FeatureVector};
use crate::link_resolver::LinkResolver;
use crate::suffix::SuffixList;
use crate::url_cleaner::{clean_url, ensure_scheme, is_structurally_valid};

pub use extraction::{extract_feature_table, FeatureExtractionArtifact};
pub use preparation::{prepare_dataset, prepare_records, DataPreparationArtifact, PreparedRecord, RawRecord};
pub use training::{TrainingArtifacts, TrainingPipelineConfig};

/// Shared URL stages
#[derive(Clone)]
pub struct Pipeline {
    resolver: LinkResolver,
    extractor: Arc<FeatureExtractor>,
}

impl Pipeline {
    pub fn new(resolver: LinkResolver, extractor: FeatureExtractor) -> Self {
        Self {
            resolver,
            extractor: Arc::new(extractor),
        }
    }

    /// Wires the persistent cache, suffix list and resolver from settings
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let suffixes = SuffixList::load(settings.features.public_suffix_list.as_deref())?;
        let cache = SqliteUrlCache::open(&settings.storage.cache_db_path)
            .await
            .context("Failed to open URL cache")?;
        let resolver = LinkResolver::new(
            settings.resolver.to_resolver_config(),
            Arc::new(cache),
            suffixes.clone(),
        )?;
        Ok(Self::new(resolver, FeatureExtractor::new(suffixes)))
    }

    pub fn resolver(&self) -> &LinkResolver {
        &self.resolver
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Canonical form of one raw URL, expanding it if it is shortened
    ///
    /// When the expanded URL fails structural validation the raw input is
    /// returned as-is, so a request is never rejected on shape alone.
    #[instrument(level = "debug", skip(self))]
    pub async fn canonicalize_and_resolve(&self, raw: &str) -> Result<String> {
        let cleaned = clean_url(&ensure_scheme(raw));
        if !is_structurally_valid(&cleaned) {
            debug!("Cleaned URL is not structurally valid, keeping raw input");
            return Ok(raw.to_string());
        }

        let resolved = if self.resolver.is_shortener(&cleaned) {
            clean_url(&self.resolver.resolve(&cleaned).await?)
        } else {
            cleaned
        };

        if is_structurally_valid(&resolved) {
            Ok(resolved)
        } else {
            debug!("Resolved URL {} is not structurally valid, keeping raw input", resolved);
            Ok(raw.to_string())
        }
    }

    /// Canonical URL and its features
    pub async fn featurize(&self, raw: &str) -> Result<(String, FeatureVector)> {
        let canonical = self.canonicalize_and_resolve(raw).await?;
        let features = self.extractor.extract_features(&canonical);
        Ok((canonical, features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryUrlCache, UrlCache};
    use crate::link_resolver::ResolverConfig;

    fn pipeline_with(cache: Arc<MemoryUrlCache>) -> Pipeline {
        let resolver =
            LinkResolver::new(ResolverConfig::default(), cache, SuffixList::shared()).unwrap();
        Pipeline::new(resolver, FeatureExtractor::default())
    }

    #[tokio::test]
    async fn test_plain_url_is_canonicalized_without_network() {
        let pipeline = pipeline_with(Arc::new(MemoryUrlCache::new()));
        let canonical = pipeline.canonicalize_and_resolve("example.com/").await.unwrap();
        assert_eq!(canonical, "http://example.com");

        let canonical = pipeline.canonicalize_and_resolve("exa\u{200B}mple.com").await.unwrap();
        assert_eq!(canonical, "http://example.com");
    }

    #[tokio::test]
    async fn test_shortened_url_uses_cached_expansion() {
        let cache = Arc::new(MemoryUrlCache::new());
        cache
            .cache_url("https://bit.ly/abc", "https://landing.example.org/page/")
            .await
            .unwrap();
        let pipeline = pipeline_with(cache);

        let (canonical, features) = pipeline.featurize("https://bit.ly/abc/").await.unwrap();
        assert_eq!(canonical, "https://landing.example.org/page");
        assert_eq!(features.has_https, 1);
        assert_eq!(features.url_depth, 1);
    }

    #[tokio::test]
    async fn test_inference_and_batch_share_features() {
        let pipeline = pipeline_with(Arc::new(MemoryUrlCache::new()));
        let (canonical, single) = pipeline.featurize("  https://a-1.co/x_y?q=1/ ").await.unwrap();
        let batch = pipeline.extractor().extract_features(&canonical);
        assert_eq!(single, batch);
    }
}
