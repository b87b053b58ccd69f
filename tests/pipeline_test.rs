use anyhow::Result;
use chrono::{Local, TimeZone};
use std::sync::Arc;

use phishguard::cache::{MemoryUrlCache, UrlCache};
use phishguard::features::{FeatureExtractor, FEATURE_NAMES};
use phishguard::feedback::{feature_hash, submit_feedback, FeedbackStore, Label, SqliteFeedbackStore};
use phishguard::link_resolver::{LinkResolver, ResolverConfig};
use phishguard::pipeline::{Pipeline, TrainingPipelineConfig};
use phishguard::suffix::SuffixList;

async fn pipeline(cached: &[(&str, &str)]) -> Result<Pipeline> {
    let cache = Arc::new(MemoryUrlCache::new());
    for (short, long) in cached {
        cache.cache_url(short, long).await?;
    }
    let resolver = LinkResolver::new(ResolverConfig::default(), cache, SuffixList::shared())?;
    Ok(Pipeline::new(resolver, FeatureExtractor::default()))
}

#[tokio::test]
async fn test_canonical_examples() -> Result<()> {
    let pipeline = pipeline(&[]).await?;

    let canonical = pipeline.canonicalize_and_resolve("example.com").await?;
    assert_eq!(canonical, "http://example.com");
    assert_eq!(pipeline.extractor().extract_features(&canonical).has_https, 0);

    assert_eq!(
        pipeline.canonicalize_and_resolve("https:// example.com///").await?,
        "https://example.com"
    );
    assert_eq!(
        pipeline.canonicalize_and_resolve("exa\u{200B}mple.com").await?,
        "http://example.com"
    );
    Ok(())
}

#[tokio::test]
async fn test_training_data_run_writes_artifacts() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let raw_path = dir.path().join("raw_data.csv");
    std::fs::write(
        &raw_path,
        "url,label\n\
         google.com,legitimate\n\
         http://google.com/,legitimate\n\
         https://bit.ly/promo,phishing\n\
         http://secure-login.paypa1.co/verify?id=42,phishing\n",
    )?;

    let pipeline = pipeline(&[("https://bit.ly/promo", "https://account-update.example.net/form/")]).await?;
    let timestamp = Local.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
    let config = TrainingPipelineConfig::new(dir.path().join("Artifacts"), timestamp);

    let artifacts = pipeline.run_training_data(&raw_path, &config).await?;
    assert_eq!(artifacts.preparation.rows_in, 4);
    assert_eq!(artifacts.preparation.rows_out, 3);
    assert_eq!(artifacts.extraction.rows, 3);
    assert!(artifacts
        .preparation
        .processed_data_path
        .ends_with("02_01_2025_03_04_05/data_preparation/processed/processed_data.csv"));

    let prepared = std::fs::read_to_string(&artifacts.preparation.processed_data_path)?;
    assert!(prepared.contains("https://bit.ly/promo,https://account-update.example.net/form,1"));

    let features = std::fs::read_to_string(&artifacts.extraction.features_data_path)?;
    let header = features.lines().next().unwrap_or_default();
    let mut expected: Vec<&str> = FEATURE_NAMES.to_vec();
    expected.push("label");
    assert_eq!(header, expected.join(","));
    assert_eq!(features.lines().count(), 4);
    Ok(())
}

#[tokio::test]
async fn test_feedback_is_keyed_by_feature_hash() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = SqliteFeedbackStore::open(dir.path().join("feedback.db")).await?;
    let pipeline = pipeline(&[]).await?;

    let first = submit_feedback(
        &pipeline,
        &store,
        "paypa1-login.com/",
        Label::Phishing,
        Label::Legitimate,
        Some(0.4),
    )
    .await?;
    assert_eq!(first.canonical_url, "http://paypa1-login.com");
    assert_eq!(
        first.feature_hash,
        feature_hash(&pipeline.extractor().extract_features("http://paypa1-login.com"))
    );

    // same canonical URL, corrected label
    let second = submit_feedback(
        &pipeline,
        &store,
        "http://paypa1-login.com",
        Label::Legitimate,
        Label::Legitimate,
        None,
    )
    .await?;
    assert_eq!(second.feature_hash, first.feature_hash);

    assert_eq!(store.count().await?, 1);
    let stored = store.get(&first.feature_hash).await?.expect("record exists");
    assert_eq!(stored.label, Label::Legitimate);
    assert_eq!(stored.confidence, None);
    Ok(())
}
