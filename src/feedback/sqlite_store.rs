use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use std::path::Path;
use tracing::debug;

use super::{FeedbackRecord, FeedbackStore};
use crate::utils::sqlite::{open_file_pool, open_memory_pool};

#[derive(Debug, FromRow)]
struct FeedbackRow {
    feature_hash: String,
    url: String,
    canonical_url: String,
    features: String,
    label: String,
    model_prediction: String,
    confidence: Option<f64>,
    created_at: String,
}

impl FeedbackRow {
    fn into_record(self) -> Result<FeedbackRecord> {
        Ok(FeedbackRecord {
            features: serde_json::from_str(&self.features)
                .with_context(|| format!("Corrupt features for {}", self.feature_hash))?,
            label: self.label.parse()?,
            model_prediction: self.model_prediction.parse()?,
            created_at: DateTime::parse_from_rfc3339(&self.created_at)
                .with_context(|| format!("Corrupt timestamp for {}", self.feature_hash))?
                .with_timezone(&Utc),
            url: self.url,
            canonical_url: self.canonical_url,
            confidence: self.confidence,
            feature_hash: self.feature_hash,
        })
    }
}

/// Feedback table in a single SQLite file
#[derive(Debug, Clone)]
pub struct SqliteFeedbackStore {
    pool: SqlitePool,
}

impl SqliteFeedbackStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let pool = open_file_pool(path.as_ref()).await?;
        Self::with_pool(pool).await
    }

    pub async fn in_memory() -> Result<Self> {
        let pool = open_memory_pool().await?;
        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feedback_features (
                feature_hash TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                canonical_url TEXT NOT NULL,
                features TEXT NOT NULL,
                label TEXT NOT NULL,
                model_prediction TEXT NOT NULL,
                confidence REAL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("Failed to create feedback_features table")?;

        debug!("feedback_features table ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl FeedbackStore for SqliteFeedbackStore {
    async fn upsert(&self, record: &FeedbackRecord) -> Result<()> {
        let features =
            serde_json::to_string(&record.features).context("Failed to serialize features")?;

        // created_at keeps the first submission time
        sqlx::query(
            r#"
            INSERT INTO feedback_features
                (feature_hash, url, canonical_url, features, label, model_prediction, confidence, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(feature_hash) DO UPDATE SET
                url = excluded.url,
                canonical_url = excluded.canonical_url,
                features = excluded.features,
                label = excluded.label,
                model_prediction = excluded.model_prediction,
                confidence = excluded.confidence
            "#,
        )
        .bind(&record.feature_hash)
        .bind(&record.url)
        .bind(&record.canonical_url)
        .bind(features)
        .bind(record.label.as_str())
        .bind(record.model_prediction.as_str())
        .bind(record.confidence)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to store feedback {}", record.feature_hash))?;

        Ok(())
    }

    async fn get(&self, feature_hash: &str) -> Result<Option<FeedbackRecord>> {
        let row: Option<FeedbackRow> = sqlx::query_as(
            r#"
            SELECT feature_hash, url, canonical_url, features, label, model_prediction, confidence, created_at
            FROM feedback_features WHERE feature_hash = ?
            "#,
        )
        .bind(feature_hash)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to read feedback {}", feature_hash))?;

        row.map(FeedbackRow::into_record).transpose()
    }

    async fn count(&self) -> Result<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feedback_features")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count feedback records")?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::Label;
    use crate::features::FeatureExtractor;

    fn record(url: &str, label: Label, confidence: Option<f64>) -> FeedbackRecord {
        let features = FeatureExtractor::default().extract_features(url);
        FeedbackRecord::new(url, url, features, label, Label::Legitimate, confidence)
    }

    #[tokio::test]
    async fn test_upsert_then_get() {
        let store = SqliteFeedbackStore::in_memory().await.unwrap();
        let stored = record("http://paypal-secure.example.com/login", Label::Phishing, Some(0.9));
        store.upsert(&stored).await.unwrap();

        let loaded = store.get(&stored.feature_hash).await.unwrap().unwrap();
        assert_eq!(loaded.url, stored.url);
        assert_eq!(loaded.features, stored.features);
        assert_eq!(loaded.label, Label::Phishing);
        assert_eq!(loaded.confidence, Some(0.9));
        assert_eq!(loaded.created_at.timestamp(), stored.created_at.timestamp());
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_same_features_update_one_record() {
        let store = SqliteFeedbackStore::in_memory().await.unwrap();
        let first = record("http://example.com", Label::Phishing, None);
        store.upsert(&first).await.unwrap();

        let second = record("http://example.com", Label::Legitimate, Some(0.2));
        store.upsert(&second).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let loaded = store.get(&first.feature_hash).await.unwrap().unwrap();
        assert_eq!(loaded.label, Label::Legitimate);
        assert_eq!(loaded.confidence, Some(0.2));
        assert_eq!(loaded.created_at.timestamp(), first.created_at.timestamp());
    }

    #[tokio::test]
    async fn test_upsert_keeps_features_in_step_with_url() {
        let store = SqliteFeedbackStore::in_memory().await.unwrap();
        let first = record("http://example.com/a", Label::Phishing, None);
        store.upsert(&first).await.unwrap();

        // same hash, features differ below the rounding used for hashing
        let mut features = first.features;
        features.url_entropy += 1e-9;
        let second = FeedbackRecord {
            url: "http://example.com/b".to_string(),
            canonical_url: "http://example.com/b".to_string(),
            features,
            ..first.clone()
        };
        store.upsert(&second).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let loaded = store.get(&first.feature_hash).await.unwrap().unwrap();
        assert_eq!(loaded.canonical_url, "http://example.com/b");
        assert!((loaded.features.url_entropy - features.url_entropy).abs() < 1e-12);
        assert!((loaded.features.url_entropy - first.features.url_entropy).abs() > 1e-10);
    }
}
