//! Labelled feedback records
//!
//! A feedback submission is recomputed through the same pipeline as a
//! prediction, then stored under a hash of its feature values. Two URLs that
//! canonicalize to identical features share one record; the latest label wins.

mod sqlite_store;

pub use sqlite_store::SqliteFeedbackStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use tracing::{info, instrument};

use crate::features::{FeatureValue, FeatureVector};
use crate::pipeline::Pipeline;

const HASH_DELIMITER: &str = "|";
const HASH_DECIMALS: i32 = 6;

/// Human or model verdict on a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Phishing,
    Legitimate,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Phishing => "phishing",
            Label::Legitimate => "legitimate",
        }
    }

    pub fn from_prediction(is_phishing: bool) -> Self {
        if is_phishing {
            Label::Phishing
        } else {
            Label::Legitimate
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "phishing" => Ok(Label::Phishing),
            "legitimate" => Ok(Label::Legitimate),
            other => anyhow::bail!("Unknown label: {}", other),
        }
    }
}

fn normalized_value(value: FeatureValue) -> String {
    match value {
        FeatureValue::Count(v) => v.to_string(),
        FeatureValue::Ratio(v) => {
            let scale = 10f64.powi(HASH_DECIMALS);
            let rounded = (v * scale).round() / scale;
            // -0.0 and 0.0 must hash alike
            let rounded = if rounded == 0.0 { 0.0 } else { rounded };
            format!("{:?}", rounded)
        }
    }
}

/// SHA-256 (hex) over the feature values, sorted by feature name
///
/// Reals are rounded to six decimals first, so float noise below that does
/// not split one URL into several records.
pub fn feature_hash(features: &FeatureVector) -> String {
    let mut values = features.named_values();
    values.sort_by_key(|(name, _)| *name);

    let joined = values
        .iter()
        .map(|(_, value)| normalized_value(*value))
        .collect::<Vec<_>>()
        .join(HASH_DELIMITER);

    hex::encode(Sha256::digest(joined.as_bytes()))
}

/// Stored feedback row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub url: String,
    pub canonical_url: String,
    pub features: FeatureVector,
    pub label: Label,
    pub model_prediction: Label,
    pub confidence: Option<f64>,
    pub feature_hash: String,
    pub created_at: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn new(
        url: impl Into<String>,
        canonical_url: impl Into<String>,
        features: FeatureVector,
        label: Label,
        model_prediction: Label,
        confidence: Option<f64>,
    ) -> Self {
        Self {
            url: url.into(),
            canonical_url: canonical_url.into(),
            feature_hash: feature_hash(&features),
            features,
            label,
            model_prediction,
            confidence,
            created_at: Utc::now(),
        }
    }
}

/// Persistent home of feedback records
///
/// Store failures are returned, never swallowed: a dropped label is lost
/// training data.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Inserts the record, or updates the record with the same feature hash
    async fn upsert(&self, record: &FeedbackRecord) -> Result<()>;

    async fn get(&self, feature_hash: &str) -> Result<Option<FeedbackRecord>>;

    async fn count(&self) -> Result<usize>;
}

/// Recomputes a submission through the pipeline and stores it
#[instrument(level = "info", skip(pipeline, store))]
pub async fn submit_feedback(
    pipeline: &Pipeline,
    store: &dyn FeedbackStore,
    url: &str,
    label: Label,
    model_prediction: Label,
    confidence: Option<f64>,
) -> Result<FeedbackRecord> {
    let (canonical_url, features) = pipeline.featurize(url).await?;
    let record = FeedbackRecord::new(url, canonical_url, features, label, model_prediction, confidence);

    store.upsert(&record).await?;
    info!("Stored feedback {} for {}", record.feature_hash, record.canonical_url);
    Ok(record)
}
