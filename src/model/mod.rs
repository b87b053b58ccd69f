//! Classifier behind the inference boundary
//!
//! The model artifact is JSON:
//!
//! ```json
//! { "version": "2024-03-07", "bias": -1.2, "weights": { "has_https": -0.8, ... } }
//! ```
//!
//! The weight keys must be exactly the extractor's feature names. A model
//! trained against a different feature schema is refused at load time.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::info;

use crate::features::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};

pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Model outcome for one URL
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub probability: f64,
    pub is_phishing: bool,
}

impl Prediction {
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        Self {
            probability,
            is_phishing: probability >= threshold,
        }
    }
}

/// Anything that scores a feature vector
pub trait Classifier: Send + Sync {
    /// Probability in [0, 1] that the URL is phishing
    fn predict_proba(&self, features: &FeatureVector) -> f64;

    fn version(&self) -> &str;

    fn predict(&self, features: &FeatureVector, threshold: f64) -> Prediction {
        Prediction::from_probability(self.predict_proba(features), threshold)
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct ModelArtifact {
    version: String,
    bias: f64,
    weights: HashMap<String, f64>,
}

/// Logistic regression over the feature columns
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticModel {
    version: String,
    bias: f64,
    weights: [f64; FEATURE_COUNT],
}

impl LogisticModel {
    pub fn new(version: impl Into<String>, bias: f64, weights: [f64; FEATURE_COUNT]) -> Self {
        Self {
            version: version.into(),
            bias,
            weights,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let artifact: ModelArtifact =
            serde_json::from_str(json).context("Failed to parse model artifact")?;

        let expected: BTreeSet<&str> = FEATURE_NAMES.iter().copied().collect();
        let found: BTreeSet<&str> = artifact.weights.keys().map(String::as_str).collect();
        if expected != found {
            let missing: Vec<_> = expected.difference(&found).collect();
            let unexpected: Vec<_> = found.difference(&expected).collect();
            bail!(
                "Model {} does not match the feature schema (missing: {:?}, unexpected: {:?})",
                artifact.version,
                missing,
                unexpected
            );
        }

        let weights = FEATURE_NAMES.map(|name| artifact.weights[name]);
        Ok(Self::new(artifact.version, artifact.bias, weights))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model {}", path.display()))?;
        let model = Self::from_json(&json)
            .with_context(|| format!("Failed to load model {}", path.display()))?;
        info!("Loaded model {} from {}", model.version, path.display());
        Ok(model)
    }

    pub fn to_json(&self) -> Result<String> {
        let artifact = ModelArtifact {
            version: self.version.clone(),
            bias: self.bias,
            weights: FEATURE_NAMES
                .iter()
                .zip(self.weights.iter())
                .map(|(name, weight)| (name.to_string(), *weight))
                .collect(),
        };
        serde_json::to_string_pretty(&artifact).context("Failed to serialize model")
    }
}

impl Classifier for LogisticModel {
    fn predict_proba(&self, features: &FeatureVector) -> f64 {
        let z = features
            .to_array()
            .iter()
            .zip(self.weights.iter())
            .fold(self.bias, |acc, (x, w)| acc + x * w);
        1.0 / (1.0 + (-z).exp())
    }

    fn version(&self) -> &str {
        &self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureExtractor;

    fn artifact_json(bias: f64, skip: Option<&str>, extra: Option<&str>) -> String {
        let mut weights: serde_json::Map<String, serde_json::Value> = FEATURE_NAMES
            .iter()
            .filter(|name| Some(**name) != skip)
            .map(|name| (name.to_string(), serde_json::json!(0.0)))
            .collect();
        if let Some(extra) = extra {
            weights.insert(extra.to_string(), serde_json::json!(1.0));
        }
        serde_json::json!({ "version": "test-1", "bias": bias, "weights": weights }).to_string()
    }

    #[test]
    fn test_bias_only_model() {
        let model = LogisticModel::from_json(&artifact_json(0.0, None, None)).unwrap();
        let features = FeatureExtractor::default().extract_features("http://example.com");
        let prediction = model.predict(&features, DEFAULT_THRESHOLD);

        assert_eq!(model.version(), "test-1");
        assert!((prediction.probability - 0.5).abs() < 1e-12);
        assert!(prediction.is_phishing, "threshold is inclusive");
    }

    #[test]
    fn test_weights_apply_in_column_order() {
        let mut weights = [0.0; FEATURE_COUNT];
        weights[1] = 0.1; // url_len
        let model = LogisticModel::new("w", -1.8, weights);
        let features = FeatureExtractor::default().extract_features("http://example.com");

        // z = -1.8 + 0.1 * 18 = 0
        assert!((model.predict_proba(&features) - 0.5).abs() < 1e-9);
        assert!(!model.predict(&features, 0.6).is_phishing);
    }

    #[test]
    fn test_schema_skew_is_rejected() {
        let err = LogisticModel::from_json(&artifact_json(0.0, Some("path_entropy"), None)).unwrap_err();
        assert!(err.to_string().contains("path_entropy"));

        assert!(LogisticModel::from_json(&artifact_json(0.0, None, Some("page_rank"))).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let mut weights = [0.0; FEATURE_COUNT];
        weights[24] = 2.5;
        let model = LogisticModel::new("rt", 0.25, weights);
        let back = LogisticModel::from_json(&model.to_json().unwrap()).unwrap();
        assert_eq!(back, model);
    }
}
