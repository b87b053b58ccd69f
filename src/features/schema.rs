use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use super::{FeatureValue, FeatureVector, FEATURE_SCHEMA_VERSION};

pub const LABEL_COLUMN: &str = "label";

/// Expected column of a feature table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub dtype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<i64>>,
}

/// Declarative description of the feature table, consumed by validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: String,
    pub columns: Vec<ColumnSpec>,
}

impl FeatureSchema {
    /// Schema of the current extractor, label column last
    pub fn current() -> Self {
        let mut columns: Vec<ColumnSpec> = FeatureVector::default()
            .named_values()
            .iter()
            .map(|(name, value)| ColumnSpec {
                name: name.to_string(),
                dtype: match value {
                    FeatureValue::Count(_) => "int64",
                    FeatureValue::Ratio(_) => "float64",
                }
                .to_string(),
                allowed_values: None,
            })
            .collect();

        columns.push(ColumnSpec {
            name: LABEL_COLUMN.to_string(),
            dtype: "int64".to_string(),
            allowed_values: Some(vec![0, 1]),
        });

        Self {
            version: FEATURE_SCHEMA_VERSION.to_string(),
            columns,
        }
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize feature schema")
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write schema to {}", path.display()))?;
        info!("Feature schema {} written to {}", self.version, path.display());
        Ok(())
    }
}
