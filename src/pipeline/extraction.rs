use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::preparation::{read_prepared_records, PreparedRecord};
use crate::features::{FeatureExtractor, FEATURE_NAMES, LABEL_COLUMN};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureExtractionArtifact {
    pub features_data_path: PathBuf,
    pub rows: usize,
}

/// Feature rows (feature values then label) with duplicate rows removed
pub fn feature_rows(extractor: &FeatureExtractor, records: &[PreparedRecord]) -> Vec<Vec<String>> {
    let mut seen = HashSet::new();
    let mut rows = Vec::with_capacity(records.len());

    for record in records {
        let mut row = extractor.extract_features(&record.processed_url).to_record();
        row.push(record.label.to_string());
        if seen.insert(row.clone()) {
            rows.push(row);
        } else {
            debug!("Dropping duplicate feature row for {}", record.processed_url);
        }
    }
    rows
}

pub fn write_feature_rows(path: &Path, rows: &[Vec<String>]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut header: Vec<&str> = FEATURE_NAMES.to_vec();
    header.push(LABEL_COLUMN);
    writer.write_record(&header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Builds the feature table for a prepared dataset
///
/// Extraction is CPU-bound, so it runs on the blocking thread pool.
pub async fn extract_feature_table(
    extractor: Arc<FeatureExtractor>,
    prepared_path: &Path,
    output_path: &Path,
) -> Result<FeatureExtractionArtifact> {
    info!("Initiating feature extraction from {}", prepared_path.display());
    let records = read_prepared_records(prepared_path)?;

    let rows = tokio::task::spawn_blocking(move || feature_rows(&extractor, &records))
        .await
        .context("Feature extraction task panicked")?;

    write_feature_rows(output_path, &rows)?;
    info!("Saved {} feature rows to {}", rows.len(), output_path.display());

    Ok(FeatureExtractionArtifact {
        features_data_path: output_path.to_path_buf(),
        rows: rows.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared(url: &str, label: u8) -> PreparedRecord {
        PreparedRecord {
            url: url.to_string(),
            processed_url: url.to_string(),
            label,
        }
    }

    #[test]
    fn test_duplicate_rows_are_dropped() {
        let extractor = FeatureExtractor::default();
        let records = vec![
            prepared("http://example.com", 0),
            prepared("http://example.com", 0),
            prepared("http://example.com", 1),
            prepared("https://a-1.co/x_y?q=1", 1),
        ];

        let rows = feature_rows(&extractor, &records);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.len() == FEATURE_NAMES.len() + 1));
        assert_eq!(rows[0].last().map(String::as_str), Some("0"));
        assert_eq!(rows[1].last().map(String::as_str), Some("1"));
    }

    #[tokio::test]
    async fn test_feature_table_header() {
        let dir = tempfile::tempdir().unwrap();
        let prepared_path = dir.path().join("processed_data.csv");
        std::fs::write(
            &prepared_path,
            "url,processed_url,label\nhttp://example.com,http://example.com,0\n",
        )
        .unwrap();
        let output = dir.path().join("features").join("features_data.csv");

        let artifact = extract_feature_table(Arc::new(FeatureExtractor::default()), &prepared_path, &output)
            .await
            .unwrap();
        assert_eq!(artifact.rows, 1);

        let text = std::fs::read_to_string(&output).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), format!("{},label", FEATURE_NAMES.join(",")));
        assert!(lines.next().unwrap().starts_with("0,18,11,0,0,0,0,3,7,0,0,1,"));
    }
}
