//! Dataset preparation: raw `url,label` rows to canonical, labelled rows

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use crate::link_resolver::LinkResolver;
use crate::url_cleaner::{canonicalize, clean_url, is_structurally_valid};

/// Label value that encodes to 1; every other label encodes to 0
pub const PHISHING_LABEL: &str = "phishing";

/// One row of the raw dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub url: String,
    pub label: String,
}

/// One row of the prepared dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedRecord {
    pub url: String,           // cleaned input URL
    pub processed_url: String, // cleaned URL after expansion
    pub label: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPreparationArtifact {
    pub processed_data_path: PathBuf,
    pub rows_in: usize,
    pub rows_out: usize,
}

pub fn encode_label(label: &str) -> u8 {
    (label == PHISHING_LABEL) as u8
}

/// Canonicalizes, expands and filters a batch of raw rows
///
/// Shortened URLs are expanded once per distinct URL. Rows whose raw URL is
/// blank or whose processed URL is structurally invalid are dropped, and only the first row
/// of each processed URL is kept.
#[instrument(level = "info", skip_all, fields(rows = records.len()))]
pub async fn prepare_records(
    resolver: &LinkResolver,
    records: Vec<RawRecord>,
) -> Result<Vec<PreparedRecord>> {
    let rows_in = records.len();
    // a blank URL would otherwise canonicalize to the bare "http:"
    let cleaned: Vec<(String, String)> = records
        .into_iter()
        .filter(|record| !clean_url(&record.url).is_empty())
        .map(|record| (canonicalize(&record.url), record.label))
        .collect();
    if cleaned.len() < rows_in {
        debug!("Dropped {} rows with a blank URL", rows_in - cleaned.len());
    }
    info!("Cleaned {} URLs", cleaned.len());

    let expansions = resolver
        .resolve_batch(cleaned.iter().map(|(url, _)| url.as_str()))
        .await?;
    info!("Expanded {} shortened URLs", expansions.len());

    let mut seen = HashSet::new();
    let mut prepared = Vec::new();
    for (url, label) in cleaned {
        let expanded = expansions.get(&url).map(String::as_str).unwrap_or(url.as_str());
        let processed_url = clean_url(expanded);

        if !is_structurally_valid(&processed_url) {
            continue;
        }
        if !seen.insert(processed_url.clone()) {
            continue;
        }

        prepared.push(PreparedRecord {
            label: encode_label(&label),
            url,
            processed_url,
        });
    }

    info!("Prepared {} records", prepared.len());
    Ok(prepared)
}

pub fn read_raw_records(path: &Path) -> Result<Vec<RawRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open raw dataset {}", path.display()))?;

    reader
        .deserialize()
        .collect::<std::result::Result<Vec<RawRecord>, _>>()
        .with_context(|| format!("Failed to read raw dataset {}", path.display()))
}

pub fn write_prepared_records(path: &Path, records: &[PreparedRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    if records.is_empty() {
        writer.write_record(["url", "processed_url", "label"])?;
    }
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_prepared_records(path: &Path) -> Result<Vec<PreparedRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open prepared dataset {}", path.display()))?;

    reader
        .deserialize()
        .collect::<std::result::Result<Vec<PreparedRecord>, _>>()
        .with_context(|| format!("Failed to read prepared dataset {}", path.display()))
}

/// Reads `raw_path`, prepares it and writes the result to `output_path`
pub async fn prepare_dataset(
    resolver: &LinkResolver,
    raw_path: &Path,
    output_path: &Path,
) -> Result<DataPreparationArtifact> {
    info!("Initiating data preparation from {}", raw_path.display());
    let raw = read_raw_records(raw_path)?;
    let rows_in = raw.len();

    let prepared = prepare_records(resolver, raw).await?;
    write_prepared_records(output_path, &prepared)?;
    info!(
        "Saved {} of {} rows to {}",
        prepared.len(),
        rows_in,
        output_path.display()
    );

    Ok(DataPreparationArtifact {
        processed_data_path: output_path.to_path_buf(),
        rows_in,
        rows_out: prepared.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryUrlCache, UrlCache};
    use crate::link_resolver::ResolverConfig;
    use crate::suffix::SuffixList;
    use std::sync::Arc;

    fn raw(url: &str, label: &str) -> RawRecord {
        RawRecord {
            url: url.to_string(),
            label: label.to_string(),
        }
    }

    async fn resolver_with_cache(entries: &[(&str, &str)]) -> LinkResolver {
        let cache = Arc::new(MemoryUrlCache::new());
        for (short, long) in entries {
            cache.cache_url(short, long).await.unwrap();
        }
        LinkResolver::new(ResolverConfig::default(), cache, SuffixList::shared()).unwrap()
    }

    #[test]
    fn test_encode_label() {
        assert_eq!(encode_label("phishing"), 1);
        assert_eq!(encode_label("legitimate"), 0);
        assert_eq!(encode_label("Phishing"), 0);
        assert_eq!(encode_label(""), 0);
    }

    #[tokio::test]
    async fn test_prepare_expands_dedupes_and_encodes() {
        let resolver = resolver_with_cache(&[("http://bit.ly/x", "https://evil.example.com/login/")]).await;
        let records = vec![
            raw("example.com/", "legitimate"),
            raw("http://example.com", "phishing"),
            raw("bit.ly/x", "phishing"),
            raw("https://evil.example.com/login", "legitimate"),
        ];

        let prepared = prepare_records(&resolver, records).await.unwrap();
        assert_eq!(
            prepared,
            vec![
                PreparedRecord {
                    url: "http://example.com".to_string(),
                    processed_url: "http://example.com".to_string(),
                    label: 0,
                },
                PreparedRecord {
                    url: "http://bit.ly/x".to_string(),
                    processed_url: "https://evil.example.com/login".to_string(),
                    label: 1,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_prepare_drops_blank_urls() {
        let resolver = resolver_with_cache(&[]).await;
        let records = vec![
            raw("", "phishing"),
            raw("   ", "legitimate"),
            raw("\u{200B}\t", "phishing"),
            raw("paypa1.co", "phishing"),
        ];

        let prepared = prepare_records(&resolver, records).await.unwrap();
        assert_eq!(prepared.len(), 1);
        assert_eq!(prepared[0].processed_url, "http://paypa1.co");
        assert!(prepared.iter().all(|record| record.processed_url != "http:"));
    }

    #[tokio::test]
    async fn test_prepare_dataset_round_trips_through_csv() {
        let dir = tempfile::tempdir().unwrap();
        let raw_path = dir.path().join("raw_data.csv");
        std::fs::write(&raw_path, "url,label\nexample.com,legitimate\nhttps://paypa1.co/x,phishing\n").unwrap();
        let output = dir.path().join("processed").join("processed_data.csv");

        let resolver = resolver_with_cache(&[]).await;
        let artifact = prepare_dataset(&resolver, &raw_path, &output).await.unwrap();
        assert_eq!(artifact.rows_in, 2);
        assert_eq!(artifact.rows_out, 2);

        let text = std::fs::read_to_string(&output).unwrap();
        assert_eq!(text.lines().next(), Some("url,processed_url,label"));

        let back = read_prepared_records(&output).unwrap();
        assert_eq!(back[1].processed_url, "https://paypa1.co/x");
        assert_eq!(back[1].label, 1);
    }
}
