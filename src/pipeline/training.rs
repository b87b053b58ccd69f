use anyhow::Result;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::info;

use super::extraction::{extract_feature_table, FeatureExtractionArtifact};
use super::preparation::{prepare_dataset, DataPreparationArtifact};
use super::Pipeline;

const DATA_PREPARATION_DIR_NAME: &str = "data_preparation";
const DATA_PREPARATION_PROCESSED_DIR_NAME: &str = "processed";
const PROCESSED_DATA_FILE_NAME: &str = "processed_data.csv";
const FEATURE_EXTRACTION_DIR_NAME: &str = "feature_extraction";
const FEATURE_EXTRACTION_FEATURES_DIR_NAME: &str = "features";
const FEATURES_DATA_FILE_NAME: &str = "features_data.csv";

/// Artifact layout of one training-data run
///
/// Every run writes under its own `dd_mm_YYYY_HH_MM_SS` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingPipelineConfig {
    pub artifact_dir: PathBuf,
}

impl TrainingPipelineConfig {
    pub fn new(artifact_root: impl AsRef<Path>, timestamp: DateTime<Local>) -> Self {
        let run = timestamp.format("%d_%m_%Y_%H_%M_%S").to_string();
        Self {
            artifact_dir: artifact_root.as_ref().join(run),
        }
    }

    pub fn now(artifact_root: impl AsRef<Path>) -> Self {
        Self::new(artifact_root, Local::now())
    }

    pub fn processed_data_path(&self) -> PathBuf {
        self.artifact_dir
            .join(DATA_PREPARATION_DIR_NAME)
            .join(DATA_PREPARATION_PROCESSED_DIR_NAME)
            .join(PROCESSED_DATA_FILE_NAME)
    }

    pub fn features_data_path(&self) -> PathBuf {
        self.artifact_dir
            .join(FEATURE_EXTRACTION_DIR_NAME)
            .join(FEATURE_EXTRACTION_FEATURES_DIR_NAME)
            .join(FEATURES_DATA_FILE_NAME)
    }
}

#[derive(Debug, Clone)]
pub struct TrainingArtifacts {
    pub preparation: DataPreparationArtifact,
    pub extraction: FeatureExtractionArtifact,
}

impl Pipeline {
    /// Runs preparation then feature extraction into the artifact layout
    pub async fn run_training_data(
        &self,
        raw_data_path: &Path,
        config: &TrainingPipelineConfig,
    ) -> Result<TrainingArtifacts> {
        info!("Starting training data run in {}", config.artifact_dir.display());

        let preparation =
            prepare_dataset(self.resolver(), raw_data_path, &config.processed_data_path()).await?;
        let extraction = extract_feature_table(
            self.extractor.clone(),
            &preparation.processed_data_path,
            &config.features_data_path(),
        )
        .await?;

        info!(
            "Training data run complete: {} prepared rows, {} feature rows",
            preparation.rows_out, extraction.rows
        );
        Ok(TrainingArtifacts {
            preparation,
            extraction,
        })
    }
}
