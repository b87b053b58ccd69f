use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::api::models::{
    FeedbackRequest, FeedbackResponse, JobRequest, JobResponse, PredictionRequest,
    PredictionResponse,
};
use crate::config::Settings;
use crate::feedback::{submit_feedback, FeedbackStore, Label, SqliteFeedbackStore};
use crate::model::{Classifier, LogisticModel};
use crate::pipeline::Pipeline;

/// Everything a worker needs to answer a request
#[derive(Clone)]
pub struct Services {
    pub pipeline: Pipeline,
    pub model: Arc<dyn Classifier>,
    pub feedback: Arc<dyn FeedbackStore>,
    pub threshold: f64,
}

impl Services {
    /// Opens the stores and loads the model named in `settings`
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let pipeline = Pipeline::from_settings(settings).await?;
        let model = LogisticModel::load(&settings.model.path)?;
        let feedback = SqliteFeedbackStore::open(&settings.storage.feedback_db_path)
            .await
            .context("Failed to open feedback store")?;

        Ok(Self {
            pipeline,
            model: Arc::new(model),
            feedback: Arc::new(feedback),
            threshold: settings.model.threshold,
        })
    }
}

/// Runs one queued request through the pipeline
#[instrument(skip(services), fields(url = %request.url()))]
pub async fn process_request(request: JobRequest, services: &Services) -> Result<JobResponse> {
    match request {
        JobRequest::Predict(request) => predict(request, services).await.map(JobResponse::Prediction),
        JobRequest::Feedback(request) => record(request, services).await.map(JobResponse::Feedback),
    }
}

async fn predict(request: PredictionRequest, services: &Services) -> Result<PredictionResponse> {
    let (canonical_url, features) = services.pipeline.featurize(&request.url).await?;
    debug!("Features for {}: {:?}", canonical_url, features);

    let prediction = services.model.predict(&features, services.threshold);
    info!(
        "Scored {} as {:.4} (phishing: {})",
        canonical_url, prediction.probability, prediction.is_phishing
    );

    Ok(PredictionResponse {
        url: request.url,
        canonical_url,
        probability: prediction.probability,
        prediction: prediction.is_phishing,
        label: Label::from_prediction(prediction.is_phishing),
        model_version: services.model.version().to_string(),
    })
}

async fn record(request: FeedbackRequest, services: &Services) -> Result<FeedbackResponse> {
    let record = submit_feedback(
        &services.pipeline,
        services.feedback.as_ref(),
        &request.url,
        request.user_label,
        request.model_prediction,
        request.confidence,
    )
    .await?;

    Ok(FeedbackResponse {
        status: "feedback stored".to_string(),
        feature_hash: record.feature_hash,
        canonical_url: record.canonical_url,
    })
}
