use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::feedback::Label;

/// Request to score a URL
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PredictionRequest {
    pub url: String,
}

/// Score for one URL
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PredictionResponse {
    /// URL as submitted
    pub url: String,

    /// URL the features were computed from
    pub canonical_url: String,

    /// Probability that the URL is phishing
    pub probability: f64,

    /// True when the probability reaches the configured threshold
    pub prediction: bool,

    pub label: Label,

    pub model_version: String,
}

/// Human verdict on a previously scored URL
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FeedbackRequest {
    pub url: String,
    pub model_prediction: Label,
    pub user_label: Label,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FeedbackResponse {
    pub status: String,
    pub feature_hash: String,
    pub canonical_url: String,
}

/// Work item handed to the worker pool
#[derive(Debug)]
pub enum JobRequest {
    Predict(PredictionRequest),
    Feedback(FeedbackRequest),
}

impl JobRequest {
    pub fn url(&self) -> &str {
        match self {
            JobRequest::Predict(request) => &request.url,
            JobRequest::Feedback(request) => &request.url,
        }
    }
}

#[derive(Debug)]
pub enum JobResponse {
    Prediction(PredictionResponse),
    Feedback(FeedbackResponse),
}

/// Internal job structure for queued requests
#[derive(Debug)]
pub struct PipelineJob {
    /// Correlates handler and worker log lines
    pub id: Uuid,

    pub request: JobRequest,

    /// Sender for the response channel
    pub response_tx: oneshot::Sender<Result<JobResponse, String>>,
}

/// Health status response for the /health endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Status indicator: healthy or degraded
    pub status: String,

    /// Free slots in the job queue
    pub queue_available: usize,

    /// Total capacity of the job queue
    pub queue_capacity: usize,

    pub model_version: String,

    pub feature_schema_version: String,
}

/// Error response for API endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Status indicator: error
    pub status: String,

    /// Error message details
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}
