//! HTTP surface
//!
//! - `POST /predict`  `{ "url": ... }` -> probability and label
//! - `POST /feedback` `{ "url", "model_prediction", "user_label", "confidence"? }`
//! - `GET /health`
//!
//! Handlers never run the pipeline themselves. Requests go onto a bounded
//! queue drained by worker tasks, so a slow shortener expansion never blocks
//! the server's own threads. A full queue answers 429 and a request that
//! outlives `request_timeout` answers 408.

pub mod handlers;
pub mod models;
pub mod processor;
pub mod workers;

use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::Settings;
use handlers::{feedback_handler, health_check, predict_handler};
use models::PipelineJob;
pub use processor::Services;
use workers::start_workers;

/// Shared handler state
#[derive(Clone)]
pub struct ApiState {
    pub job_tx: mpsc::Sender<PipelineJob>,
    pub request_timeout: Duration,
    pub queue_capacity: usize,
    pub model_version: String,
}

impl ApiState {
    /// Creates the job queue and spawns its workers on the current runtime
    pub fn start(
        services: Services,
        queue_size: usize,
        worker_count: usize,
        request_timeout: Duration,
    ) -> Self {
        let queue_size = queue_size.max(1);
        debug!("Creating job queue with capacity: {}", queue_size);
        let (job_tx, job_rx) = mpsc::channel::<PipelineJob>(queue_size);

        let model_version = services.model.version().to_string();
        start_workers(job_rx, services, worker_count);

        Self {
            job_tx,
            request_timeout,
            queue_capacity: queue_size,
            model_version,
        }
    }
}

/// Registers the routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/predict").route(web::post().to(predict_handler)))
        .service(web::resource("/feedback").route(web::post().to(feedback_handler)))
        .service(web::resource("/health").route(web::get().to(health_check)));
}

/// Starts the HTTP server and runs until it is shut down
pub async fn start_server(settings: &Settings) -> Result<()> {
    let server = &settings.server;
    info!("Starting phishing detection API on {}:{}", server.host, server.port);

    let services = Services::from_settings(settings).await?;
    let state = ApiState::start(
        services,
        server.queue_size,
        server.workers,
        server.request_timeout(),
    );
    let state_data = web::Data::new(state);

    HttpServer::new(move || {
        App::new()
            .app_data(state_data.clone())
            .configure(configure)
    })
    .bind((server.host.as_str(), server.port))
    .with_context(|| format!("Failed to bind {}:{}", server.host, server.port))?
    .run()
    .await
    .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{FeedbackResponse, HealthStatus, PredictionResponse};
    use crate::cache::MemoryUrlCache;
    use crate::feedback::{FeedbackStore, Label, SqliteFeedbackStore};
    use crate::features::{FeatureExtractor, FEATURE_COUNT};
    use crate::link_resolver::{LinkResolver, ResolverConfig};
    use crate::model::LogisticModel;
    use crate::pipeline::Pipeline;
    use crate::suffix::SuffixList;
    use actix_web::{http::StatusCode, test};
    use std::sync::Arc;

    async fn services(feedback: Arc<SqliteFeedbackStore>) -> Services {
        let resolver = LinkResolver::new(
            ResolverConfig::default(),
            Arc::new(MemoryUrlCache::new()),
            SuffixList::shared(),
        )
        .unwrap();
        Services {
            pipeline: Pipeline::new(resolver, FeatureExtractor::default()),
            model: Arc::new(LogisticModel::new("test-model", 0.0, [0.0; FEATURE_COUNT])),
            feedback,
            threshold: 0.5,
        }
    }

    #[actix_web::test]
    async fn test_predict_route() {
        let feedback = Arc::new(SqliteFeedbackStore::in_memory().await.unwrap());
        let state = ApiState::start(services(feedback).await, 4, 2, Duration::from_secs(5));
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(serde_json::json!({ "url": "example.com/" }))
            .to_request();
        let body: PredictionResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.canonical_url, "http://example.com");
        assert!((body.probability - 0.5).abs() < 1e-12);
        assert!(body.prediction);
        assert_eq!(body.label, Label::Phishing);
        assert_eq!(body.model_version, "test-model");
    }

    #[actix_web::test]
    async fn test_feedback_route_upserts() {
        let feedback = Arc::new(SqliteFeedbackStore::in_memory().await.unwrap());
        let state = ApiState::start(services(feedback.clone()).await, 4, 2, Duration::from_secs(5));
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure)).await;

        for label in ["phishing", "legitimate"] {
            let req = test::TestRequest::post()
                .uri("/feedback")
                .set_json(serde_json::json!({
                    "url": "http://login-paypa1.example.com/verify",
                    "model_prediction": "legitimate",
                    "user_label": label,
                    "confidence": 0.8
                }))
                .to_request();
            let body: FeedbackResponse = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body.status, "feedback stored");
        }

        assert_eq!(feedback.count().await.unwrap(), 1);
    }

    #[actix_web::test]
    async fn test_bad_requests() {
        let feedback = Arc::new(SqliteFeedbackStore::in_memory().await.unwrap());
        let state = ApiState::start(services(feedback).await, 4, 1, Duration::from_secs(5));
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(serde_json::json!({ "url": "   " }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/feedback")
            .set_json(serde_json::json!({
                "url": "http://example.com",
                "model_prediction": "maybe",
                "user_label": "phishing"
            }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_health_route() {
        let feedback = Arc::new(SqliteFeedbackStore::in_memory().await.unwrap());
        let state = ApiState::start(services(feedback).await, 8, 1, Duration::from_secs(5));
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure)).await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: HealthStatus = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.status, "healthy");
        assert_eq!(body.queue_capacity, 8);
        assert_eq!(body.model_version, "test-model");
    }
}
