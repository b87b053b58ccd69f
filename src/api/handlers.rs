use actix_web::{web, HttpResponse, Responder};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::api::models::{
    ErrorResponse, FeedbackRequest, HealthStatus, JobRequest, JobResponse, PipelineJob,
    PredictionRequest,
};
use crate::api::ApiState;
use crate::features::FEATURE_SCHEMA_VERSION;

const ENQUEUE_ATTEMPTS: u32 = 3;
const ENQUEUE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Scores a URL
#[instrument(skip(state), fields(url = %request.url))]
pub async fn predict_handler(
    request: web::Json<PredictionRequest>,
    state: web::Data<ApiState>,
) -> impl Responder {
    info!("Received prediction request");
    if request.url.trim().is_empty() {
        return HttpResponse::BadRequest().json(ErrorResponse::new("URL must not be empty"));
    }
    submit_job(JobRequest::Predict(request.into_inner()), &state).await
}

/// Stores a labelled URL for retraining
#[instrument(skip(state), fields(url = %request.url))]
pub async fn feedback_handler(
    request: web::Json<FeedbackRequest>,
    state: web::Data<ApiState>,
) -> impl Responder {
    info!("Received feedback: user label {}", request.user_label);
    if request.url.trim().is_empty() {
        return HttpResponse::BadRequest().json(ErrorResponse::new("URL must not be empty"));
    }
    if let Some(confidence) = request.confidence {
        if !(0.0..=1.0).contains(&confidence) {
            return HttpResponse::BadRequest()
                .json(ErrorResponse::new("confidence must be between 0 and 1"));
        }
    }
    submit_job(JobRequest::Feedback(request.into_inner()), &state).await
}

/// Enqueues a job, retrying briefly while the queue is full, and waits for it
async fn submit_job(request: JobRequest, state: &ApiState) -> HttpResponse {
    let mut request = request;
    let mut attempts = 0;
    let id = Uuid::new_v4();

    loop {
        let (response_tx, response_rx) = oneshot::channel();
        let job = PipelineJob { id, request, response_tx };

        match state.job_tx.try_send(job) {
            Ok(_) => {
                debug!("Job {} enqueued after {} attempt(s)", id, attempts + 1);
                return await_response(response_rx, state.request_timeout).await;
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                attempts += 1;
                if attempts >= ENQUEUE_ATTEMPTS {
                    warn!("Queue full after {} attempts, rejecting request", attempts);
                    return HttpResponse::TooManyRequests().json(ErrorResponse::new(format!(
                        "Server is busy, try again later. Queue has been full for {:?}",
                        ENQUEUE_RETRY_DELAY * attempts
                    )));
                }
                warn!("Queue full, retrying (attempt {}/{})", attempts, ENQUEUE_ATTEMPTS);
                request = job.request;
                sleep(ENQUEUE_RETRY_DELAY).await;
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!("Worker queue has been closed!");
                return HttpResponse::ServiceUnavailable()
                    .json(ErrorResponse::new("Service is shutting down or unavailable."));
            }
        }
    }
}

async fn await_response(
    response_rx: oneshot::Receiver<Result<JobResponse, String>>,
    request_timeout: Duration,
) -> HttpResponse {
    match timeout(request_timeout, response_rx).await {
        Ok(Ok(Ok(JobResponse::Prediction(response)))) => HttpResponse::Ok().json(response),
        Ok(Ok(Ok(JobResponse::Feedback(response)))) => HttpResponse::Ok().json(response),
        Ok(Ok(Err(e))) => {
            error!("Request failed: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::new(e))
        }
        Ok(Err(_)) => {
            error!("Worker channel closed unexpectedly");
            HttpResponse::InternalServerError().json(ErrorResponse::new("Worker dropped."))
        }
        Err(_) => {
            error!("Request timed out after {:?}", request_timeout);
            HttpResponse::RequestTimeout().json(ErrorResponse::new("Request timed out."))
        }
    }
}

/// Reports queue pressure and the loaded model
#[instrument(skip(state))]
pub async fn health_check(state: web::Data<ApiState>) -> impl Responder {
    let available = state.job_tx.capacity();
    let capacity = state.queue_capacity;

    let status = if available == 0 { "degraded" } else { "healthy" };
    debug!("Health check: status={}, queue {}/{} free", status, available, capacity);

    HttpResponse::Ok().json(HealthStatus {
        status: status.to_string(),
        queue_available: available,
        queue_capacity: capacity,
        model_version: state.model_version.clone(),
        feature_schema_version: FEATURE_SCHEMA_VERSION.to_string(),
    })
}
