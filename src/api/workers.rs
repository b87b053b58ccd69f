use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, trace, warn};

use crate::api::models::PipelineJob;
use crate::api::processor::{process_request, Services};

/// Starts worker tasks that drain the job queue
///
/// All workers share one receiver; each job is answered on its own
/// oneshot channel. Workers exit when every sender has been dropped.
pub fn start_workers(job_rx: mpsc::Receiver<PipelineJob>, services: Services, worker_count: usize) {
    // Wrap the job receiver in a mutex so multiple workers can access it
    let job_rx = Arc::new(Mutex::new(job_rx));

    info!("Spawning {} worker tasks", worker_count);
    for worker_id in 0..worker_count.max(1) {
        let services = services.clone();
        let job_rx = job_rx.clone();

        tokio::spawn(async move {
            debug!("Worker {} started", worker_id);
            loop {
                trace!("Worker {} waiting for job", worker_id);
                let job_opt = { job_rx.lock().await.recv().await };

                match job_opt {
                    Some(job) => {
                        debug!("Worker {} processing job {} for URL: {}", worker_id, job.id, job.request.url());
                        let result = process_request(job.request, &services).await;

                        match &result {
                            Ok(_) => debug!("Worker {} completed job {}", worker_id, job.id),
                            Err(e) => warn!("Worker {} job {} failed: {:#}", worker_id, job.id, e),
                        }

                        if job.response_tx.send(result.map_err(|e| format!("{:#}", e))).is_err() {
                            warn!("Worker {} failed to send response - receiver dropped", worker_id);
                        }
                    }
                    None => {
                        info!("Worker {} shutting down - channel closed", worker_id);
                        break;
                    }
                }
            }
        });
    }
}
