//! In-process ingestion worker pool (spec §5 AMBIENT), playing the role
//! `casparian_worker::Worker` plays for the teacher's external Python
//! plugin processes, but in-process: a bounded pool of `tokio` tasks
//! reading `IngestJob`s from an `mpsc` channel instead of dispatching
//! over ZeroMQ to a separate OS process.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use wine_alerts::AlertCenter;
use wine_ids::{CorrelationId, JobId};
use wine_ingest::{process_file, Config as IngestConfig, LlmClient, OcrClient};
use wine_protocol::Tenant;
use wine_store::{JobManager, JobStatus, JobUpdate, TenantStore};

use crate::notify::{notify_best_effort, AdminNotification, AdminNotifier};

/// One unit of ingestion work, handed off by the entry point (spec §6
/// ingestion entry point) to whichever worker dequeues it next.
pub struct IngestJob {
    pub tenant: Tenant,
    pub job_id: JobId,
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub correlation_id: CorrelationId,
}

/// Shared dependencies every worker needs to run a job to completion.
pub struct WorkerContext {
    pub job_manager: JobManager,
    pub tenant_store: TenantStore,
    pub alert_center: Arc<AlertCenter>,
    pub admin_notifier: Arc<dyn AdminNotifier>,
    pub llm: Arc<dyn LlmClient>,
    pub ocr: Arc<dyn OcrClient>,
    pub ingest_config: IngestConfig,
}

/// Handle to the running pool: holds the sending half of the job queue.
/// Dropping every clone of this closes the channel, letting the worker
/// tasks drain and exit.
#[derive(Clone)]
pub struct IngestWorkerPool {
    sender: mpsc::Sender<IngestJob>,
}

impl IngestWorkerPool {
    /// Spawn `worker_count` tasks sharing one `mpsc` receiver, each
    /// processing jobs to completion before pulling the next one —
    /// exactly the one-job-per-worker-at-a-time model `WorkerArgs`'s
    /// `--worker-id` concept describes, minus the external-process
    /// connect/abort bookkeeping that ZeroMQ dispatch required.
    pub fn spawn(worker_count: usize, queue_capacity: usize, context: Arc<WorkerContext>) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        for worker_id in 0..worker_count.max(1) {
            let receiver = Arc::clone(&receiver);
            let context = Arc::clone(&context);
            tokio::spawn(async move {
                info!(worker_id, "ingestion worker started");
                loop {
                    let job = {
                        let mut receiver = receiver.lock().await;
                        receiver.recv().await
                    };
                    let Some(job) = job else {
                        info!(worker_id, "ingestion worker shutting down: queue closed");
                        break;
                    };
                    run_job(&context, job).await;
                }
            });
        }

        IngestWorkerPool { sender }
    }

    pub async fn submit(&self, job: IngestJob) -> anyhow::Result<()> {
        self.sender.send(job).await.map_err(|_| anyhow::anyhow!("ingestion worker pool is shut down"))
    }
}

/// Run one job through the pipeline and persist its outcome, mirroring
/// `ingest/pipeline.py::process_file`'s caller: mark `processing`, run
/// the orchestrator, then mark `completed`/`error` with the resulting
/// counts (spec §4.G).
async fn run_job(context: &WorkerContext, job: IngestJob) {
    let IngestJob { tenant, job_id, bytes, file_name, correlation_id } = job;

    if let Err(e) = context
        .job_manager
        .update_job_status(&job_id, JobStatus::Processing, JobUpdate::default())
        .await
    {
        error!(job_id = %job_id, error = %e, "failed to mark job processing");
        return;
    }

    let outcome = process_file(
        &bytes,
        &file_name,
        &tenant,
        &correlation_id,
        &context.ingest_config,
        context.llm.as_ref(),
        context.ocr.as_ref(),
    )
    .await;

    match outcome {
        Ok(outcome) => {
            let total = outcome.wines.len() as i64;
            let (saved, errors) = match context
                .tenant_store
                .batch_insert_wines(&tenant, outcome.wines, context.ingest_config.db_insert_batch_size)
                .await
            {
                Ok(counts) => counts,
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "failed to persist extracted wines");
                    (0, total)
                }
            };

            let update = JobUpdate {
                total_wines: Some(total),
                processed_wines: Some(total),
                saved_wines: Some(saved),
                error_count: Some(errors),
                stage_used: Some(format!("{:?}", outcome.final_method)),
                ..Default::default()
            };
            let _ = context.job_manager.update_job_status(&job_id, JobStatus::Completed, update).await;
        }
        Err(e) => {
            warn!(job_id = %job_id, correlation_id = %correlation_id, error = %e, "ingestion failed");
            let correlation_str = correlation_id.to_string();
            let event = context.alert_center.record_error(chrono::Utc::now(), Some(&correlation_str));
            if let Some(event) = event {
                notify_best_effort(
                    context.admin_notifier.as_ref(),
                    AdminNotification::new("alert", event.message).with_correlation_id(correlation_id.to_string()),
                )
                .await;
            }
            let update = JobUpdate { error_message: Some(e.to_string()), ..Default::default() };
            let _ = context.job_manager.update_job_status(&job_id, JobStatus::Error, update).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wine_alerts::{AlertThresholds, LoggingAlertSink};
    use wine_db::DbConfig;

    async fn test_context() -> Arc<WorkerContext> {
        let pool = wine_db::create_pool(DbConfig::memory()).await.unwrap();
        let job_manager = JobManager::new(pool.clone());
        job_manager.ensure_schema().await.unwrap();
        let tenant_store = TenantStore::new(pool);

        Arc::new(WorkerContext {
            job_manager,
            tenant_store,
            alert_center: Arc::new(AlertCenter::new(AlertThresholds::default(), Box::new(LoggingAlertSink))),
            admin_notifier: Arc::new(crate::notify::RecordingAdminNotifier::new()),
            llm: Arc::new(crate::clients::UnconfiguredLlmClient),
            ocr: Arc::new(crate::clients::UnconfiguredOcrClient),
            ingest_config: IngestConfig::default(),
        })
    }

    #[tokio::test]
    async fn unsupported_extension_marks_job_errored() {
        let context = test_context().await;
        let tenant = Tenant::new(1, "Trattoria");
        let job_id = context.job_manager.create_job(&tenant, "bin", "list.bin", 10, None).await.unwrap();

        let job = IngestJob {
            tenant,
            job_id: job_id.clone(),
            bytes: b"whatever".to_vec(),
            file_name: "list.bin".to_string(),
            correlation_id: CorrelationId::new(),
        };
        run_job(&context, job).await;

        let stored = context.job_manager.get_job(&job_id).await.unwrap();
        assert_eq!(stored.status, wine_store::JobStatus::Error);
    }

    #[tokio::test]
    async fn pool_processes_submitted_jobs() {
        let context = test_context().await;
        let tenant = Tenant::new(1, "Trattoria");
        let job_id = context.job_manager.create_job(&tenant, "bin", "list.bin", 10, None).await.unwrap();
        let pool = IngestWorkerPool::spawn(2, 8, context.clone());

        pool.submit(IngestJob {
            tenant,
            job_id: job_id.clone(),
            bytes: b"whatever".to_vec(),
            file_name: "list.bin".to_string(),
            correlation_id: CorrelationId::new(),
        })
        .await
        .unwrap();

        for _ in 0..50 {
            let job = context.job_manager.get_job(&job_id).await.unwrap();
            if job.status.is_terminal() {
                assert_eq!(job.status, wine_store::JobStatus::Error);
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("job never reached a terminal state");
    }
}
