//! `WineService`: the AMBIENT realisation of spec §6's external
//! interfaces as plain async functions rather than an HTTP transport —
//! the ingestion entry point, job-status query, movement entry point and
//! snapshot query, each callable directly in tests and from the thin CLI
//! in `main.rs`.

use std::sync::Arc;

use async_trait::async_trait;

use wine_alerts::AlertCenter;
use wine_db::DbPool;
use wine_ids::{CorrelationId, JobId};
use wine_protocol::Tenant;
use wine_store::{
    Job, JobManager, MovementEngine, MovementOutcome, MovementType, SetQuantityOutcome, Snapshot, TenantRegistry,
    TenantStore,
};

use crate::config::Config;
use crate::notify::AdminNotifier;
use crate::worker_pool::{IngestJob, IngestWorkerPool, WorkerContext};

/// Ingestion entry point + job-status query (spec §6).
#[async_trait]
pub trait IngestionApi {
    /// Enqueue a file for processing and return immediately with a job
    /// id (spec §4.G): idempotent on `(tenant, client_msg_id)`.
    async fn submit_ingestion(
        &self,
        tenant: &Tenant,
        file_name: &str,
        bytes: Vec<u8>,
        client_msg_id: Option<&str>,
    ) -> anyhow::Result<JobId>;

    async fn job_status(&self, job_id: &JobId) -> anyhow::Result<Job>;
}

/// Stock-movement entry point + inventory snapshot query (spec §6).
#[async_trait]
pub trait MovementApi {
    async fn apply_movement(
        &self,
        tenant: &Tenant,
        wine_lookup_term: &str,
        movement_type: MovementType,
        quantity: i64,
    ) -> anyhow::Result<MovementOutcome>;

    async fn snapshot(&self, tenant: &Tenant) -> anyhow::Result<Snapshot>;

    /// Administrative quantity override (spec §4.I "set field"): a no-op
    /// when `new_value` matches the current quantity, a movement otherwise.
    async fn set_quantity(&self, tenant: &Tenant, wine_id: &str, new_value: i64) -> anyhow::Result<SetQuantityOutcome>;
}

/// Wires every component crate together: job manager, per-tenant store,
/// movement engine, tenant registry, alert center, and the ingestion
/// worker pool. One instance is built at process start and shared
/// (behind an `Arc`) by the CLI commands and the scheduler.
pub struct WineService {
    pool: DbPool,
    job_manager: JobManager,
    tenant_store: TenantStore,
    movement_engine: MovementEngine,
    tenant_registry: TenantRegistry,
    alert_center: Arc<AlertCenter>,
    admin_notifier: Arc<dyn AdminNotifier>,
    ingest_pool: IngestWorkerPool,
}

impl WineService {
    /// Provision every shared table and spawn the ingestion worker pool.
    pub async fn bootstrap(
        pool: DbPool,
        config: &Config,
        admin_notifier: Arc<dyn AdminNotifier>,
        llm: Arc<dyn wine_ingest::LlmClient>,
        ocr: Arc<dyn wine_ingest::OcrClient>,
    ) -> anyhow::Result<Self> {
        let job_manager = JobManager::new(pool.clone());
        job_manager.ensure_schema().await?;

        let tenant_registry = TenantRegistry::new(pool.clone());
        tenant_registry.ensure_schema().await?;

        let tenant_store = TenantStore::new(pool.clone());
        let movement_engine = MovementEngine::new(pool.clone());
        let alert_center = Arc::new(AlertCenter::new(config.alert_thresholds(), Box::new(wine_alerts::LoggingAlertSink)));

        let worker_context = Arc::new(WorkerContext {
            job_manager: JobManager::new(pool.clone()),
            tenant_store: TenantStore::new(pool.clone()),
            alert_center: Arc::clone(&alert_center),
            admin_notifier: Arc::clone(&admin_notifier),
            llm,
            ocr,
            ingest_config: config.ingest_config(),
        });
        let ingest_pool = IngestWorkerPool::spawn(config.resolved_worker_count(), 256, worker_context);

        Ok(WineService {
            pool,
            job_manager,
            tenant_store,
            movement_engine,
            tenant_registry,
            alert_center,
            admin_notifier,
            ingest_pool,
        })
    }

    /// Mark a tenant as onboarded, making it eligible for the scheduler's
    /// daily report run (spec §4.K). Stands in for whatever onboarding
    /// conversation flow the out-of-scope messaging bot would drive.
    pub async fn complete_onboarding(&self, tenant: &Tenant) -> anyhow::Result<()> {
        self.tenant_registry.upsert_tenant(tenant).await?;
        self.tenant_registry.mark_onboarding_completed(tenant).await?;
        Ok(())
    }
}

#[async_trait]
impl IngestionApi for WineService {
    async fn submit_ingestion(
        &self,
        tenant: &Tenant,
        file_name: &str,
        bytes: Vec<u8>,
        client_msg_id: Option<&str>,
    ) -> anyhow::Result<JobId> {
        self.tenant_store.ensure_tables(tenant).await?;
        self.tenant_registry.upsert_tenant(tenant).await?;

        if let Some(client_msg_id) = client_msg_id {
            if let Some(existing) = self.job_manager.get_job_by_client_msg_id(tenant, client_msg_id).await? {
                return Ok(existing.job_id);
            }
        }

        let ext = file_name.rsplit('.').next().unwrap_or("").to_string();
        let job_id = self.job_manager.create_job(tenant, &ext, file_name, bytes.len() as i64, client_msg_id).await?;

        let correlation_id = CorrelationId::new();
        self.ingest_pool
            .submit(IngestJob { tenant: tenant.clone(), job_id: job_id.clone(), bytes, file_name: file_name.to_string(), correlation_id })
            .await?;

        Ok(job_id)
    }

    async fn job_status(&self, job_id: &JobId) -> anyhow::Result<Job> {
        Ok(self.job_manager.get_job(job_id).await?)
    }
}

#[async_trait]
impl MovementApi for WineService {
    async fn apply_movement(
        &self,
        tenant: &Tenant,
        wine_lookup_term: &str,
        movement_type: MovementType,
        quantity: i64,
    ) -> anyhow::Result<MovementOutcome> {
        self.tenant_store.ensure_tables(tenant).await?;
        Ok(self.movement_engine.apply_movement(tenant, wine_lookup_term, movement_type, quantity).await?)
    }

    async fn snapshot(&self, tenant: &Tenant) -> anyhow::Result<Snapshot> {
        self.tenant_store.ensure_tables(tenant).await?;
        Ok(self.tenant_store.snapshot(tenant).await?)
    }

    async fn set_quantity(&self, tenant: &Tenant, wine_id: &str, new_value: i64) -> anyhow::Result<SetQuantityOutcome> {
        self.tenant_store.ensure_tables(tenant).await?;
        Ok(self.movement_engine.set_quantity(tenant, wine_id, new_value).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{UnconfiguredLlmClient, UnconfiguredOcrClient};
    use crate::notify::RecordingAdminNotifier;
    use wine_db::DbConfig;

    async fn test_service() -> WineService {
        let pool = wine_db::create_pool(DbConfig::memory()).await.unwrap();
        WineService::bootstrap(
            pool,
            &Config::default(),
            Arc::new(RecordingAdminNotifier::new()),
            Arc::new(UnconfiguredLlmClient),
            Arc::new(UnconfiguredOcrClient),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn submit_ingestion_returns_a_job_id_immediately() {
        let service = test_service().await;
        let tenant = Tenant::new(1, "Trattoria");
        let job_id = service.submit_ingestion(&tenant, "list.csv", b"name\nBarolo".to_vec(), Some("msg-1")).await.unwrap();
        let job = service.job_status(&job_id).await.unwrap();
        assert_eq!(job.file_name, "list.csv");
    }

    #[tokio::test]
    async fn repeated_client_msg_id_returns_the_same_job() {
        let service = test_service().await;
        let tenant = Tenant::new(1, "Trattoria");
        let first = service.submit_ingestion(&tenant, "list.csv", b"name\nBarolo".to_vec(), Some("msg-dup")).await.unwrap();
        let second = service.submit_ingestion(&tenant, "list.csv", b"name\nBarolo".to_vec(), Some("msg-dup")).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn apply_movement_against_an_empty_inventory_reports_not_found() {
        let service = test_service().await;
        let tenant = Tenant::new(1, "Trattoria");
        let result = service.apply_movement(&tenant, "Barolo", MovementType::Consumo, 1).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn snapshot_of_a_fresh_tenant_is_empty() {
        let service = test_service().await;
        let tenant = Tenant::new(1, "Trattoria");
        let snapshot = service.snapshot(&tenant).await.unwrap();
        assert!(snapshot.wines.is_empty());
    }

    #[tokio::test]
    async fn set_quantity_against_unknown_wine_reports_not_found() {
        let service = test_service().await;
        let tenant = Tenant::new(1, "Trattoria");
        let result = service.set_quantity(&tenant, "not-a-real-wine-id", 5).await;
        assert!(result.is_err());
    }
}
