//! Job lifecycle and idempotency (spec §4.G), grounded in
//! `core/job_manager.py` and `db/queue.rs`'s transactional-claim idiom.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;

use wine_db::DbPool;
use wine_ids::JobId;
use wine_protocol::Tenant;

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    /// Invariant I6: terminal states are final.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    fn as_db_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    fn from_db_str(s: &str) -> Self {
        match s {
            "processing" => JobStatus::Processing,
            "completed" => JobStatus::Completed,
            "error" => JobStatus::Error,
            _ => JobStatus::Pending,
        }
    }
}

/// A processing job (spec §3 "Processing job").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub tenant_user_id: i64,
    pub tenant_business_name: String,
    pub status: JobStatus,
    pub file_type: String,
    pub file_name: String,
    pub file_size: i64,
    pub total_wines: i64,
    pub processed_wines: i64,
    pub saved_wines: i64,
    pub error_count: i64,
    pub result_data: Option<String>,
    pub error_message: Option<String>,
    pub client_msg_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub processing_method: Option<String>,
    pub stage_used: Option<String>,
}

impl Job {
    pub fn tenant(&self) -> Tenant {
        Tenant::new(self.tenant_user_id, self.tenant_business_name.clone())
    }

    /// `progress_percent = 100 × processed_wines / total_wines` (0 when `total_wines=0`).
    pub fn progress_percent(&self) -> f64 {
        if self.total_wines == 0 {
            0.0
        } else {
            100.0 * self.processed_wines as f64 / self.total_wines as f64
        }
    }

    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        let job_id_raw: String = row.try_get("job_id")?;
        let job_id = JobId::parse(&job_id_raw)
            .map_err(|e| sqlx::Error::Decode(Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))))?;
        Ok(Job {
            job_id,
            tenant_user_id: row.try_get("tenant_user_id")?,
            tenant_business_name: row.try_get("tenant_business_name")?,
            status: JobStatus::from_db_str(row.try_get::<String, _>("status")?.as_str()),
            file_type: row.try_get("file_type")?,
            file_name: row.try_get("file_name")?,
            file_size: row.try_get("file_size")?,
            total_wines: row.try_get("total_wines")?,
            processed_wines: row.try_get("processed_wines")?,
            saved_wines: row.try_get("saved_wines")?,
            error_count: row.try_get("error_count")?,
            result_data: row.try_get("result_data")?,
            error_message: row.try_get("error_message")?,
            client_msg_id: row.try_get("client_msg_id")?,
            created_at: row.try_get("created_at")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            processing_method: row.try_get("processing_method")?,
            stage_used: row.try_get("stage_used")?,
        })
    }
}

/// Fields an orchestrator may update as a job progresses. Absent fields are
/// left unchanged; `status` always moves the job forward.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub total_wines: Option<i64>,
    pub processed_wines: Option<i64>,
    pub saved_wines: Option<i64>,
    pub error_count: Option<i64>,
    pub result_data: Option<String>,
    pub error_message: Option<String>,
    pub processing_method: Option<String>,
    pub stage_used: Option<String>,
}

pub struct JobManager {
    pool: DbPool,
}

impl JobManager {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Idempotent DDL: the unique partial index enforces I7 at the database
    /// level, mirroring `core/database.py::create_tables`'s auto-migration.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                job_id TEXT PRIMARY KEY,
                tenant_user_id INTEGER NOT NULL,
                tenant_business_name TEXT NOT NULL,
                status TEXT NOT NULL,
                file_type TEXT NOT NULL,
                file_name TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                total_wines INTEGER NOT NULL DEFAULT 0,
                processed_wines INTEGER NOT NULL DEFAULT 0,
                saved_wines INTEGER NOT NULL DEFAULT 0,
                error_count INTEGER NOT NULL DEFAULT 0,
                result_data TEXT,
                error_message TEXT,
                client_msg_id TEXT,
                created_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                processing_method TEXT,
                stage_used TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Excludes `error` rows: `get_job_by_client_msg_id` treats a prior
        // error as not-cached and falls through to `create_job`, so a retry
        // after a failed job must be able to insert a fresh row under the
        // same (tenant, client_msg_id) (I7 / scenario S6).
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS jobs_tenant_client_msg_id
            ON jobs (tenant_user_id, tenant_business_name, client_msg_id)
            WHERE client_msg_id IS NOT NULL AND status != 'error'
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn create_job(
        &self,
        tenant: &Tenant,
        file_type: &str,
        file_name: &str,
        file_size: i64,
        client_msg_id: Option<&str>,
    ) -> Result<JobId> {
        let job_id = JobId::new();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO jobs (job_id, tenant_user_id, tenant_business_name, status,
                               file_type, file_name, file_size, created_at, client_msg_id)
            VALUES (?, ?, ?, 'pending', ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job_id.as_str())
        .bind(tenant.user_id)
        .bind(&tenant.business_name)
        .bind(file_type)
        .bind(file_name)
        .bind(file_size)
        .bind(now)
        .bind(client_msg_id)
        .execute(&self.pool)
        .await?;

        Ok(job_id)
    }

    pub async fn get_job(&self, job_id: &JobId) -> Result<Job> {
        let row = sqlx::query("SELECT * FROM jobs WHERE job_id = ?")
            .bind(job_id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))?;
        Ok(Job::from_row(&row)?)
    }

    /// Idempotency probe (spec §4.G): a `completed` or `processing` job is
    /// returned as-is for the caller to treat as cached; an `error` job is
    /// not returned at all, so the caller falls through to `create_job`.
    pub async fn get_job_by_client_msg_id(&self, tenant: &Tenant, client_msg_id: &str) -> Result<Option<Job>> {
        let row = sqlx::query(
            "SELECT * FROM jobs WHERE tenant_user_id = ? AND tenant_business_name = ? AND client_msg_id = ?",
        )
        .bind(tenant.user_id)
        .bind(&tenant.business_name)
        .bind(client_msg_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let job = Job::from_row(&row)?;
                if job.status == JobStatus::Error {
                    Ok(None)
                } else {
                    Ok(Some(job))
                }
            }
            None => Ok(None),
        }
    }

    /// Transition a job's status, enforcing I6 (no transition out of a
    /// terminal state) and setting `started_at`/`completed_at` on first
    /// entry, exactly as `job_manager.py::update_job_status` does.
    pub async fn update_job_status(&self, job_id: &JobId, status: JobStatus, update: JobUpdate) -> Result<()> {
        let current = self.get_job(job_id).await?;
        if current.status.is_terminal() {
            return Err(StoreError::TerminalJobTransition);
        }

        let now = Utc::now();
        let started_at = if status == JobStatus::Processing && current.started_at.is_none() {
            Some(now)
        } else {
            current.started_at
        };
        let completed_at = if status.is_terminal() { Some(now) } else { current.completed_at };

        sqlx::query(
            r#"
            UPDATE jobs SET
                status = ?,
                total_wines = COALESCE(?, total_wines),
                processed_wines = COALESCE(?, processed_wines),
                saved_wines = COALESCE(?, saved_wines),
                error_count = COALESCE(?, error_count),
                result_data = COALESCE(?, result_data),
                error_message = COALESCE(?, error_message),
                processing_method = COALESCE(?, processing_method),
                stage_used = COALESCE(?, stage_used),
                started_at = ?,
                completed_at = ?
            WHERE job_id = ?
            "#,
        )
        .bind(status.as_db_str())
        .bind(update.total_wines)
        .bind(update.processed_wines)
        .bind(update.saved_wines)
        .bind(update.error_count)
        .bind(update.result_data)
        .bind(update.error_message)
        .bind(update.processing_method)
        .bind(update.stage_used)
        .bind(started_at)
        .bind(completed_at)
        .bind(job_id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wine_db::DbConfig;

    async fn setup() -> JobManager {
        let pool = wine_db::create_pool(DbConfig::memory()).await.unwrap();
        let manager = JobManager::new(pool);
        manager.ensure_schema().await.unwrap();
        manager
    }

    #[tokio::test]
    async fn create_and_fetch_job() {
        let manager = setup().await;
        let tenant = Tenant::new(1, "Trattoria");
        let job_id = manager.create_job(&tenant, "csv", "list.csv", 1024, Some("msg-1")).await.unwrap();
        let job = manager.get_job(&job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.client_msg_id.as_deref(), Some("msg-1"));
    }

    #[tokio::test]
    async fn idempotency_probe_skips_error_jobs() {
        let manager = setup().await;
        let tenant = Tenant::new(1, "Trattoria");
        let job_id = manager.create_job(&tenant, "csv", "list.csv", 1024, Some("msg-1")).await.unwrap();
        manager
            .update_job_status(&job_id, JobStatus::Error, JobUpdate { error_message: Some("boom".into()), ..Default::default() })
            .await
            .unwrap();

        let probe = manager.get_job_by_client_msg_id(&tenant, "msg-1").await.unwrap();
        assert!(probe.is_none());
    }

    #[tokio::test]
    async fn idempotency_probe_returns_cached_processing_job() {
        let manager = setup().await;
        let tenant = Tenant::new(1, "Trattoria");
        let job_id = manager.create_job(&tenant, "csv", "list.csv", 1024, Some("msg-1")).await.unwrap();
        manager.update_job_status(&job_id, JobStatus::Processing, JobUpdate::default()).await.unwrap();

        let probe = manager.get_job_by_client_msg_id(&tenant, "msg-1").await.unwrap().unwrap();
        assert_eq!(probe.job_id, job_id);
        assert!(probe.started_at.is_some());
    }

    #[tokio::test]
    async fn retry_after_error_creates_a_fresh_job_under_the_same_client_msg_id() {
        let manager = setup().await;
        let tenant = Tenant::new(1, "Trattoria");
        let first = manager.create_job(&tenant, "csv", "list.csv", 1024, Some("msg-1")).await.unwrap();
        manager
            .update_job_status(&first, JobStatus::Error, JobUpdate { error_message: Some("boom".into()), ..Default::default() })
            .await
            .unwrap();

        let second = manager.create_job(&tenant, "csv", "list.csv", 1024, Some("msg-1")).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn terminal_transition_is_rejected() {
        let manager = setup().await;
        let tenant = Tenant::new(1, "Trattoria");
        let job_id = manager.create_job(&tenant, "csv", "list.csv", 1024, None).await.unwrap();
        manager.update_job_status(&job_id, JobStatus::Completed, JobUpdate::default()).await.unwrap();

        let result = manager.update_job_status(&job_id, JobStatus::Processing, JobUpdate::default()).await;
        assert!(matches!(result, Err(StoreError::TerminalJobTransition)));
    }
}
