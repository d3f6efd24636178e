//! Shared registry of known tenants, grounded in `core/database.py`'s
//! `User` model. Ambient addition (spec §3): not load-bearing for any
//! invariant, but the Scheduler (§4.K) needs a list of onboarded tenants
//! to iterate without scanning every per-tenant table set.

use chrono::Utc;
use sqlx::Row;

use wine_db::DbPool;
use wine_protocol::Tenant;

use crate::error::Result;

pub struct TenantRegistry {
    pool: DbPool,
}

impl TenantRegistry {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tenants (
                user_id INTEGER NOT NULL,
                business_name TEXT NOT NULL,
                onboarding_completed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, business_name)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Register a tenant if unseen; a no-op otherwise. Does not touch
    /// `onboarding_completed`, which is flipped explicitly once.
    pub async fn upsert_tenant(&self, tenant: &Tenant) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO tenants (user_id, business_name, onboarding_completed, created_at, updated_at)
            VALUES (?, ?, 0, ?, ?)
            ON CONFLICT (user_id, business_name) DO UPDATE SET updated_at = excluded.updated_at
            "#,
        )
        .bind(tenant.user_id)
        .bind(&tenant.business_name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_onboarding_completed(&self, tenant: &Tenant) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE tenants SET onboarding_completed = 1, updated_at = ?
            WHERE user_id = ? AND business_name = ?
            "#,
        )
        .bind(Utc::now())
        .bind(tenant.user_id)
        .bind(&tenant.business_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All tenants with `onboarding_completed = true`, the population the
    /// daily report job iterates (`send_daily_reports_to_all_users`'s
    /// `WHERE onboarding_completed == True` filter).
    pub async fn list_onboarded(&self) -> Result<Vec<Tenant>> {
        let rows = sqlx::query(
            r#"SELECT user_id, business_name FROM tenants WHERE onboarding_completed = 1"#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let user_id: i64 = row.get("user_id");
                let business_name: String = row.get("business_name");
                Tenant::new(user_id, business_name)
            })
            .collect())
    }
}
