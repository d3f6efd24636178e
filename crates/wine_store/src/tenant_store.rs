//! Per-tenant table provisioning, batched inserts and snapshot queries
//! (spec §4.H), grounded in `core/database.py`'s `ensure_user_tables` /
//! `batch_insert_wines` / `create_tables`.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use tracing::warn;

use wine_db::DbPool;
use wine_ids::WineId;
use wine_protocol::{Tenant, TenantTableKind};
use wine_validation::{CanonicalWine, WineType};

use crate::error::Result;

/// A stored inventory row: a [`CanonicalWine`] plus the identity and
/// timestamps the store assigns on insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WineRow {
    pub wine_id: WineId,
    pub name: String,
    pub producer: Option<String>,
    pub supplier: Option<String>,
    pub vintage: Option<i32>,
    pub grape_variety: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub wine_type: Option<WineType>,
    pub classification: Option<String>,
    pub quantity: i64,
    pub min_quantity: i64,
    pub cost_price: Option<f64>,
    pub selling_price: Option<f64>,
    pub alcohol_content: Option<f64>,
    pub description: Option<String>,
    pub notes: Option<String>,
}

fn wine_type_to_db(wine_type: WineType) -> &'static str {
    match wine_type {
        WineType::Rosso => "rosso",
        WineType::Bianco => "bianco",
        WineType::Rosato => "rosato",
        WineType::Spumante => "spumante",
        WineType::Altro => "altro",
    }
}

fn wine_type_from_db(value: &str) -> Option<WineType> {
    match value {
        "rosso" => Some(WineType::Rosso),
        "bianco" => Some(WineType::Bianco),
        "rosato" => Some(WineType::Rosato),
        "spumante" => Some(WineType::Spumante),
        "altro" => Some(WineType::Altro),
        _ => None,
    }
}

/// Aggregate facets over `type`, `vintage` and `producer` for client filter UIs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Facets {
    pub by_type: HashMap<String, i64>,
    pub by_vintage: HashMap<String, i64>,
    pub by_producer: HashMap<String, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub wines: Vec<WineRow>,
    pub facets: Facets,
}

pub struct TenantStore {
    pool: DbPool,
}

impl TenantStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn table(&self, tenant: &Tenant, kind: TenantTableKind) -> String {
        tenant.table_name(kind)
    }

    /// Idempotent provisioning of the tenant's four tables.
    pub async fn ensure_tables(&self, tenant: &Tenant) -> Result<()> {
        let inventory = self.table(tenant, TenantTableKind::Inventory);
        let snapshot_backup = self.table(tenant, TenantTableKind::SnapshotBackup);
        let interaction_log = self.table(tenant, TenantTableKind::InteractionLog);
        let movements_log = self.table(tenant, TenantTableKind::MovementsLog);

        for table in [&inventory, &snapshot_backup] {
            let ddl = format!(
                r#"
                CREATE TABLE IF NOT EXISTS "{table}" (
                    wine_id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    producer TEXT,
                    supplier TEXT,
                    vintage INTEGER,
                    grape_variety TEXT,
                    region TEXT,
                    country TEXT,
                    wine_type TEXT,
                    classification TEXT,
                    quantity INTEGER NOT NULL DEFAULT 0,
                    min_quantity INTEGER NOT NULL DEFAULT 0,
                    cost_price REAL,
                    selling_price REAL,
                    alcohol_content REAL,
                    description TEXT,
                    notes TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )
                "#
            );
            sqlx::query(&ddl).execute(&self.pool).await?;
        }

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{interaction_log}" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                occurred_at TEXT NOT NULL,
                kind TEXT NOT NULL,
                detail TEXT
            )
            "#
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{movements_log}" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                wine_name TEXT NOT NULL,
                wine_producer TEXT,
                movement_type TEXT NOT NULL,
                quantity_change INTEGER NOT NULL,
                quantity_before INTEGER NOT NULL,
                quantity_after INTEGER NOT NULL,
                occurred_at TEXT NOT NULL
            )
            "#
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS wine_history (
                tenant_user_id INTEGER NOT NULL,
                tenant_business_name TEXT NOT NULL,
                name TEXT NOT NULL,
                producer TEXT NOT NULL DEFAULT '',
                current_stock INTEGER NOT NULL DEFAULT 0,
                total_consumi INTEGER NOT NULL DEFAULT 0,
                total_rifornimenti INTEGER NOT NULL DEFAULT 0,
                movements_json TEXT NOT NULL DEFAULT '[]',
                first_movement_date TEXT,
                last_movement_date TEXT,
                PRIMARY KEY (tenant_user_id, tenant_business_name, name, producer)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert rows in groups of at most `batch_size` (default 500),
    /// committing each batch independently so a failing batch does not
    /// lose prior progress. Returns `(saved_count, error_count)`.
    pub async fn batch_insert_wines(
        &self,
        tenant: &Tenant,
        rows: Vec<CanonicalWine>,
        batch_size: usize,
    ) -> Result<(i64, i64)> {
        let inventory = self.table(tenant, TenantTableKind::Inventory);
        let mut saved = 0i64;
        let mut errors = 0i64;

        for batch in rows.chunks(batch_size.max(1)) {
            let mut tx = self.pool.begin().await?;

            for wine in batch {
                let now = Utc::now();
                let wine_id = WineId::new();
                let result = sqlx::query(&format!(
                    r#"
                    INSERT INTO "{inventory}"
                        (wine_id, name, producer, supplier, vintage, grape_variety, region,
                         country, wine_type, classification, quantity, min_quantity,
                         cost_price, selling_price, alcohol_content, description, notes,
                         created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#
                ))
                .bind(wine_id.as_str())
                .bind(&wine.name)
                .bind(&wine.producer)
                .bind(&wine.supplier)
                .bind(wine.vintage)
                .bind(&wine.grape_variety)
                .bind(&wine.region)
                .bind(&wine.country)
                .bind(wine_type_to_db(wine.wine_type))
                .bind(&wine.classification)
                .bind(wine.quantity)
                .bind(wine.min_quantity)
                .bind(wine.cost_price)
                .bind(wine.selling_price)
                .bind(wine.alcohol_content)
                .bind(&wine.description)
                .bind(&wine.notes)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await;

                match result {
                    Ok(_) => saved += 1,
                    Err(e) => {
                        warn!(error = %e, wine = %wine.name, "failed to insert wine row");
                        errors += 1;
                    }
                }
            }

            // Commit whatever succeeded in this batch rather than rolling
            // the whole batch back — a single bad row should not lose its
            // neighbors, matching `batch_insert_wines`'s continue-on-error.
            tx.commit().await?;
        }

        Ok((saved, errors))
    }

    /// Delete-before-insert variant used by administrative import paths.
    pub async fn clear_inventory(&self, tenant: &Tenant) -> Result<()> {
        let inventory = self.table(tenant, TenantTableKind::Inventory);
        sqlx::query(&format!(r#"DELETE FROM "{inventory}""#)).execute(&self.pool).await?;
        Ok(())
    }

    /// Take the tenant's first-load snapshot backup, if it hasn't been taken yet.
    pub async fn ensure_snapshot_backup(&self, tenant: &Tenant) -> Result<()> {
        let inventory = self.table(tenant, TenantTableKind::Inventory);
        let snapshot_backup = self.table(tenant, TenantTableKind::SnapshotBackup);

        let existing: i64 = sqlx::query_scalar(&format!(r#"SELECT COUNT(*) FROM "{snapshot_backup}""#))
            .fetch_one(&self.pool)
            .await?;
        if existing > 0 {
            return Ok(());
        }

        sqlx::query(&format!(r#"INSERT INTO "{snapshot_backup}" SELECT * FROM "{inventory}""#))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn snapshot(&self, tenant: &Tenant) -> Result<Snapshot> {
        let inventory = self.table(tenant, TenantTableKind::Inventory);
        let rows = sqlx::query(&format!(r#"SELECT * FROM "{inventory}""#)).fetch_all(&self.pool).await?;

        let mut wines = Vec::with_capacity(rows.len());
        let mut facets = Facets::default();

        for row in rows {
            let wine_type_raw: Option<String> = row.try_get("wine_type")?;
            let wine_type = wine_type_raw.as_deref().and_then(wine_type_from_db);
            let producer: Option<String> = row.try_get("producer")?;
            let vintage: Option<i32> = row.try_get("vintage")?;

            *facets
                .by_type
                .entry(wine_type.map(|t| t.to_string()).unwrap_or_else(|| "Altro".to_string()))
                .or_insert(0) += 1;
            if let Some(v) = vintage {
                *facets.by_vintage.entry(v.to_string()).or_insert(0) += 1;
            }
            if let Some(p) = &producer {
                *facets.by_producer.entry(p.clone()).or_insert(0) += 1;
            }

            let wine_id_raw: String = row.try_get("wine_id")?;
            wines.push(WineRow {
                wine_id: WineId::parse(&wine_id_raw)
                    .map_err(|e| sqlx::Error::Decode(Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))))?,
                name: row.try_get("name")?,
                producer,
                supplier: row.try_get("supplier")?,
                vintage,
                grape_variety: row.try_get("grape_variety")?,
                region: row.try_get("region")?,
                country: row.try_get("country")?,
                wine_type,
                classification: row.try_get("classification")?,
                quantity: row.try_get("quantity")?,
                min_quantity: row.try_get("min_quantity")?,
                cost_price: row.try_get("cost_price")?,
                selling_price: row.try_get("selling_price")?,
                alcohol_content: row.try_get("alcohol_content")?,
                description: row.try_get("description")?,
                notes: row.try_get("notes")?,
            });
        }

        Ok(Snapshot { wines, facets })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wine_db::DbConfig;
    use wine_validation::SourceStage;

    fn wine(name: &str) -> CanonicalWine {
        CanonicalWine {
            name: name.to_string(),
            producer: Some("Rossi".to_string()),
            supplier: None,
            vintage: Some(2015),
            grape_variety: None,
            region: None,
            country: None,
            wine_type: WineType::Rosso,
            classification: None,
            quantity: 10,
            min_quantity: 2,
            cost_price: Some(8.0),
            selling_price: Some(15.0),
            alcohol_content: Some(13.5),
            description: None,
            notes: None,
            source_stage: SourceStage::Stage1Classic,
        }
    }

    #[tokio::test]
    async fn provisions_tables_and_inserts_rows() {
        let pool = wine_db::create_pool(DbConfig::memory()).await.unwrap();
        let store = TenantStore::new(pool);
        let tenant = Tenant::new(1, "Trattoria Da Mario");
        store.ensure_tables(&tenant).await.unwrap();

        let (saved, errors) = store
            .batch_insert_wines(&tenant, vec![wine("Barolo"), wine("Chianti")], 500)
            .await
            .unwrap();
        assert_eq!(saved, 2);
        assert_eq!(errors, 0);

        let snapshot = store.snapshot(&tenant).await.unwrap();
        assert_eq!(snapshot.wines.len(), 2);
        assert_eq!(snapshot.facets.by_type.get("Rosso"), Some(&2));
    }

    #[tokio::test]
    async fn clear_inventory_empties_the_table() {
        let pool = wine_db::create_pool(DbConfig::memory()).await.unwrap();
        let store = TenantStore::new(pool);
        let tenant = Tenant::new(1, "Trattoria");
        store.ensure_tables(&tenant).await.unwrap();
        store.batch_insert_wines(&tenant, vec![wine("Barolo")], 500).await.unwrap();

        store.clear_inventory(&tenant).await.unwrap();
        let snapshot = store.snapshot(&tenant).await.unwrap();
        assert!(snapshot.wines.is_empty());
    }
}
