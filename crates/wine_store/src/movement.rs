//! Movement engine (spec §4.I), grounded exhaustively in
//! `api/routers/movements.py::process_movement_background`: producer-cue
//! particles, grape-variety vocabulary, ranking heuristics and Italian
//! plural-variant search, re-expressed as plain Rust data and a pure
//! ranking function rather than a dynamically built SQL `CASE` clause.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::Row;

use wine_protocol::{Tenant, TenantTableKind};

use crate::error::{Result, StoreError};
use wine_db::DbPool;

/// Prepositions and brand prefixes that suggest the lookup term names a
/// producer rather than a wine or grape.
const PRODUCER_CUE_PARTICLES: &[&str] = &["del", "di", "da", "ca'", "ca '", "castello", "tenuta", "azienda"];

/// Representative grape-variety vocabulary (not exhaustive — mirrors the
/// scope of the original's hard-coded list).
const GRAPE_VARIETIES: &[&str] = &[
    "sangiovese", "nebbiolo", "barbera", "chardonnay", "merlot", "cabernet", "pinot nero", "pinot grigio",
    "trebbiano", "vermentino", "nero d'avola", "primitivo", "montepulciano", "glera", "garganega", "corvina",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Producer,
    GrapeVariety,
}

impl Field {
    fn column(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Producer => "producer",
            Field::GrapeVariety => "grape_variety",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    Consumo,
    Rifornimento,
}

impl MovementType {
    fn as_db_str(self) -> &'static str {
        match self {
            MovementType::Consumo => "consumo",
            MovementType::Rifornimento => "rifornimento",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementOutcome {
    pub wine_name: String,
    pub wine_producer: Option<String>,
    pub movement_type: MovementType,
    pub quantity_change: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
}

/// Result of an administrative quantity override (spec §4.I "set field"
/// operations): unlike [`MovementEngine::apply_movement`], the caller
/// supplies an absolute target quantity rather than a signed delta, and a
/// no-op (`new_value == quantity_before`) updates the inventory row without
/// writing a movement or touching history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetQuantityOutcome {
    pub wine_name: String,
    pub wine_producer: Option<String>,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub movement: Option<MovementOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MovementEntry {
    movement_type: MovementType,
    quantity_change: i64,
    quantity_before: i64,
    quantity_after: i64,
    occurred_at: chrono::DateTime<Utc>,
}

/// Rank which column to prioritize in the lookup, per the heuristics in
/// spec §4.I: producer cue particles outrank a grape-variety vocabulary
/// match, which in turn outranks the default name-first order.
fn field_priority(term: &str) -> [Field; 3] {
    let lower = term.to_lowercase();
    if PRODUCER_CUE_PARTICLES.iter().any(|p| lower.contains(p)) {
        return [Field::Producer, Field::Name, Field::GrapeVariety];
    }
    if matches_grape_vocabulary(&lower) {
        return [Field::GrapeVariety, Field::Producer, Field::Name];
    }
    [Field::Name, Field::Producer, Field::GrapeVariety]
}

fn matches_grape_vocabulary(lower_term: &str) -> bool {
    GRAPE_VARIETIES
        .iter()
        .any(|v| lower_term.contains(v) || italian_plural_variants(lower_term).iter().any(|variant| variant == v))
}

/// Italian singular/plural variants of a term: `-i -> -o`/`-e`, `-e -> -a`/`-o`.
fn italian_plural_variants(term: &str) -> Vec<String> {
    let mut variants = vec![term.to_string()];
    if let Some(stem) = term.strip_suffix('i') {
        variants.push(format!("{stem}o"));
        variants.push(format!("{stem}e"));
    } else if let Some(stem) = term.strip_suffix('e') {
        variants.push(format!("{stem}a"));
        variants.push(format!("{stem}o"));
    }
    variants
}

pub struct MovementEngine {
    pool: DbPool,
}

impl MovementEngine {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Execute one movement as a single atomic transaction. SQLite has no
    /// `SELECT ... FOR UPDATE`; `BEGIN IMMEDIATE` acquires the write lock
    /// up front and serializes concurrent movements on the same database
    /// the same way a row lock would.
    pub async fn apply_movement(
        &self,
        tenant: &Tenant,
        wine_lookup_term: &str,
        movement_type: MovementType,
        quantity: i64,
    ) -> Result<MovementOutcome> {
        let inventory = tenant.table_name(TenantTableKind::Inventory);
        let movements_log = tenant.table_name(TenantTableKind::MovementsLog);

        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let outcome = self
            .apply_movement_locked(&mut conn, tenant, &inventory, &movements_log, wine_lookup_term, movement_type, quantity)
            .await;

        match outcome {
            Ok(outcome) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(outcome)
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(e)
            }
        }
    }

    async fn apply_movement_locked(
        &self,
        conn: &mut sqlx::SqliteConnection,
        tenant: &Tenant,
        inventory: &str,
        movements_log: &str,
        wine_lookup_term: &str,
        movement_type: MovementType,
        quantity: i64,
    ) -> Result<MovementOutcome> {
        let priority = field_priority(wine_lookup_term);
        let variants = italian_plural_variants(&wine_lookup_term.to_lowercase());

        let mut clauses = Vec::new();
        let mut binds = Vec::new();
        for field in priority {
            for variant in &variants {
                clauses.push(format!("LOWER({}) LIKE ?", field.column()));
                binds.push(format!("%{variant}%"));
            }
        }

        let sql = format!(
            r#"SELECT * FROM "{inventory}" WHERE {} LIMIT 50"#,
            clauses.join(" OR ")
        );
        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind.as_str());
        }
        let candidates = query.fetch_all(&mut *conn).await?;

        if candidates.is_empty() {
            return Err(StoreError::WineNotFound(wine_lookup_term.to_string()));
        }

        // Pick the candidate whose best-matching field has the highest
        // priority (lowest index in `priority`), first-seen on ties.
        let lower_term = wine_lookup_term.to_lowercase();
        let mut best_row = None;
        let mut best_rank = usize::MAX;
        for row in &candidates {
            for (rank, field) in priority.iter().enumerate() {
                let value: Option<String> = row.try_get(field.column())?;
                if let Some(value) = value {
                    if value.to_lowercase().contains(&lower_term)
                        || variants.iter().any(|v| value.to_lowercase().contains(v))
                    {
                        if rank < best_rank {
                            best_rank = rank;
                            best_row = Some(row);
                        }
                        break;
                    }
                }
            }
        }
        let row = best_row.unwrap_or(&candidates[0]);

        let wine_id: String = row.try_get("wine_id")?;
        let wine_name: String = row.try_get("name")?;
        let wine_producer: Option<String> = row.try_get("producer")?;
        let quantity_before: i64 = row.try_get("quantity")?;

        let (quantity_after, quantity_change) = match movement_type {
            MovementType::Consumo => {
                if quantity_before < quantity {
                    return Err(StoreError::InsufficientQuantity { have: quantity_before, need: quantity });
                }
                (quantity_before - quantity, -quantity)
            }
            MovementType::Rifornimento => (quantity_before + quantity, quantity),
        };

        let now = Utc::now();
        sqlx::query(&format!(r#"UPDATE "{inventory}" SET quantity = ?, updated_at = ? WHERE wine_id = ?"#))
            .bind(quantity_after)
            .bind(now)
            .bind(&wine_id)
            .execute(&mut *conn)
            .await?;

        sqlx::query(&format!(
            r#"
            INSERT INTO "{movements_log}"
                (wine_name, wine_producer, movement_type, quantity_change, quantity_before, quantity_after, occurred_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#
        ))
        .bind(&wine_name)
        .bind(&wine_producer)
        .bind(movement_type.as_db_str())
        .bind(quantity_change)
        .bind(quantity_before)
        .bind(quantity_after)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        self.upsert_history(conn, tenant, &wine_name, wine_producer.as_deref(), movement_type, quantity_change, quantity_before, quantity_after, now)
            .await?;

        Ok(MovementOutcome {
            wine_name,
            wine_producer,
            movement_type,
            quantity_change,
            quantity_before,
            quantity_after,
        })
    }

    /// Administrative "set field" quantity override (spec §4.I): looks the
    /// wine up directly by id rather than by fuzzy lookup term, and treats
    /// `new_value == quantity_before` as a no-op that skips the movement
    /// log and history aggregate entirely.
    pub async fn set_quantity(&self, tenant: &Tenant, wine_id: &str, new_value: i64) -> Result<SetQuantityOutcome> {
        let inventory = tenant.table_name(TenantTableKind::Inventory);
        let movements_log = tenant.table_name(TenantTableKind::MovementsLog);

        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let outcome = self.set_quantity_locked(&mut conn, tenant, &inventory, &movements_log, wine_id, new_value).await;

        match outcome {
            Ok(outcome) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(outcome)
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(e)
            }
        }
    }

    async fn set_quantity_locked(
        &self,
        conn: &mut sqlx::SqliteConnection,
        tenant: &Tenant,
        inventory: &str,
        movements_log: &str,
        wine_id: &str,
        new_value: i64,
    ) -> Result<SetQuantityOutcome> {
        let row = sqlx::query(&format!(r#"SELECT * FROM "{inventory}" WHERE wine_id = ?"#))
            .bind(wine_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| StoreError::WineNotFound(wine_id.to_string()))?;

        let wine_name: String = row.try_get("name")?;
        let wine_producer: Option<String> = row.try_get("producer")?;
        let quantity_before: i64 = row.try_get("quantity")?;
        let quantity_change = new_value - quantity_before;

        let now = Utc::now();
        sqlx::query(&format!(r#"UPDATE "{inventory}" SET quantity = ?, updated_at = ? WHERE wine_id = ?"#))
            .bind(new_value)
            .bind(now)
            .bind(wine_id)
            .execute(&mut *conn)
            .await?;

        if quantity_change == 0 {
            return Ok(SetQuantityOutcome { wine_name, wine_producer, quantity_before, quantity_after: new_value, movement: None });
        }

        let movement_type = if quantity_change > 0 { MovementType::Rifornimento } else { MovementType::Consumo };

        sqlx::query(&format!(
            r#"
            INSERT INTO "{movements_log}"
                (wine_name, wine_producer, movement_type, quantity_change, quantity_before, quantity_after, occurred_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#
        ))
        .bind(&wine_name)
        .bind(&wine_producer)
        .bind(movement_type.as_db_str())
        .bind(quantity_change)
        .bind(quantity_before)
        .bind(new_value)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        self.upsert_history(conn, tenant, &wine_name, wine_producer.as_deref(), movement_type, quantity_change, quantity_before, new_value, now)
            .await?;

        Ok(SetQuantityOutcome {
            wine_name: wine_name.clone(),
            wine_producer: wine_producer.clone(),
            quantity_before,
            quantity_after: new_value,
            movement: Some(MovementOutcome {
                wine_name,
                wine_producer,
                movement_type,
                quantity_change,
                quantity_before,
                quantity_after: new_value,
            }),
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn upsert_history(
        &self,
        conn: &mut sqlx::SqliteConnection,
        tenant: &Tenant,
        wine_name: &str,
        wine_producer: Option<&str>,
        movement_type: MovementType,
        quantity_change: i64,
        quantity_before: i64,
        quantity_after: i64,
        occurred_at: chrono::DateTime<Utc>,
    ) -> Result<()> {
        let producer_key = wine_producer.unwrap_or("");

        let existing = sqlx::query(
            r#"
            SELECT total_consumi, total_rifornimenti, movements_json, first_movement_date
            FROM wine_history
            WHERE tenant_user_id = ? AND tenant_business_name = ? AND name = ? AND producer = ?
            "#,
        )
        .bind(tenant.user_id)
        .bind(&tenant.business_name)
        .bind(wine_name)
        .bind(producer_key)
        .fetch_optional(&mut *conn)
        .await?;

        let entry = MovementEntry { movement_type, quantity_change, quantity_before, quantity_after, occurred_at };

        match existing {
            Some(row) => {
                let mut total_consumi: i64 = row.try_get("total_consumi")?;
                let mut total_rifornimenti: i64 = row.try_get("total_rifornimenti")?;
                let movements_json: String = row.try_get("movements_json")?;
                let first_movement_date: Option<chrono::DateTime<Utc>> = row.try_get("first_movement_date")?;

                let mut movements: Vec<MovementEntry> = serde_json::from_str(&movements_json)?;
                movements.push(entry);

                match movement_type {
                    MovementType::Consumo => total_consumi += quantity_change.unsigned_abs() as i64,
                    MovementType::Rifornimento => total_rifornimenti += quantity_change,
                }

                sqlx::query(
                    r#"
                    UPDATE wine_history SET
                        current_stock = ?,
                        total_consumi = ?,
                        total_rifornimenti = ?,
                        movements_json = ?,
                        first_movement_date = ?,
                        last_movement_date = ?
                    WHERE tenant_user_id = ? AND tenant_business_name = ? AND name = ? AND producer = ?
                    "#,
                )
                .bind(quantity_after)
                .bind(total_consumi)
                .bind(total_rifornimenti)
                .bind(serde_json::to_string(&movements)?)
                .bind(first_movement_date.unwrap_or(occurred_at))
                .bind(occurred_at)
                .bind(tenant.user_id)
                .bind(&tenant.business_name)
                .bind(wine_name)
                .bind(producer_key)
                .execute(&mut *conn)
                .await?;
            }
            None => {
                let (total_consumi, total_rifornimenti) = match movement_type {
                    MovementType::Consumo => (quantity_change.unsigned_abs() as i64, 0),
                    MovementType::Rifornimento => (0, quantity_change),
                };
                let movements = vec![entry];

                sqlx::query(
                    r#"
                    INSERT INTO wine_history
                        (tenant_user_id, tenant_business_name, name, producer, current_stock,
                         total_consumi, total_rifornimenti, movements_json,
                         first_movement_date, last_movement_date)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(tenant.user_id)
                .bind(&tenant.business_name)
                .bind(wine_name)
                .bind(producer_key)
                .bind(quantity_after)
                .bind(total_consumi)
                .bind(total_rifornimenti)
                .bind(serde_json::to_string(&movements)?)
                .bind(occurred_at)
                .bind(occurred_at)
                .execute(&mut *conn)
                .await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant_store::TenantStore;
    use wine_db::DbConfig;
    use wine_validation::{CanonicalWine, SourceStage, WineType};

    async fn setup() -> (DbPool, Tenant) {
        let pool = wine_db::create_pool(DbConfig::memory()).await.unwrap();
        let tenant = Tenant::new(1, "Trattoria Da Mario");
        let store = TenantStore::new(pool.clone());
        store.ensure_tables(&tenant).await.unwrap();
        store
            .batch_insert_wines(
                &tenant,
                vec![CanonicalWine {
                    name: "Barolo Riserva".to_string(),
                    producer: Some("Cantina Rossi".to_string()),
                    supplier: None,
                    vintage: Some(2015),
                    grape_variety: Some("Nebbiolo".to_string()),
                    region: None,
                    country: None,
                    wine_type: WineType::Rosso,
                    classification: None,
                    quantity: 10,
                    min_quantity: 2,
                    cost_price: None,
                    selling_price: None,
                    alcohol_content: None,
                    description: None,
                    notes: None,
                    source_stage: SourceStage::Stage1Classic,
                }],
                500,
            )
            .await
            .unwrap();
        (pool, tenant)
    }

    #[tokio::test]
    async fn consumo_decrements_quantity() {
        let (pool, tenant) = setup().await;
        let engine = MovementEngine::new(pool);
        let outcome = engine.apply_movement(&tenant, "Barolo", MovementType::Consumo, 3).await.unwrap();
        assert_eq!(outcome.quantity_before, 10);
        assert_eq!(outcome.quantity_after, 7);
        assert_eq!(outcome.quantity_change, -3);
    }

    #[tokio::test]
    async fn rifornimento_increments_quantity() {
        let (pool, tenant) = setup().await;
        let engine = MovementEngine::new(pool);
        let outcome = engine.apply_movement(&tenant, "Barolo", MovementType::Rifornimento, 5).await.unwrap();
        assert_eq!(outcome.quantity_after, 15);
    }

    #[tokio::test]
    async fn consumo_rejects_insufficient_quantity() {
        let (pool, tenant) = setup().await;
        let engine = MovementEngine::new(pool);
        let result = engine.apply_movement(&tenant, "Barolo", MovementType::Consumo, 100).await;
        assert!(matches!(result, Err(StoreError::InsufficientQuantity { .. })));
    }

    #[tokio::test]
    async fn unknown_wine_errors() {
        let (pool, tenant) = setup().await;
        let engine = MovementEngine::new(pool);
        let result = engine.apply_movement(&tenant, "Zinfandel", MovementType::Consumo, 1).await;
        assert!(matches!(result, Err(StoreError::WineNotFound(_))));
    }

    #[tokio::test]
    async fn set_quantity_no_op_skips_movement_and_history() {
        let (pool, tenant) = setup().await;
        let store = TenantStore::new(pool.clone());
        let snapshot = store.snapshot(&tenant).await.unwrap();
        let wine_id = snapshot.wines[0].wine_id.clone();

        let engine = MovementEngine::new(pool);
        let outcome = engine.set_quantity(&tenant, wine_id.as_str(), 10).await.unwrap();
        assert_eq!(outcome.quantity_before, 10);
        assert_eq!(outcome.quantity_after, 10);
        assert!(outcome.movement.is_none());
    }

    #[tokio::test]
    async fn set_quantity_change_records_a_movement() {
        let (pool, tenant) = setup().await;
        let store = TenantStore::new(pool.clone());
        let snapshot = store.snapshot(&tenant).await.unwrap();
        let wine_id = snapshot.wines[0].wine_id.clone();

        let engine = MovementEngine::new(pool);
        let outcome = engine.set_quantity(&tenant, wine_id.as_str(), 4).await.unwrap();
        assert_eq!(outcome.quantity_after, 4);
        let movement = outcome.movement.unwrap();
        assert_eq!(movement.movement_type, MovementType::Consumo);
        assert_eq!(movement.quantity_change, -6);
    }

    #[test]
    fn producer_cue_outranks_default_order() {
        assert_eq!(field_priority("tenuta rossi")[0], Field::Producer);
        assert_eq!(field_priority("nebbioli")[0], Field::GrapeVariety);
        assert_eq!(field_priority("barolo")[0], Field::Name);
    }
}
