//! Tenant identity and per-tenant table naming.
//!
//! A tenant is the `(user_id, business_name)` pair from spec §3. `user_id`
//! is the stable identifier; `business_name` only participates in naming
//! and display. Never conflate either with a messaging-platform chat id.

use crate::idempotency::short_hash;
use serde::{Deserialize, Serialize};

/// A tenant: the stable owner of one private inventory and its history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tenant {
    pub user_id: i64,
    pub business_name: String,
}

impl Tenant {
    pub fn new(user_id: i64, business_name: impl Into<String>) -> Self {
        let business_name = business_name.into();
        let business_name = if business_name.trim().is_empty() {
            "Upload Manuale".to_string()
        } else {
            business_name
        };
        Self {
            user_id,
            business_name,
        }
    }

    /// Stable per-tenant slug used as the stem of its four table names.
    ///
    /// Unlike the Python original's `f'"{telegram_id}/{business_name}"'`
    /// (a raw quoted identifier), this never touches user-supplied text
    /// directly: SQLite identifiers can't be bound as query parameters, so
    /// the slug must come from a vetted function.
    pub fn slug(&self) -> String {
        let base = format!("t{}_{}", self.user_id, self.business_name);
        let hash = short_hash(&format!("{}\u{1f}{}", self.user_id, self.business_name));
        format!("{}_{}", crate::naming::safe_output_id(&base), hash)
    }

    /// Table name for one of the tenant's four logical collections.
    pub fn table_name(&self, kind: TenantTableKind) -> String {
        format!("{}__{}", self.slug(), kind.suffix())
    }
}

/// The four per-tenant logical collections from spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantTableKind {
    Inventory,
    SnapshotBackup,
    InteractionLog,
    MovementsLog,
}

impl TenantTableKind {
    fn suffix(self) -> &'static str {
        match self {
            TenantTableKind::Inventory => "inventario",
            TenantTableKind::SnapshotBackup => "inventario_backup",
            TenantTableKind::InteractionLog => "log_interazione",
            TenantTableKind::MovementsLog => "movimenti",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_is_stable_and_safe() {
        let t = Tenant::new(42, "Enoteca Rossi");
        let slug = t.slug();
        assert_eq!(slug, Tenant::new(42, "Enoteca Rossi").slug());
        assert!(slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
    }

    #[test]
    fn distinct_tenants_get_distinct_slugs() {
        assert_ne!(
            Tenant::new(1, "A").slug(),
            Tenant::new(2, "A").slug()
        );
    }

    #[test]
    fn blank_business_name_defaults() {
        let t = Tenant::new(7, "");
        assert_eq!(t.business_name, "Upload Manuale");
    }

    #[test]
    fn table_names_are_distinct_per_kind() {
        let t = Tenant::new(1, "Cantina");
        assert_ne!(
            t.table_name(TenantTableKind::Inventory),
            t.table_name(TenantTableKind::MovementsLog)
        );
    }
}
