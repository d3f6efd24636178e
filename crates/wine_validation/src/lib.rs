//! Row coercion, validation and deduplication (spec §4.A).
//!
//! Accepts a loosely-typed row (free-form attribute map) produced by any
//! ingestion stage and produces either a [`CanonicalWine`] or a
//! [`RejectionReason`]. Unlike the teacher's schema-contract philosophy —
//! once approved, no coercion, violations are hard failures — this crate's
//! job is exactly the opposite: coerce everything that can be coerced, and
//! reject only what the spec says must be rejected (an empty or
//! placeholder `name`).

pub mod coerce;
pub mod dedup;
pub mod types;

pub use dedup::{dedup_key, dedup_wines, DedupStats};
pub use types::{CanonicalWine, RawRow, RejectionReason, SourceStage, ValidationError, WineType};

use std::collections::HashMap;

const PLACEHOLDER_TOKENS: &[&str] = &["nan", "none", "null", "n/a"];

/// Validate and coerce one row into a [`CanonicalWine`], or reject it.
pub fn validate_row(row: &RawRow, stage: SourceStage) -> Result<CanonicalWine, RejectionReason> {
    let name = row
        .get("name")
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    if name.is_empty() {
        return Err(RejectionReason::EmptyName);
    }
    if PLACEHOLDER_TOKENS.contains(&name.to_lowercase().as_str()) {
        return Err(RejectionReason::PlaceholderName);
    }

    let vintage = row.get("vintage").and_then(|v| coerce::coerce_vintage(v));
    let quantity = row.get("quantity").map(|q| coerce::coerce_quantity(q)).unwrap_or(0);
    let min_quantity = row
        .get("min_quantity")
        .map(|q| coerce::coerce_quantity(q))
        .unwrap_or(0);
    let cost_price = row.get("cost_price").and_then(|v| coerce::coerce_money(v));
    let selling_price = row
        .get("selling_price")
        .or_else(|| row.get("price"))
        .and_then(|v| coerce::coerce_money(v));
    let alcohol_content = row
        .get("alcohol_content")
        .and_then(|v| coerce::coerce_alcohol_content(v));
    let wine_type = coerce::coerce_wine_type(row.get("wine_type").map(|s| s.as_str()), &name);

    Ok(CanonicalWine {
        name,
        producer: non_empty(row.get("producer")),
        supplier: non_empty(row.get("supplier")),
        vintage,
        grape_variety: non_empty(row.get("grape_variety")),
        region: non_empty(row.get("region")),
        country: non_empty(row.get("country")),
        wine_type,
        classification: non_empty(row.get("classification")).map(|s| s.to_uppercase()),
        quantity,
        min_quantity,
        cost_price,
        selling_price,
        alcohol_content,
        description: non_empty(row.get("description")),
        notes: non_empty(row.get("notes")),
        source_stage: stage,
    })
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Outcome of validating a whole batch of rows (spec §4.A `validate_batch`).
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub valid: Vec<CanonicalWine>,
    pub rejected: Vec<(RawRow, RejectionReason)>,
    pub rows_total: usize,
    pub rows_valid: usize,
    pub rows_rejected: usize,
    pub rejection_histogram: HashMap<RejectionReason, usize>,
}

impl BatchReport {
    /// Fraction of rows that validated, used by Stage 1/2's escalation decision.
    pub fn valid_fraction(&self) -> f64 {
        if self.rows_total == 0 {
            0.0
        } else {
            self.rows_valid as f64 / self.rows_total as f64
        }
    }
}

/// Validate every row in a batch, tagging each with its source stage.
pub fn validate_batch(rows: Vec<RawRow>, stage: SourceStage) -> BatchReport {
    let rows_total = rows.len();
    let mut report = BatchReport {
        rows_total,
        ..Default::default()
    };

    for row in rows {
        match validate_row(&row, stage) {
            Ok(wine) => report.valid.push(wine),
            Err(reason) => {
                *report.rejection_histogram.entry(reason).or_insert(0) += 1;
                report.rejected.push((row, reason));
            }
        }
    }

    report.rows_valid = report.valid.len();
    report.rows_rejected = report.rejected.len();
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn rejects_empty_name() {
        let r = row(&[("name", "   ")]);
        assert_eq!(validate_row(&r, SourceStage::Stage1Classic), Err(RejectionReason::EmptyName));
    }

    #[test]
    fn rejects_placeholder_name() {
        let r = row(&[("name", "N/A")]);
        assert_eq!(
            validate_row(&r, SourceStage::Stage1Classic),
            Err(RejectionReason::PlaceholderName)
        );
    }

    #[test]
    fn coerces_a_full_row() {
        let r = row(&[
            ("name", "Barolo Riserva"),
            ("producer", "Cantina Rossi"),
            ("vintage", "2015"),
            ("quantity", "12"),
            ("cost_price", "18,50"),
            ("selling_price", "35.00"),
            ("alcohol_content", "14.5%"),
        ]);
        let wine = validate_row(&r, SourceStage::Stage1Classic).unwrap();
        assert_eq!(wine.vintage, Some(2015));
        assert_eq!(wine.quantity, 12);
        assert_eq!(wine.cost_price, Some(18.50));
        assert_eq!(wine.selling_price, Some(35.00));
        assert_eq!(wine.alcohol_content, Some(14.5));
    }

    #[test]
    fn price_falls_back_to_generic_price_column() {
        let r = row(&[("name", "Chianti"), ("price", "9.99")]);
        let wine = validate_row(&r, SourceStage::Stage1Classic).unwrap();
        assert_eq!(wine.selling_price, Some(9.99));
    }

    #[test]
    fn validate_batch_builds_histogram() {
        let rows = vec![
            row(&[("name", "Chianti")]),
            row(&[("name", "")]),
            row(&[("name", "null")]),
        ];
        let report = validate_batch(rows, SourceStage::Stage1Classic);
        assert_eq!(report.rows_total, 3);
        assert_eq!(report.rows_valid, 1);
        assert_eq!(report.rows_rejected, 2);
        assert_eq!(report.rejection_histogram.get(&RejectionReason::EmptyName), Some(&1));
        assert_eq!(report.rejection_histogram.get(&RejectionReason::PlaceholderName), Some(&1));
    }
}
