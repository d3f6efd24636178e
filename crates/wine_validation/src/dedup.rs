//! Deduplication key and merge policy (spec §4.A), grounded in
//! `csv_processor.py::deduplicate_wines`'s normalize-and-sum approach,
//! extended with the stage-priority merge rule spec.md adds on top.

use crate::types::{CanonicalWine, SourceStage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fold common accented Latin characters to their plain equivalent.
fn fold_accents(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'à' | 'á' | 'â' | 'ä' => 'a',
            'è' | 'é' | 'ê' | 'ë' => 'e',
            'ì' | 'í' | 'î' | 'ï' => 'i',
            'ò' | 'ó' | 'ô' | 'ö' => 'o',
            'ù' | 'ú' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

fn strip_punctuation_and_collapse(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for c in s.chars() {
        if c.is_alphanumeric() {
            out.push(c);
            last_was_space = false;
        } else if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        }
        // other punctuation is dropped entirely
    }
    out.trim().to_string()
}

/// Build the dedup key: normalized name + producer + vintage.
pub fn dedup_key(name: &str, producer: Option<&str>, vintage: Option<i32>) -> String {
    let norm_name = strip_punctuation_and_collapse(&fold_accents(&name.to_lowercase()));
    let mut parts = vec![norm_name];
    if let Some(p) = producer {
        let norm_producer = strip_punctuation_and_collapse(&fold_accents(&p.to_lowercase()));
        if !norm_producer.is_empty() {
            parts.push(norm_producer);
        }
    }
    if let Some(v) = vintage {
        parts.push(v.to_string());
    }
    parts.join("|")
}

/// Stats describing one dedup pass, surfaced on the job's `result_data`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedupStats {
    pub original_count: usize,
    pub deduplicated_count: usize,
    pub duplicates_found: usize,
}

/// Deduplicate by `(name, producer, vintage)`, summing quantities and
/// adopting the first non-absent value per field in stage-priority order
/// (Stage 1 > Stage 2 > Stage 3). Preserves first-seen order.
pub fn dedup_wines(wines: Vec<CanonicalWine>) -> (Vec<CanonicalWine>, DedupStats) {
    let original_count = wines.len();
    let mut order: Vec<String> = Vec::new();
    let mut by_key: HashMap<String, CanonicalWine> = HashMap::new();
    let mut duplicates_found = 0usize;

    for wine in wines {
        let key = dedup_key(&wine.name, wine.producer.as_deref(), wine.vintage);
        match by_key.get_mut(&key) {
            Some(existing) => {
                duplicates_found += 1;
                merge_into(existing, wine);
            }
            None => {
                order.push(key.clone());
                by_key.insert(key, wine);
            }
        }
    }

    let deduplicated: Vec<CanonicalWine> = order
        .into_iter()
        .filter_map(|k| by_key.remove(&k))
        .collect();

    let stats = DedupStats {
        original_count,
        deduplicated_count: deduplicated.len(),
        duplicates_found,
    };
    (deduplicated, stats)
}

/// Merge `incoming` into `existing` in place: sum quantity, adopt the
/// higher-priority (lower `SourceStage::priority`) non-absent value per
/// attribute.
fn merge_into(existing: &mut CanonicalWine, incoming: CanonicalWine) {
    existing.quantity += incoming.quantity;
    existing.min_quantity = existing.min_quantity.max(incoming.min_quantity);

    let incoming_wins = incoming.source_stage.priority() < existing.source_stage.priority();

    // Resolve and stamp the winning stage first, independent of the
    // per-field fallback below, so a later merge always compares against
    // the true minimum priority seen so far rather than a value that could
    // have been left stale by an intermediate losing merge.
    if incoming_wins {
        existing.wine_type = incoming.wine_type;
        existing.source_stage = incoming.source_stage;
    }

    macro_rules! adopt_option {
        ($field:ident) => {
            if incoming_wins && incoming.$field.is_some() {
                existing.$field = incoming.$field.clone();
            } else if existing.$field.is_none() {
                existing.$field = incoming.$field.clone();
            }
        };
    }

    adopt_option!(producer);
    adopt_option!(supplier);
    adopt_option!(vintage);
    adopt_option!(grape_variety);
    adopt_option!(region);
    adopt_option!(country);
    adopt_option!(classification);
    adopt_option!(cost_price);
    adopt_option!(selling_price);
    adopt_option!(alcohol_content);
    adopt_option!(description);
    adopt_option!(notes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WineType;

    fn wine(name: &str, producer: Option<&str>, vintage: Option<i32>, qty: i64, stage: SourceStage) -> CanonicalWine {
        CanonicalWine {
            name: name.to_string(),
            producer: producer.map(String::from),
            supplier: None,
            vintage,
            grape_variety: None,
            region: None,
            country: None,
            wine_type: WineType::Altro,
            classification: None,
            quantity: qty,
            min_quantity: 0,
            cost_price: None,
            selling_price: None,
            alcohol_content: None,
            description: None,
            notes: None,
            source_stage: stage,
        }
    }

    #[test]
    fn accents_and_case_fold_into_same_key() {
        let a = dedup_key("Château Rosé", Some("Cantina Rossi"), Some(2018));
        let b = dedup_key("chateau rose", Some("CANTINA ROSSI"), Some(2018));
        assert_eq!(a, b);
    }

    #[test]
    fn dedup_sums_quantities() {
        let wines = vec![
            wine("Barolo", Some("Rossi"), Some(2015), 3, SourceStage::Stage1Classic),
            wine("barolo", Some("rossi"), Some(2015), 5, SourceStage::Stage1Classic),
        ];
        let (out, stats) = dedup_wines(wines);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].quantity, 8);
        assert_eq!(stats.duplicates_found, 1);
    }

    #[test]
    fn higher_priority_stage_wins_on_conflicting_fields() {
        let mut stage3 = wine("Barolo", Some("Rossi"), Some(2015), 1, SourceStage::Stage3LlmExtractor);
        stage3.region = Some("Wrong Region".to_string());
        let mut stage1 = wine("Barolo", Some("Rossi"), Some(2015), 1, SourceStage::Stage1Classic);
        stage1.region = Some("Piemonte".to_string());

        let (out, _) = dedup_wines(vec![stage3, stage1]);
        assert_eq!(out[0].region.as_deref(), Some("Piemonte"));
    }

    #[test]
    fn distinct_vintages_are_not_merged() {
        let wines = vec![
            wine("Barolo", Some("Rossi"), Some(2015), 1, SourceStage::Stage1Classic),
            wine("Barolo", Some("Rossi"), Some(2018), 1, SourceStage::Stage1Classic),
        ];
        let (out, _) = dedup_wines(wines);
        assert_eq!(out.len(), 2);
    }
}
