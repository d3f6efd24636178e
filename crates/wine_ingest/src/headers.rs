//! Header synonym dictionary and matching algorithm (spec §4.B step 3),
//! grounded in `csv_processor.py::COLUMN_MAPPINGS`/`find_column_mapping`.

use std::collections::HashMap;

/// The six core fields a header can map to, plus the lower-priority extras
/// the original also recognizes.
pub const CORE_FIELDS: &[&str] = &["name", "producer", "vintage", "quantity", "selling_price", "wine_type"];

fn synonym_table() -> HashMap<&'static str, &'static [&'static str]> {
    HashMap::from([
        ("name", &["nome", "vino", "wine", "wine name", "nome vino", "denominazione", "etichetta", "prodotto", "articolo", "titolo"][..]),
        ("vintage", &["annata", "year", "vintage", "anno", "anno produzione", "vintage year", "anno vendemmia", "vendemmia"][..]),
        ("producer", &["produttore", "producer", "winery", "azienda", "casa vinicola", "marca", "brand", "cantina", "fattoria", "azienda vinicola"][..]),
        ("grape_variety", &["uvaggio", "vitigno", "grape variety", "varieta", "grape_variety", "grape", "grapes", "vitigni", "varieta uva"][..]),
        ("region", &["regione", "region", "zona", "area", "area geografica", "zona geografica", "territorio", "zona di produzione"][..]),
        ("country", &["paese", "country", "nazione", "nation", "paese di origine", "origine", "provenienza"][..]),
        ("wine_type", &["tipo", "type", "wine_type", "categoria", "tipo vino", "categoria vino", "colore", "tipologia"][..]),
        ("classification", &["classificazione", "classification", "doc", "docg", "igt", "dop", "igp", "qualita"][..]),
        ("quantity", &["quantita", "quantity", "qty", "q.ta", "pezzi", "bottiglie", "scorta", "qta_magazzino", "qta magazzino", "disp", "disponibilita", "stock"][..]),
        ("min_quantity", &["scorta minima", "min quantity", "quantita minima", "min qty", "scorta min", "qta min", "min stock"][..]),
        ("cost_price", &["costo", "cost", "prezzo acquisto", "prezzo di acquisto", "costo unitario", "costo per bottiglia", "prezzo fornitore"][..]),
        ("selling_price", &["prezzo", "price", "prezzo vendita", "prezzo di vendita", "prezzo al pubblico", "prezzo pubblico", "listino", "prezzo listino"][..]),
        ("alcohol_content", &["alcol", "alcohol", "gradazione", "abv", "alc.", "% vol", "%vol", "grado alcolico", "alc %"][..]),
        ("description", &["descrizione", "description", "dettagli", "caratteristiche"][..]),
        ("notes", &["note", "notes", "osservazioni", "note aggiuntive", "commenti", "annotazioni"][..]),
    ])
}

fn normalize(s: &str) -> String {
    let collapsed: String = s
        .to_lowercase()
        .trim()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    collapsed
}

/// Find the best target field for one header, per the priority rules in
/// spec §4.B: exact equality > source-starts-with-synonym >
/// source-contains-synonym > synonym-contains-source, ties broken by
/// synonym length.
fn best_match_for_header(header: &str, table: &HashMap<&'static str, &'static [&'static str]>) -> Option<&'static str> {
    let normalized_header = normalize(header);

    // Exact equality first, across all target fields.
    for (&target, synonyms) in table {
        if synonyms.iter().any(|syn| normalize(syn) == normalized_header) {
            return Some(target);
        }
    }

    let mut best: Option<(&'static str, u8, usize)> = None; // (target, score, synonym_len)
    for (&target, synonyms) in table {
        for syn in synonyms.iter() {
            let normalized_syn = normalize(syn);
            let score = if normalized_header.starts_with(&normalized_syn) {
                3
            } else if normalized_header.contains(&normalized_syn) {
                2
            } else if normalized_syn.contains(&normalized_header) {
                1
            } else {
                0
            };
            if score == 0 {
                continue;
            }
            let len = normalized_syn.len();
            let better = match best {
                None => true,
                Some((_, best_score, best_len)) => {
                    score > best_score || (score == best_score && len > best_len)
                }
            };
            if better {
                best = Some((target, score, len));
            }
        }
    }
    best.map(|(target, _, _)| target)
}

/// Map each original header to a target field, assigning each target field
/// at most once (first-wins across headers in input order).
pub fn map_headers(original_headers: &[String]) -> HashMap<String, String> {
    let table = synonym_table();
    let mut mapping = HashMap::new();
    let mut assigned: std::collections::HashSet<&'static str> = std::collections::HashSet::new();

    for header in original_headers {
        if let Some(target) = best_match_for_header(header, &table) {
            if !assigned.contains(target) {
                mapping.insert(header.clone(), target.to_string());
                assigned.insert(target);
            }
        }
    }
    mapping
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_synonym_match() {
        let mapping = map_headers(&["Produttore".to_string()]);
        assert_eq!(mapping.get("Produttore"), Some(&"producer".to_string()));
    }

    #[test]
    fn specific_match_prefers_longer_synonym() {
        // "regione/denominazione" contains both "regione" and shorter matches;
        // should still resolve to region via contains-match.
        let mapping = map_headers(&["regione/denominazione".to_string()]);
        assert_eq!(mapping.get("regione/denominazione"), Some(&"region".to_string()));
    }

    #[test]
    fn each_target_assigned_once() {
        let mapping = map_headers(&["nome".to_string(), "vino".to_string()]);
        let targets: std::collections::HashSet<_> = mapping.values().collect();
        assert_eq!(targets.len(), 1);
    }

    #[test]
    fn unmatched_header_is_absent() {
        let mapping = map_headers(&["xyz123".to_string()]);
        assert!(mapping.is_empty());
    }
}
