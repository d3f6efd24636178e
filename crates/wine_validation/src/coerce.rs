//! Field-level coercion rules (spec §4.A).
//!
//! Each function takes a raw string and returns the coerced value, or
//! `None` when the rule says the field degrades to absent. Grounded in
//! `csv_processor.py::extract_wine_data_from_row`'s per-field regex
//! cleanup, generalized to the exact thresholds spec.md requires (the
//! original's looser defaults, e.g. quantity defaulting to 1, are not
//! carried over where spec.md is explicit).

use crate::types::WineType;
use regex::Regex;
use std::sync::OnceLock;

fn vintage_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap())
}

fn digits_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-?\d+").unwrap())
}

fn money_chars_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\d.,\-]").unwrap())
}

/// Extract the first 4-digit year in 1900..2099, from an integer-looking
/// or free-text string. Years outside that range are treated as absent.
pub fn coerce_vintage(raw: &str) -> Option<i32> {
    let trimmed = raw.trim();
    if let Ok(year) = trimmed.parse::<i32>() {
        if (1900..=2099).contains(&year) {
            return Some(year);
        }
    }
    let m = vintage_re().find(trimmed)?;
    m.as_str().parse::<i32>().ok().filter(|y| (1900..=2099).contains(y))
}

/// Extract the first non-negative integer; absent or negative collapses to 0.
pub fn coerce_quantity(raw: &str) -> i64 {
    let trimmed = raw.trim();
    match digits_re().find(trimmed) {
        Some(m) => m.as_str().parse::<i64>().unwrap_or(0).max(0),
        None => 0,
    }
}

/// Parse a monetary field: strip currency symbols, resolve comma ambiguity,
/// reject negative results to absent.
pub fn coerce_money(raw: &str) -> Option<f64> {
    let stripped = money_chars_re().replace_all(raw.trim(), "");
    if stripped.is_empty() {
        return None;
    }

    let has_dot = stripped.contains('.');
    let normalized = if stripped.contains(',') {
        if has_dot {
            // comma as thousands separator: "1,234.56" -> "1234.56"
            stripped.replace(',', "")
        } else {
            // comma as decimal separator: "12,50" -> "12.50"
            stripped.replace(',', ".")
        }
    } else {
        stripped.to_string()
    };

    let value: f64 = normalized.parse().ok()?;
    if value < 0.0 {
        None
    } else {
        Some(value)
    }
}

/// Parse an alcohol-by-volume percentage: strip `%`/`vol`, clamp-reject
/// outside 0..100 to absent.
pub fn coerce_alcohol_content(raw: &str) -> Option<f64> {
    let cleaned = raw
        .trim()
        .to_lowercase()
        .replace('%', "")
        .replace("vol", "");
    let cleaned = cleaned.trim().replace(',', ".");
    let value: f64 = cleaned.parse().ok()?;
    if (0.0..=100.0).contains(&value) {
        Some(value)
    } else {
        None
    }
}

/// Resolve a wine's type from an explicit type column, falling back to
/// name-keyword heuristics, falling back to `Altro`.
pub fn coerce_wine_type(raw_type: Option<&str>, name: &str) -> WineType {
    if let Some(raw) = raw_type {
        if let Some(exact) = match_explicit_type(raw) {
            return exact;
        }
    }
    classify_from_keywords(name)
}

fn match_explicit_type(raw: &str) -> Option<WineType> {
    let lower = raw.trim().to_lowercase();
    match lower.as_str() {
        "rosso" | "red" => Some(WineType::Rosso),
        "bianco" | "white" => Some(WineType::Bianco),
        "rosato" | "rose" | "rosé" => Some(WineType::Rosato),
        "spumante" | "sparkling" => Some(WineType::Spumante),
        _ => None,
    }
}

const RED_KEYWORDS: &[&str] = &[
    "rosso", "red", "nero", "black", "sangiovese", "barbera", "nebbiolo", "cabernet", "merlot",
    "pinot noir", "syrah", "shiraz",
];
const WHITE_KEYWORDS: &[&str] = &[
    "bianco", "white", "chardonnay", "pinot grigio", "sauvignon", "riesling", "gewurztraminer",
    "moscato",
];
const ROSE_KEYWORDS: &[&str] = &["rosato", "rose", "rosé", "pink"];
const SPARKLING_KEYWORDS: &[&str] = &[
    "spumante", "champagne", "prosecco", "frizzante", "sparkling", "cava", "cremant",
];

fn classify_from_keywords(name: &str) -> WineType {
    let lower = name.to_lowercase();
    // Sparkling/moscato-style keywords are checked before red/white so
    // "moscato" classifies as Spumante, matching the original's ordering.
    if SPARKLING_KEYWORDS.iter().any(|k| lower.contains(k)) || lower.contains("moscato") {
        return WineType::Spumante;
    }
    if RED_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return WineType::Rosso;
    }
    if WHITE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return WineType::Bianco;
    }
    if ROSE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return WineType::Rosato;
    }
    WineType::Altro
}
