//! Canonical wine row and the closed error/reason enums around it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A loosely-typed input row: header name to raw string value, as produced
/// by Stage 1's CSV/Excel reader or Stage 2/3's LLM JSON response.
pub type RawRow = HashMap<String, String>;

/// Which escalation stage produced a row. Used for dedup merge priority
/// (Stage 1 > Stage 2 > Stage 3, see [`crate::dedup`]) and carried through
/// to the job's `processing_method`/`stage_used` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SourceStage {
    Stage1Classic,
    Stage2TargetedAi,
    Stage3LlmExtractor,
}

impl SourceStage {
    /// Lower is higher priority in merges: Stage 1 wins over Stage 2 wins over Stage 3.
    pub fn priority(self) -> u8 {
        match self {
            SourceStage::Stage1Classic => 0,
            SourceStage::Stage2TargetedAi => 1,
            SourceStage::Stage3LlmExtractor => 2,
        }
    }
}

/// One of the four recognized wine categories, or `Altro` for everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WineType {
    Rosso,
    Bianco,
    Rosato,
    Spumante,
    Altro,
}

impl std::fmt::Display for WineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WineType::Rosso => "Rosso",
            WineType::Bianco => "Bianco",
            WineType::Rosato => "Rosato",
            WineType::Spumante => "Spumante",
            WineType::Altro => "Altro",
        };
        write!(f, "{s}")
    }
}

/// Why a row was rejected outright rather than coerced with an absent field.
///
/// Every other coercion rule in §4.A degrades a single attribute to absent;
/// only the name check can reject the whole row (spec invariant I2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error, Serialize, Deserialize)]
pub enum RejectionReason {
    #[error("name is empty after trimming")]
    EmptyName,
    #[error("name is a placeholder token")]
    PlaceholderName,
}

/// Alias kept for the library/application error-handling split: every
/// rejection this crate produces is one of the closed reasons above.
pub type ValidationError = RejectionReason;

/// A fully coerced wine row, ready for dedup and storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalWine {
    pub name: String,
    pub producer: Option<String>,
    pub supplier: Option<String>,
    pub vintage: Option<i32>,
    pub grape_variety: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub wine_type: WineType,
    pub classification: Option<String>,
    pub quantity: i64,
    pub min_quantity: i64,
    pub cost_price: Option<f64>,
    pub selling_price: Option<f64>,
    pub alcohol_content: Option<f64>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub source_stage: SourceStage,
}
