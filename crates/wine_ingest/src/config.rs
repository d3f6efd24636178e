//! Pipeline policy knobs (spec §6 Configuration), grounded in
//! `core/config.py`'s `get_config()` settings object.

/// Configuration controlling which stages run and their decision thresholds.
#[derive(Debug, Clone)]
pub struct Config {
    pub ia_targeted_enabled: bool,
    pub llm_fallback_enabled: bool,
    pub ocr_enabled: bool,
    pub schema_score_th: f64,
    pub min_valid_rows: f64,
    pub batch_size_ambiguous_rows: usize,
    pub max_llm_tokens: u32,
    pub llm_model_targeted: String,
    pub llm_model_extract: String,
    pub db_insert_batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ia_targeted_enabled: true,
            llm_fallback_enabled: true,
            ocr_enabled: true,
            schema_score_th: 0.7,
            min_valid_rows: 0.6,
            batch_size_ambiguous_rows: 20,
            max_llm_tokens: 300,
            llm_model_targeted: "gpt-4o-mini".to_string(),
            llm_model_extract: "gpt-4o".to_string(),
            db_insert_batch_size: 500,
        }
    }
}
