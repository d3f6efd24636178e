//! Runtime configuration (spec §6 AMBIENT — Configuration), grounded in
//! `casparian::WorkerArgs`'s clap(derive, env) shape and `core/config.py`'s
//! `get_config()` singleton: every policy knob is an environment variable
//! with a `WINE_` prefix, optionally overridden by a TOML file.

use std::path::PathBuf;

use clap::Args;
use serde::{Deserialize, Serialize};

/// Base directory override, standing in for the teacher's `CASPARIAN_HOME`.
/// Delegates to `wine_logging::wine_home` so the database, the
/// notification log and the rolling log files all resolve against the
/// same `WINE_HOME`.
pub fn wine_home() -> PathBuf {
    wine_logging::wine_home()
}

pub fn default_db_path() -> PathBuf {
    wine_home().join("wine.sqlite3")
}

pub fn default_notifications_log_path() -> PathBuf {
    wine_home().join("notifications.jsonl")
}

/// Every policy knob from spec §6, plus the ambient worker-pool and
/// home-directory settings. Deserializable from environment variables
/// (`clap`'s `env` feature) and mergeable with an optional TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, Args)]
pub struct Config {
    /// Base directory for the database file and notification log.
    #[arg(long, env = "WINE_HOME")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wine_home: Option<PathBuf>,

    #[arg(long, env = "WINE_DB_PATH")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,

    #[arg(long, env = "WINE_DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub db_max_connections: u32,

    /// Size of the in-process ingestion worker pool (spec §5).
    #[arg(long, env = "WINE_INGEST_WORKER_COUNT")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingest_worker_count: Option<usize>,

    #[arg(long, env = "WINE_IA_TARGETED_ENABLED", default_value_t = true)]
    pub ia_targeted_enabled: bool,

    #[arg(long, env = "WINE_LLM_FALLBACK_ENABLED", default_value_t = true)]
    pub llm_fallback_enabled: bool,

    #[arg(long, env = "WINE_OCR_ENABLED", default_value_t = true)]
    pub ocr_enabled: bool,

    #[arg(long, env = "WINE_SCHEMA_SCORE_TH", default_value_t = 0.7)]
    pub schema_score_th: f64,

    #[arg(long, env = "WINE_MIN_VALID_ROWS", default_value_t = 0.6)]
    pub min_valid_rows: f64,

    #[arg(long, env = "WINE_BATCH_SIZE_AMBIGUOUS_ROWS", default_value_t = 20)]
    pub batch_size_ambiguous_rows: usize,

    #[arg(long, env = "WINE_MAX_LLM_TOKENS", default_value_t = 300)]
    pub max_llm_tokens: u32,

    #[arg(long, env = "WINE_LLM_MODEL_TARGETED", default_value = "gpt-4o-mini")]
    pub llm_model_targeted: String,

    #[arg(long, env = "WINE_LLM_MODEL_EXTRACT", default_value = "gpt-4o")]
    pub llm_model_extract: String,

    #[arg(long, env = "WINE_DB_INSERT_BATCH_SIZE", default_value_t = 500)]
    pub db_insert_batch_size: usize,

    #[arg(long, env = "WINE_ALERT_STAGE3_FAILURE_COUNT", default_value_t = 5)]
    pub alert_stage3_failure_count: u32,

    #[arg(long, env = "WINE_ALERT_STAGE3_WINDOW_MINUTES", default_value_t = 60)]
    pub alert_stage3_window_minutes: i64,

    #[arg(long, env = "WINE_ALERT_LLM_COST_EUR", default_value_t = 0.50)]
    pub alert_llm_cost_eur: f64,

    #[arg(long, env = "WINE_ALERT_LLM_COST_WINDOW_MINUTES", default_value_t = 60)]
    pub alert_llm_cost_window_minutes: i64,

    #[arg(long, env = "WINE_ALERT_ERROR_COUNT", default_value_t = 10)]
    pub alert_error_count: u32,

    #[arg(long, env = "WINE_ALERT_ERROR_WINDOW_MINUTES", default_value_t = 60)]
    pub alert_error_window_minutes: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            wine_home: None,
            db_path: None,
            db_max_connections: 5,
            ingest_worker_count: None,
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
            alert_stage3_failure_count: 5,
            alert_stage3_window_minutes: 60,
            alert_llm_cost_eur: 0.50,
            alert_llm_cost_window_minutes: 60,
            alert_error_count: 10,
            alert_error_window_minutes: 60,
        }
    }
}

impl Config {
    /// Load a complete `Config` from a TOML file, overriding whatever
    /// `clap`/env produced. Mirrors `core/config.py`'s file-backed
    /// settings object; unlike that Python singleton, the file here is a
    /// full override rather than a partial patch, since `clap`/env has
    /// already applied spec-default values by the time this runs.
    pub fn from_toml_file(path: &std::path::Path) -> anyhow::Result<Config> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| anyhow::anyhow!("invalid config file {}: {e}", path.display()))
    }

    pub fn resolved_wine_home(&self) -> PathBuf {
        self.wine_home.clone().unwrap_or_else(wine_home)
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| self.resolved_wine_home().join("wine.sqlite3"))
    }

    pub fn resolved_worker_count(&self) -> usize {
        self.ingest_worker_count.unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
    }

    pub fn ingest_config(&self) -> wine_ingest::Config {
        wine_ingest::Config {
            ia_targeted_enabled: self.ia_targeted_enabled,
            llm_fallback_enabled: self.llm_fallback_enabled,
            ocr_enabled: self.ocr_enabled,
            schema_score_th: self.schema_score_th,
            min_valid_rows: self.min_valid_rows,
            batch_size_ambiguous_rows: self.batch_size_ambiguous_rows,
            max_llm_tokens: self.max_llm_tokens,
            llm_model_targeted: self.llm_model_targeted.clone(),
            llm_model_extract: self.llm_model_extract.clone(),
            db_insert_batch_size: self.db_insert_batch_size,
        }
    }

    pub fn alert_thresholds(&self) -> wine_alerts::AlertThresholds {
        wine_alerts::AlertThresholds {
            stage3_failure_count: self.alert_stage3_failure_count,
            stage3_window_minutes: self.alert_stage3_window_minutes,
            llm_cost_eur: self.alert_llm_cost_eur,
            llm_cost_window_minutes: self.alert_llm_cost_window_minutes,
            error_count: self.alert_error_count,
            error_window_minutes: self.alert_error_window_minutes,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.schema_score_th, 0.7);
        assert_eq!(config.llm_model_extract, "gpt-4o");
        assert_eq!(config.alert_llm_cost_eur, 0.50);
    }

    #[test]
    fn worker_count_falls_back_to_available_parallelism() {
        let config = Config::default();
        assert!(config.resolved_worker_count() >= 1);
    }

    #[test]
    fn ingest_config_carries_policy_knobs_through() {
        let mut config = Config::default();
        config.schema_score_th = 0.9;
        let ingest_config = config.ingest_config();
        assert_eq!(ingest_config.schema_score_th, 0.9);
    }

    #[test]
    fn round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.schema_score_th, config.schema_score_th);
        assert_eq!(parsed.llm_model_extract, config.llm_model_extract);
    }
}
