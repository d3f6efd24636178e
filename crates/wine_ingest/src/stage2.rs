//! Stage 2: targeted AI repair (spec §4.F stage 2), grounded in
//! `ingest/llm_targeted.py`'s header-disambiguation + row-repair calls.

use std::collections::HashMap;

use serde::Deserialize;

use crate::config::Config;
use crate::error::IngestError;
use crate::llm::{LlmClient, LlmRequest};
use wine_validation::{validate_batch, BatchReport, RawRow, SourceStage};

/// Outcome of running Stage 2 over the rows Stage 1 could not classify.
#[derive(Debug, Clone)]
pub struct Stage2Outcome {
    pub report: BatchReport,
    pub escalate_to_stage3: bool,
}

/// Ask the model to map ambiguous original headers onto the canonical
/// field names, returning only the headers it could confidently resolve.
pub async fn disambiguate_headers(
    unmapped_headers: &[String],
    llm: &dyn LlmClient,
    config: &Config,
) -> Result<HashMap<String, String>, IngestError> {
    if unmapped_headers.is_empty() {
        return Ok(HashMap::new());
    }

    let prompt = format!(
        "Map each of these spreadsheet column headers to one of: name, producer, vintage, \
         grape_variety, region, country, wine_type, classification, quantity, min_quantity, \
         cost_price, selling_price, alcohol_content, description, notes. If a header does not \
         correspond to any of them, map it to null. Respond with a single JSON object whose keys \
         are the original headers and values are the target field name or null.\n\nHeaders: {}",
        unmapped_headers.join(", ")
    );

    let response = llm
        .complete(LlmRequest {
            model: config.llm_model_targeted.clone(),
            prompt,
            max_tokens: config.max_llm_tokens,
        })
        .await
        .map_err(|e| IngestError::LlmCall(e.to_string()))?;

    let parsed: HashMap<String, Option<String>> =
        serde_json::from_str(response.text.trim()).map_err(|e| IngestError::LlmCall(e.to_string()))?;

    Ok(parsed.into_iter().filter_map(|(k, v)| v.map(|target| (k, target))).collect())
}

#[derive(Debug, Deserialize)]
struct RepairedRow(HashMap<String, String>);

/// Ask the model to fill in missing canonical fields for a batch of rows
/// that Stage 1 could not fully validate, capped at `batch_size_ambiguous_rows`.
pub async fn repair_ambiguous_rows(
    rows: &[RawRow],
    llm: &dyn LlmClient,
    config: &Config,
) -> Result<Vec<RawRow>, IngestError> {
    let mut repaired = Vec::with_capacity(rows.len());

    for batch in rows.chunks(config.batch_size_ambiguous_rows) {
        let serialized = serde_json::to_string(batch).map_err(|e| IngestError::LlmCall(e.to_string()))?;
        let prompt = format!(
            "Each JSON object below is a partially-recognized wine inventory row. Fill in any \
             missing fields you can infer from the values already present (do not invent values \
             you cannot infer). Respond with a JSON array of objects in the same order, using the \
             same field names.\n\nRows: {serialized}"
        );

        let response = llm
            .complete(LlmRequest {
                model: config.llm_model_targeted.clone(),
                prompt,
                max_tokens: config.max_llm_tokens * batch.len().max(1) as u32,
            })
            .await
            .map_err(|e| IngestError::LlmCall(e.to_string()))?;

        let rows: Vec<RepairedRow> =
            serde_json::from_str(response.text.trim()).map_err(|e| IngestError::LlmCall(e.to_string()))?;
        repaired.extend(rows.into_iter().map(|r| r.0));
    }

    Ok(repaired)
}

/// Validate the repaired rows and decide whether Stage 3 is still needed.
/// Whether Stage 3 itself runs is the caller's decision
/// (`config.llm_fallback_enabled` gates execution, not this judgment).
pub fn finalize(rows: Vec<RawRow>, config: &Config) -> Stage2Outcome {
    let report = validate_batch(rows, SourceStage::Stage2TargetedAi);
    let escalate_to_stage3 = report.valid_fraction() < config.min_valid_rows;
    Stage2Outcome { report, escalate_to_stage3 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::fakes::ScriptedLlmClient;

    #[tokio::test]
    async fn disambiguates_headers_from_llm_json() {
        let llm = ScriptedLlmClient::new(vec![r#"{"Vino": "name", "Colore_Bottiglia": null}"#]);
        let config = Config::default();
        let mapping = disambiguate_headers(&["Vino".to_string(), "Colore_Bottiglia".to_string()], &llm, &config)
            .await
            .unwrap();
        assert_eq!(mapping.get("Vino"), Some(&"name".to_string()));
        assert!(!mapping.contains_key("Colore_Bottiglia"));
    }

    #[tokio::test]
    async fn repairs_rows_via_llm_batch() {
        let llm = ScriptedLlmClient::new(vec![r#"[{"name": "Barolo", "producer": "Rossi"}]"#]);
        let config = Config::default();
        let rows = vec![RawRow::from([("name".to_string(), "Barolo".to_string())])];
        let repaired = repair_ambiguous_rows(&rows, &llm, &config).await.unwrap();
        assert_eq!(repaired[0].get("producer"), Some(&"Rossi".to_string()));
    }

    #[test]
    fn finalize_escalates_when_still_below_threshold() {
        let rows = vec![RawRow::from([("name".to_string(), "".to_string())])];
        let outcome = finalize(rows, &Config::default());
        assert!(outcome.escalate_to_stage3);
    }
}
