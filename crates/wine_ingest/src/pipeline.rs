//! Orchestrator tying the four stages together (spec §4.F), grounded in
//! `ingest/pipeline.py::process_file`'s escalation and hybrid-merge logic.

use tracing::{info, warn};

use wine_ids::CorrelationId;
use wine_protocol::tenant::Tenant;
use wine_validation::{dedup_wines, CanonicalWine, DedupStats, SourceStage};

use crate::config::Config;
use crate::error::IngestError;
use crate::gate::{route_file, Route};
use crate::llm::LlmClient;
use crate::ocr::OcrClient;
use crate::{stage1, stage2, stage3, stage4};

/// Which stage ultimately produced the wines returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalMethod {
    Stage1Classic,
    Stage2TargetedAi,
    Stage3LlmExtractor,
    /// Stage 3 ran but extracted nothing usable; the best rows from an
    /// earlier stage were kept instead (spec §4.F hybrid fallback).
    LlmModeFallbackPrevious,
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub wines: Vec<CanonicalWine>,
    pub stages_attempted: Vec<SourceStage>,
    pub final_method: FinalMethod,
    pub dedup_stats: Option<DedupStats>,
}

/// Run the full escalating pipeline over one uploaded file.
pub async fn process_file(
    bytes: &[u8],
    file_name: &str,
    tenant: &Tenant,
    correlation_id: &CorrelationId,
    config: &Config,
    llm: &dyn LlmClient,
    ocr: &dyn OcrClient,
) -> Result<PipelineOutcome, IngestError> {
    let (route, ext) = route_file(file_name, None)?;

    info!(
        tenant_user_id = tenant.user_id,
        correlation_id = %correlation_id,
        file_name,
        ext,
        ?route,
        "routing uploaded file"
    );

    match route {
        Route::CsvExcel => process_csv_excel(bytes, &ext, config, llm).await,
        Route::Ocr => process_ocr(bytes, &ext, config, llm, ocr).await,
    }
}

async fn process_csv_excel(
    bytes: &[u8],
    ext: &str,
    config: &Config,
    llm: &dyn LlmClient,
) -> Result<PipelineOutcome, IngestError> {
    let mut stages_attempted = vec![SourceStage::Stage1Classic];
    let stage1_outcome = stage1::run(bytes, ext, config)?;

    if !stage1_outcome.escalate_to_stage2 {
        return Ok(PipelineOutcome {
            wines: stage1_outcome.report.valid,
            stages_attempted,
            final_method: FinalMethod::Stage1Classic,
            dedup_stats: None,
        });
    }

    // Stage 1 wants to escalate. If Stage 2 is disabled we skip straight to
    // Stage 3 with Stage 1's valid rows carried forward, rather than
    // treating "disabled" as "Stage 1's output was good enough".
    let previous_stage_wines = if config.ia_targeted_enabled {
        stages_attempted.push(SourceStage::Stage2TargetedAi);
        let header_map = stage2::disambiguate_headers(&stage1_outcome.unmapped_headers, llm, config).await?;
        if !header_map.is_empty() {
            info!(resolved = header_map.len(), "stage 2 disambiguated ambiguous headers");
        }

        let rejected_rows: Vec<_> = stage1_outcome.report.rejected.iter().map(|(row, _)| row.clone()).collect();
        let repaired_rows = stage2::repair_ambiguous_rows(&rejected_rows, llm, config).await?;
        let stage2_outcome = stage2::finalize(repaired_rows, config);

        let mut previous_stage_wines = stage1_outcome.report.valid;
        previous_stage_wines.extend(stage2_outcome.report.valid.clone());

        if !stage2_outcome.escalate_to_stage3 {
            return Ok(PipelineOutcome {
                wines: previous_stage_wines,
                stages_attempted,
                final_method: FinalMethod::Stage2TargetedAi,
                dedup_stats: None,
            });
        }
        previous_stage_wines
    } else {
        info!("stage 2 disabled, escalating straight to stage 3");
        stage1_outcome.report.valid
    };

    if !config.llm_fallback_enabled {
        warn!("stage 3 disabled and earlier stages did not produce a usable result");
        return Err(IngestError::StageDisabled);
    }

    stages_attempted.push(SourceStage::Stage3LlmExtractor);
    let text = stage3::prepare_text_input(bytes, ext)?;
    let stage3_wines = run_stage3_extraction(&text, llm, config).await;

    hybrid_merge_or_fallback(stage3_wines, previous_stage_wines, stages_attempted)
}

async fn process_ocr(
    bytes: &[u8],
    ext: &str,
    config: &Config,
    llm: &dyn LlmClient,
    ocr: &dyn OcrClient,
) -> Result<PipelineOutcome, IngestError> {
    let stages_attempted = vec![SourceStage::Stage3LlmExtractor];
    let stage4_outcome = stage4::run(bytes, ext, ocr, config).await?;

    let stage3_wines = run_stage3_extraction(&stage4_outcome.text, llm, config).await;

    match stage3_wines {
        Some(wines) if !wines.is_empty() => Ok(PipelineOutcome {
            wines,
            stages_attempted,
            final_method: FinalMethod::Stage3LlmExtractor,
            dedup_stats: None,
        }),
        _ => Err(IngestError::NoRowsExtracted),
    }
}

/// Run Stage 3 over every chunk of `text`, tolerating individual chunk
/// failures (a scanned page with no wines, a transient LLM hiccup) as long
/// as at least one chunk yields something. Returns `None` only if every
/// chunk failed outright.
async fn run_stage3_extraction(text: &str, llm: &dyn LlmClient, config: &Config) -> Option<Vec<CanonicalWine>> {
    let chunks = stage3::chunk_text(text);
    let mut all_rows = Vec::new();
    let mut any_chunk_succeeded = false;

    for chunk in &chunks {
        match stage3::extract_with_llm(chunk, llm, config).await {
            Ok(rows) => {
                any_chunk_succeeded = true;
                all_rows.extend(rows);
            }
            Err(e) => warn!(error = %e, "stage 3 chunk extraction failed, continuing"),
        }
    }

    if !any_chunk_succeeded {
        return None;
    }

    let report = stage3::validate(all_rows);
    Some(report.valid)
}

fn hybrid_merge_or_fallback(
    stage3_wines: Option<Vec<CanonicalWine>>,
    previous_stage_wines: Vec<CanonicalWine>,
    stages_attempted: Vec<SourceStage>,
) -> Result<PipelineOutcome, IngestError> {
    match stage3_wines {
        Some(wines) if !wines.is_empty() => {
            let mut merged = wines;
            merged.extend(previous_stage_wines);
            let (deduped, stats) = dedup_wines(merged);
            Ok(PipelineOutcome {
                wines: deduped,
                stages_attempted,
                final_method: FinalMethod::Stage3LlmExtractor,
                dedup_stats: Some(stats),
            })
        }
        _ if !previous_stage_wines.is_empty() => {
            warn!("stage 3 produced nothing usable, falling back to earlier stage's rows");
            Ok(PipelineOutcome {
                wines: previous_stage_wines,
                stages_attempted,
                final_method: FinalMethod::LlmModeFallbackPrevious,
                dedup_stats: None,
            })
        }
        _ => Err(IngestError::NoRowsExtracted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::fakes::ScriptedLlmClient;
    use crate::ocr::fakes::FixedOcrClient;
    use wine_protocol::tenant::Tenant;

    #[tokio::test]
    async fn clean_csv_stops_at_stage1() {
        let bytes = b"Nome,Produttore,Annata,Quantita\nBarolo,Rossi,2015,10\n".to_vec();
        let llm = ScriptedLlmClient::new(vec![]);
        let ocr = FixedOcrClient { text: String::new(), pages: 0 };
        let outcome = process_file(
            &bytes,
            "list.csv",
            &Tenant::new(1, "Trattoria"),
            &CorrelationId::new(),
            &Config::default(),
            &llm,
            &ocr,
        )
        .await
        .unwrap();
        assert_eq!(outcome.final_method, FinalMethod::Stage1Classic);
        assert_eq!(outcome.wines.len(), 1);
    }

    #[tokio::test]
    async fn ocr_route_extracts_via_stage3() {
        let bytes = b"fake-scan-bytes".to_vec();
        let llm = ScriptedLlmClient::new(vec![r#"[{"name": "Barolo", "quantity": 6}]"#]);
        let ocr = FixedOcrClient { text: "Barolo | Rossi | 2015 | 6".to_string(), pages: 1 };
        let outcome = process_file(
            &bytes,
            "scan.png",
            &Tenant::new(2, "Enoteca"),
            &CorrelationId::new(),
            &Config::default(),
            &llm,
            &ocr,
        )
        .await
        .unwrap();
        assert_eq!(outcome.final_method, FinalMethod::Stage3LlmExtractor);
        assert_eq!(outcome.wines[0].name, "Barolo");
    }

    #[tokio::test]
    async fn disabled_stage2_skips_straight_to_stage3_instead_of_accepting_stage1() {
        let bytes = b"a,b,c\n1,2,3\n4,5,6\n".to_vec();
        let llm = ScriptedLlmClient::new(vec![r#"[{"name": "Barolo", "quantity": 6}]"#]);
        let ocr = FixedOcrClient { text: String::new(), pages: 0 };
        let config = Config { ia_targeted_enabled: false, ..Config::default() };
        let outcome = process_file(
            &bytes,
            "list.csv",
            &Tenant::new(1, "Trattoria"),
            &CorrelationId::new(),
            &config,
            &llm,
            &ocr,
        )
        .await
        .unwrap();
        assert_eq!(outcome.final_method, FinalMethod::Stage3LlmExtractor);
    }

    #[tokio::test]
    async fn disabled_stage3_errors_instead_of_accepting_earlier_output() {
        let bytes = b"a,b,c\n1,2,3\n4,5,6\n".to_vec();
        let llm = ScriptedLlmClient::new(vec![]);
        let ocr = FixedOcrClient { text: String::new(), pages: 0 };
        let config = Config { llm_fallback_enabled: false, ..Config::default() };
        let result = process_file(
            &bytes,
            "list.csv",
            &Tenant::new(1, "Trattoria"),
            &CorrelationId::new(),
            &config,
            &llm,
            &ocr,
        )
        .await;
        assert!(matches!(result, Err(IngestError::StageDisabled)));
    }

    #[tokio::test]
    async fn disabled_ocr_errors_on_the_ocr_route() {
        let bytes = b"fake-scan-bytes".to_vec();
        let llm = ScriptedLlmClient::new(vec![]);
        let ocr = FixedOcrClient { text: "Barolo".to_string(), pages: 1 };
        let config = Config { ocr_enabled: false, ..Config::default() };
        let result = process_file(
            &bytes,
            "scan.png",
            &Tenant::new(2, "Enoteca"),
            &CorrelationId::new(),
            &config,
            &llm,
            &ocr,
        )
        .await;
        assert!(matches!(result, Err(IngestError::StageDisabled)));
    }
}
