//! Stage 3: LLM extractor (spec §4.F stage 3), grounded in
//! `ingest/llm_extract.py`'s text-preparation, chunking and
//! `extract_with_llm` JSON-recovery cascade.

use regex::Regex;
use serde_json::Value;

use crate::config::Config;
use crate::encoding;
use crate::error::IngestError;
use crate::llm::{LlmClient, LlmRequest};
use wine_validation::{validate_batch, BatchReport, RawRow, SourceStage};

const MAX_INPUT_CHARS: usize = 80 * 1024;
const CHUNK_SIZE: usize = 40 * 1024;
const CHUNK_OVERLAP: usize = 1024;

/// Flatten a CSV/Excel file into plain text for the LLM prompt, deduping
/// repeated header lines and capping total size.
pub fn prepare_text_input(bytes: &[u8], ext: &str) -> Result<String, IngestError> {
    if bytes.is_empty() {
        return Err(IngestError::EmptyFile);
    }

    let text = match ext {
        "csv" | "tsv" => {
            let (decoded, _) = encoding::detect_and_decode(bytes);
            dedup_header_lines(&decoded)
        }
        "xlsx" | "xls" => excel_to_pipe_text(bytes, ext)?,
        other => return Err(IngestError::UnsupportedExtension(other.to_string())),
    };

    Ok(truncate_chars(&text, MAX_INPUT_CHARS))
}

fn dedup_header_lines(text: &str) -> String {
    let mut seen_header: Option<&str> = None;
    let mut out_lines = Vec::new();
    for line in text.lines() {
        if seen_header.is_none() {
            seen_header = Some(line);
            out_lines.push(line);
        } else if Some(line) == seen_header {
            continue;
        } else {
            out_lines.push(line);
        }
    }
    out_lines.join("\n")
}

fn excel_to_pipe_text(bytes: &[u8], ext: &str) -> Result<String, IngestError> {
    use crate::stage1;
    // Stage 1's excel reader already gives us (header, rows); we don't
    // validate here, just serialize every cell as "value | value".
    let (headers, rows) = stage1::read_excel_rows(bytes, ext)?;
    let mut lines = vec![headers.join(" | ")];
    for row in rows {
        lines.push(row.into_iter().map(|(_, v)| v).collect::<Vec<_>>().join(" | "));
    }
    Ok(lines.join("\n"))
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}

/// Split text into overlapping chunks, snapping chunk boundaries to the
/// nearest preceding newline within the overlap window so rows aren't split.
pub fn chunk_text(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    if bytes.len() <= CHUNK_SIZE {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < bytes.len() {
        let mut end = (start + CHUNK_SIZE).min(bytes.len());
        if end < bytes.len() {
            let window_start = end.saturating_sub(CHUNK_OVERLAP);
            if let Some(rel_nl) = text[window_start..end].rfind('\n') {
                end = window_start + rel_nl + 1;
            }
        }
        chunks.push(text[start..end].to_string());
        if end <= start {
            break;
        }
        start = end.saturating_sub(CHUNK_OVERLAP.min(end));
        if start >= bytes.len() {
            break;
        }
    }
    chunks
}

/// Four-step JSON recovery cascade for an LLM extraction response:
/// direct parse, regex array extraction, balanced-brace object extraction,
/// and finally a retry prompt over a reduced input.
pub async fn extract_with_llm(
    chunk: &str,
    llm: &dyn LlmClient,
    config: &Config,
) -> Result<Vec<RawRow>, IngestError> {
    let prompt = extraction_prompt(chunk);
    let response = llm
        .complete(LlmRequest {
            model: config.llm_model_extract.clone(),
            prompt,
            max_tokens: config.max_llm_tokens,
        })
        .await
        .map_err(|e| IngestError::LlmCall(e.to_string()))?;

    if let Some(rows) = parse_direct(&response.text) {
        return Ok(rows);
    }
    if let Some(rows) = parse_via_array_regex(&response.text) {
        return Ok(rows);
    }
    if let Some(rows) = parse_via_balanced_braces(&response.text) {
        if !rows.is_empty() {
            return Ok(rows);
        }
    }

    // Final retry: reduced input, in case the failure came from an
    // oversized or truncated chunk rather than a malformed response.
    let reduced = truncate_chars(chunk, chunk.len() / 2);
    let retry_prompt = extraction_prompt(&reduced);
    let retry_response = llm
        .complete(LlmRequest {
            model: config.llm_model_extract.clone(),
            prompt: retry_prompt,
            max_tokens: config.max_llm_tokens,
        })
        .await
        .map_err(|e| IngestError::LlmCall(e.to_string()))?;

    parse_direct(&retry_response.text)
        .or_else(|| parse_via_array_regex(&retry_response.text))
        .or_else(|| parse_via_balanced_braces(&retry_response.text))
        .filter(|rows| !rows.is_empty())
        .ok_or(IngestError::NoRowsExtracted)
}

fn extraction_prompt(text: &str) -> String {
    format!(
        "Extract every wine inventory row from the text below into a JSON array of objects with \
         keys from: name, producer, vintage, grape_variety, region, country, wine_type, \
         classification, quantity, min_quantity, cost_price, selling_price, alcohol_content, \
         description, notes. Omit fields you cannot find. Respond with only the JSON array.\n\n{text}"
    )
}

fn value_to_row(value: &Value) -> Option<RawRow> {
    let obj = value.as_object()?;
    Some(
        obj.iter()
            .filter_map(|(k, v)| scalar_to_string(v).map(|s| (k.clone(), s)))
            .collect(),
    )
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_direct(text: &str) -> Option<Vec<RawRow>> {
    let value: Value = serde_json::from_str(text.trim()).ok()?;
    rows_from_array_value(&value)
}

fn rows_from_array_value(value: &Value) -> Option<Vec<RawRow>> {
    let array = value.as_array()?;
    Some(array.iter().filter_map(value_to_row).collect())
}

fn parse_via_array_regex(text: &str) -> Option<Vec<RawRow>> {
    let re = Regex::new(r"(?s)\[.*\]").ok()?;
    let matched = re.find(text)?;
    let value: Value = serde_json::from_str(matched.as_str()).ok()?;
    rows_from_array_value(&value)
}

/// Scan for top-level balanced `{...}` objects, tracking string/escape
/// state so braces inside quoted strings don't confuse the stack, and
/// parse each one independently.
fn parse_via_balanced_braces(text: &str) -> Option<Vec<RawRow>> {
    let mut rows = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0usize;
    let mut depth = 0i32;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else {
            match c {
                '"' => in_string = true,
                '{' => {
                    if depth == 0 {
                        start = i;
                    }
                    depth += 1;
                }
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let candidate: String = chars[start..=i].iter().collect();
                        if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
                            if let Some(row) = value_to_row(&value) {
                                rows.push(row);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }

    Some(rows)
}

/// Validate extracted rows, producing the batch report Stage 3's caller
/// uses to decide between hybrid merge and fallback-to-previous-stage.
pub fn validate(rows: Vec<RawRow>) -> BatchReport {
    validate_batch(rows, SourceStage::Stage3LlmExtractor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::fakes::ScriptedLlmClient;

    #[test]
    fn chunks_long_text_on_line_boundaries() {
        let line = "a".repeat(100);
        let text = std::iter::repeat(line.clone()).take(1000).collect::<Vec<_>>().join("\n");
        let chunks = chunk_text(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.ends_with('\n'));
        }
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        assert_eq!(chunk_text("short text").len(), 1);
    }

    #[test]
    fn parses_direct_json_array() {
        let text = r#"[{"name": "Barolo", "quantity": 5}]"#;
        let rows = parse_direct(text).unwrap();
        assert_eq!(rows[0].get("name"), Some(&"Barolo".to_string()));
    }

    #[test]
    fn recovers_array_embedded_in_prose() {
        let text = "Sure, here are the wines:\n[{\"name\": \"Chianti\"}]\nLet me know if you need more.";
        let rows = parse_via_array_regex(text).unwrap();
        assert_eq!(rows[0].get("name"), Some(&"Chianti".to_string()));
    }

    #[test]
    fn recovers_balanced_objects_without_enclosing_array() {
        let text = "{\"name\": \"Barolo\"} garbage {\"name\": \"Chianti, \\\"Riserva\\\"\"}";
        let rows = parse_via_balanced_braces(text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("name"), Some(&"Chianti, \"Riserva\"".to_string()));
    }

    #[tokio::test]
    async fn extract_with_llm_uses_direct_parse_when_clean() {
        let llm = ScriptedLlmClient::new(vec![r#"[{"name": "Barolo"}]"#]);
        let config = Config::default();
        let rows = extract_with_llm("some text", &llm, &config).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn extract_with_llm_retries_on_unparseable_response() {
        let llm = ScriptedLlmClient::new(vec!["not json at all", r#"[{"name": "Chianti"}]"#]);
        let config = Config::default();
        let rows = extract_with_llm("some text", &llm, &config).await.unwrap();
        assert_eq!(rows[0].get("name"), Some(&"Chianti".to_string()));
    }
}
