//! Stage 1: classic parser (spec §4.F stage 1), grounded in
//! `ingest/pipeline.py`'s header-mapping + schema-score path and
//! `csv_processor.py`'s delimiter sniffing.

use std::io::Cursor;

use calamine::{open_workbook_from_rw, Data, Reader, Xls, Xlsx};

use crate::config::Config;
use crate::encoding;
use crate::error::IngestError;
use crate::headers;
use wine_validation::{validate_batch, BatchReport, RawRow, SourceStage};

const CANDIDATE_DELIMITERS: &[u8] = b",;\t|";

/// Outcome of running Stage 1 over one file.
#[derive(Debug, Clone)]
pub struct Stage1Outcome {
    pub report: BatchReport,
    /// Fraction of original headers that mapped to a recognized target field.
    pub schema_score: f64,
    pub escalate_to_stage2: bool,
    /// Original header names Stage 1's synonym table could not resolve;
    /// Stage 2 asks the model to disambiguate these.
    pub unmapped_headers: Vec<String>,
}

/// Read and validate a CSV/TSV/Excel file, scoring how well its headers and
/// rows matched the canonical schema.
pub fn run(bytes: &[u8], ext: &str, config: &Config) -> Result<Stage1Outcome, IngestError> {
    if bytes.is_empty() {
        return Err(IngestError::EmptyFile);
    }

    let (headers_row, rows) = match ext {
        "csv" | "tsv" => read_delimited(bytes)?,
        "xlsx" | "xls" => read_excel(bytes, ext)?,
        other => return Err(IngestError::UnsupportedExtension(other.to_string())),
    };

    let mapping = headers::map_headers(&headers_row);
    let schema_score = if headers_row.is_empty() {
        0.0
    } else {
        mapping.len() as f64 / headers_row.len() as f64
    };

    let mapped_rows: Vec<RawRow> = rows
        .into_iter()
        .map(|row| {
            let mut mapped = RawRow::new();
            for (original, value) in row {
                if let Some(target) = mapping.get(&original) {
                    mapped.insert(target.clone(), value);
                }
            }
            mapped
        })
        .collect();

    let unmapped_headers: Vec<String> = headers_row
        .iter()
        .filter(|h| !mapping.contains_key(h.as_str()))
        .cloned()
        .collect();

    let report = validate_batch(mapped_rows, SourceStage::Stage1Classic);
    // Whether Stage 2 itself runs is the caller's decision (`config.ia_targeted_enabled`
    // gates execution, not this quality judgment).
    let escalate_to_stage2 = schema_score < config.schema_score_th || report.valid_fraction() < config.min_valid_rows;

    Ok(Stage1Outcome { report, schema_score, escalate_to_stage2, unmapped_headers })
}

/// Sniff the delimiter among `,`, `;`, tab and `|` by picking the one that
/// gives the most consistent column count across the sampled lines.
fn sniff_delimiter(text: &str) -> u8 {
    let sample: Vec<&str> = text.lines().take(20).collect();
    let mut best = (b',', 0usize);

    for &delim in CANDIDATE_DELIMITERS {
        let ch = delim as char;
        let counts: Vec<usize> = sample.iter().map(|line| line.matches(ch).count() + 1).collect();
        if counts.is_empty() || counts.iter().all(|&c| c <= 1) {
            continue;
        }
        let first = counts[0];
        let consistent = counts.iter().filter(|&&c| c == first).count();
        if consistent > best.1 {
            best = (delim, consistent);
        }
    }
    best.0
}

fn read_delimited(bytes: &[u8]) -> Result<(Vec<String>, Vec<Vec<(String, String)>>), IngestError> {
    let (text, _) = encoding::detect_and_decode(bytes);
    let delimiter = sniff_delimiter(&text);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers_row: Vec<String> = reader
        .headers()
        .map_err(|e| IngestError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    // Deduplicate repeated header lines (e.g. merged multi-sheet exports
    // that re-print the header row partway through the body).
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| IngestError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        if record.iter().collect::<Vec<_>>() == headers_row.iter().map(String::as_str).collect::<Vec<_>>() {
            continue;
        }
        let row: Vec<(String, String)> = headers_row
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), v.trim().to_string()))
            .collect();
        rows.push(row);
    }

    Ok((headers_row, rows))
}

/// Shared with Stage 3's text-preparation path, which needs the same raw
/// cells serialized as plain text rather than validated rows.
pub(crate) fn read_excel_rows(bytes: &[u8], ext: &str) -> Result<(Vec<String>, Vec<Vec<(String, String)>>), IngestError> {
    read_excel(bytes, ext)
}

fn read_excel(bytes: &[u8], ext: &str) -> Result<(Vec<String>, Vec<Vec<(String, String)>>), IngestError> {
    let cursor = Cursor::new(bytes.to_vec());
    let sheet = if ext == "xls" {
        let mut workbook: Xls<_> = open_workbook_from_rw(cursor)
            .map_err(|e| IngestError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())))?;
        first_sheet_rows(&mut workbook)?
    } else {
        let mut workbook: Xlsx<_> = open_workbook_from_rw(cursor)
            .map_err(|e| IngestError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())))?;
        first_sheet_rows(&mut workbook)?
    };
    Ok(sheet)
}

fn first_sheet_rows<R: Reader<Cursor<Vec<u8>>>>(
    workbook: &mut R,
) -> Result<(Vec<String>, Vec<Vec<(String, String)>>), IngestError> {
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(IngestError::EmptyFile)?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| IngestError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())))?;

    let mut rows_iter = range.rows();
    let header_cells = rows_iter.next().ok_or(IngestError::EmptyFile)?;
    let headers_row: Vec<String> = header_cells.iter().map(cell_to_string).collect();

    let rows: Vec<Vec<(String, String)>> = rows_iter
        .map(|cells| {
            headers_row
                .iter()
                .zip(cells.iter())
                .map(|(h, c)| (h.clone(), cell_to_string(c)))
                .collect()
        })
        .collect();

    Ok((headers_row, rows))
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#ERROR:{e:?}"),
    }
}
