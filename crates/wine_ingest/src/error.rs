//! Closed error taxonomy for the ingestion pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported file extension: .{0}")]
    UnsupportedExtension(String),

    #[error("could not determine file extension for {0}")]
    MissingExtension(String),

    #[error("file is empty")]
    EmptyFile,

    #[error("stage disabled and no further escalation available")]
    StageDisabled,

    #[error("LLM call failed: {0}")]
    LlmCall(String),

    #[error("OCR extraction failed: {0}")]
    Ocr(String),

    #[error("no rows survived extraction")]
    NoRowsExtracted,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
