//! Escalating ingestion pipeline (spec §4.B/§4.F): classic CSV/Excel
//! parsing, targeted AI header/row repair, full LLM extraction, and OCR
//! for scanned documents, with a hybrid merge/fallback policy tying the
//! stages together.

pub mod config;
pub mod encoding;
pub mod error;
pub mod gate;
pub mod headers;
pub mod llm;
pub mod ocr;
pub mod pipeline;
pub mod stage1;
pub mod stage2;
pub mod stage3;
pub mod stage4;

pub use config::Config;
pub use error::IngestError;
pub use llm::{LlmClient, LlmRequest, LlmResponse};
pub use ocr::{OcrClient, OcrResult};
pub use pipeline::{process_file, FinalMethod, PipelineOutcome};
