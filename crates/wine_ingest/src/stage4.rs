//! Stage 4: OCR extractor (spec §4.F stage 4), grounded in
//! `ingest/ocr_extract.py`. Scanned images and PDFs never have a header
//! row to parse, so this stage only produces raw text; the actual row
//! extraction is delegated to [`crate::stage3::extract_with_llm`].

use crate::config::Config;
use crate::error::IngestError;
use crate::ocr::OcrClient;

#[derive(Debug, Clone)]
pub struct Stage4Outcome {
    pub text: String,
    pub pages: u32,
}

pub async fn run(bytes: &[u8], ext: &str, ocr: &dyn OcrClient, config: &Config) -> Result<Stage4Outcome, IngestError> {
    if !config.ocr_enabled {
        return Err(IngestError::StageDisabled);
    }

    if bytes.is_empty() {
        return Err(IngestError::EmptyFile);
    }

    let result = ocr
        .extract_text(bytes, ext)
        .await
        .map_err(|e| IngestError::Ocr(e.to_string()))?;

    if result.text.trim().is_empty() {
        return Err(IngestError::Ocr("no text recognized in image".to_string()));
    }

    Ok(Stage4Outcome { text: result.text, pages: result.pages })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::fakes::FixedOcrClient;

    #[tokio::test]
    async fn returns_recognized_text() {
        let ocr = FixedOcrClient { text: "Barolo | Rossi | 2015".to_string(), pages: 1 };
        let outcome = run(b"fake-image-bytes", "png", &ocr, &Config::default()).await.unwrap();
        assert_eq!(outcome.pages, 1);
        assert!(outcome.text.contains("Barolo"));
    }

    #[tokio::test]
    async fn rejects_blank_ocr_result() {
        let ocr = FixedOcrClient { text: "   ".to_string(), pages: 1 };
        assert!(run(b"fake-image-bytes", "png", &ocr, &Config::default()).await.is_err());
    }

    #[tokio::test]
    async fn rejects_empty_file() {
        let ocr = FixedOcrClient { text: "irrelevant".to_string(), pages: 0 };
        assert!(matches!(run(&[], "png", &ocr, &Config::default()).await, Err(IngestError::EmptyFile)));
    }

    #[tokio::test]
    async fn rejects_when_ocr_disabled() {
        let ocr = FixedOcrClient { text: "Barolo".to_string(), pages: 1 };
        let config = Config { ocr_enabled: false, ..Config::default() };
        assert!(matches!(run(b"fake-image-bytes", "png", &ocr, &config).await, Err(IngestError::StageDisabled)));
    }
}
