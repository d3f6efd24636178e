//! OCR call isolation seam, same rationale as [`crate::llm`].

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct OcrResult {
    pub text: String,
    pub pages: u32,
}

#[async_trait]
pub trait OcrClient: Send + Sync {
    async fn extract_text(&self, bytes: &[u8], ext: &str) -> anyhow::Result<OcrResult>;
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;

    pub struct FixedOcrClient {
        pub text: String,
        pub pages: u32,
    }

    #[async_trait]
    impl OcrClient for FixedOcrClient {
        async fn extract_text(&self, _bytes: &[u8], _ext: &str) -> anyhow::Result<OcrResult> {
            Ok(OcrResult { text: self.text.clone(), pages: self.pages })
        }
    }
}
