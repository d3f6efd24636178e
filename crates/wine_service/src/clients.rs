//! Production `LlmClient`/`OcrClient` stand-ins.
//!
//! Both stage2/stage3 (LLM) and stage4 (OCR) call out to an external
//! vendor API that spec §1 places out of scope for this repo — the same
//! boundary the teacher draws around its own plugin-process dispatch.
//! `wine_ingest` isolates the call behind a trait for testability
//! (`wine_ingest::llm::fakes::ScriptedLlmClient` is what its own tests
//! use); this crate's production binary needs a concrete type to hand the
//! pipeline, so `UnconfiguredLlmClient`/`UnconfiguredOcrClient` fail loudly
//! until a real vendor integration is wired in by a deployment that has
//! one.

use async_trait::async_trait;
use wine_ingest::{LlmClient, LlmRequest, LlmResponse, OcrClient, OcrResult};

pub struct UnconfiguredLlmClient;

#[async_trait]
impl LlmClient for UnconfiguredLlmClient {
    async fn complete(&self, request: LlmRequest) -> anyhow::Result<LlmResponse> {
        anyhow::bail!(
            "no LLM provider configured for model {:?}; wire a real LlmClient implementation before enabling stage2/stage3",
            request.model
        )
    }
}

pub struct UnconfiguredOcrClient;

#[async_trait]
impl OcrClient for UnconfiguredOcrClient {
    async fn extract_text(&self, _bytes: &[u8], ext: &str) -> anyhow::Result<OcrResult> {
        anyhow::bail!("no OCR provider configured for .{ext} input; wire a real OcrClient implementation before enabling stage4")
    }
}
