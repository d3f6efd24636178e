//! LLM call isolation seam, grounded in the teacher's pattern of hiding
//! external I/O behind a narrow trait so pipeline logic can be exercised
//! with a fake in tests (the same role the teacher's `Worker::connect`/
//! `recv` boundary plays for ZeroMQ sockets).

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    /// Estimated prompt + completion tokens, used by wine_alerts' cost rollup.
    pub tokens_used: u32,
}

/// Isolates calls to an external LLM provider so stage2/stage3 logic can be
/// tested without network access.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> anyhow::Result<LlmResponse>;
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::sync::Mutex;

    /// Returns a fixed canned response for every call, recording the
    /// requests it received so tests can assert on prompts.
    pub struct ScriptedLlmClient {
        pub responses: Mutex<Vec<String>>,
        pub received: Mutex<Vec<LlmRequest>>,
    }

    impl ScriptedLlmClient {
        pub fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().map(String::from).collect()),
                received: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlmClient {
        async fn complete(&self, request: LlmRequest) -> anyhow::Result<LlmResponse> {
            self.received.lock().unwrap().push(request.clone());
            let text = self
                .responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| anyhow::anyhow!("no more scripted responses"))?;
            Ok(LlmResponse { tokens_used: (text.len() / 4) as u32, text })
        }
    }
}
