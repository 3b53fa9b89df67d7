//! The [`LlmTurn`] seam: lets the loop drive any single-turn completer,
//! not just [`LlmDriver`] directly, so it can be exercised with a
//! deterministic stub in tests.

use async_trait::async_trait;
use chatos_llm::{LlmDriver, LlmRequest, LlmResponse, LlmResult};

/// Runs exactly one (possibly retried) completion and returns the
/// accumulated response.
#[async_trait]
pub trait LlmTurn: Send + Sync {
    /// Complete one turn of the conversation in `request`.
    async fn complete(&self, request: &LlmRequest) -> LlmResult<LlmResponse>;
}

#[async_trait]
impl LlmTurn for LlmDriver {
    async fn complete(&self, request: &LlmRequest) -> LlmResult<LlmResponse> {
        LlmDriver::complete(self, request).await
    }
}
