/// OpenAI-compatible chat completions.
pub mod openai;

use crate::stream::StreamEvent;
use async_trait::async_trait;
use parley_core::{Message, ParleyResult};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use openai::OpenAiBackend;

/// Trait for LLM provider backends.
///
/// A backend turns a system prompt plus a message window into assistant text.
/// Provider failures are reported as [`ParleyError::Upstream`](parley_core::ParleyError::Upstream).
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Non-streaming chat completion.
    async fn chat(&self, system_prompt: Option<&str>, messages: &[Message])
        -> ParleyResult<String>;

    /// Streaming chat completion.
    ///
    /// Returns a receiver for stream events and a join handle that resolves
    /// to the full assistant text once the provider is done.
    async fn chat_stream(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
    ) -> ParleyResult<(mpsc::Receiver<StreamEvent>, JoinHandle<ParleyResult<String>>)>;
}
