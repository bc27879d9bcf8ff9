//! Inference backend layer
//! The scheduler talks to text generation through the `InferenceBackend`
//! trait; `OllamaClient` is the production implementation.

pub mod ollama_client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use ollama_client::{
    GenerateOptions, GenerateOutcome, OllamaClient, ToolChatOutcome, ToolInvocation, ToolSpec,
};

/// Outcome of the backend health probe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Availability {
    pub fn up() -> Self {
        Self {
            available: true,
            error: None,
        }
    }

    pub fn down(error: impl Into<String>) -> Self {
        Self {
            available: false,
            error: Some(error.into()),
        }
    }
}

/// Seam between the scheduler and the inference service. One instance is
/// constructed per application lifetime and passed down explicitly; tests
/// inject stubs to force outages and canned replies.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Lightweight health + model-presence probe.
    async fn availability(&self) -> Availability;

    /// Blocking text generation. Failures are values, never `Err`.
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> GenerateOutcome;

    /// Structured tool-calling request. Backends that reject tool calling
    /// report `tools_unsupported` so callers can fall back to free text.
    async fn chat_with_tools(
        &self,
        system: &str,
        prompt: &str,
        tools: &[ToolSpec],
        options: &GenerateOptions,
    ) -> ToolChatOutcome;
}
